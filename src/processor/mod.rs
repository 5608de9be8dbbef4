mod http_client;
mod mock_client;

pub use http_client::HttpProcessorClient;
pub use mock_client::{MockProcessorClient, ScriptedResponse};

use async_trait::async_trait;

use crate::model::{HealthView, Payment, ProcessorType};

/// Result of a single `POST /payments` call, already collapsed into the
/// two outcomes the dispatch engine cares about -- the idempotent-replay
/// case is folded into `Accepted` here, not left for the caller to
/// reinterpret a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected,
}

/// Two-endpoint HTTP caller for the external payment processors.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn probe(&self, kind: ProcessorType) -> Option<HealthView>;
    async fn submit(&self, kind: ProcessorType, payment: &Payment) -> SubmitOutcome;
}
