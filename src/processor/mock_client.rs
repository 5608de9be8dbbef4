use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::{HealthView, Payment, ProcessorType};

use super::{ProcessorClient, SubmitOutcome};

/// A scripted response for one processor, keyed by correlation id so a
/// test can make the same processor behave differently across retries
/// of the same payment (e.g. reject then idempotent-accept).
#[derive(Clone)]
pub struct ScriptedResponse {
    pub health: Option<HealthView>,
    pub submit: SubmitOutcome,
}

/// `ProcessorClient` double for tests. Health views are set per
/// processor; submit outcomes default per-processor but can be
/// overridden per correlation id to script multi-attempt scenarios.
#[derive(Default)]
pub struct MockProcessorClient {
    health: Mutex<HashMap<ProcessorType, Option<HealthView>>>,
    default_submit: Mutex<HashMap<ProcessorType, SubmitOutcome>>,
    submit_overrides: Mutex<HashMap<(ProcessorType, uuid::Uuid), SubmitOutcome>>,
    submit_calls: Mutex<Vec<(ProcessorType, uuid::Uuid)>>,
}

impl MockProcessorClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_health(self, kind: ProcessorType, view: Option<HealthView>) -> Self {
        self.health.lock().unwrap().insert(kind, view);
        self
    }

    pub fn with_default_submit(self, kind: ProcessorType, outcome: SubmitOutcome) -> Self {
        self.default_submit.lock().unwrap().insert(kind, outcome);
        self
    }

    pub fn with_submit_override(
        self,
        kind: ProcessorType,
        correlation_id: uuid::Uuid,
        outcome: SubmitOutcome,
    ) -> Self {
        self.submit_overrides
            .lock()
            .unwrap()
            .insert((kind, correlation_id), outcome);
        self
    }

    pub fn submit_call_count(&self, kind: ProcessorType) -> usize {
        self.submit_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl ProcessorClient for MockProcessorClient {
    async fn probe(&self, kind: ProcessorType) -> Option<HealthView> {
        self.health.lock().unwrap().get(&kind).copied().flatten()
    }

    async fn submit(&self, kind: ProcessorType, payment: &Payment) -> SubmitOutcome {
        self.submit_calls
            .lock()
            .unwrap()
            .push((kind, payment.correlation_id));

        if let Some(outcome) = self
            .submit_overrides
            .lock()
            .unwrap()
            .get(&(kind, payment.correlation_id))
        {
            return *outcome;
        }

        self.default_submit
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(SubmitOutcome::Rejected)
    }
}
