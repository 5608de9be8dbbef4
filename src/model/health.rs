use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one processor's readiness, written by the health
/// orchestrator and read by the dispatch engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthView {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
    #[serde(rename = "lastCheckedAt")]
    pub last_checked_at: DateTime<Utc>,
}

impl HealthView {
    pub fn new(failing: bool, min_response_time: u64) -> Self {
        Self {
            failing,
            min_response_time,
            last_checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        !self.failing
    }
}

/// Wire shape of `GET /payments/service-health`, decoded before being
/// wrapped into a `HealthView` with a freshly-stamped `last_checked_at`.
#[derive(Debug, Deserialize)]
pub struct ServiceHealthResponse {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
}
