use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use crate::health_cache::HealthCache;
use crate::model::ProcessorType;
use crate::processor::ProcessorClient;
use crate::store::Store;

const LEASE_NAME: &str = "healthcheck-leader-lock-registry:global-health-check-leader-task";
const LEASE_TTL: Duration = Duration::from_secs(12);
const JOINT_PROBE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub probe_interval: Duration,
}

/// Leader-elected periodic prober: at most one instance in the fleet
/// holds the lease and calls the two processors' health endpoints in a
/// given interval, publishing results into the shared health cache.
pub struct HealthOrchestrator {
    store: Arc<dyn Store>,
    processor: Arc<dyn ProcessorClient>,
    health: HealthCache,
    config: OrchestratorConfig,
}

impl HealthOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        processor: Arc<dyn ProcessorClient>,
        health: HealthCache,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            processor,
            health,
            config,
        }
    }

    pub async fn run_forever(self: Arc<Self>) {
        let mut ticker = interval(self.config.probe_interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One leader tick: `Idle -> ProbeInFlight -> Publishing -> Idle`.
    /// A tick that fails to acquire the lease returns immediately,
    /// leaving probing to whichever instance currently holds it.
    pub async fn tick(&self) {
        let lease = match self.store.try_acquire_lease(LEASE_NAME, LEASE_TTL).await {
            Ok(Some(lease)) => lease,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(%error, "lease acquisition failed, skipping health probe tick");
                return;
            }
        };

        let probes = async {
            tokio::join!(
                self.processor.probe(ProcessorType::Default),
                self.processor.probe(ProcessorType::Fallback),
            )
        };

        let (default_view, fallback_view) =
            match tokio::time::timeout(JOINT_PROBE_DEADLINE, probes).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("joint health probe deadline exceeded");
                    drop(lease);
                    return;
                }
            };

        self.publish(ProcessorType::Default, default_view).await;
        self.publish(ProcessorType::Fallback, fallback_view).await;

        drop(lease);
    }

    async fn publish(&self, kind: ProcessorType, view: Option<crate::model::HealthView>) {
        let result = match view {
            Some(view) => self.health.set(kind, view).await,
            None => self.health.clear(kind).await,
        };

        if let Err(error) = result {
            tracing::warn!(%kind, %error, "failed to publish health probe result");
        }
    }
}
