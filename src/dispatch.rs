use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::health_cache::HealthCache;
use crate::history::HistoryRecorder;
use crate::model::{Payment, ProcessorType};
use crate::processor::{ProcessorClient, SubmitOutcome};

/// Abstraction the dispatch engine re-enqueues through. This is the
/// indirection that breaks the dispatch <-> queue dependency cycle:
/// dispatch depends only on this trait, the queue adapter implements it,
/// and nothing in this module knows the main queue's key name.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn republish(&self, payment: &Payment) -> Result<(), StoreError>;
}

/// `Publisher` that re-enqueues onto the main queue list in the shared
/// store. `Consumer` reads from the same key; `DispatchEngine` never
/// sees it directly.
pub struct MainQueuePublisher {
    store: Arc<dyn crate::store::Store>,
    queue_key: String,
}

impl MainQueuePublisher {
    pub fn new(store: Arc<dyn crate::store::Store>, queue_key: String) -> Self {
        Self { store, queue_key }
    }
}

#[async_trait]
impl Publisher for MainQueuePublisher {
    async fn republish(&self, payment: &Payment) -> Result<(), StoreError> {
        let json = serde_json::to_string(payment)?;
        self.store.list_push_head(&self.queue_key, json).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub assume_healthy_when_unknown: bool,
    pub max_retry_attempts_per_dispatch: u32,
    pub max_reenqueue_count: u32,
}

pub struct DispatchEngine {
    processor: Arc<dyn ProcessorClient>,
    health: HealthCache,
    history: HistoryRecorder,
    publisher: Arc<dyn Publisher>,
    config: RetryConfig,
}

impl DispatchEngine {
    pub fn new(
        processor: Arc<dyn ProcessorClient>,
        health: HealthCache,
        history: HistoryRecorder,
        publisher: Arc<dyn Publisher>,
        config: RetryConfig,
    ) -> Self {
        Self {
            processor,
            health,
            history,
            publisher,
            config,
        }
    }

    async fn is_healthy(&self, kind: ProcessorType) -> bool {
        match self.health.get(kind).await {
            Ok(Some(view)) => view.is_healthy(),
            Ok(None) => self.config.assume_healthy_when_unknown,
            Err(error) => {
                tracing::warn!(%kind, %error, "health cache read failed, treating as unhealthy");
                false
            }
        }
    }

    /// Runs the full dispatch-and-retry algorithm for one payment.
    /// Returns whether it was ultimately accepted by a processor this
    /// call (a `false` return with `status == Retry` means it has been
    /// re-enqueued, not dropped).
    #[tracing::instrument(skip(self, payment), fields(correlation_id = %payment.correlation_id))]
    pub async fn dispatch_one(&self, mut payment: Payment) -> bool {
        payment.mark_processing();

        for _attempt in 0..self.config.max_retry_attempts_per_dispatch.max(1) {
            for kind in ProcessorType::ALL {
                if !self.is_healthy(kind).await {
                    continue;
                }

                match self.processor.submit(kind, &payment).await {
                    SubmitOutcome::Accepted => {
                        payment.mark_succeeded(kind);
                        if let Err(error) = self.history.record(&payment).await {
                            tracing::error!(
                                correlation_id = %payment.correlation_id,
                                %error,
                                "failed to record successful payment to history"
                            );
                        }
                        return true;
                    }
                    SubmitOutcome::Rejected => {
                        tracing::debug!(%kind, correlation_id = %payment.correlation_id, "submit rejected, trying next option");
                    }
                }
            }
        }

        self.handle_exhausted(payment).await;
        false
    }

    async fn handle_exhausted(&self, mut payment: Payment) {
        payment.mark_retry();

        if payment.retry_count > self.config.max_reenqueue_count {
            payment.mark_failed();
            tracing::warn!(
                correlation_id = %payment.correlation_id,
                retry_count = payment.retry_count,
                "payment exceeded max re-enqueue count, terminal failure"
            );
            return;
        }

        if let Err(error) = self.publisher.republish(&payment).await {
            tracing::error!(
                correlation_id = %payment.correlation_id,
                %error,
                "failed to re-enqueue payment, dropping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockStore, Store};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    struct QueuePublisher {
        store: Arc<MockStore>,
        key: &'static str,
    }

    #[async_trait]
    impl Publisher for QueuePublisher {
        async fn republish(&self, payment: &Payment) -> Result<(), StoreError> {
            let json = serde_json::to_string(payment)?;
            self.store.list_push_head(self.key, json).await
        }
    }

    fn sample_payment() -> Payment {
        Payment::new(Uuid::new_v4(), Decimal::from_str("19.90").unwrap(), Utc::now())
    }

    fn default_config() -> RetryConfig {
        RetryConfig {
            assume_healthy_when_unknown: false,
            max_retry_attempts_per_dispatch: 2,
            max_reenqueue_count: 3,
        }
    }

    fn engine(
        store: Arc<MockStore>,
        processor: Arc<crate::processor::MockProcessorClient>,
        config: RetryConfig,
    ) -> DispatchEngine {
        DispatchEngine::new(
            processor,
            HealthCache::new(store.clone()),
            HistoryRecorder::new(store.clone()),
            Arc::new(QueuePublisher { store, key: "main" }),
            config,
        )
    }

    #[tokio::test]
    async fn happy_path_records_to_default_history() {
        let store = Arc::new(MockStore::new());
        crate::health_cache::HealthCache::new(store.clone())
            .set(ProcessorType::Default, crate::model::HealthView::new(false, 10))
            .await
            .unwrap();

        let processor = Arc::new(
            crate::processor::MockProcessorClient::new()
                .with_default_submit(ProcessorType::Default, SubmitOutcome::Accepted),
        );

        let engine = engine(store.clone(), processor, default_config());
        let accepted = engine.dispatch_one(sample_payment()).await;

        assert!(accepted);
        assert_eq!(store.list_snapshot("payments:history:default").len(), 1);
        assert!(store.list_snapshot("main").is_empty());
    }

    #[tokio::test]
    async fn falls_back_when_default_is_unhealthy() {
        let store = Arc::new(MockStore::new());
        let cache = HealthCache::new(store.clone());
        cache
            .set(ProcessorType::Default, crate::model::HealthView::new(true, 0))
            .await
            .unwrap();
        cache
            .set(ProcessorType::Fallback, crate::model::HealthView::new(false, 50))
            .await
            .unwrap();

        let processor = Arc::new(
            crate::processor::MockProcessorClient::new()
                .with_default_submit(ProcessorType::Fallback, SubmitOutcome::Accepted),
        );

        let engine = engine(store.clone(), processor.clone(), default_config());
        let accepted = engine.dispatch_one(sample_payment()).await;

        assert!(accepted);
        assert_eq!(processor.submit_call_count(ProcessorType::Default), 0);
        assert_eq!(store.list_snapshot("payments:history:fallback").len(), 1);
    }

    #[tokio::test]
    async fn both_unhealthy_reenqueues_without_any_http_call() {
        let store = Arc::new(MockStore::new());
        let cache = HealthCache::new(store.clone());
        cache
            .set(ProcessorType::Default, crate::model::HealthView::new(true, 0))
            .await
            .unwrap();
        cache
            .set(ProcessorType::Fallback, crate::model::HealthView::new(true, 0))
            .await
            .unwrap();

        let processor = Arc::new(crate::processor::MockProcessorClient::new());
        let engine = engine(store.clone(), processor.clone(), default_config());
        let accepted = engine.dispatch_one(sample_payment()).await;

        assert!(!accepted);
        assert_eq!(processor.submit_call_count(ProcessorType::Default), 0);
        assert_eq!(processor.submit_call_count(ProcessorType::Fallback), 0);

        let requeued = store.list_snapshot("main");
        assert_eq!(requeued.len(), 1);
        let payment: Payment = serde_json::from_str(&requeued[0]).unwrap();
        assert_eq!(payment.retry_count, 1);
    }

    #[tokio::test]
    async fn missing_health_is_treated_as_skip_by_default() {
        let store = Arc::new(MockStore::new());
        let processor = Arc::new(crate::processor::MockProcessorClient::new());
        let engine = engine(store.clone(), processor.clone(), default_config());

        let accepted = engine.dispatch_one(sample_payment()).await;

        assert!(!accepted);
        assert_eq!(processor.submit_call_count(ProcessorType::Default), 0);
        assert_eq!(processor.submit_call_count(ProcessorType::Fallback), 0);
    }

    #[tokio::test]
    async fn exceeding_reenqueue_ceiling_is_terminal() {
        let store = Arc::new(MockStore::new());
        let processor = Arc::new(crate::processor::MockProcessorClient::new());
        let config = RetryConfig {
            assume_healthy_when_unknown: false,
            max_retry_attempts_per_dispatch: 1,
            max_reenqueue_count: 0,
        };
        let engine = engine(store.clone(), processor, config);

        let accepted = engine.dispatch_one(sample_payment()).await;

        assert!(!accepted);
        assert!(store.list_snapshot("main").is_empty());
    }
}
