use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use crate::dispatch::DispatchEngine;
use crate::model::Payment;
use crate::store::Store;

const FIRST_POP_BLOCK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct ConsumerConfig {
    pub max_concurrent_payments: u32,
    pub batch_size: u32,
    pub execution_delay: Duration,
}

/// Atomic counters tracking in-flight and lifetime dispatch activity.
/// These are the only in-process shared mutable state in the worker;
/// everything else flows through the data store.
#[derive(Default)]
pub struct ConsumerMetrics {
    pub active_count: AtomicU64,
    /// Dispatches that finished by being accepted by a processor, not
    /// merely finishing regardless of outcome.
    pub completed_count: AtomicU64,
    pub total_count: AtomicU64,
    pub batch_count: AtomicU64,
}

/// RAII guard decrementing `active_count` when a dispatch task finishes
/// and, if the dispatch succeeded, incrementing `completed_count` --
/// Rust has no `finally`, so the guard's `Drop` plays that role for the
/// unconditional half of the bookkeeping. `mark_succeeded` must be
/// called before the guard is dropped to count a successful dispatch.
struct InFlightGuard {
    metrics: Arc<ConsumerMetrics>,
    succeeded: bool,
}

impl InFlightGuard {
    fn mark_succeeded(&mut self) {
        self.succeeded = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.active_count.fetch_sub(1, Ordering::SeqCst);
        if self.succeeded {
            self.metrics.completed_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct Consumer {
    store: Arc<dyn Store>,
    dispatch: Arc<DispatchEngine>,
    queue_key: String,
    config: ConsumerConfig,
    pub metrics: Arc<ConsumerMetrics>,
}

impl Consumer {
    pub fn new(
        store: Arc<dyn Store>,
        dispatch: Arc<DispatchEngine>,
        queue_key: String,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            store,
            dispatch,
            queue_key,
            config,
            metrics: Arc::new(ConsumerMetrics::default()),
        }
    }

    pub async fn run_forever(self: Arc<Self>) {
        let mut ticker = interval(self.config.execution_delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One consumer tick: compute backpressure-aware batch size, pop up
    /// to that many items (first pop short-blocking, rest non-blocking),
    /// and fan each out onto its own dispatch task.
    pub async fn tick(&self) {
        let active = self.metrics.active_count.load(Ordering::SeqCst) as i64;
        let available_slots = self.config.max_concurrent_payments as i64 - active;
        if available_slots <= 0 {
            return;
        }

        let current_batch = (self.config.batch_size as i64).min(available_slots);
        if current_batch <= 0 {
            return;
        }

        let Some(first) = self.pop_one(Some(FIRST_POP_BLOCK)).await else {
            return;
        };

        self.spawn_dispatch(first);
        let mut popped_this_tick = 1;

        for _ in 1..current_batch {
            match self.pop_one(None).await {
                Some(payload) => {
                    self.spawn_dispatch(payload);
                    popped_this_tick += 1;
                }
                None => break,
            }
        }

        if popped_this_tick > 0 {
            self.metrics.batch_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn pop_one(&self, block_for: Option<Duration>) -> Option<String> {
        match self.store.list_pop_tail(&self.queue_key, block_for).await {
            Ok(item) => item,
            Err(error) => {
                tracing::warn!(%error, "store error popping main queue, skipping this tick");
                None
            }
        }
    }

    fn spawn_dispatch(&self, payload: String) {
        let payment: Payment = match serde_json::from_str(&payload) {
            Ok(payment) => payment,
            Err(error) => {
                tracing::error!(%error, payload, "dropping malformed queue entry");
                return;
            }
        };

        self.metrics.active_count.fetch_add(1, Ordering::SeqCst);
        self.metrics.total_count.fetch_add(1, Ordering::SeqCst);

        let dispatch = self.dispatch.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut guard = InFlightGuard { metrics, succeeded: false };
            if dispatch.dispatch_one(payment).await {
                guard.mark_succeeded();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health_cache::HealthCache;
    use crate::history::HistoryRecorder;
    use crate::model::ProcessorType;
    use crate::processor::{MockProcessorClient, SubmitOutcome};
    use crate::store::MockStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    struct QueuePublisher {
        store: Arc<MockStore>,
        key: String,
    }

    #[async_trait]
    impl crate::dispatch::Publisher for QueuePublisher {
        async fn republish(&self, payment: &Payment) -> Result<(), crate::error::StoreError> {
            let json = serde_json::to_string(payment)?;
            self.store.list_push_head(&self.key, json).await
        }
    }

    fn build_consumer(
        store: Arc<MockStore>,
        processor: Arc<MockProcessorClient>,
        max_concurrent: u32,
        batch_size: u32,
    ) -> Consumer {
        let engine = Arc::new(DispatchEngine::new(
            processor,
            HealthCache::new(store.clone()),
            HistoryRecorder::new(store.clone()),
            Arc::new(QueuePublisher { store: store.clone(), key: "q".into() }),
            crate::dispatch::RetryConfig {
                assume_healthy_when_unknown: false,
                max_retry_attempts_per_dispatch: 2,
                max_reenqueue_count: 3,
            },
        ));

        Consumer::new(
            store,
            engine,
            "q".into(),
            ConsumerConfig {
                max_concurrent_payments: max_concurrent,
                batch_size,
                execution_delay: Duration::from_millis(200),
            },
        )
    }

    async fn push_payment(store: &MockStore, key: &str) {
        let payment = Payment::new(Uuid::new_v4(), Decimal::from_str("5.00").unwrap(), Utc::now());
        store
            .list_push_head(key, serde_json::to_string(&payment).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_queue_tick_performs_no_http_calls() {
        let store = Arc::new(MockStore::new());
        let processor = Arc::new(MockProcessorClient::new());
        let consumer = build_consumer(store, processor.clone(), 10, 10);

        consumer.tick().await;

        assert_eq!(processor.submit_call_count(ProcessorType::Default), 0);
        assert_eq!(consumer.metrics.batch_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn saturated_consumer_performs_zero_pops() {
        let store = Arc::new(MockStore::new());
        push_payment(&store, "q").await;

        let processor = Arc::new(MockProcessorClient::new());
        let consumer = build_consumer(store.clone(), processor, 1, 10);
        consumer.metrics.active_count.store(1, Ordering::SeqCst);

        consumer.tick().await;

        assert_eq!(store.list_len("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tick_fans_out_a_popped_payment_to_dispatch() {
        let store = Arc::new(MockStore::new());
        push_payment(&store, "q").await;

        HealthCache::new(store.clone())
            .set(ProcessorType::Default, crate::model::HealthView::new(false, 5))
            .await
            .unwrap();

        let processor = Arc::new(
            MockProcessorClient::new().with_default_submit(ProcessorType::Default, SubmitOutcome::Accepted),
        );
        let consumer = build_consumer(store.clone(), processor, 10, 10);

        consumer.tick().await;
        // dispatch runs on a spawned task; give it a chance to complete.
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if consumer.metrics.completed_count.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(consumer.metrics.total_count.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.metrics.completed_count.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.metrics.active_count.load(Ordering::SeqCst), 0);
    }
}
