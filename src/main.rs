use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use rinha_worker::config::WorkerConfig;
use rinha_worker::consumer::{Consumer, ConsumerConfig};
use rinha_worker::dispatch::{DispatchEngine, MainQueuePublisher, RetryConfig};
use rinha_worker::health_cache::HealthCache;
use rinha_worker::history::HistoryRecorder;
use rinha_worker::orchestrator::{HealthOrchestrator, OrchestratorConfig};
use rinha_worker::processor::HttpProcessorClient;
use rinha_worker::store::{RedisStore, Store};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rinha_worker=info,reqwest=warn"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "failed to load configuration");
            std::process::exit(1);
        }
    };
    config.log_configuration();

    let store: Arc<dyn Store> = match RedisStore::new(&config.redis_url) {
        Ok(store) => Arc::new(store),
        Err(error) => {
            tracing::error!(%error, "failed to initialize data-store client");
            std::process::exit(1);
        }
    };

    if let Err(error) = store.list_len(&config.main_queue_key).await {
        tracing::error!(%error, "data-store is unreachable at startup");
        std::process::exit(1);
    }

    let processor = match HttpProcessorClient::new(
        config.default_processor_url.clone(),
        config.fallback_processor_url.clone(),
    ) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            tracing::error!(%error, "failed to build processor HTTP client");
            std::process::exit(1);
        }
    };

    let dispatch = Arc::new(DispatchEngine::new(
        processor.clone(),
        HealthCache::new(store.clone()),
        HistoryRecorder::new(store.clone()),
        Arc::new(MainQueuePublisher::new(store.clone(), config.main_queue_key.clone())),
        RetryConfig {
            assume_healthy_when_unknown: config.assume_healthy_when_unknown,
            max_retry_attempts_per_dispatch: config.max_retry_attempts_per_dispatch,
            max_reenqueue_count: config.max_reenqueue_count,
        },
    ));

    let consumer = Arc::new(Consumer::new(
        store.clone(),
        dispatch,
        config.main_queue_key.clone(),
        ConsumerConfig {
            max_concurrent_payments: config.max_concurrent_payments,
            batch_size: config.batch_size,
            execution_delay: config.execution_delay,
        },
    ));

    let orchestrator = Arc::new(HealthOrchestrator::new(
        store.clone(),
        processor,
        HealthCache::new(store.clone()),
        OrchestratorConfig { probe_interval: config.probe_interval },
    ));

    tracing::info!("rinha-worker started");

    tokio::select! {
        _ = consumer.run_forever() => {},
        _ = orchestrator.run_forever() => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, exiting (in-flight dispatches are abandoned)");
        }
    }
}
