use std::time::Duration;

use crate::error::WorkerError;

/// Process-wide configuration, loaded once at startup from environment
/// variables. Every field here corresponds to a variable in the
/// configuration table; unset variables fall back to the documented
/// defaults.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub default_processor_url: String,
    pub fallback_processor_url: String,
    pub main_queue_key: String,
    pub max_concurrent_payments: u32,
    pub batch_size: u32,
    pub execution_delay: Duration,
    pub assume_healthy_when_unknown: bool,
    pub max_retry_attempts_per_dispatch: u32,
    pub max_reenqueue_count: u32,
    pub probe_interval: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, WorkerError> {
        let config = Self {
            redis_url: env_or("REDIS_URL", "redis://localhost:6379/0"),
            default_processor_url: env_or(
                "PAYMENT_PROCESSOR_DEFAULT_URL",
                "http://localhost:8001",
            ),
            fallback_processor_url: env_or(
                "PAYMENT_PROCESSOR_FALLBACK_URL",
                "http://localhost:8002",
            ),
            main_queue_key: env_or("REDIS_QUEUE_PAYMENTS_MAIN", "rinha-payments-main-queue"),
            max_concurrent_payments: parse_env("WORKER_MAX_CONCURRENT_PAYMENTS", 100)?,
            batch_size: parse_env("WORKER_BATCH_SIZE", 100)?,
            execution_delay: Duration::from_millis(parse_env("WORKER_EXECUTION_DELAY", 200)?),
            assume_healthy_when_unknown: parse_env("WORKER_ASSUME_HEALTHY_WHEN_UNKNOWN", false)?,
            max_retry_attempts_per_dispatch: parse_env(
                "WORKER_MAX_RETRY_ATTEMPTS_PER_DISPATCH",
                2,
            )?,
            max_reenqueue_count: parse_env("WORKER_MAX_REENQUEUE_COUNT", 3)?,
            probe_interval: Duration::from_millis(parse_env(
                "WORKER_HEALTH_PROBE_INTERVAL_MS",
                4900,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WorkerError> {
        if self.max_concurrent_payments == 0 {
            return Err(WorkerError::Bootstrap(
                "WORKER_MAX_CONCURRENT_PAYMENTS must be greater than 0".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(WorkerError::Bootstrap(
                "WORKER_BATCH_SIZE must be greater than 0".into(),
            ));
        }
        if self.default_processor_url.is_empty() || self.fallback_processor_url.is_empty() {
            return Err(WorkerError::Bootstrap(
                "processor URLs cannot be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn log_configuration(&self) {
        tracing::info!(
            redis_url = %self.redis_url,
            default_processor_url = %self.default_processor_url,
            fallback_processor_url = %self.fallback_processor_url,
            main_queue_key = %self.main_queue_key,
            max_concurrent_payments = self.max_concurrent_payments,
            batch_size = self.batch_size,
            execution_delay_ms = self.execution_delay.as_millis() as u64,
            assume_healthy_when_unknown = self.assume_healthy_when_unknown,
            max_retry_attempts_per_dispatch = self.max_retry_attempts_per_dispatch,
            max_reenqueue_count = self.max_reenqueue_count,
            probe_interval_ms = self.probe_interval.as_millis() as u64,
            "worker configuration loaded"
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, WorkerError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| WorkerError::Bootstrap(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = defaults();
        config.max_concurrent_payments = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_processor_url() {
        let mut config = defaults();
        config.default_processor_url = String::new();
        assert!(config.validate().is_err());
    }

    fn defaults() -> WorkerConfig {
        WorkerConfig {
            redis_url: "redis://localhost:6379/0".into(),
            default_processor_url: "http://localhost:8001".into(),
            fallback_processor_url: "http://localhost:8002".into(),
            main_queue_key: "rinha-payments-main-queue".into(),
            max_concurrent_payments: 100,
            batch_size: 100,
            execution_delay: Duration::from_millis(200),
            assume_healthy_when_unknown: false,
            max_retry_attempts_per_dispatch: 2,
            max_reenqueue_count: 3,
            probe_interval: Duration::from_millis(4900),
        }
    }
}
