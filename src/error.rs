use thiserror::Error;

/// Errors surfaced by the shared data-store capability. `Timeout` is
/// reserved for blocking list-pop deadlines; a plain empty result from a
/// non-blocking pop is not an error, see `store::Store::list_pop_tail`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("data-store operation timed out")]
    Timeout,
    #[error("data-store transport error: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("data-store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the history recorder. Callers log-and-swallow
/// these: the processor has already accepted the payment, so a failure
/// here must not propagate back into the dispatch loop.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("payment has no processor assigned, cannot record to history")]
    MissingProcessor,
    #[error("failed to serialize payment for history: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to append to history list: {0}")]
    Store(#[from] StoreError),
}

/// Top-level error for conditions that should abort startup.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("bootstrap failure: {0}")]
    Bootstrap(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
