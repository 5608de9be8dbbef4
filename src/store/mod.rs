mod mock_store;
mod redis_store;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

pub use mock_store::MockStore;
pub use redis_store::RedisStore;

use crate::error::StoreError;

/// A held distributed advisory lock. Releasing is best-effort and
/// happens on drop since `Drop` cannot be `async`; callers that need to
/// observe release completing should call `release` explicitly instead
/// of letting the handle fall out of scope.
pub struct LeaseHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LeaseHandle {
    pub(crate) fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LeaseHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Thin capability surface over the shared data store: list push/pop,
/// key/value with TTL, hash increments, and a distributed lease. Any
/// backend that can provide these primitives can implement this trait;
/// `RedisStore` is the canonical one.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_push_head(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Pops the tail of `key`. `block_for` of `None` is a non-blocking
    /// pop; `Some(d)` blocks up to `d` waiting for an item. Either way,
    /// an empty list is `Ok(None)`, never an error.
    async fn list_pop_tail(
        &self,
        key: &str,
        block_for: Option<Duration>,
    ) -> Result<Option<String>, StoreError>;

    async fn list_len(&self, key: &str) -> Result<i64, StoreError>;

    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_string_ttl(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn hash_incr_int(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    async fn hash_incr_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<f64, StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Attempts to acquire a named lease with the given TTL. Returns
    /// `None` if another holder currently owns it.
    async fn try_acquire_lease(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<LeaseHandle>, StoreError>;
}
