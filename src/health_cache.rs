use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::model::{HealthView, ProcessorType};
use crate::store::Store;

/// TTL slightly below the orchestrator's probe interval, so a cache
/// entry naturally goes stale if a tick is skipped rather than serving
/// a confidently wrong answer forever.
pub const HEALTH_CACHE_TTL: Duration = Duration::from_millis(4900);

fn cache_key(kind: ProcessorType) -> String {
    format!("payment_processor_health:{kind}")
}

/// Read/write view of the per-processor health cache. A missing entry
/// means "no fresh opinion", not "unhealthy" -- callers decide what
/// that implies.
pub struct HealthCache {
    store: Arc<dyn Store>,
}

impl HealthCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, kind: ProcessorType) -> Result<Option<HealthView>, StoreError> {
        match self.store.get_string(&cache_key(kind)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, kind: ProcessorType, view: HealthView) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&view)?;
        self.store
            .set_string_ttl(&cache_key(kind), raw, HEALTH_CACHE_TTL)
            .await
    }

    pub async fn clear(&self, kind: ProcessorType) -> Result<(), StoreError> {
        self.store.delete(&cache_key(kind)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;

    #[tokio::test]
    async fn missing_entry_reads_as_none() {
        let cache = HealthCache::new(Arc::new(MockStore::new()));
        assert!(cache.get(ProcessorType::Default).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = HealthCache::new(Arc::new(MockStore::new()));
        let view = HealthView::new(false, 120);
        cache.set(ProcessorType::Default, view).await.unwrap();

        let read = cache.get(ProcessorType::Default).await.unwrap().unwrap();
        assert_eq!(read.failing, false);
        assert_eq!(read.min_response_time, 120);
    }

    #[tokio::test]
    async fn clear_removes_entry() {
        let cache = HealthCache::new(Arc::new(MockStore::new()));
        cache
            .set(ProcessorType::Fallback, HealthView::new(true, 0))
            .await
            .unwrap();
        cache.clear(ProcessorType::Fallback).await.unwrap();
        assert!(cache.get(ProcessorType::Fallback).await.unwrap().is_none());
    }
}
