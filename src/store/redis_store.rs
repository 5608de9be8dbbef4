use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use uuid::Uuid;

use crate::error::StoreError;

use super::{LeaseHandle, Store};

/// A Lua script releasing a lease only if the caller still owns it,
/// so a slow release cannot clobber a lease another instance already
/// re-acquired after this one expired.
const RELEASE_IF_OWNER_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// `Store` backed by a real Redis (or Redis-protocol-compatible) server,
/// using one multiplexed async connection shared across calls.
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_tokio_connection().await?)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn list_push_head(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn list_pop_tail(
        &self,
        key: &str,
        block_for: Option<Duration>,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        match block_for {
            Some(timeout) => {
                let popped: Option<(String, String)> =
                    conn.brpop(key, timeout.as_secs_f64()).await?;
                Ok(popped.map(|(_key, value)| value))
            }
            None => Ok(conn.rpop(key, None).await?),
        }
    }

    async fn list_len(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.llen(key).await?)
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set_string_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn hash_incr_int(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn hash_incr_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<f64, StoreError> {
        let mut conn = self.connection().await?;
        let raw: String = redis::cmd("HINCRBYFLOAT")
            .arg(key)
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        raw.parse()
            .map_err(|_| StoreError::Serialization(serde::de::Error::custom("non-numeric HINCRBYFLOAT reply")))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<LeaseHandle>, StoreError> {
        let mut conn = self.connection().await?;
        let token = Uuid::new_v4().to_string();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if acquired.is_none() {
            return Ok(None);
        }

        let client = self.client.clone();
        let key = name.to_string();
        let release = move || {
            tokio::spawn(async move {
                if let Ok(mut conn) = client.get_multiplexed_tokio_connection().await {
                    let script = redis::Script::new(RELEASE_IF_OWNER_SCRIPT);
                    let _: Result<i64, _> = script
                        .key(&key)
                        .arg(&token)
                        .invoke_async(&mut conn)
                        .await;
                }
            });
        };

        Ok(Some(LeaseHandle::new(release)))
    }
}
