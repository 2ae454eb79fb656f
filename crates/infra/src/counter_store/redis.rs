//! Redis-backed counter store (INCR / EXPIRE / TTL).
//!
//! The production implementation for horizontally-scaled deployments: every
//! instance increments the same keys, so limits and lockouts are
//! cross-instance consistent while redis is reachable.

use async_trait::async_trait;
use redis::AsyncCommands;

use super::r#trait::{CounterStoreError, DurableCounterStore};

#[derive(Debug, Clone)]
pub struct RedisCounterStore {
    client: redis::Client,
}

impl RedisCounterStore {
    /// Connect lazily to the given redis URL (e.g. `redis://localhost:6379`).
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CounterStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CounterStoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, CounterStoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CounterStoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl DurableCounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, CounterStoreError> {
        let mut conn = self.conn().await?;
        conn.incr(key, 1u64)
            .await
            .map_err(|e| CounterStoreError::Command(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CounterStoreError> {
        let mut conn = self.conn().await?;
        conn.expire(key, ttl_seconds as i64)
            .await
            .map_err(|e| CounterStoreError::Command(e.to_string()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CounterStoreError> {
        let mut conn = self.conn().await?;
        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| CounterStoreError::Command(e.to_string()))?;
        // -2: key missing, -1: key has no expiry.
        Ok(if ttl > 0 { Some(ttl as u64) } else { None })
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, CounterStoreError> {
        let mut conn = self.conn().await?;
        conn.get(key)
            .await
            .map_err(|e| CounterStoreError::Command(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CounterStoreError> {
        let mut conn = self.conn().await?;
        conn.del(key)
            .await
            .map_err(|e| CounterStoreError::Command(e.to_string()))
    }
}
