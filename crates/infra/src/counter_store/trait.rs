use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Counter store operation error.
///
/// These are infrastructure failures (connection, command). Callers on the
/// hot path treat any of them as "store unreachable" and fall back to
/// process-local counting; they are never surfaced to end users.
#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error("counter store connection error: {0}")]
    Connection(String),

    #[error("counter store command error: {0}")]
    Command(String),
}

/// Shared key-value store providing atomic increment + TTL.
///
/// The single source of truth for cross-instance rate limiting and lockout
/// tracking when reachable. Implementations must make `increment` atomic at
/// the store level; callers rely on every invocation observing a distinct
/// count.
#[async_trait]
pub trait DurableCounterStore: Send + Sync {
    /// Atomically increment `key`, returning the new count (1 on first call).
    async fn increment(&self, key: &str) -> Result<u64, CounterStoreError>;

    /// Set the remaining lifetime of `key`.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CounterStoreError>;

    /// Remaining lifetime of `key` in seconds. `None` if the key is missing
    /// or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, CounterStoreError>;

    /// Current count of `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<u64>, CounterStoreError>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> Result<(), CounterStoreError>;
}

#[async_trait]
impl<S> DurableCounterStore for Arc<S>
where
    S: DurableCounterStore + ?Sized,
{
    async fn increment(&self, key: &str) -> Result<u64, CounterStoreError> {
        (**self).increment(key).await
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CounterStoreError> {
        (**self).expire(key, ttl_seconds).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CounterStoreError> {
        (**self).ttl(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, CounterStoreError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), CounterStoreError> {
        (**self).delete(key).await
    }
}
