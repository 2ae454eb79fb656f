//! Shared atomic counters with TTL (the durable store behind rate limiting
//! and lockout tracking).

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod r#trait;

pub use in_memory::InMemoryCounterStore;
#[cfg(feature = "redis")]
pub use redis::RedisCounterStore;
pub use r#trait::{CounterStoreError, DurableCounterStore};
