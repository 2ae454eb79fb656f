//! `caregate-infra` — stateful collaborators of the authentication core.
//!
//! Durable counter store (trait + in-memory + redis), the two-tier rate
//! limiter, the lockout tracker, and the credential store boundary. All
//! shared state lives in explicit per-instance containers; nothing in this
//! crate is a process-wide singleton.

pub mod best_effort;
pub mod counter_store;
pub mod credential_store;
pub mod lockout;
pub mod rate_limiter;

pub use best_effort::best_effort;
pub use counter_store::{CounterStoreError, DurableCounterStore, InMemoryCounterStore};
#[cfg(feature = "redis")]
pub use counter_store::RedisCounterStore;
pub use credential_store::{
    CredentialStore, CredentialStoreError, Identity, InMemoryCredentialStore,
};
pub use lockout::{LockoutStatus, LockoutTracker};
pub use rate_limiter::{RateDecision, RateLimiter};
