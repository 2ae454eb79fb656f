use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use caregate_core::Clock;

use super::r#trait::{CounterStoreError, DurableCounterStore};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory counter store with lazy TTL expiry.
///
/// Intended for tests/dev and single-instance deployments. Expiry is
/// evaluated against the injected clock on every access; nothing is swept
/// proactively.
pub struct InMemoryCounterStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    // Simulates a store outage (every call errors). Used to exercise the
    // limiter's fallback path.
    failing: AtomicBool,
}

impl InMemoryCounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), CounterStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CounterStoreError::Connection(
                "simulated outage".to_string(),
            ));
        }
        Ok(())
    }

    fn is_expired(entry: &Entry, now: DateTime<Utc>) -> bool {
        matches!(entry.expires_at, Some(at) if now >= at)
    }

    fn lock_err() -> CounterStoreError {
        CounterStoreError::Command("lock poisoned".to_string())
    }
}

#[async_trait]
impl DurableCounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, CounterStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: None,
        });
        if Self::is_expired(entry, now) {
            *entry = Entry {
                count: 0,
                expires_at: None,
            };
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CounterStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;

        if let Some(entry) = entries.get_mut(key) {
            if !Self::is_expired(entry, now) {
                entry.expires_at = Some(now + Duration::seconds(ttl_seconds as i64));
            }
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CounterStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;

        Ok(entries.get(key).and_then(|entry| {
            if Self::is_expired(entry, now) {
                return None;
            }
            let at = entry.expires_at?;
            let remaining_ms = (at - now).num_milliseconds().max(0) as u64;
            Some(remaining_ms.div_ceil(1000))
        }))
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, CounterStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;

        Ok(entries
            .get(key)
            .filter(|entry| !Self::is_expired(entry, now))
            .map(|entry| entry.count))
    }

    async fn delete(&self, key: &str) -> Result<(), CounterStoreError> {
        self.check_available()?;
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        entries.remove(key);
        Ok(())
    }
}
