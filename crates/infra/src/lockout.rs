//! Per-identity failure counting and timed lockout.
//!
//! State machine: Normal → (failures reach the threshold) → Locked(until) →
//! (until passes, observed lazily on the next check) → Normal. Successful
//! authentication clears the record unconditionally.
//!
//! Backed by the same durable counter store as the rate limiter so lockouts
//! hold across horizontally-scaled instances; a per-process map takes over
//! only while the store is unreachable (degraded: that instance's counts
//! only). Locks are never shortened: repeated failures can only extend
//! `locked_until`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use caregate_core::{normalize_identity_key, Clock};

use crate::best_effort::best_effort;
use crate::counter_store::DurableCounterStore;

/// Result of a lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub locked: bool,
    /// Seconds until the lock clears (0 when not locked).
    pub remaining_seconds: u64,
}

impl LockoutStatus {
    fn clear() -> Self {
        Self {
            locked: false,
            remaining_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LocalRecord {
    window_start: Option<DateTime<Utc>>,
    failed_count: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// Tracks login failures per identity and enforces timed lockout.
pub struct LockoutTracker {
    store: Option<Arc<dyn DurableCounterStore>>,
    store_timeout: Duration,
    clock: Arc<dyn Clock>,
    max_failures: u32,
    lockout_duration: Duration,
    fallback: Mutex<HashMap<String, LocalRecord>>,
}

impl LockoutTracker {
    pub fn new(
        store: Option<Arc<dyn DurableCounterStore>>,
        store_timeout: Duration,
        clock: Arc<dyn Clock>,
        max_failures: u32,
        lockout_duration: Duration,
    ) -> Self {
        Self {
            store,
            store_timeout,
            clock,
            max_failures,
            lockout_duration,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    fn fail_key(identity_key: &str) -> String {
        format!("lockout:fail:{}", normalize_identity_key(identity_key))
    }

    fn lock_key(identity_key: &str) -> String {
        format!("lockout:lock:{}", normalize_identity_key(identity_key))
    }

    fn duration_seconds(&self) -> u64 {
        self.lockout_duration.as_secs().max(1)
    }

    /// Whether the identity is currently locked out.
    ///
    /// A lock recorded locally during a store outage is honored even after
    /// the store recovers.
    pub async fn check_lockout(&self, identity_key: &str) -> LockoutStatus {
        let local = self.check_local(identity_key);
        if local.locked {
            return local;
        }

        if let Some(store) = &self.store {
            let lock_key = Self::lock_key(identity_key);
            match tokio::time::timeout(self.store_timeout, store.ttl(&lock_key)).await {
                Ok(Ok(Some(remaining_seconds))) => {
                    return LockoutStatus {
                        locked: true,
                        remaining_seconds,
                    };
                }
                Ok(Ok(None)) => return LockoutStatus::clear(),
                Ok(Err(err)) => warn!("lockout check degraded to local state: {err}"),
                Err(_) => warn!("lockout check degraded to local state: store timed out"),
            }
        }

        LockoutStatus::clear()
    }

    /// Record one failed login, locking the identity once the threshold is
    /// reached. Returns the current consecutive-failure count.
    ///
    /// Not idempotent by design: every call tallies one failure.
    pub async fn record_failure(&self, identity_key: &str) -> u32 {
        if let Some(store) = &self.store {
            match self.record_durable(store, identity_key).await {
                Ok(count) => return count,
                Err(err) => {
                    warn!("lockout tracking falling back to local state: {err}");
                }
            }
        }
        self.record_local(identity_key)
    }

    /// Forget all failure state for the identity (called on successful
    /// authentication).
    pub async fn clear(&self, identity_key: &str) {
        if let Ok(mut map) = self.fallback.lock() {
            map.remove(&normalize_identity_key(identity_key));
        }

        if let Some(store) = &self.store {
            for key in [Self::fail_key(identity_key), Self::lock_key(identity_key)] {
                best_effort(
                    "lockout record cleanup",
                    match tokio::time::timeout(self.store_timeout, store.delete(&key)).await {
                        Ok(result) => result.map_err(|e| e.to_string()),
                        Err(_) => Err("store timed out".to_string()),
                    },
                );
            }
        }
    }

    async fn record_durable(
        &self,
        store: &Arc<dyn DurableCounterStore>,
        identity_key: &str,
    ) -> Result<u32, String> {
        let fail_key = Self::fail_key(identity_key);
        let count = tokio::time::timeout(self.store_timeout, store.increment(&fail_key))
            .await
            .map_err(|_| "increment timed out".to_string())?
            .map_err(|e| e.to_string())?;

        if count == 1 {
            // Failures are tracked over the same window a lock would last.
            tokio::time::timeout(
                self.store_timeout,
                store.expire(&fail_key, self.duration_seconds()),
            )
            .await
            .map_err(|_| "expire timed out".to_string())?
            .map_err(|e| e.to_string())?;
        }

        if count >= u64::from(self.max_failures) {
            let lock_key = Self::lock_key(identity_key);
            tokio::time::timeout(self.store_timeout, store.increment(&lock_key))
                .await
                .map_err(|_| "lock write timed out".to_string())?
                .map_err(|e| e.to_string())?;
            tokio::time::timeout(
                self.store_timeout,
                store.expire(&lock_key, self.duration_seconds()),
            )
            .await
            .map_err(|_| "lock expiry timed out".to_string())?
            .map_err(|e| e.to_string())?;
            // Start the failure tally fresh once the lock clears.
            best_effort(
                "failure counter reset",
                match tokio::time::timeout(self.store_timeout, store.delete(&fail_key)).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err("store timed out".to_string()),
                },
            );
        }

        Ok(count.min(u64::from(u32::MAX)) as u32)
    }

    fn check_local(&self, identity_key: &str) -> LockoutStatus {
        let now = self.clock.now();
        let key = normalize_identity_key(identity_key);
        let mut map = match self.fallback.lock() {
            Ok(map) => map,
            Err(_) => return LockoutStatus::clear(),
        };

        let locked_until = map.get(&key).and_then(|record| record.locked_until);
        match locked_until {
            Some(until) if now < until => {
                let remaining_ms = (until - now).num_milliseconds().max(0) as u64;
                LockoutStatus {
                    locked: true,
                    remaining_seconds: remaining_ms.div_ceil(1000),
                }
            }
            Some(_) => {
                // Lock elapsed: lazy clear back to Normal.
                map.remove(&key);
                LockoutStatus::clear()
            }
            None => LockoutStatus::clear(),
        }
    }

    fn record_local(&self, identity_key: &str) -> u32 {
        let now = self.clock.now();
        let window = chrono::Duration::from_std(self.lockout_duration)
            .unwrap_or_else(|_| chrono::Duration::seconds(15 * 60));
        let key = normalize_identity_key(identity_key);
        let mut map = match self.fallback.lock() {
            Ok(map) => map,
            Err(_) => return 1,
        };

        let record = map.entry(key).or_default();

        // Expired lock or stale failure window: start over.
        if matches!(record.locked_until, Some(until) if now >= until)
            || matches!(record.window_start, Some(start) if now - start > window)
        {
            *record = LocalRecord::default();
        }

        if record.window_start.is_none() {
            record.window_start = Some(now);
        }
        record.failed_count += 1;

        if record.failed_count >= self.max_failures {
            let until = now + window;
            // Never decrease an existing lock.
            record.locked_until = Some(match record.locked_until {
                Some(existing) if existing > until => existing,
                _ => until,
            });
        }

        record.failed_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::InMemoryCounterStore;
    use caregate_core::ManualClock;
    use chrono::Duration as ChronoDuration;

    const MAX_FAILURES: u32 = 5;
    const LOCKOUT_SECS: u64 = 15 * 60;

    fn tracker_with_store() -> (LockoutTracker, Arc<InMemoryCounterStore>, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemoryCounterStore::new(Arc::new(clock.clone())));
        let tracker = LockoutTracker::new(
            Some(store.clone()),
            Duration::from_millis(200),
            Arc::new(clock.clone()),
            MAX_FAILURES,
            Duration::from_secs(LOCKOUT_SECS),
        );
        (tracker, store, clock)
    }

    #[tokio::test]
    async fn locks_after_threshold_failures() {
        let (tracker, _store, _clock) = tracker_with_store();

        for expected in 1..MAX_FAILURES {
            assert_eq!(tracker.record_failure("alice@clinic.io").await, expected);
            assert!(!tracker.check_lockout("alice@clinic.io").await.locked);
        }

        assert_eq!(tracker.record_failure("alice@clinic.io").await, MAX_FAILURES);

        let status = tracker.check_lockout("alice@clinic.io").await;
        assert!(status.locked);
        assert!(status.remaining_seconds > 0);
        assert!(status.remaining_seconds <= LOCKOUT_SECS);
    }

    #[tokio::test]
    async fn lock_clears_lazily_after_duration() {
        let (tracker, _store, clock) = tracker_with_store();

        for _ in 0..MAX_FAILURES {
            tracker.record_failure("bob@clinic.io").await;
        }
        assert!(tracker.check_lockout("bob@clinic.io").await.locked);

        clock.advance(ChronoDuration::seconds(LOCKOUT_SECS as i64 + 1));

        let status = tracker.check_lockout("bob@clinic.io").await;
        assert!(!status.locked);
        assert_eq!(status.remaining_seconds, 0);
        // Failure tally restarted as well.
        assert_eq!(tracker.record_failure("bob@clinic.io").await, 1);
    }

    #[tokio::test]
    async fn successful_auth_clears_everything() {
        let (tracker, _store, _clock) = tracker_with_store();

        for _ in 0..MAX_FAILURES {
            tracker.record_failure("carol@clinic.io").await;
        }
        assert!(tracker.check_lockout("carol@clinic.io").await.locked);

        tracker.clear("carol@clinic.io").await;

        assert!(!tracker.check_lockout("carol@clinic.io").await.locked);
        assert_eq!(tracker.record_failure("carol@clinic.io").await, 1);
    }

    #[tokio::test]
    async fn identity_keys_are_normalized() {
        let (tracker, _store, _clock) = tracker_with_store();

        assert_eq!(tracker.record_failure(" Dave@Clinic.IO ").await, 1);
        assert_eq!(tracker.record_failure("dave@clinic.io").await, 2);
    }

    #[tokio::test]
    async fn store_outage_falls_back_to_local_tracking() {
        let (tracker, store, clock) = tracker_with_store();
        store.set_failing(true);

        for expected in 1..=MAX_FAILURES {
            assert_eq!(tracker.record_failure("eve@clinic.io").await, expected);
        }

        let status = tracker.check_lockout("eve@clinic.io").await;
        assert!(status.locked);

        // The local lock holds even after the store recovers.
        store.set_failing(false);
        assert!(tracker.check_lockout("eve@clinic.io").await.locked);

        clock.advance(ChronoDuration::seconds(LOCKOUT_SECS as i64 + 1));
        assert!(!tracker.check_lockout("eve@clinic.io").await.locked);
    }

    #[tokio::test]
    async fn repeated_failures_never_shorten_the_lock() {
        let (tracker, store, clock) = tracker_with_store();
        store.set_failing(true);

        for _ in 0..MAX_FAILURES {
            tracker.record_failure("frank@clinic.io").await;
        }
        let first = tracker.check_lockout("frank@clinic.io").await;

        clock.advance(ChronoDuration::seconds(60));
        let later = tracker.check_lockout("frank@clinic.io").await;
        assert!(later.locked);
        assert!(later.remaining_seconds <= first.remaining_seconds);
    }
}
