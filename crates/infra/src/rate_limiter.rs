//! Two-tier windowed rate limiting.
//!
//! Primary path: atomic counters in the durable store, shared across all
//! service instances. Fallback path: a per-process map, engaged only when
//! the store call fails, times out, or no store is configured.
//!
//! The fallback trades global accuracy for availability: during a store
//! outage each instance counts independently, so up to `limit × instances`
//! requests can slip through per window. A limiter outage must never fail
//! the protected endpoint, and `check` never returns an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use tracing::warn;

use caregate_core::{normalize_identity_key, Clock, RateLimitRule};

use crate::best_effort::best_effort;
use crate::counter_store::DurableCounterStore;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Calls left in the current window (0 when denied).
    pub remaining: u32,
    /// Seconds until the window resets (0 when allowed).
    pub retry_after_seconds: u64,
}

#[derive(Debug, Clone, Copy)]
struct WindowSlot {
    window_start: DateTime<Utc>,
    count: u64,
}

/// Windowed counter with durable-store primary path and in-process fallback.
///
/// One instance per service process, owned by the application state
/// container; the fallback map is never shared across instances.
pub struct RateLimiter {
    store: Option<Arc<dyn DurableCounterStore>>,
    store_timeout: Duration,
    clock: Arc<dyn Clock>,
    fallback: Mutex<HashMap<String, WindowSlot>>,
}

impl RateLimiter {
    pub fn new(
        store: Option<Arc<dyn DurableCounterStore>>,
        store_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            store_timeout,
            clock,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Build a counter key from an operation class and actor.
    ///
    /// The actor is normalized the same way identity keys are, so mixed-case
    /// emails tally against one counter.
    pub fn key(class: &str, actor: &str) -> String {
        format!("rate:{class}:{}", normalize_identity_key(actor))
    }

    /// Consume one unit of quota under `key` and decide.
    ///
    /// Not idempotent by design: every call counts. Never errors; a durable
    /// store failure silently degrades to per-process counting.
    pub async fn check(&self, key: &str, rule: RateLimitRule) -> RateDecision {
        if let Some(store) = &self.store {
            match self.check_durable(store, key, rule).await {
                Ok(decision) => return decision,
                Err(err) => {
                    warn!("rate limiter falling back to local counting: {err}");
                }
            }
        }
        self.check_fallback(key, rule)
    }

    async fn check_durable(
        &self,
        store: &Arc<dyn DurableCounterStore>,
        key: &str,
        rule: RateLimitRule,
    ) -> Result<RateDecision, String> {
        let count = tokio::time::timeout(self.store_timeout, store.increment(key))
            .await
            .map_err(|_| "increment timed out".to_string())?
            .map_err(|e| e.to_string())?;

        if count == 1 {
            // First request of the window owns setting the expiry. If this
            // fails the counter lives until the store evicts it; the window
            // just starts over on the next reset.
            best_effort(
                "counter expiry",
                match tokio::time::timeout(
                    self.store_timeout,
                    store.expire(key, rule.window_seconds()),
                )
                .await
                {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err("expire timed out".to_string()),
                },
            );
        }

        if count > u64::from(rule.limit) {
            let retry_after = tokio::time::timeout(self.store_timeout, store.ttl(key))
                .await
                .ok()
                .and_then(|r| r.ok())
                .flatten()
                .unwrap_or_else(|| rule.window_seconds());
            return Ok(RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_seconds: retry_after,
            });
        }

        Ok(RateDecision {
            allowed: true,
            remaining: rule.limit - count as u32,
            retry_after_seconds: 0,
        })
    }

    fn check_fallback(&self, key: &str, rule: RateLimitRule) -> RateDecision {
        let now = self.clock.now();
        let mut map = match self.fallback.lock() {
            Ok(map) => map,
            // A poisoned map means another request panicked mid-update;
            // failing open here mirrors the availability-first policy.
            Err(_) => {
                return RateDecision {
                    allowed: true,
                    remaining: 0,
                    retry_after_seconds: 0,
                }
            }
        };

        let slot = map.entry(key.to_string()).or_insert(WindowSlot {
            window_start: now,
            count: 0,
        });

        let elapsed_ms = (now - slot.window_start).num_milliseconds().max(0) as u64;
        if elapsed_ms > rule.window_ms {
            *slot = WindowSlot {
                window_start: now,
                count: 0,
            };
        }
        slot.count += 1;

        if slot.count > u64::from(rule.limit) {
            let elapsed_ms = (now - slot.window_start).num_milliseconds().max(0) as u64;
            let remaining_ms = rule.window_ms.saturating_sub(elapsed_ms);
            RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_seconds: remaining_ms.div_ceil(1000).max(1),
            }
        } else {
            RateDecision {
                allowed: true,
                remaining: rule.limit - slot.count as u32,
                retry_after_seconds: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::InMemoryCounterStore;
    use caregate_core::ManualClock;
    use chrono::Duration as ChronoDuration;

    fn limiter_with_store() -> (RateLimiter, Arc<InMemoryCounterStore>, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemoryCounterStore::new(Arc::new(clock.clone())));
        let limiter = RateLimiter::new(
            Some(store.clone()),
            std::time::Duration::from_millis(200),
            Arc::new(clock.clone()),
        );
        (limiter, store, clock)
    }

    fn limiter_without_store() -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(
            None,
            std::time::Duration::from_millis(200),
            Arc::new(clock.clone()),
        );
        (limiter, clock)
    }

    #[tokio::test]
    async fn allows_up_to_limit_with_decreasing_remaining() {
        let (limiter, _store, _clock) = limiter_with_store();
        let rule = RateLimitRule::new(3, 60_000);
        let key = RateLimiter::key("login", "10.0.0.1");

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check(&key, rule).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let denied = limiter.check(&key, rule).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after_seconds > 0);
        assert!(denied.retry_after_seconds <= 60);
    }

    #[tokio::test]
    async fn window_elapse_resets_the_counter() {
        let (limiter, _store, clock) = limiter_with_store();
        let rule = RateLimitRule::new(2, 60_000);
        let key = RateLimiter::key("login", "10.0.0.2");

        limiter.check(&key, rule).await;
        limiter.check(&key, rule).await;
        assert!(!limiter.check(&key, rule).await.allowed);

        clock.advance(ChronoDuration::seconds(61));

        let after = limiter.check(&key, rule).await;
        assert!(after.allowed);
        assert_eq!(after.remaining, 1);
    }

    #[tokio::test]
    async fn fallback_engages_when_store_fails_and_never_errors() {
        let (limiter, store, _clock) = limiter_with_store();
        store.set_failing(true);
        let rule = RateLimitRule::new(3, 60_000);
        let key = RateLimiter::key("login", "10.0.0.3");

        // Every call still produces a decision.
        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check(&key, rule).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let denied = limiter.check(&key, rule).await;
        assert!(!denied.allowed);
        assert!(denied.retry_after_seconds > 0);
    }

    #[tokio::test]
    async fn fallback_window_resets_after_elapse() {
        let (limiter, clock) = limiter_without_store();
        let rule = RateLimitRule::new(1, 10_000);
        let key = RateLimiter::key("api", "user@example.com");

        assert!(limiter.check(&key, rule).await.allowed);
        let denied = limiter.check(&key, rule).await;
        assert!(!denied.allowed);
        assert!(denied.retry_after_seconds <= 10);

        clock.advance(ChronoDuration::seconds(11));
        assert!(limiter.check(&key, rule).await.allowed);
    }

    #[tokio::test]
    async fn distinct_classes_count_separately() {
        let (limiter, _clock) = limiter_without_store();
        let rule = RateLimitRule::new(1, 60_000);

        assert!(limiter
            .check(&RateLimiter::key("login", "a@b.c"), rule)
            .await
            .allowed);
        // Same actor, different class: fresh counter.
        assert!(limiter
            .check(&RateLimiter::key("ai", "a@b.c"), rule)
            .await
            .allowed);
    }

    #[test]
    fn keys_normalize_the_actor() {
        assert_eq!(
            RateLimiter::key("login", " Alice@Example.COM "),
            "rate:login:alice@example.com"
        );
    }
}
