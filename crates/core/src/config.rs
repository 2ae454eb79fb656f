//! Typed service configuration, validated eagerly at startup.
//!
//! All knobs the gate exposes (secret, store connection, origin allowlist,
//! lockout thresholds, per-class rate limits) live here as concrete fields.
//! Malformed or missing required configuration fails startup with
//! [`AuthError::Configuration`]; nothing silently defaults to an empty map.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Minimum accepted signing-secret length, in bytes.
const MIN_SECRET_LEN: usize = 16;

/// One rate-limit class: at most `limit` calls per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window_ms: u64,
}

impl RateLimitRule {
    pub fn new(limit: u32, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    /// Window length in whole seconds, rounded up (used for Retry-After).
    pub fn window_seconds(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }
}

/// CORS allowlist configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Statically configured production origins. Must be non-empty.
    pub allowed_origins: Vec<String>,
    /// Deployment project identifier for preview origins
    /// (e.g. `myclinic` matching `https://myclinic-<hash>.vercel.app`).
    pub project_slug: Option<String>,
    /// Shared wildcard domain suffix for preview origins (e.g. `.vercel.app`).
    pub preview_suffix: Option<String>,
}

/// Full configuration surface of the gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Token signing secret. Required, never logged.
    pub token_secret: String,
    /// Session token lifetime.
    pub token_ttl: Duration,
    /// Durable counter store connection. `None` means in-process fallback only.
    pub redis_url: Option<String>,
    /// Upper bound on every durable-store call.
    pub store_timeout: Duration,
    /// Consecutive failures before an identity is locked out.
    pub max_login_failures: u32,
    /// How long a lockout lasts once triggered.
    pub lockout_duration: Duration,
    /// Per-operation-class rate limits, keyed by class name ("login", "api", ...).
    pub rate_limits: HashMap<String, RateLimitRule>,
    pub cors: CorsConfig,
}

impl GateConfig {
    /// Read configuration from the environment, failing fast on anything
    /// missing or malformed.
    pub fn from_env() -> AuthResult<Self> {
        let token_secret = require_env("CAREGATE_TOKEN_SECRET")?;
        let token_ttl =
            Duration::from_secs(parse_env("CAREGATE_TOKEN_TTL_SECONDS", 12 * 60 * 60)?);
        let redis_url = std::env::var("CAREGATE_REDIS_URL").ok().filter(|s| !s.is_empty());
        let store_timeout =
            Duration::from_millis(parse_env("CAREGATE_STORE_TIMEOUT_MS", 2_000)?);
        let max_login_failures = parse_env("CAREGATE_MAX_LOGIN_FAILURES", 5)?;
        let lockout_duration =
            Duration::from_secs(parse_env("CAREGATE_LOCKOUT_SECONDS", 15 * 60)?);

        let origins = require_env("CAREGATE_ALLOWED_ORIGINS")?;
        let cors = CorsConfig {
            allowed_origins: split_origins(&origins),
            project_slug: std::env::var("CAREGATE_PROJECT_SLUG").ok().filter(|s| !s.is_empty()),
            preview_suffix: std::env::var("CAREGATE_PREVIEW_SUFFIX").ok().filter(|s| !s.is_empty()),
        };

        let rate_limits = match std::env::var("CAREGATE_RATE_LIMITS") {
            Ok(spec) => parse_rate_limits(&spec)?,
            Err(_) => default_rate_limits(),
        };

        Self {
            token_secret,
            token_ttl,
            redis_url,
            store_timeout,
            max_login_failures,
            lockout_duration,
            rate_limits,
            cors,
        }
        .validated()
    }

    /// Check cross-field invariants. Called by `from_env`, and by tests that
    /// build configs by hand.
    pub fn validated(self) -> AuthResult<Self> {
        if self.token_secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "token secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.token_ttl.is_zero() {
            return Err(AuthError::configuration("token TTL must be positive"));
        }
        if self.max_login_failures == 0 {
            return Err(AuthError::configuration(
                "max login failures must be at least 1",
            ));
        }
        if self.cors.allowed_origins.is_empty() {
            return Err(AuthError::configuration(
                "at least one allowed origin is required",
            ));
        }
        for (class, rule) in &self.rate_limits {
            if rule.limit == 0 || rule.window_ms == 0 {
                return Err(AuthError::configuration(format!(
                    "rate limit class '{class}' must have positive limit and window"
                )));
            }
        }
        Ok(self)
    }

    /// Rule for an operation class; absent classes fall back to "api".
    pub fn rate_limit(&self, class: &str) -> RateLimitRule {
        self.rate_limits
            .get(class)
            .or_else(|| self.rate_limits.get("api"))
            .copied()
            .unwrap_or(RateLimitRule::new(100, 60_000))
    }
}

/// Built-in per-class limits, overridable via `CAREGATE_RATE_LIMITS`.
pub fn default_rate_limits() -> HashMap<String, RateLimitRule> {
    HashMap::from([
        ("login".to_string(), RateLimitRule::new(10, 60_000)),
        ("verify".to_string(), RateLimitRule::new(60, 60_000)),
        ("api".to_string(), RateLimitRule::new(100, 60_000)),
    ])
}

fn require_env(name: &str) -> AuthResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AuthError::configuration(format!("{name} is required"))),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AuthResult<T> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| AuthError::configuration(format!("{name} is malformed: '{v}'"))),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Parse `"login=5/60000,api=100/60000"` into per-class rules.
fn parse_rate_limits(spec: &str) -> AuthResult<HashMap<String, RateLimitRule>> {
    let mut limits = default_rate_limits();
    for entry in spec.split(',').filter(|e| !e.trim().is_empty()) {
        let malformed =
            || AuthError::configuration(format!("rate limit entry is malformed: '{entry}'"));
        let (class, rule) = entry.split_once('=').ok_or_else(malformed)?;
        let (limit, window_ms) = rule.split_once('/').ok_or_else(malformed)?;
        limits.insert(
            class.trim().to_string(),
            RateLimitRule::new(
                limit.trim().parse().map_err(|_| malformed())?,
                window_ms.trim().parse().map_err(|_| malformed())?,
            ),
        );
    }
    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> GateConfig {
        GateConfig {
            token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            token_ttl: Duration::from_secs(3600),
            redis_url: None,
            store_timeout: Duration::from_millis(500),
            max_login_failures: 5,
            lockout_duration: Duration::from_secs(900),
            rate_limits: default_rate_limits(),
            cors: CorsConfig {
                allowed_origins: vec!["https://app.example.com".to_string()],
                project_slug: None,
                preview_suffix: None,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validated().is_ok());
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.token_secret = "short".to_string();
        assert!(matches!(
            cfg.validated(),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn empty_origin_allowlist_is_rejected() {
        let mut cfg = base_config();
        cfg.cors.allowed_origins.clear();
        assert!(matches!(
            cfg.validated(),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn zero_limit_class_is_rejected() {
        let mut cfg = base_config();
        cfg.rate_limits
            .insert("ai".to_string(), RateLimitRule::new(0, 60_000));
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn rate_limit_spec_overrides_defaults() {
        let limits = parse_rate_limits("login=3/60000, ai=20/30000").unwrap();
        assert_eq!(limits["login"], RateLimitRule::new(3, 60_000));
        assert_eq!(limits["ai"], RateLimitRule::new(20, 30_000));
        // Unmentioned classes keep their defaults.
        assert_eq!(limits["api"], RateLimitRule::new(100, 60_000));
    }

    #[test]
    fn malformed_rate_limit_spec_is_rejected() {
        assert!(parse_rate_limits("login=fast").is_err());
        assert!(parse_rate_limits("login=3").is_err());
    }

    #[test]
    fn window_seconds_rounds_up() {
        assert_eq!(RateLimitRule::new(1, 1500).window_seconds(), 2);
        assert_eq!(RateLimitRule::new(1, 60_000).window_seconds(), 60);
    }

    #[test]
    fn origin_split_trims_and_drops_trailing_slash() {
        let origins = split_origins(" https://a.example.com/, https://b.example.com ,");
        assert_eq!(origins, vec!["https://a.example.com", "https://b.example.com"]);
    }
}
