//! `caregate-core` — shared foundation for the authentication core.
//!
//! This crate contains **pure** building blocks (ids, clock, errors, config);
//! no HTTP and no storage concerns.

pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CorsConfig, GateConfig, RateLimitRule};
pub use error::{AuthError, AuthResult};
pub use id::{SubjectId, TenantId};

/// Normalize an identity key (email/username) for lookups and counter keys.
///
/// Applied before **every** credential lookup and rate/lockout key
/// construction so that `" Alice@Example.com "` and `"alice@example.com"`
/// tally against the same identity.
pub fn normalize_identity_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_is_trimmed_and_lowercased() {
        assert_eq!(
            normalize_identity_key("  Alice@Example.COM "),
            "alice@example.com"
        );
    }

    #[test]
    fn identity_key_normalization_is_idempotent() {
        let once = normalize_identity_key("Bob@Clinic.io");
        assert_eq!(normalize_identity_key(&once), once);
    }
}
