//! Error taxonomy for the authentication core.

use thiserror::Error;

/// Result type used across the authentication core.
pub type AuthResult<T> = Result<T, AuthError>;

/// Core-level error.
///
/// The variants map one-to-one onto HTTP status classes at the API boundary
/// (400 / 401 / 403 / 429 / 500). Security-relevant failures carry no detail
/// that would let a caller enumerate identities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed or missing input (maps to 400).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Bad credentials or an invalid/expired/forged token (maps to 401).
    ///
    /// Deliberately carries no payload: "unknown user", "wrong password",
    /// "expired token" and "forged token" must be indistinguishable.
    #[error("authentication failed")]
    Authentication,

    /// Insufficient role/permission/scope (maps to 403).
    #[error("forbidden: {0}")]
    Authorization(String),

    /// Rate limit exceeded or account lockout active (maps to 429).
    #[error("throttled, retry after {retry_after_seconds}s")]
    Throttled { retry_after_seconds: u64 },

    /// Missing/malformed configuration detected at startup (maps to 500).
    ///
    /// The detail is logged server-side; the API layer never returns it.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required upstream (credential store) failed (maps to 500).
    ///
    /// Never reinterpreted as "user not found".
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn throttled(retry_after_seconds: u64) -> Self {
        Self::Throttled {
            retry_after_seconds,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_carries_no_detail() {
        assert_eq!(AuthError::Authentication.to_string(), "authentication failed");
    }

    #[test]
    fn throttled_reports_retry_hint() {
        let err = AuthError::throttled(42);
        assert_eq!(err.to_string(), "throttled, retry after 42s");
    }
}
