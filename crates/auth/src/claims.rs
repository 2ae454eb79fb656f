use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use caregate_core::{SubjectId, TenantId};

use crate::Role;

/// Session claims model (transport-agnostic).
///
/// Created once at login and immutable afterwards: there is no server-side
/// revocation in this design, only expiry. Timestamps serialize as unix
/// seconds (`iat`/`exp`) for JWT interop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject / stable principal identifier.
    #[serde(rename = "sub")]
    pub subject_id: SubjectId,

    /// Human-readable name, informational only. Never used for
    /// authorization decisions (ownership checks go by `subject_id`).
    pub display_name: String,

    /// RBAC role granted within the tenant context.
    pub role: Role,

    /// Tenant context for the token.
    pub tenant_id: TenantId,

    /// Stores/locations this subject may operate against.
    /// The literal `"all"` grants every store in the tenant.
    pub store_scopes: Vec<String>,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp (exclusive).
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Whether the subject is scoped to the given store.
    pub fn has_store_scope(&self, store: &str) -> bool {
        self.store_scopes
            .iter()
            .any(|s| s == "all" || s == store)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the temporal window of a set of claims.
///
/// Expiry is exclusive: a token checked at exactly `expires_at` is rejected.
/// Signature verification / decoding is intentionally outside this function.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.expires_at <= claims.issued_at {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}
