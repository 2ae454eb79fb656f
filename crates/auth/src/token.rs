//! Session token issuance and verification (HS256).
//!
//! Verification is a pure function of token + secret + now: the signature and
//! payload shape are checked by `jsonwebtoken`, the temporal window by
//! [`validate_claims`] against the injected clock. Every failure collapses
//! into the single opaque [`TokenError`] so a caller cannot distinguish
//! "expired" from "forged".

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, Claims};

/// Generic token failure. Intentionally carries no cause.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid token")]
pub struct TokenError;

/// Signs session claims into bearer tokens.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign claims into an opaque bearer credential.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|_| TokenError)
    }
}

/// Verifies bearer tokens back into claims.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Temporal validity is checked against the injected clock in
        // `verify`, not against jsonwebtoken's wall clock (whose exp check
        // is inclusive, while ours is exclusive).
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify signature, payload shape, and temporal window.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|_| TokenError)?;
        validate_claims(&data.claims, now).map_err(|_| TokenError)?;
        Ok(data.claims)
    }
}
