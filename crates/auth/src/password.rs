//! Password hashing and secret comparison.
//!
//! Passwords use argon2id in PHC string format; verification is
//! constant-time inside the argon2 crate. Raw shared secrets (webhooks)
//! must never be compared with `==`; use [`shared_secret_eq`].

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use subtle::ConstantTimeEq;

use caregate_core::{AuthError, AuthResult};

/// Hash a plaintext password into a salted argon2id PHC string.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AuthError::configuration(format!("salt generation failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AuthError::configuration(format!("salt encoding failed: {e}")))?;

    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::configuration(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(phc)
}

/// Verify a plaintext password against a stored PHC hash.
///
/// An unparseable stored hash verifies as `false` rather than erroring, so a
/// corrupt record behaves like a wrong password (non-enumerable).
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(stored_hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Length-checked constant-time comparison for raw shared secrets.
pub fn shared_secret_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn corrupt_stored_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn shared_secret_comparison() {
        assert!(shared_secret_eq(b"whsec_abc123", b"whsec_abc123"));
        assert!(!shared_secret_eq(b"whsec_abc123", b"whsec_abc124"));
        // Length mismatch is rejected before byte comparison.
        assert!(!shared_secret_eq(b"short", b"longer-secret"));
        assert!(!shared_secret_eq(b"", b"x"));
    }
}
