//! Credential lookup boundary.
//!
//! The business system (patients, billing, staff management) owns identities;
//! this core only reads them through [`CredentialStore`]. A backend failure
//! is an upstream error and must never be reinterpreted as "user not found".

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use caregate_core::{normalize_identity_key, SubjectId, TenantId};
use caregate_auth::Role;

/// A resolvable identity, as stored by the credential backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    /// Normalized login key (trimmed, lowercased email/username).
    pub identity_key: String,
    pub display_name: String,
    /// Argon2id PHC hash, never a raw secret.
    pub password_hash: String,
    pub role: Role,
    pub tenant_id: TenantId,
    pub store_scopes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("credential backend unavailable: {0}")]
    Unavailable(String),
}

/// Resolves identity keys to credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an identity. `Ok(None)` means the identity does not exist;
    /// `Err` means the backend failed and nothing is known.
    async fn lookup(&self, identity_key: &str)
        -> Result<Option<Identity>, CredentialStoreError>;
}

#[async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn lookup(
        &self,
        identity_key: &str,
    ) -> Result<Option<Identity>, CredentialStoreError> {
        (**self).lookup(identity_key).await
    }
}

/// In-memory credential store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    identities: RwLock<HashMap<String, Identity>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: Identity) {
        let key = normalize_identity_key(&identity.identity_key);
        if let Ok(mut map) = self.identities.write() {
            map.insert(key, identity);
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup(
        &self,
        identity_key: &str,
    ) -> Result<Option<Identity>, CredentialStoreError> {
        let key = normalize_identity_key(identity_key);
        let map = self
            .identities
            .read()
            .map_err(|_| CredentialStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(key: &str) -> Identity {
        Identity {
            subject_id: SubjectId::new(),
            identity_key: key.to_string(),
            display_name: "Dr. Alice".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::new("doctor"),
            tenant_id: TenantId::new(),
            store_scopes: vec!["StoreY".to_string()],
        }
    }

    #[tokio::test]
    async fn lookup_normalizes_the_key() {
        let store = InMemoryCredentialStore::new();
        store.insert(identity("Alice@Clinic.IO"));

        let found = store.lookup("  alice@clinic.io ").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn missing_identity_is_none_not_error() {
        let store = InMemoryCredentialStore::new();
        assert!(store.lookup("ghost@clinic.io").await.unwrap().is_none());
    }
}
