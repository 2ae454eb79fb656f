use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Roles that bypass self-ownership checks.
const ELEVATED_ROLES: &[&str] = &["admin", "manager", "superadmin"];

/// Role identifier used for RBAC.
///
/// Roles are intentionally opaque strings at this layer; mapping roles to
/// permissions is the job of [`crate::PermissionMatrix`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this role may act on records it does not own.
    pub fn is_elevated(&self) -> bool {
        ELEVATED_ROLES.contains(&self.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
