use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "patients.read").
/// The special permission `"all"` is reserved: a role granted `"all"`
/// passes every permission check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "all"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission-set table.
///
/// Process-wide and read-only after construction. Unknown roles and unknown
/// permissions both deny; there is no implicit grant anywhere.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    grants: HashMap<String, HashSet<String>>,
}

impl PermissionMatrix {
    pub fn new(grants: HashMap<String, HashSet<String>>) -> Self {
        Self { grants }
    }

    /// Whether `role` is granted `permission` (directly or via `"all"`).
    pub fn grants(&self, role: &Role, permission: &Permission) -> bool {
        match self.grants.get(role.as_str()) {
            Some(perms) => perms.contains("all") || perms.contains(permission.as_str()),
            None => false,
        }
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.grants.keys().map(String::as_str)
    }
}

impl Default for PermissionMatrix {
    /// Built-in matrix for the clinic roles.
    fn default() -> Self {
        fn set(perms: &[&str]) -> HashSet<String> {
            perms.iter().map(|p| (*p).to_string()).collect()
        }

        let mut grants = HashMap::new();
        grants.insert("superadmin".to_string(), set(&["all"]));
        grants.insert("admin".to_string(), set(&["all"]));
        grants.insert(
            "manager".to_string(),
            set(&[
                "patients.read",
                "patients.write",
                "appointments.read",
                "appointments.write",
                "billing.read",
                "billing.write",
                "inventory.read",
                "inventory.write",
                "reports.read",
            ]),
        );
        grants.insert(
            "doctor".to_string(),
            set(&[
                "patients.read",
                "patients.write",
                "appointments.read",
                "appointments.write",
                "prescriptions.write",
            ]),
        );
        grants.insert(
            "receptionist".to_string(),
            set(&["patients.read", "appointments.read", "appointments.write"]),
        );
        Self::new(grants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_grants_everything() {
        let matrix = PermissionMatrix::default();
        assert!(matrix.grants(&Role::new("admin"), &Permission::new("anything.at.all")));
        assert!(matrix.grants(&Role::new("superadmin"), &Permission::new("billing.write")));
    }

    #[test]
    fn explicit_grant_passes() {
        let matrix = PermissionMatrix::default();
        assert!(matrix.grants(&Role::new("doctor"), &Permission::new("patients.read")));
    }

    #[test]
    fn unknown_role_denies() {
        let matrix = PermissionMatrix::default();
        assert!(!matrix.grants(&Role::new("janitor"), &Permission::new("patients.read")));
    }

    #[test]
    fn unknown_permission_denies() {
        let matrix = PermissionMatrix::default();
        assert!(!matrix.grants(&Role::new("doctor"), &Permission::new("billing.write")));
    }
}
