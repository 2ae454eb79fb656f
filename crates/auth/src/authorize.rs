//! Layered authorization checks over verified claims.
//!
//! - No IO
//! - No panics
//! - No business logic (pure policy evaluation)

use std::collections::HashSet;

use caregate_core::SubjectId;

use crate::{Claims, Permission, PermissionMatrix, Role};

/// A single authorization requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Caller's role must be one of the given roles.
    RoleIn(HashSet<Role>),

    /// Caller's role must be granted the named permission by the matrix.
    PermissionNamed(Permission),

    /// Caller must be scoped to the given store (or hold the `"all"` scope).
    StoreAccess(String),

    /// Caller must own the target record, unless elevated.
    ///
    /// Ownership is matched by stable subject id; display names are
    /// informational and never compared here.
    SelfOrElevated { owner: SubjectId },
}

/// Outcome of an authorization check.
///
/// A denial carries the reason for logging and the 403 body; a grant carries
/// an empty reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Evaluate one requirement against verified claims.
pub fn authorize(matrix: &PermissionMatrix, claims: &Claims, requirement: &Requirement) -> Decision {
    match requirement {
        Requirement::RoleIn(roles) => {
            if roles.contains(&claims.role) {
                Decision::allow()
            } else {
                Decision::deny(format!("role '{}' is not permitted", claims.role))
            }
        }

        Requirement::PermissionNamed(permission) => {
            if matrix.grants(&claims.role, permission) {
                Decision::allow()
            } else {
                Decision::deny(format!(
                    "role '{}' lacks permission '{}'",
                    claims.role, permission
                ))
            }
        }

        Requirement::StoreAccess(store) => {
            if claims.has_store_scope(store) {
                Decision::allow()
            } else {
                Decision::deny(format!("no access to store '{store}'"))
            }
        }

        Requirement::SelfOrElevated { owner } => {
            if claims.role.is_elevated() || claims.subject_id == *owner {
                Decision::allow()
            } else {
                Decision::deny("record belongs to another user")
            }
        }
    }
}

/// Evaluate requirements with logical AND; the first denial wins and its
/// reason is surfaced.
pub fn authorize_all(
    matrix: &PermissionMatrix,
    claims: &Claims,
    requirements: &[Requirement],
) -> Decision {
    for requirement in requirements {
        let decision = authorize(matrix, claims, requirement);
        if !decision.allowed {
            return decision;
        }
    }
    Decision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use caregate_core::TenantId;
    use chrono::{Duration, Utc};

    fn claims(role: &'static str, scopes: &[&str]) -> Claims {
        let now = Utc::now();
        Claims {
            subject_id: SubjectId::new(),
            display_name: "Dr. Alice".to_string(),
            role: Role::new(role),
            tenant_id: TenantId::new(),
            store_scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn role_in_allows_member() {
        let matrix = PermissionMatrix::default();
        let req = Requirement::RoleIn(HashSet::from([Role::new("doctor"), Role::new("admin")]));
        assert!(authorize(&matrix, &claims("doctor", &[]), &req).allowed);
        assert!(!authorize(&matrix, &claims("receptionist", &[]), &req).allowed);
    }

    #[test]
    fn store_access_requires_exact_scope_or_wildcard() {
        let matrix = PermissionMatrix::default();
        let req = Requirement::StoreAccess("StoreX".to_string());

        let denied = authorize(&matrix, &claims("doctor", &["StoreY"]), &req);
        assert!(!denied.allowed);
        assert!(denied.reason.contains("StoreX"));

        assert!(authorize(&matrix, &claims("doctor", &["all"]), &req).allowed);
        assert!(authorize(&matrix, &claims("doctor", &["StoreX"]), &req).allowed);
    }

    #[test]
    fn self_or_elevated_matches_by_subject_id() {
        let matrix = PermissionMatrix::default();
        let me = claims("doctor", &[]);

        // Owns the record: allowed.
        let own = Requirement::SelfOrElevated {
            owner: me.subject_id,
        };
        assert!(authorize(&matrix, &me, &own).allowed);

        // Someone else's record: denied for doctor, allowed for manager.
        let other = Requirement::SelfOrElevated {
            owner: SubjectId::new(),
        };
        assert!(!authorize(&matrix, &me, &other).allowed);
        assert!(authorize(&matrix, &claims("manager", &[]), &other).allowed);
    }

    #[test]
    fn composite_surfaces_first_failure() {
        let matrix = PermissionMatrix::default();
        let me = claims("doctor", &["StoreY"]);

        let reqs = [
            Requirement::PermissionNamed(Permission::new("patients.read")),
            Requirement::StoreAccess("StoreX".to_string()),
            Requirement::RoleIn(HashSet::from([Role::new("admin")])),
        ];

        let decision = authorize_all(&matrix, &me, &reqs);
        assert!(!decision.allowed);
        // Store access fails before the role check is reached.
        assert!(decision.reason.contains("StoreX"));
    }

    #[test]
    fn composite_all_pass() {
        let matrix = PermissionMatrix::default();
        let me = claims("doctor", &["StoreX"]);

        let reqs = [
            Requirement::PermissionNamed(Permission::new("patients.read")),
            Requirement::StoreAccess("StoreX".to_string()),
        ];

        assert!(authorize_all(&matrix, &me, &reqs).allowed);
    }

    #[test]
    fn repeated_evaluation_is_stable() {
        let matrix = PermissionMatrix::default();
        let me = claims("doctor", &["StoreY"]);
        let req = Requirement::StoreAccess("StoreX".to_string());

        assert_eq!(
            authorize(&matrix, &me, &req),
            authorize(&matrix, &me, &req)
        );
    }
}
