//! `caregate-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: claims,
//! roles, the permission matrix, the authorization engine, and the password
//! and token primitives. IO lives in `caregate-infra` and `caregate-api`.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod token;

pub use authorize::{authorize, authorize_all, Decision, Requirement};
pub use claims::{validate_claims, Claims, ClaimsError};
pub use password::{hash_password, shared_secret_eq, verify_password};
pub use permissions::{Permission, PermissionMatrix};
pub use roles::Role;
pub use token::{TokenError, TokenIssuer, TokenVerifier};
