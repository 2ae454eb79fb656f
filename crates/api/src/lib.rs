//! `caregate-api` — HTTP surface of the authentication core.
//!
//! The request gate: CORS enforcement, rate limiting, lockout, credential
//! verification and token issuance on login; token verification and layered
//! authorization on every authenticated request.

pub mod app;
pub mod cors;
pub mod errors;
pub mod middleware;
pub mod routes;

pub use app::{build_app, AppState};
pub use cors::CorsGuard;
