//! The request gate: login, token verification, and representative
//! authenticated routes.
//!
//! Login flow: per-IP rate limit → lockout check → credential lookup →
//! password verification → failure accounting or token issuance. A failed
//! login below the lockout threshold reports attempts remaining; once
//! locked, only a retry-after duration.

use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use caregate_auth::{verify_password, Claims, Permission, Requirement};
use caregate_core::{normalize_identity_key, AuthError};
use caregate_infra::RateLimiter;

use crate::app::AppState;
use crate::errors::{throttled_response, ApiError};
use crate::middleware::require;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    // Login attempts are throttled by client IP before anything else runs.
    let ip = client_ip(&headers);
    let rule = state.config.rate_limit("login");
    let decision = state
        .rate_limiter
        .check(&RateLimiter::key("login", &ip), rule)
        .await;
    if !decision.allowed {
        return throttled_response(decision.retry_after_seconds, None);
    }

    if body.username.trim().is_empty() || body.password.is_empty() {
        return ApiError(AuthError::validation("username and password are required"))
            .into_response();
    }
    let identity_key = normalize_identity_key(&body.username);

    let lock = state.lockout.check_lockout(&identity_key).await;
    if lock.locked {
        return throttled_response(lock.remaining_seconds.max(1), None);
    }

    let identity = match state.credentials.lookup(&identity_key).await {
        Ok(identity) => identity,
        // Backend down is a 500, never "user not found".
        Err(err) => return ApiError(AuthError::upstream(err.to_string())).into_response(),
    };

    // Unknown identity and wrong password take the same path: one failure
    // tallied, one generic response shape.
    let verified = match &identity {
        Some(identity) => verify_password(&body.password, &identity.password_hash),
        None => false,
    };

    if !verified {
        let failures = state.lockout.record_failure(&identity_key).await;
        let max = state.lockout.max_failures();
        if failures >= max {
            let lock = state.lockout.check_lockout(&identity_key).await;
            warn!("identity locked out after {failures} failed logins");
            return throttled_response(lock.remaining_seconds.max(1), None);
        }
        return failed_login_response(max - failures);
    }

    let Some(identity) = identity else {
        // Unreachable: verified implies an identity was found.
        return ApiError(AuthError::Authentication).into_response();
    };

    state.lockout.clear(&identity_key).await;

    let now = state.clock.now();
    let ttl = Duration::from_std(state.config.token_ttl).unwrap_or_else(|_| Duration::hours(12));
    let claims = Claims {
        subject_id: identity.subject_id,
        display_name: identity.display_name,
        role: identity.role,
        tenant_id: identity.tenant_id,
        store_scopes: identity.store_scopes,
        issued_at: now,
        expires_at: now + ttl,
    };

    let token = match state.issuer.sign(&claims) {
        Ok(token) => token,
        Err(_) => {
            return ApiError(AuthError::configuration("token signing failed")).into_response()
        }
    };

    info!(subject = %claims.subject_id, "login succeeded");
    Json(LoginResponse { token, claims }).into_response()
}

pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ip = client_ip(&headers);
    let rule = state.config.rate_limit("verify");
    let decision = state
        .rate_limiter
        .check(&RateLimiter::key("verify", &ip), rule)
        .await;
    if !decision.allowed {
        return Err(AuthError::throttled(decision.retry_after_seconds).into());
    }

    if body.token.trim().is_empty() {
        return Err(AuthError::validation("token is required").into());
    }

    let claims = state
        .verifier
        .verify(&body.token, state.clock.now())
        .map_err(|_| AuthError::Authentication)?;

    Ok(Json(json!({ "claims": claims })))
}

/// Claims of the calling subject (any authenticated role).
pub async fn me(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}

/// Representative store-scoped route: requires the read permission **and**
/// access to the requested store.
pub async fn store_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(store): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(
        &state,
        &claims,
        &[
            Requirement::PermissionNamed(Permission::new("appointments.read")),
            Requirement::StoreAccess(store.clone()),
        ],
    )?;

    Ok(Json(json!({
        "store": store,
        "subject": claims.subject_id,
        "role": claims.role,
    })))
}

/// Generic 401 carrying only the attempts-remaining hint. Body shape is
/// identical for unknown users and wrong passwords.
fn failed_login_response(attempts_remaining: u32) -> Response {
    let body = json!({
        "error": "authentication_failed",
        "message": "invalid credentials or token",
        "attempts_remaining": attempts_remaining,
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Client address as seen through the front proxy.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn client_ip_defaults_when_absent() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
