use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use caregate_auth::{authorize_all, Claims, Requirement};
use caregate_core::AuthError;
use caregate_infra::RateLimiter;

use crate::app::AppState;
use crate::errors::ApiError;

/// Verify the bearer token and enforce the per-user quota, then make the
/// claims available to handlers as an extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or(AuthError::Authentication)?;

    let claims = state
        .verifier
        .verify(token, state.clock.now())
        .map_err(|_| AuthError::Authentication)?;

    // Authenticated operations are throttled per subject, not per IP.
    let rule = state.config.rate_limit("api");
    let key = RateLimiter::key("api", &claims.subject_id.to_string());
    let decision = state.rate_limiter.check(&key, rule).await;
    if !decision.allowed {
        return Err(AuthError::throttled(decision.retry_after_seconds).into());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Enforce authorization requirements before handler logic runs.
///
/// Requirements combine with logical AND; the first denial's reason becomes
/// the 403 body.
pub fn require(
    state: &AppState,
    claims: &Claims,
    requirements: &[Requirement],
) -> Result<(), ApiError> {
    let decision = authorize_all(&state.matrix, claims, requirements);
    if decision.allowed {
        Ok(())
    } else {
        Err(AuthError::forbidden(decision.reason).into())
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
