use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use caregate_core::AuthError;

/// API-boundary wrapper mapping [`AuthError`] onto HTTP responses.
///
/// 401 bodies are always the same generic shape (no identity enumeration);
/// 500 detail is logged server-side and never returned.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AuthError::Validation(msg) => {
                json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            AuthError::Authentication => json_error(
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                "invalid credentials or token",
            ),
            AuthError::Authorization(reason) => {
                json_error(StatusCode::FORBIDDEN, "forbidden", reason)
            }
            AuthError::Throttled {
                retry_after_seconds,
            } => throttled_response(retry_after_seconds, None),
            AuthError::Configuration(detail) => {
                tracing::error!("configuration error: {detail}");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error",
                )
            }
            AuthError::Upstream(detail) => {
                tracing::error!("upstream failure: {detail}");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error",
                )
            }
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 429 with a `Retry-After` header and optional attempts context.
pub fn throttled_response(retry_after_seconds: u64, attempts_remaining: Option<u32>) -> Response {
    let mut body = json!({
        "error": "throttled",
        "message": "too many requests",
        "retry_after_seconds": retry_after_seconds,
    });
    if let Some(remaining) = attempts_remaining {
        body["attempts_remaining"] = json!(remaining);
    }

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_carries_retry_after_header() {
        let response = ApiError(AuthError::throttled(42)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
    }

    #[test]
    fn upstream_detail_is_not_leaked() {
        let response =
            ApiError(AuthError::upstream("postgres connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
