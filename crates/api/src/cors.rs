//! Origin allowlist enforcement.
//!
//! This is a security boundary: an arbitrary Origin value is never echoed
//! back. Only exact allowlist matches (static origins, local development
//! origins, same-project preview origins) receive a CORS header.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use caregate_core::CorsConfig;

use crate::app::AppState;

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Authorization, Content-Type";
const MAX_AGE_SECONDS: &str = "86400";

/// Origins always accepted for local development.
const LOCAL_DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
];

/// Evaluates Origin headers against the configured allowlist.
#[derive(Debug, Clone)]
pub struct CorsGuard {
    allowed: Vec<String>,
    project_slug: Option<String>,
    preview_suffix: Option<String>,
}

impl CorsGuard {
    pub fn new(config: &CorsConfig) -> Self {
        let mut allowed = config.allowed_origins.clone();
        for origin in LOCAL_DEV_ORIGINS {
            if !allowed.iter().any(|o| o == origin) {
                allowed.push((*origin).to_string());
            }
        }
        Self {
            allowed,
            project_slug: config.project_slug.clone(),
            preview_suffix: config.preview_suffix.clone(),
        }
    }

    /// Decide which value (if any) to emit as `Access-Control-Allow-Origin`.
    ///
    /// No Origin header is treated as a same-origin/non-browser caller and
    /// answered with the first configured origin. Whether deliberately
    /// omitting Origin should stay this permissive is an open question;
    /// revisit rather than assume safe.
    pub fn evaluate(&self, origin: Option<&str>) -> Option<String> {
        let Some(origin) = origin else {
            return self.allowed.first().cloned();
        };

        if self.allowed.iter().any(|o| o == origin) {
            return Some(origin.to_string());
        }

        if self.is_same_project_preview(origin) {
            return Some(origin.to_string());
        }

        None
    }

    /// Deployment previews of the same project live on a shared wildcard
    /// domain: `https://{slug}-<deployment>.{suffix}`.
    fn is_same_project_preview(&self, origin: &str) -> bool {
        let (Some(slug), Some(suffix)) = (&self.project_slug, &self.preview_suffix) else {
            return false;
        };
        let prefix = format!("https://{slug}-");
        origin.starts_with(&prefix)
            && origin.ends_with(suffix.as_str())
            && origin.len() > prefix.len() + suffix.len()
    }
}

/// Apply CORS policy around every request; answers preflights directly.
pub async fn cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let allow_origin = state.cors.evaluate(origin.as_deref());

    if req.method() == Method::OPTIONS {
        let mut response = Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::empty())
            .unwrap_or_default();
        apply_headers(&mut response, allow_origin.as_deref());
        return response;
    }

    let mut response = next.run(req).await;
    apply_headers(&mut response, allow_origin.as_deref());
    response
}

fn apply_headers(response: &mut Response, allow_origin: Option<&str>) {
    let Some(origin) = allow_origin else {
        return;
    };
    let Ok(origin_value) = HeaderValue::from_str(origin) else {
        return;
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_value);
    // Origins are echoed from an allowlist, never "*", so credentials are safe.
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECONDS),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> CorsGuard {
        CorsGuard::new(&CorsConfig {
            allowed_origins: vec![
                "https://app.myclinic.com".to_string(),
                "https://admin.myclinic.com".to_string(),
            ],
            project_slug: Some("myclinic".to_string()),
            preview_suffix: Some(".vercel.app".to_string()),
        })
    }

    #[test]
    fn allowlisted_origin_is_echoed_exactly() {
        assert_eq!(
            guard().evaluate(Some("https://admin.myclinic.com")),
            Some("https://admin.myclinic.com".to_string())
        );
    }

    #[test]
    fn unknown_origin_gets_no_header() {
        assert_eq!(guard().evaluate(Some("https://evil.example.com")), None);
    }

    #[test]
    fn absent_origin_falls_back_to_first_configured() {
        assert_eq!(
            guard().evaluate(None),
            Some("https://app.myclinic.com".to_string())
        );
    }

    #[test]
    fn local_dev_origins_are_allowed() {
        assert_eq!(
            guard().evaluate(Some("http://localhost:5173")),
            Some("http://localhost:5173".to_string())
        );
    }

    #[test]
    fn same_project_preview_is_allowed() {
        assert_eq!(
            guard().evaluate(Some("https://myclinic-abc123.vercel.app")),
            Some("https://myclinic-abc123.vercel.app".to_string())
        );
    }

    #[test]
    fn other_project_preview_is_rejected() {
        assert_eq!(
            guard().evaluate(Some("https://otherapp-abc123.vercel.app")),
            None
        );
        // Prefix alone is not enough; the shared suffix must match too.
        assert_eq!(
            guard().evaluate(Some("https://myclinic-abc123.attacker.dev")),
            None
        );
    }
}
