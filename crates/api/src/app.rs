use std::ops::Deref;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use caregate_auth::{PermissionMatrix, TokenIssuer, TokenVerifier};
use caregate_core::{AuthResult, Clock, GateConfig};
use caregate_infra::{CredentialStore, DurableCounterStore, LockoutTracker, RateLimiter};

use crate::cors::{cors_middleware, CorsGuard};
use crate::middleware::auth_middleware;
use crate::routes;

/// Everything one service instance owns.
///
/// Constructed once per instance and passed by reference into every
/// component. No module-level globals, so every test gets a fresh instance.
pub struct AppServices {
    pub config: GateConfig,
    pub clock: Arc<dyn Clock>,
    pub credentials: Arc<dyn CredentialStore>,
    pub rate_limiter: RateLimiter,
    pub lockout: LockoutTracker,
    pub matrix: PermissionMatrix,
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub cors: CorsGuard,
}

/// Cheaply cloneable handle shared across handlers.
#[derive(Clone)]
pub struct AppState(Arc<AppServices>);

impl Deref for AppState {
    type Target = AppServices;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    /// Wire a service instance. Validates configuration eagerly; a malformed
    /// config fails here, before anything is served.
    pub fn new(
        config: GateConfig,
        clock: Arc<dyn Clock>,
        counter_store: Option<Arc<dyn DurableCounterStore>>,
        credentials: Arc<dyn CredentialStore>,
    ) -> AuthResult<Self> {
        let config = config.validated()?;

        let cors = CorsGuard::new(&config.cors);
        let issuer = TokenIssuer::new(&config.token_secret);
        let verifier = TokenVerifier::new(&config.token_secret);
        let rate_limiter = RateLimiter::new(
            counter_store.clone(),
            config.store_timeout,
            clock.clone(),
        );
        let lockout = LockoutTracker::new(
            counter_store,
            config.store_timeout,
            clock.clone(),
            config.max_login_failures,
            config.lockout_duration,
        );

        Ok(Self(Arc::new(AppServices {
            config,
            clock,
            credentials,
            rate_limiter,
            lockout,
            matrix: PermissionMatrix::default(),
            issuer,
            verifier,
            cors,
        })))
    }
}

/// Build the router (same wiring in production and black-box tests).
pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(routes::auth::me))
        .route("/stores/:store/summary", get(routes::auth::store_summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(routes::auth::health))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/verify", post(routes::auth::verify))
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), cors_middleware))
        .with_state(state)
}
