use std::process::ExitCode;
use std::sync::Arc;

use caregate_api::{build_app, AppState};
use caregate_core::{Clock, GateConfig, SystemClock};
use caregate_infra::{DurableCounterStore, InMemoryCredentialStore};

#[tokio::main]
async fn main() -> ExitCode {
    caregate_observability::init();

    let config = match GateConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let counter_store = match build_counter_store(&config, clock.clone()) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!("counter store setup failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    // The deployment's directory service plugs in here; the in-memory store
    // only backs local runs.
    let credentials = Arc::new(InMemoryCredentialStore::new());

    let state = match AppState::new(config, clock, counter_store, credentials) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind("0.0.0.0:8080").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind 0.0.0.0:8080: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on {addr}");
    }

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(feature = "redis")]
fn build_counter_store(
    config: &GateConfig,
    clock: Arc<dyn Clock>,
) -> Result<Option<Arc<dyn DurableCounterStore>>, String> {
    use caregate_infra::{InMemoryCounterStore, RedisCounterStore};

    match &config.redis_url {
        Some(url) => {
            let store = RedisCounterStore::new(url).map_err(|e| e.to_string())?;
            Ok(Some(Arc::new(store)))
        }
        None => {
            tracing::warn!("CAREGATE_REDIS_URL not set; counters are process-local");
            Ok(Some(Arc::new(InMemoryCounterStore::new(clock))))
        }
    }
}

#[cfg(not(feature = "redis"))]
fn build_counter_store(
    config: &GateConfig,
    clock: Arc<dyn Clock>,
) -> Result<Option<Arc<dyn DurableCounterStore>>, String> {
    use caregate_infra::InMemoryCounterStore;

    if config.redis_url.is_some() {
        tracing::warn!("CAREGATE_REDIS_URL set but redis support is not compiled in");
    }
    Ok(Some(Arc::new(InMemoryCounterStore::new(clock))))
}
