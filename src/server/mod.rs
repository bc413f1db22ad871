//! HTTP server for inbound webhooks.
//!
//! # Endpoints
//!
//! - `POST /hook` - Relays GitHub webhook deliveries to configured endpoints (always 202 Accepted)
//! - `POST /hookTester` - Logs the request and its expected test signatures
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use axum::http::StatusCode;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::webhooks::WebhookDispatcher;

pub mod echo;
pub mod relay;

pub use echo::echo_handler;
pub use relay::{RelayError, relay_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Arc<Config>,
    dispatcher: WebhookDispatcher,
}

impl AppState {
    pub fn new(config: Arc<Config>, dispatcher: WebhookDispatcher) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { config, dispatcher }),
        }
    }

    /// Returns the hook configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the outbound dispatcher.
    pub fn dispatcher(&self) -> &WebhookDispatcher {
        &self.inner.dispatcher
    }
}

/// Liveness probe.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/hook", post(relay_handler))
        .route("/hookTester", post(echo_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
