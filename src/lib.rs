//! SCIM 1.1 provisioning gateway.
//!
//! Accepts SCIM requests over HTTP(S), turns each one into a single
//! normalized operation on a [`ScimAdapter`](adapter::ScimAdapter), and
//! shapes the adapter's answer back into a SCIM response. The gateway keeps
//! no identity data of its own.

use std::sync::Arc;

use axum::Router;
use tokio_util::task::TaskTracker;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod adapter;
pub mod config;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;
pub mod scim;

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::GatewayConfig>,
    /// The backend every SCIM operation is dispatched to.
    pub adapter: Arc<dyn adapter::ScimAdapter>,
    /// Tracks in-flight adapter calls so shutdown can wait for them.
    pub task_tracker: TaskTracker,
}

impl AppState {
    pub fn new(config: config::GatewayConfig, adapter: Arc<dyn adapter::ScimAdapter>) -> Self {
        Self {
            config: Arc::new(config),
            adapter,
            task_tracker: TaskTracker::new(),
        }
    }
}

/// Assemble the HTTP application.
///
/// SCIM routes are served both at the root and under `/v1`. Basic
/// authentication wraps everything, including the 404 fallback.
pub fn build_app(config: &config::GatewayConfig, state: AppState) -> Router {
    let app = Router::new()
        .merge(routes::scim::scim_routes())
        .nest("/v1", routes::scim::scim_routes())
        .fallback(routes::scim::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            routes::scim::middleware::basic_auth_middleware,
        ));

    app.layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
