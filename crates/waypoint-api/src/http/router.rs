//! Axum router configuration with middleware.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the trigger router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/workflows", get(handlers::list_workflows))
        .route("/workflows/{name}/runs", post(handlers::start_run))
        .route("/runs", get(handlers::list_runs))
        .route("/runs/{run_id}/cancel", post(handlers::cancel_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
