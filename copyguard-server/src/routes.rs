//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::Config;
use crate::handlers::{
    add_hashes_handler, create_reference_handler, enqueue_scan_handler, get_reference_handler,
    health, list_dead_letters_handler, list_fingerprints_handler, list_matches_handler, ready,
    update_policy_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router with default config (for testing)
pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, &Config::default())
}

/// Create the application router with custom configuration
pub fn create_router_with_config(state: AppState, config: &Config) -> Router {
    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let v1 = Router::new()
        .route("/scans", post(enqueue_scan_handler))
        .route("/references", post(create_reference_handler))
        .route("/references/{id}", get(get_reference_handler))
        .route("/references/{id}/policy", put(update_policy_handler))
        .route("/references/{id}/hashes", post(add_hashes_handler))
        .route("/contents/{id}/matches", get(list_matches_handler))
        .route("/contents/{id}/fingerprints", get(list_fingerprints_handler))
        .route("/dead-letters", get(list_dead_letters_handler));

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state)
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
}
