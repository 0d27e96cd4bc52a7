mod handlers;
pub(crate) mod responses;

use crate::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete API router.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        // Status
        .route("/api/status", get(handlers::get_status))
        // Inventory
        .route("/api/servers", get(handlers::get_servers).post(handlers::upsert_server))
        .route("/api/servers/{hostname}", delete(handlers::delete_server))
        .route(
            "/api/virtual-servers",
            get(handlers::get_virtual_servers).post(handlers::upsert_virtual_server),
        )
        .route("/api/virtual-servers/{hostname}", delete(handlers::delete_virtual_server))
        // Optimization
        .route("/api/optimize", post(handlers::start_optimize))
        .route("/api/runs/{run_id}", get(handlers::get_run))
        .route("/api/runs/{run_id}/cancel", post(handlers::cancel_run))
        // Settings
        .route("/api/settings", get(handlers::get_settings))
        .route("/api/settings", post(handlers::update_settings))
        // SSE events
        .route("/api/events", get(handlers::sse_events))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
