use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    agent_handler, files_handler, health_handler, index_reload_handler, index_status_handler,
    stats_handler,
};
use super::server::AppState;

/// Assemble the HTTP surface over `state`.
///
/// Request bodies larger than `max_body_size` bytes are refused with 413.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/files", get(files_handler))
        .route("/stats", get(stats_handler))
        .route("/agent", post(agent_handler))
        .route("/index/status", get(index_status_handler))
        .route("/index/reload", post(index_reload_handler))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
