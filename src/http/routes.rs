use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Interview streaming channel
        .route("/interview/ws", get(handlers::interview_ws))
        // Session control
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:session_id/stop", post(handlers::stop_session))
        // Persisted activity
        .route("/activities/:session_id", get(handlers::get_activity))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Browser clients are served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
