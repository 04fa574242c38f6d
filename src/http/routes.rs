use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/conversation/record/start", post(handlers::start_recording))
        .route("/conversation/record/stop", post(handlers::stop_recording))
        .route("/conversation/record/pause", post(handlers::pause_recording))
        .route("/conversation/record/resume", post(handlers::resume_recording))
        .route("/conversation/language", put(handlers::set_language))
        // Conversation queries
        .route("/conversation/status", get(handlers::get_status))
        .route("/conversation/messages", get(handlers::get_messages))
        .route("/conversation/level", get(handlers::get_level))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
