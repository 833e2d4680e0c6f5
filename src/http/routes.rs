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
        // Live session control
        .route("/live/start", post(handlers::start_live))
        .route("/live/stop", post(handlers::stop_live))
        .route("/live/status", get(handlers::live_status))
        // Text chat
        .route("/chat", post(handlers::send_chat))
        .route("/chat/transcript", get(handlers::get_transcript))
        // Structured suggestions
        .route("/suggestions/rotation", post(handlers::crop_rotation))
        .route("/suggestions/schemes", post(handlers::schemes))
        .route("/suggestions/finance", post(handlers::financial_advice))
        // The mobile front-end is served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
