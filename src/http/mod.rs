//! HTTP API for the mobile front-end
//!
//! This module provides a REST API around the live session and chat:
//! - POST /live/start - Start a live session (`{"use_camera": bool}`)
//! - POST /live/stop - Stop the live session
//! - GET /live/status - Session state and resource counts
//! - POST /chat - Send a text message
//! - GET /chat/transcript - Text conversation so far
//! - POST /suggestions/{rotation,schemes,finance} - Structured suggestions
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
