use super::state::AppState;
use crate::chat::{ChatMessage, Expense};
use crate::error::LiveError;
use crate::session::SessionState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartLiveRequest {
    /// Stream camera frames alongside audio
    #[serde(default)]
    pub use_camera: bool,
}

#[derive(Debug, Serialize)]
pub struct StartLiveResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RotationRequest {
    pub location: String,
    pub climate: String,
}

#[derive(Debug, Deserialize)]
pub struct SchemesRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct FinanceRequest {
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub advice: String,
}

/// Status while a start holds the controller
#[derive(Debug, Serialize)]
pub struct BusyStatusResponse {
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn live_error_status(e: &LiveError) -> StatusCode {
    match e {
        LiveError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        LiveError::AlreadyActive | LiveError::Cancelled => StatusCode::CONFLICT,
        LiveError::TransportError(_) | LiveError::TransportClosed => StatusCode::BAD_GATEWAY,
        LiveError::ConfigurationError(_) | LiveError::Decode(_) | LiveError::Device(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /live/start
/// Start a live voice (or voice + camera) session
pub async fn start_live(
    State(state): State<AppState>,
    body: Option<Json<StartLiveRequest>>,
) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    info!("Starting live session (camera: {})", req.use_camera);

    let mut live = state.live.lock().await;
    match live.start(req.use_camera).await {
        Ok(id) => (
            StatusCode::OK,
            Json(StartLiveResponse {
                session_id: id.to_string(),
                status: "live".to_string(),
                message: format!("Live session {} started", id),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start live session: {}", e);
            error_response(live_error_status(&e), e.to_string())
        }
    }
}

/// POST /live/stop
/// Stop the live session (always succeeds)
pub async fn stop_live(State(state): State<AppState>) -> impl IntoResponse {
    // A pending start holds the lock; cancel it so it unwinds and lets go
    if state.control.cancel_start() {
        info!("Cancelling pending live session start");
    }

    let mut live = state.live.lock().await;
    live.stop().await;
    (StatusCode::OK, Json(live.stats()))
}

/// GET /live/status
pub async fn live_status(State(state): State<AppState>) -> Response {
    match state.live.try_lock() {
        Ok(live) => (StatusCode::OK, Json(live.stats())).into_response(),
        Err(_) => (
            StatusCode::OK,
            Json(BusyStatusResponse {
                state: state.control.state(),
            }),
        )
            .into_response(),
    }
}

/// POST /chat
/// Send a text message; refused while a live session is starting or open
pub async fn send_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message is empty");
    }

    if state.control.state().is_active() {
        return error_response(
            StatusCode::CONFLICT,
            "Text chat is unavailable while a live session is open",
        );
    }

    let mut transcript = state.transcript.write().await;
    let reply: ChatMessage = state.chat.send(&mut transcript, message).await;
    (StatusCode::OK, Json(reply)).into_response()
}

/// GET /chat/transcript
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript = state.transcript.read().await;
    (StatusCode::OK, Json(transcript.messages().to_vec()))
}

/// POST /suggestions/rotation
pub async fn crop_rotation(
    State(state): State<AppState>,
    Json(req): Json<RotationRequest>,
) -> impl IntoResponse {
    let plan = state
        .suggestions
        .crop_rotation(&req.location, &req.climate)
        .await;
    (StatusCode::OK, Json(plan))
}

/// POST /suggestions/schemes
pub async fn schemes(
    State(state): State<AppState>,
    Json(req): Json<SchemesRequest>,
) -> impl IntoResponse {
    let schemes = state.suggestions.schemes(&req.query).await;
    (StatusCode::OK, Json(schemes))
}

/// POST /suggestions/finance
pub async fn financial_advice(
    State(state): State<AppState>,
    Json(req): Json<FinanceRequest>,
) -> impl IntoResponse {
    let advice = state.suggestions.financial_advice(&req.expenses).await;
    (StatusCode::OK, Json(AdviceResponse { advice }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
