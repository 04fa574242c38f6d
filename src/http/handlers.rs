use super::state::AppState;
use crate::conversation::Message;
use crate::language::LanguageTag;
use crate::orchestrator::{ControlReply, ConversationSnapshot, Event, Phase};
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

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub action: String,
    /// Phase right after the request was applied
    #[serde(flatten)]
    pub phase: Phase,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    /// BCP-47 tag; `null` or `"auto"` switches to auto-detection
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LanguageResponse {
    pub selected_language: Option<LanguageTag>,
}

#[derive(Debug, Serialize)]
pub struct LevelResponse {
    pub level: u8,
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

/// Run a control event through the driver and map its verdict to a response
async fn apply(state: &AppState, action: &str, event: Event) -> Result<ConversationSnapshot, Response> {
    match state.conversation.request(event).await {
        Ok(ControlReply::Accepted(snapshot)) => {
            info!("Applied {}, now {:?}", action, snapshot.phase);
            Ok(snapshot)
        }
        Ok(ControlReply::Rejected(reason)) => Err(error_response(StatusCode::CONFLICT, reason)),
        Err(e) => {
            error!("Failed to apply {}: {}", action, e);
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

async fn control(state: &AppState, action: &str, event: Event) -> Response {
    match apply(state, action, event).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(ActionResponse {
                action: action.to_string(),
                phase: snapshot.phase,
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /conversation/record/start
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    control(&state, "start", Event::StartRecording).await
}

/// POST /conversation/record/stop
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    control(&state, "stop", Event::StopRecording).await
}

/// POST /conversation/record/pause
pub async fn pause_recording(State(state): State<AppState>) -> impl IntoResponse {
    control(&state, "pause", Event::PauseRecording).await
}

/// POST /conversation/record/resume
pub async fn resume_recording(State(state): State<AppState>) -> impl IntoResponse {
    control(&state, "resume", Event::ResumeRecording).await
}

/// PUT /conversation/language
pub async fn set_language(
    State(state): State<AppState>,
    Json(req): Json<LanguageRequest>,
) -> impl IntoResponse {
    let language = req
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto"))
        .map(LanguageTag::new);

    match apply(&state, "language", Event::SelectLanguage(language)).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(LanguageResponse {
                selected_language: snapshot.selected_language,
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}

/// GET /conversation/status
pub async fn get_status(State(state): State<AppState>) -> Json<ConversationSnapshot> {
    Json(state.conversation.snapshot())
}

/// GET /conversation/messages
pub async fn get_messages(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(state.conversation.snapshot().messages)
}

/// GET /conversation/level
pub async fn get_level(State(state): State<AppState>) -> Json<LevelResponse> {
    Json(LevelResponse {
        level: state.conversation.level(),
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
