use super::state::AppState;
use crate::audio::CaptureInput;
use crate::session::{LiveSession, OutputTarget, SessionConfig, SessionStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Optional WAV fixture to drive capture instead of a microphone
    pub capture_wav: Option<String>,

    /// Optional WAV path to render scheduled reply audio into
    pub output_wav: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
    pub stats: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start the live voice session
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("live-{}", uuid::Uuid::new_v4()));

    info!("Starting live session: {}", session_id);

    // At most one session at a time. The slot lock is held across the whole
    // start so concurrent requests serialize here; the loser sees the
    // occupied slot and gets a conflict instead of overwriting a live session.
    let mut slot = state.session.write().await;
    if slot.is_some() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "A live session is already running".to_string(),
            }),
        )
            .into_response();
    }

    let api_key = std::env::var(&state.config.live.api_key_env).unwrap_or_else(|_| {
        warn!("API key env var {} is not set", state.config.live.api_key_env);
        String::new()
    });

    let capture = match req
        .capture_wav
        .or_else(|| state.config.audio.capture_wav.clone())
    {
        Some(path) => CaptureInput::WavFile(path.into()),
        None => CaptureInput::Microphone,
    };

    let output = match req
        .output_wav
        .or_else(|| state.config.audio.output_wav.clone())
    {
        Some(path) => OutputTarget::WavFile(path.into()),
        None => OutputTarget::Null,
    };

    let config = SessionConfig {
        session_id: session_id.clone(),
        endpoint: state.config.live.endpoint.clone(),
        model: state.config.live.model.clone(),
        voice: state.config.live.voice.clone(),
        system_prompt: state.config.live.system_prompt.clone(),
        api_key,
        capture,
        output,
    };

    let session = match LiveSession::new(config, Arc::clone(&state.cues)) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create session: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create session: {}", e),
                }),
            )
                .into_response();
        }
    };

    // A start failure reverts the session to idle; the slot stays empty
    if let Err(e) = session.start().await {
        error!("Failed to start session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start session: {}", e),
            }),
        )
            .into_response();
    }

    *slot = Some(session);
    drop(slot);

    info!("Live session started: {}", session_id);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id: session_id.clone(),
            status: "connecting".to_string(),
            message: format!("Live session {} started", session_id),
        }),
    )
        .into_response()
}

/// POST /session/stop
/// Stop the live voice session
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = {
        let mut slot = state.session.write().await;
        slot.take()
    };

    match session {
        Some(session) => {
            let stats = session.close().await;
            info!("Live session stopped: {}", session.session_id());
            (
                StatusCode::OK,
                Json(StopSessionResponse {
                    session_id: session.session_id().to_string(),
                    status: "closed".to_string(),
                    message: "Live session stopped".to_string(),
                    stats,
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No live session is running".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /session/status
/// Get status of the live session
pub async fn get_session_status(State(state): State<AppState>) -> impl IntoResponse {
    let slot = state.session.read().await;

    match slot.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.status().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No live session is running".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /session/transcript
/// Get the running transcript of the live session
pub async fn get_session_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let slot = state.session.read().await;

    match slot.as_ref() {
        Some(session) => (StatusCode::OK, session.transcript().await).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No live session is running".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
