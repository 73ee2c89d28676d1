use super::state::AppState;
use super::ws;
use crate::session::StartRequest;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /interview/ws
/// Validate start parameters, then upgrade to the interview channel
pub async fn interview_ws(
    State(state): State<AppState>,
    Query(req): Query<StartRequest>,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    let mode = req.mode.unwrap_or(state.config.dialogue.mode);
    let question_count = req
        .question_count
        .unwrap_or(state.config.dialogue.question_count)
        .clamp(1, 20);

    // Rejected before any session, device or provider is touched
    let params = match req.into_params() {
        Ok(params) => params,
        Err(e) => {
            warn!("Rejecting interview start: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let Some(upgrade) = upgrade else {
        return error_response(
            StatusCode::UPGRADE_REQUIRED,
            "Interviews run over a WebSocket".to_string(),
        );
    };

    info!(
        "Starting {:?} interview: {} / {} / {}",
        mode, params.topic, params.role, params.level
    );

    upgrade.on_upgrade(move |socket| ws::serve_session(socket, state, params, mode, question_count))
}

/// GET /sessions
/// List live sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.sessions.list().await))
}

/// POST /sessions/:session_id/stop
/// Ask a live session to finish
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    info!("Stop requested for session: {}", session_id);

    if state.sessions.stop(&session_id).await {
        (
            StatusCode::OK,
            Json(StopSessionResponse {
                session_id: session_id.clone(),
                status: "stopping".to_string(),
                message: format!("Session {} is finishing", session_id),
            }),
        )
            .into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
    }
}

/// GET /activities/:session_id
/// Get the persisted summary of a finished session
pub async fn get_activity(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.services.store.get_activity(&session_id).await {
        Ok(Some(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Activity {} not found", session_id),
        ),
        Err(e) => {
            error!("Failed to load activity: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load activity: {}", e),
            )
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
