//! /status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::{session_error, ApiError, ApiState};

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub peers: usize,
    pub connections: usize,
    pub conversations: usize,
    pub active_sessions: usize,
    pub listeners: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, ApiError> {
    let router = &state.router;
    Ok(Json(StatusResponse {
        peers: router.registry().len(),
        connections: router.graph().edges().len(),
        conversations: router.history().conversations(),
        active_sessions: state
            .sessions
            .active_count()
            .await
            .map_err(session_error)?,
        listeners: router.delivery().len(),
    }))
}
