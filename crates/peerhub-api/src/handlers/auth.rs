//! /login, /logout, /whoami handlers and the session guard.

use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use peerhub_services::{Session, SessionError};

use super::{session_error, ApiError, ApiState};
use crate::cookie::{clear_cookie, read_cookie, session_cookie};

// ── /login (POST) ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by /login and /whoami. The token itself only travels in the cookie.
#[derive(Serialize)]
pub struct SessionInfo {
    pub username: String,
    pub expires_at: u64,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            username: session.username,
            expires_at: session.expires_at,
        }
    }
}

pub async fn handle_login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state
        .users
        .get(&req.username)
        .is_some_and(|password| *password == req.password);
    if !accepted {
        tracing::info!(username = %req.username, "login rejected");
        return Err((StatusCode::UNAUTHORIZED, "invalid credentials".to_string()));
    }

    let session = state
        .sessions
        .create(&req.username)
        .await
        .map_err(session_error)?;
    let cookie = session_cookie(
        &state.cookie_name,
        &session.id,
        state.sessions.ttl().as_secs(),
    );

    tracing::info!(username = %session.username, "login accepted");
    Ok(([(SET_COOKIE, cookie)], Json(SessionInfo::from(session))))
}

// ── /logout (POST) ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

pub async fn handle_logout(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let logged_out = match read_cookie(&headers, &state.cookie_name) {
        Some(token) => state.sessions.destroy(&token).await.map_err(session_error)?,
        None => false,
    };

    Ok((
        [(SET_COOKIE, clear_cookie(&state.cookie_name))],
        Json(LogoutResponse { logged_out }),
    ))
}

// ── /whoami (GET) ─────────────────────────────────────────────────────────────

pub async fn handle_whoami(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>, ApiError> {
    current_session(&state, &headers)
        .await
        .map(|s| Json(s.into()))
}

async fn current_session(state: &ApiState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let token = read_cookie(headers, &state.cookie_name)
        .ok_or_else(|| session_error(SessionError::NotFound))?;
    state.sessions.validate(&token).await.map_err(session_error)
}

// ── Guard ─────────────────────────────────────────────────────────────────────

/// Reject requests without a live session cookie when login is required.
pub async fn require_session(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.require_login {
        let session = current_session(&state, request.headers()).await?;
        tracing::debug!(username = %session.username, path = %request.uri().path(), "session ok");
    }
    Ok(next.run(request).await)
}
