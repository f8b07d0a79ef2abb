//! HTTP API handlers. Peer signaling and chat relay as JSON.

pub mod auth;
pub mod messages;
pub mod peers;
pub mod proxy;
pub mod status;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;

use peerhub_core::PeerAddr;
use peerhub_services::{P2PMessageRouter, PeerError, ProxyError, SessionError, SessionStore};

#[derive(Clone)]
pub struct ApiState {
    pub sessions: SessionStore,
    pub router: P2PMessageRouter,
    /// username -> password accepted by /login.
    pub users: Arc<BTreeMap<String, String>>,
    pub cookie_name: String,
    /// When false, peer endpoints skip the session check.
    pub require_login: bool,
}

pub type ApiError = (StatusCode, String);

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Parse an `ip:port` peer key from a request body field.
fn parse_peer(field: &str, value: &str) -> Result<PeerAddr, ApiError> {
    value
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{field}: {e}")))
}

pub(crate) fn peer_error(e: PeerError) -> ApiError {
    let status = match e {
        PeerError::UnknownPeer(_) => StatusCode::NOT_FOUND,
        PeerError::NotConnected { .. } => StatusCode::CONFLICT,
        PeerError::SelfConnection(_) => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

pub(crate) fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::Expired | SessionError::NotFound => (StatusCode::UNAUTHORIZED, e.to_string()),
        SessionError::Storage(_) | SessionError::Task(_) => {
            tracing::warn!(error = %e, "session storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub(crate) fn proxy_error(e: ProxyError) -> ApiError {
    let status = match e {
        ProxyError::UnknownHost(_) => StatusCode::NOT_FOUND,
        ProxyError::NoBackendsAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ProxyError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

// Re-export handler functions for use in router setup.
pub use auth::{handle_login, handle_logout, handle_whoami, require_session};
pub use messages::{handle_broadcast_peer, handle_events, handle_get_messages, handle_send_peer};
pub use peers::{
    handle_connect_peer, handle_disconnect_peer, handle_get_connected, handle_get_list,
    handle_get_total_peer, handle_remove_peer, handle_submit_info,
};
pub use proxy::{handle_proxy, ProxyState};
pub use status::handle_status;
