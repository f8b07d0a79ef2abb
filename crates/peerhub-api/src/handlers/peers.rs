//! Peer registry and connection graph endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use peerhub_core::PeerAddr;

use super::{parse_peer, peer_error, ApiError, ApiState};

// ── /submit-info (POST) ───────────────────────────────────────────────────────

/// Browsers send the port as either a JSON number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(u64),
    Text(String),
}

impl PortField {
    fn as_text(&self) -> String {
        match self {
            PortField::Number(n) => n.to_string(),
            PortField::Text(s) => s.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct SubmitInfoRequest {
    pub ip: String,
    pub port: PortField,
}

#[derive(Serialize)]
pub struct SubmitInfoResponse {
    pub peer: PeerAddr,
    /// False when the peer was already registered.
    pub registered: bool,
}

pub async fn handle_submit_info(
    State(state): State<ApiState>,
    Json(req): Json<SubmitInfoRequest>,
) -> Result<Json<SubmitInfoResponse>, ApiError> {
    let peer = PeerAddr::from_parts(&req.ip, &req.port.as_text())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let registered = state.router.register_peer(peer);
    Ok(Json(SubmitInfoResponse { peer, registered }))
}

// ── /get-total-peer (GET) ─────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerAddr>,
}

pub async fn handle_get_total_peer(State(state): State<ApiState>) -> Json<PeersResponse> {
    Json(PeersResponse {
        peers: state.router.peers(),
    })
}

// ── /get-list (POST) ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PeerRequest {
    pub peer: String,
}

#[derive(Serialize)]
pub struct NeighborsResponse {
    pub peer: PeerAddr,
    pub neighbors: Vec<PeerAddr>,
}

pub async fn handle_get_list(
    State(state): State<ApiState>,
    Json(req): Json<PeerRequest>,
) -> Result<Json<NeighborsResponse>, ApiError> {
    let peer = parse_peer("peer", &req.peer)?;
    let neighbors = state.router.neighbors(&peer).map_err(peer_error)?;
    Ok(Json(NeighborsResponse { peer, neighbors }))
}

// ── /add-list, /connect-peer, /disconnect-peer (POST) ─────────────────────────

#[derive(Deserialize)]
pub struct PairRequest {
    #[serde(rename = "peerA")]
    pub peer_a: String,
    #[serde(rename = "peerB")]
    pub peer_b: String,
}

impl PairRequest {
    fn parse(&self) -> Result<(PeerAddr, PeerAddr), ApiError> {
        Ok((
            parse_peer("peerA", &self.peer_a)?,
            parse_peer("peerB", &self.peer_b)?,
        ))
    }
}

#[derive(Serialize)]
pub struct ConnectResponse {
    pub connected: bool,
    /// False when the edge already existed.
    pub created: bool,
}

pub async fn handle_connect_peer(
    State(state): State<ApiState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let (a, b) = req.parse()?;
    let created = state.router.connect_peer(a, b).map_err(peer_error)?;
    Ok(Json(ConnectResponse {
        connected: true,
        created,
    }))
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub disconnected: bool,
}

pub async fn handle_disconnect_peer(
    State(state): State<ApiState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let (a, b) = req.parse()?;
    let disconnected = state.router.disconnect_peer(&a, &b);
    Ok(Json(DisconnectResponse { disconnected }))
}

// ── /get-connected (GET) ──────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EdgeJson {
    #[serde(rename = "peerA")]
    pub peer_a: PeerAddr,
    #[serde(rename = "peerB")]
    pub peer_b: PeerAddr,
}

#[derive(Serialize)]
pub struct ConnectedResponse {
    pub connections: Vec<EdgeJson>,
}

pub async fn handle_get_connected(State(state): State<ApiState>) -> Json<ConnectedResponse> {
    let connections = state
        .router
        .graph()
        .edges()
        .into_iter()
        .map(|(peer_a, peer_b)| EdgeJson { peer_a, peer_b })
        .collect();
    Json(ConnectedResponse { connections })
}

// ── /remove-peer (POST) ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

pub async fn handle_remove_peer(
    State(state): State<ApiState>,
    Json(req): Json<PeerRequest>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let peer = parse_peer("peer", &req.peer)?;
    let removed = state.router.remove_peer(&peer);
    tracing::info!(peer = %peer, removed, "remove-peer");
    Ok(Json(RemoveResponse { removed }))
}
