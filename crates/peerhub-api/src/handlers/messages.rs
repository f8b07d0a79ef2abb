//! Chat relay endpoints: send, broadcast, history, live push.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use peerhub_core::{ChatMessage, PeerAddr};
use peerhub_services::{BroadcastReport, PeerError};

use super::{parse_peer, peer_error, ApiError, ApiState};

// ── /send-peer (POST) ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendPeerRequest {
    pub from: String,
    pub to: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct SendPeerResponse {
    pub msg_id: String,
    pub timestamp: u64,
}

pub async fn handle_send_peer(
    State(state): State<ApiState>,
    Json(req): Json<SendPeerRequest>,
) -> Result<Json<SendPeerResponse>, ApiError> {
    let from = parse_peer("from", &req.from)?;
    let to = parse_peer("to", &req.to)?;

    let message = state
        .router
        .send_direct(from, to, &req.message)
        .map_err(peer_error)?;

    Ok(Json(SendPeerResponse {
        msg_id: message.msg_id,
        timestamp: message.timestamp,
    }))
}

// ── /broadcast-peer (POST) ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BroadcastRequest {
    pub from: String,
    pub message: String,
}

pub async fn handle_broadcast_peer(
    State(state): State<ApiState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<BroadcastReport>, ApiError> {
    let from = parse_peer("from", &req.from)?;
    state
        .router
        .broadcast(from, &req.message)
        .map(Json)
        .map_err(peer_error)
}

// ── /get-messages (POST) ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GetMessagesRequest {
    #[serde(rename = "peerA")]
    pub peer_a: String,
    #[serde(rename = "peerB")]
    pub peer_b: String,
    /// Only return messages with a timestamp strictly after this (ms).
    #[serde(default)]
    pub since: Option<u64>,
}

#[derive(Serialize)]
pub struct MessagesResponse {
    pub count: usize,
    pub messages: Vec<ChatMessage>,
}

pub async fn handle_get_messages(
    State(state): State<ApiState>,
    Json(req): Json<GetMessagesRequest>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let a = parse_peer("peerA", &req.peer_a)?;
    let b = parse_peer("peerB", &req.peer_b)?;

    let messages = state.router.messages(a, b, req.since);
    Ok(Json(MessagesResponse {
        count: messages.len(),
        messages,
    }))
}

// ── /events/{peer} (GET, server-sent events) ──────────────────────────────────

pub async fn handle_events(
    State(state): State<ApiState>,
    Path(peer): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let peer: PeerAddr = parse_peer("peer", &peer)?;
    if !state.router.registry().contains(&peer) {
        return Err(peer_error(PeerError::UnknownPeer(peer)));
    }

    let rx = state.router.delivery().subscribe(peer);
    tracing::info!(peer = %peer, "event stream opened");

    let events = stream::unfold(rx, |mut rx| async move {
        let message = rx.recv().await?;
        let event = Event::default().event("message").json_data(&message);
        Some((event, rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
