//! Chat message: one entry in a peer pair's history.

use serde::{Deserialize, Serialize};

use crate::peer::PeerAddr;

/// A message exchanged between two peers.
///
/// `msg_id` is `hex(blake3(sender_key || timestamp_le || content))`, so a
/// resend of identical text at the same millisecond collapses to one id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub msg_id: String,
    pub sender: PeerAddr,
    pub recipient: PeerAddr,
    pub content: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(sender: PeerAddr, recipient: PeerAddr, content: String, timestamp: u64) -> Self {
        let msg_id = message_id(&sender, timestamp, &content);
        Self {
            msg_id,
            sender,
            recipient,
            content,
            timestamp,
        }
    }
}

/// Deduplication id for a message.
pub fn message_id(sender: &PeerAddr, timestamp: u64, content: &str) -> String {
    let mut h = blake3::Hasher::new();
    h.update(sender.key().as_bytes());
    h.update(&timestamp.to_le_bytes());
    h.update(content.as_bytes());
    hex::encode(h.finalize().as_bytes())
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
