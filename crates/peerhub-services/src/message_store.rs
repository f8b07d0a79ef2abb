use dashmap::DashMap;
use std::sync::Arc;

use peerhub_core::{now_millis, ChatMessage, PairKey, PeerAddr};

/// In-memory chat history, one ordered log per unordered peer pair.
///
/// Appends to one pair hold that pair's map entry for the whole
/// timestamp-assign-and-push, so a log is totally ordered by timestamp.
/// Logs are never pruned, and survive removal of either peer.
#[derive(Clone, Default)]
pub struct ChatHistoryStore {
    /// PairKey -> messages, oldest first
    logs: Arc<DashMap<PairKey, Vec<ChatMessage>>>,
}

impl ChatHistoryStore {
    pub fn new() -> Self {
        Self {
            logs: Arc::new(DashMap::new()),
        }
    }

    /// Append a message from `sender` to `recipient`.
    ///
    /// Without a caller timestamp the message gets one strictly greater than
    /// the pair's last entry. A caller timestamp older than the last entry is
    /// raised to it.
    pub fn append(
        &self,
        sender: PeerAddr,
        recipient: PeerAddr,
        content: String,
        timestamp: Option<u64>,
    ) -> ChatMessage {
        let key = PairKey::new(sender, recipient);
        let mut log = self.logs.entry(key).or_default();
        let last = log.last().map(|m| m.timestamp);
        let timestamp = match (timestamp, last) {
            (Some(ts), Some(last)) => ts.max(last),
            (Some(ts), None) => ts,
            (None, Some(last)) => now_millis().max(last + 1),
            (None, None) => now_millis(),
        };
        let message = ChatMessage::new(sender, recipient, content, timestamp);
        log.push(message.clone());
        drop(log);

        tracing::debug!(pair = %key, msg_id = &message.msg_id[..16], "message appended");
        message
    }

    /// Full log for the pair, oldest first. Order of `a` and `b` is irrelevant.
    pub fn get(&self, a: PeerAddr, b: PeerAddr) -> Vec<ChatMessage> {
        self.logs
            .get(&PairKey::new(a, b))
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Messages strictly newer than `since`.
    pub fn get_since(&self, a: PeerAddr, b: PeerAddr, since: u64) -> Vec<ChatMessage> {
        self.logs
            .get(&PairKey::new(a, b))
            .map(|log| {
                log.iter()
                    .filter(|m| m.timestamp > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, a: PeerAddr, b: PeerAddr) -> usize {
        self.logs
            .get(&PairKey::new(a, b))
            .map(|log| log.len())
            .unwrap_or(0)
    }

    /// Number of pairs that have exchanged at least one message.
    pub fn conversations(&self) -> usize {
        self.logs.len()
    }
}
