//! Push delivery to peers that are listening for messages.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use peerhub_core::{ChatMessage, PeerAddr};

/// Open push channels, at most one per peer.
#[derive(Clone, Default)]
pub struct DeliveryHub {
    channels: Arc<DashMap<PeerAddr, mpsc::UnboundedSender<ChatMessage>>>,
}

/// Receiving end of one peer's push channel. Dropping it closes the channel
/// and removes it from the hub.
pub struct Listener {
    rx: mpsc::UnboundedReceiver<ChatMessage>,
    hub: DeliveryHub,
    peer: PeerAddr,
}

impl Listener {
    /// Next pushed message, or `None` once the channel is replaced or removed.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.rx.close();
        if self.hub.prune(&self.peer) {
            tracing::debug!(peer = %self.peer, "push channel closed by listener");
        }
    }
}

impl DeliveryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel for `peer`, replacing (and thereby closing) any previous one.
    pub fn subscribe(&self, peer: PeerAddr) -> Listener {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.channels.insert(peer, tx).is_some() {
            tracing::debug!(peer = %peer, "push channel replaced");
        } else {
            tracing::debug!(peer = %peer, "push channel opened");
        }
        Listener {
            rx,
            hub: self.clone(),
            peer,
        }
    }

    pub fn unsubscribe(&self, peer: &PeerAddr) -> bool {
        self.channels.remove(peer).is_some()
    }

    /// Drop `peer`'s channel if its listener has gone. A live replacement is kept.
    pub fn prune(&self, peer: &PeerAddr) -> bool {
        self.channels
            .remove_if(peer, |_, tx| tx.is_closed())
            .is_some()
    }

    /// Enqueue `message` for its recipient. Returns false if nobody is listening.
    pub fn push(&self, message: &ChatMessage) -> bool {
        let recipient = message.recipient;
        let sent = match self.channels.get(&recipient) {
            Some(tx) => tx.send(message.clone()).is_ok(),
            None => return false,
        };
        if !sent && self.prune(&recipient) {
            tracing::debug!(peer = %recipient, "pruned closed push channel");
        }
        sent
    }

    pub fn is_listening(&self, peer: &PeerAddr) -> bool {
        self.channels
            .get(peer)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Number of peers with a live listener.
    pub fn len(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
