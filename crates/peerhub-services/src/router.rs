//! P2P message router: connect, send, broadcast, and remove over the shared state.

use serde::Serialize;

use peerhub_core::{ChatMessage, PeerAddr};

use crate::delivery::DeliveryHub;
use crate::graph::ConnectionGraph;
use crate::message_store::ChatHistoryStore;
use crate::peer::{PeerError, PeerRegistry};

/// A neighbor a broadcast could not reach, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub to: PeerAddr,
    pub error: String,
}

/// Per-neighbor outcome of a broadcast.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastReport {
    pub delivered: Vec<ChatMessage>,
    pub failed: Vec<DeliveryFailure>,
}

/// Orchestrates peer operations. Constructed once per process and cloned
/// into every handler.
#[derive(Clone)]
pub struct P2PMessageRouter {
    graph: ConnectionGraph,
    history: ChatHistoryStore,
    delivery: DeliveryHub,
}

impl P2PMessageRouter {
    pub fn new(graph: ConnectionGraph, history: ChatHistoryStore, delivery: DeliveryHub) -> Self {
        Self {
            graph,
            history,
            delivery,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        self.graph.registry()
    }

    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    pub fn history(&self) -> &ChatHistoryStore {
        &self.history
    }

    pub fn delivery(&self) -> &DeliveryHub {
        &self.delivery
    }

    pub fn register_peer(&self, peer: PeerAddr) -> bool {
        self.registry().register(peer)
    }

    pub fn peers(&self) -> Vec<PeerAddr> {
        self.registry().list()
    }

    pub fn neighbors(&self, peer: &PeerAddr) -> Result<Vec<PeerAddr>, PeerError> {
        self.graph.neighbors_of(peer)
    }

    pub fn connect_peer(&self, a: PeerAddr, b: PeerAddr) -> Result<bool, PeerError> {
        self.graph.connect(a, b)
    }

    pub fn disconnect_peer(&self, a: &PeerAddr, b: &PeerAddr) -> bool {
        self.graph.disconnect(a, b)
    }

    /// Append a message to the pair's history and push it to `to` if it is listening.
    ///
    /// The append happens under the edge check, so nothing is recorded for
    /// a pair once `disconnect` has returned.
    pub fn send_direct(
        &self,
        from: PeerAddr,
        to: PeerAddr,
        text: &str,
    ) -> Result<ChatMessage, PeerError> {
        let message = self
            .graph
            .with_edge(&from, &to, || {
                self.history.append(from, to, text.to_string(), None)
            })
            .ok_or(PeerError::NotConnected { from, to })?;
        let pushed = self.delivery.push(&message);
        tracing::debug!(from = %from, to = %to, pushed, "direct message sent");
        Ok(message)
    }

    /// Send `text` to every neighbor of `from` as of the call.
    ///
    /// A failure for one neighbor is recorded and the fan-out continues.
    pub fn broadcast(&self, from: PeerAddr, text: &str) -> Result<BroadcastReport, PeerError> {
        let targets = self.graph.neighbors_of(&from)?;
        let mut report = BroadcastReport::default();

        for to in targets {
            match self.send_direct(from, to, text) {
                Ok(message) => report.delivered.push(message),
                Err(e) => {
                    tracing::warn!(from = %from, to = %to, error = %e, "broadcast delivery failed");
                    report.failed.push(DeliveryFailure {
                        to,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            from = %from,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "broadcast complete"
        );
        Ok(report)
    }

    /// Unregister the peer, drop its edges and push channel. History is kept.
    pub fn remove_peer(&self, peer: &PeerAddr) -> bool {
        let removed = self.graph.remove_peer(peer).is_some();
        self.delivery.unsubscribe(peer);
        removed
    }

    pub fn messages(&self, a: PeerAddr, b: PeerAddr, since: Option<u64>) -> Vec<ChatMessage> {
        match since {
            Some(ts) => self.history.get_since(a, b, ts),
            None => self.history.get(a, b),
        }
    }
}
