//! Peer registry: every peer that has announced itself via `submit-info`.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use peerhub_core::PeerAddr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerAddr),
    #[error("{from} is not connected to {to}")]
    NotConnected { from: PeerAddr, to: PeerAddr },
    #[error("peer {0} cannot connect to itself")]
    SelfConnection(PeerAddr),
}

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    /// Insertion order, for stable listings.
    order: Vec<PeerAddr>,
    known: HashSet<PeerAddr>,
}

impl RegistryInner {
    pub(crate) fn contains(&self, peer: &PeerAddr) -> bool {
        self.known.contains(peer)
    }

    pub(crate) fn remove(&mut self, peer: &PeerAddr) -> bool {
        if self.known.remove(peer) {
            self.order.retain(|p| p != peer);
            true
        } else {
            false
        }
    }
}

/// Known peers. Shared by the connection graph and the API handlers.
///
/// Removal goes through [`ConnectionGraph::remove_peer`](crate::ConnectionGraph::remove_peer)
/// so that the peer's edges disappear in the same critical section.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a peer. Returns false if it was already registered.
    pub fn register(&self, peer: PeerAddr) -> bool {
        let mut inner = self.write();
        if !inner.known.insert(peer) {
            return false;
        }
        inner.order.push(peer);
        drop(inner);
        tracing::info!(peer = %peer, "peer registered");
        true
    }

    pub fn contains(&self, peer: &PeerAddr) -> bool {
        self.read().contains(peer)
    }

    /// Snapshot of all known peers in registration order.
    pub fn list(&self) -> Vec<PeerAddr> {
        self.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
