//! Connection graph: symmetric adjacency of peers allowed to message each other.
//!
//! Nodes live in an arena (`slots`) addressed by index; `index` maps a peer
//! to its slot. Both directions of an edge are written under one write lock,
//! so readers never see a half-made edge. Every read returns a copy.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use peerhub_core::PeerAddr;

use crate::peer::{PeerError, PeerRegistry};

#[derive(Debug)]
struct Node {
    peer: PeerAddr,
    neighbors: BTreeSet<usize>,
}

#[derive(Debug, Default)]
struct GraphInner {
    index: HashMap<PeerAddr, usize>,
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl GraphInner {
    fn slot_for(&mut self, peer: PeerAddr) -> usize {
        if let Some(&idx) = self.index.get(&peer) {
            return idx;
        }
        let node = Node {
            peer,
            neighbors: BTreeSet::new(),
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(peer, idx);
        idx
    }

    fn node(&self, idx: usize) -> Option<&Node> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn neighbors(&self, peer: &PeerAddr) -> Vec<PeerAddr> {
        let Some(node) = self.index.get(peer).and_then(|&idx| self.node(idx)) else {
            return Vec::new();
        };
        let mut out: Vec<PeerAddr> = node
            .neighbors
            .iter()
            .filter_map(|&n| self.node(n).map(|node| node.peer))
            .collect();
        out.sort();
        out
    }

    fn linked(&self, a: &PeerAddr, b: &PeerAddr) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&ia), Some(&ib)) => self.node(ia).is_some_and(|n| n.neighbors.contains(&ib)),
            _ => false,
        }
    }

    fn link(&mut self, a: PeerAddr, b: PeerAddr) -> bool {
        let ia = self.slot_for(a);
        let ib = self.slot_for(b);
        let added = self.node_mut(ia).is_some_and(|n| n.neighbors.insert(ib));
        if let Some(n) = self.node_mut(ib) {
            n.neighbors.insert(ia);
        }
        added
    }

    fn unlink(&mut self, a: &PeerAddr, b: &PeerAddr) -> bool {
        let (Some(&ia), Some(&ib)) = (self.index.get(a), self.index.get(b)) else {
            return false;
        };
        let removed = self.node_mut(ia).is_some_and(|n| n.neighbors.remove(&ib));
        if let Some(n) = self.node_mut(ib) {
            n.neighbors.remove(&ia);
        }
        removed
    }

    /// Drop the peer's node and strip it from every neighbor. Returns the former neighbors.
    fn remove(&mut self, peer: &PeerAddr) -> Vec<PeerAddr> {
        let Some(idx) = self.index.remove(peer) else {
            return Vec::new();
        };
        let Some(node) = self.slots.get_mut(idx).and_then(Option::take) else {
            return Vec::new();
        };
        self.free.push(idx);

        let mut former = Vec::with_capacity(node.neighbors.len());
        for n in node.neighbors {
            if let Some(other) = self.node_mut(n) {
                other.neighbors.remove(&idx);
                former.push(other.peer);
            }
        }
        former.sort();
        former
    }
}

/// Who may message whom. Holds the registry so edge checks and peer removal
/// can lock both in the fixed order registry → graph.
#[derive(Clone)]
pub struct ConnectionGraph {
    registry: PeerRegistry,
    inner: Arc<RwLock<GraphInner>>,
}

impl ConnectionGraph {
    pub fn new(registry: PeerRegistry) -> Self {
        Self {
            registry,
            inner: Arc::new(RwLock::new(GraphInner::default())),
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect two registered peers in both directions.
    ///
    /// Returns false if they were already connected.
    pub fn connect(&self, a: PeerAddr, b: PeerAddr) -> Result<bool, PeerError> {
        if a == b {
            return Err(PeerError::SelfConnection(a));
        }
        let registry = self.registry.read();
        for peer in [a, b] {
            if !registry.contains(&peer) {
                return Err(PeerError::UnknownPeer(peer));
            }
        }
        let added = self.write().link(a, b);
        drop(registry);

        if added {
            tracing::info!(a = %a, b = %b, "peers connected");
        }
        Ok(added)
    }

    /// Remove the edge between `a` and `b` in both directions.
    pub fn disconnect(&self, a: &PeerAddr, b: &PeerAddr) -> bool {
        let removed = self.write().unlink(a, b);
        if removed {
            tracing::info!(a = %a, b = %b, "peers disconnected");
        }
        removed
    }

    /// Snapshot of the peer's neighbors, sorted. Fails if the peer is not registered.
    pub fn neighbors_of(&self, peer: &PeerAddr) -> Result<Vec<PeerAddr>, PeerError> {
        let registry = self.registry.read();
        if !registry.contains(peer) {
            return Err(PeerError::UnknownPeer(*peer));
        }
        Ok(self.read().neighbors(peer))
    }

    pub fn are_connected(&self, a: &PeerAddr, b: &PeerAddr) -> bool {
        self.read().linked(a, b)
    }

    /// Run `f` only if `a` and `b` are connected, holding the edge in place
    /// until it returns. A concurrent `disconnect` waits for `f`.
    pub fn with_edge<R>(&self, a: &PeerAddr, b: &PeerAddr, f: impl FnOnce() -> R) -> Option<R> {
        let inner = self.read();
        inner.linked(a, b).then(f)
    }

    /// Strip `peer` from the graph without touching the registry.
    pub fn remove_all(&self, peer: &PeerAddr) -> Vec<PeerAddr> {
        self.write().remove(peer)
    }

    /// Unregister `peer` and drop all of its edges in one critical section.
    ///
    /// Returns the former neighbors, or `None` if the peer was not registered.
    pub fn remove_peer(&self, peer: &PeerAddr) -> Option<Vec<PeerAddr>> {
        let mut registry = self.registry.write();
        let known = registry.remove(peer);
        let former = self.write().remove(peer);
        drop(registry);

        if known {
            tracing::info!(peer = %peer, neighbors = former.len(), "peer removed");
            Some(former)
        } else {
            None
        }
    }

    /// Every edge once, as `(low, high)` pairs, sorted.
    pub fn edges(&self) -> Vec<(PeerAddr, PeerAddr)> {
        let inner = self.read();
        let mut out = Vec::new();
        for node in inner.slots.iter().flatten() {
            for &n in &node.neighbors {
                if let Some(other) = inner.node(n) {
                    if node.peer < other.peer {
                        out.push((node.peer, other.peer));
                    }
                }
            }
        }
        out.sort();
        out
    }
}
