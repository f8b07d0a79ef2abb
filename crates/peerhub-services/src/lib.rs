//! peerhub-services — the shared, concurrently accessed state behind the API.
//!
//! Each structure owns its own lock. Where an operation spans the peer
//! registry and the connection graph, the registry lock is always taken
//! first.

pub mod delivery;
pub mod graph;
pub mod message_store;
pub mod peer;
pub mod proxy;
pub mod router;
pub mod session;

pub use delivery::{DeliveryHub, Listener};
pub use graph::ConnectionGraph;
pub use message_store::ChatHistoryStore;
pub use peer::{PeerError, PeerRegistry};
pub use proxy::{ForwardRequest, ForwardResponse, ProxyDispatcher, ProxyError};
pub use router::{BroadcastReport, DeliveryFailure, P2PMessageRouter};
pub use session::{Session, SessionError, SessionStore};
