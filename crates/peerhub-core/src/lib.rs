//! peerhub-core — shared value types, configuration, and the proxy config grammar.
//! All other peerhub crates depend on this one.

pub mod backend;
pub mod config;
pub mod message;
pub mod peer;
pub mod proxy_config;

pub use backend::{Backend, DistPolicy, VirtualHostConfig};
pub use message::{now_millis, ChatMessage};
pub use peer::{PairKey, PeerAddr, PeerAddrError};
