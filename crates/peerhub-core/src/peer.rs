//! Peer identity. A chat participant is its announced `ip:port`, nothing more.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A peer, identified by the address it announced via `submit-info`.
///
/// Serialized as the string key `"ip:port"` (IPv6 addresses are bracketed,
/// e.g. `"[::1]:9001"`). Two peers are the same peer iff their keys match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddr(SocketAddr);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerAddrError {
    #[error("invalid peer ip {0:?}")]
    InvalidIp(String),
    #[error("invalid peer port {0:?}")]
    InvalidPort(String),
    #[error("invalid peer key {0:?}, expected ip:port")]
    InvalidKey(String),
}

impl PeerAddr {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(ip, port))
    }

    /// Build from the loose `ip` / `port` strings a browser form submits.
    pub fn from_parts(ip: &str, port: &str) -> Result<Self, PeerAddrError> {
        let ip_parsed: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| PeerAddrError::InvalidIp(ip.to_string()))?;
        let port_parsed: u16 = port
            .trim()
            .parse()
            .map_err(|_| PeerAddrError::InvalidPort(port.to_string()))?;
        if port_parsed == 0 {
            return Err(PeerAddrError::InvalidPort(port.to_string()));
        }
        Ok(Self::new(ip_parsed, port_parsed))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// The unique string key, `"ip:port"`.
    pub fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PeerAddr {
    type Err = PeerAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: SocketAddr = s
            .trim()
            .parse()
            .map_err(|_| PeerAddrError::InvalidKey(s.to_string()))?;
        if addr.port() == 0 {
            return Err(PeerAddrError::InvalidPort("0".to_string()));
        }
        Ok(Self(addr))
    }
}

impl TryFrom<String> for PeerAddr {
    type Error = PeerAddrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerAddr> for String {
    fn from(value: PeerAddr) -> Self {
        value.key()
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(value: SocketAddr) -> Self {
        Self(value)
    }
}

/// Canonical key for an unordered pair of peers.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`; the smaller address is
/// always stored first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub low: PeerAddr,
    pub high: PeerAddr,
}

impl PairKey {
    pub fn new(a: PeerAddr, b: PeerAddr) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn contains(&self, peer: &PeerAddr) -> bool {
        self.low == *peer || self.high == *peer
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.low, self.high)
    }
}
