//! Proxy routing types: backends, distribution policies, virtual hosts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One upstream instance the proxy can forward to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Backend {
    pub host: String,
    pub port: u16,
}

impl Backend {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL requests are rewritten to, `http://host:port`.
    pub fn base_url(&self) -> String {
        format!("http://{self}")
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    /// Parse `host:port`, with or without an `http://` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("http://").unwrap_or(s);
        let s = s.trim_end_matches('/');
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("backend {s:?} is missing a port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(format!("backend {s:?} is missing a host"));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| format!("backend {s:?} has an invalid port"))?;
        Ok(Self::new(host, port))
    }
}

/// How a virtual host spreads requests over its backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistPolicy {
    #[default]
    RoundRobin,
    Random,
}

impl DistPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistPolicy::RoundRobin => "round-robin",
            DistPolicy::Random => "random",
        }
    }
}

impl fmt::Display for DistPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(DistPolicy::RoundRobin),
            "random" => Ok(DistPolicy::Random),
            other => Err(format!("unknown dist_policy {other:?}")),
        }
    }
}

/// A virtual host block as read from the proxy config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHostConfig {
    /// Incoming `Host` value this block answers for, e.g. `"app.local:8080"`.
    pub name: String,
    /// Backends in configured order.
    pub backends: Vec<Backend>,
    pub policy: DistPolicy,
}
