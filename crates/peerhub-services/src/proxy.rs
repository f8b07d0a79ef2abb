//! Reverse-proxy dispatcher. Picks a backend per request and relays it.
//!
//! The only state kept between requests is each virtual host's round-robin
//! cursor. Forwarding makes exactly one attempt; a failed backend is
//! reported to the caller, never retried elsewhere. Response bodies are
//! streamed through unbuffered, so long-lived event streams pass intact.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, HOST};
use reqwest::{Method, StatusCode};

use peerhub_core::{Backend, DistPolicy, VirtualHostConfig};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no virtual host configured for {0:?}")]
    UnknownHost(String),
    #[error("virtual host {0:?} has no backends")]
    NoBackendsAvailable(String),
    #[error("backend {backend} unreachable: {reason}")]
    BackendUnreachable { backend: Backend, reason: String },
}

/// Headers that describe one connection and must not be relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug)]
struct VirtualHost {
    backends: Vec<Backend>,
    policy: DistPolicy,
    cursor: AtomicUsize,
}

impl VirtualHost {
    fn pick(&self) -> Option<&Backend> {
        if self.backends.is_empty() {
            return None;
        }
        let idx = match self.policy {
            DistPolicy::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.backends.len()
            }
            DistPolicy::Random => rand::thread_rng().gen_range(0..self.backends.len()),
        };
        self.backends.get(idx)
    }
}

/// A request as received by the proxy front end.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path plus query string, e.g. `/get-messages?x=1`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
}

/// The backend's response head, with the body still on the wire.
#[derive(Debug)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: reqwest::Response,
}

impl ForwardResponse {
    /// Split into status, headers, and body chunks as the backend sends them.
    pub fn into_parts(
        self,
    ) -> (
        StatusCode,
        HeaderMap,
        impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) {
        (self.status, self.headers, self.body.bytes_stream())
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, reqwest::Error> {
        self.body.bytes().await
    }
}

/// Virtual host table plus the HTTP client used to reach backends.
#[derive(Clone)]
pub struct ProxyDispatcher {
    hosts: Arc<HashMap<String, VirtualHost>>,
    client: reqwest::Client,
    response_timeout: Option<Duration>,
}

impl ProxyDispatcher {
    pub fn new(config: Vec<VirtualHostConfig>, client: reqwest::Client) -> Self {
        let hosts = config
            .into_iter()
            .map(|vh| {
                tracing::info!(
                    host = %vh.name,
                    backends = vh.backends.len(),
                    policy = %vh.policy,
                    "virtual host configured"
                );
                (
                    vh.name.to_ascii_lowercase(),
                    VirtualHost {
                        backends: vh.backends,
                        policy: vh.policy,
                        cursor: AtomicUsize::new(0),
                    },
                )
            })
            .collect();
        Self {
            hosts: Arc::new(hosts),
            client,
            response_timeout: None,
        }
    }

    /// Fail a forward whose backend has not sent a response head within
    /// `timeout`. Body transfer is not limited.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn host_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hosts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Choose a backend for a request addressed to `hostname`.
    pub fn select_backend(&self, hostname: &str) -> Result<Backend, ProxyError> {
        let key = hostname.trim().to_ascii_lowercase();
        let vhost = self
            .hosts
            .get(&key)
            .ok_or_else(|| ProxyError::UnknownHost(hostname.to_string()))?;
        let backend = vhost
            .pick()
            .cloned()
            .ok_or_else(|| ProxyError::NoBackendsAvailable(hostname.to_string()))?;
        tracing::debug!(host = %key, backend = %backend, "backend selected");
        Ok(backend)
    }

    /// Relay `request` to `backend` and return its response head. The body
    /// is read lazily from the returned value.
    pub async fn forward(
        &self,
        request: ForwardRequest,
        backend: &Backend,
    ) -> Result<ForwardResponse, ProxyError> {
        let url = format!("{}{}", backend.base_url(), request.path_and_query);
        let mut headers = strip_hop_by_hop(request.headers);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);
        if let Some(ip) = request.client_ip {
            if let Ok(value) = HeaderValue::from_str(&ip.to_string()) {
                headers.append(HeaderName::from_static("x-forwarded-for"), value);
            }
        }

        let unreachable = |reason: String| {
            tracing::warn!(backend = %backend, error = %reason, "backend unreachable");
            ProxyError::BackendUnreachable {
                backend: backend.clone(),
                reason,
            }
        };

        let send = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send();
        let response = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| unreachable(format!("no response within {limit:?}")))?,
            None => send.await,
        }
        .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        let mut headers = strip_hop_by_hop(response.headers().clone());
        headers.remove(CONTENT_LENGTH);

        tracing::debug!(backend = %backend, status = status.as_u16(), "forwarding response");
        Ok(ForwardResponse {
            status,
            headers,
            body: response,
        })
    }
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}
