//! peerhub integration test harness.
//!
//! Each test starts its own backends and proxy in-process on ephemeral
//! 127.0.0.1 ports and talks to them over real HTTP. Nothing is shared
//! between tests.
//!
//!   cargo test --test integration

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;

use peerhub_api::{ApiState, ProxyState};
use peerhub_core::VirtualHostConfig;
use peerhub_services::{
    ChatHistoryStore, ConnectionGraph, DeliveryHub, P2PMessageRouter, PeerRegistry,
    ProxyDispatcher, SessionStore,
};

mod messaging;
mod peers;
mod proxy;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const USER: &str = "alice";
pub const PASSWORD: &str = "wonderland";

/// A running backend and a handle on its shared state.
pub struct TestBackend {
    pub base: String,
    pub port: u16,
    pub state: ApiState,
}

pub fn api_state(sessions: SessionStore, require_login: bool) -> ApiState {
    let mut users = BTreeMap::new();
    users.insert(USER.to_string(), PASSWORD.to_string());
    let graph = ConnectionGraph::new(PeerRegistry::new());
    ApiState {
        sessions,
        router: P2PMessageRouter::new(graph, ChatHistoryStore::new(), DeliveryHub::new()),
        users: Arc::new(users),
        cookie_name: "sessionId".to_string(),
        require_login,
    }
}

pub async fn spawn_backend_with(state: ApiState) -> Result<TestBackend> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(peerhub_api::serve_backend(state.clone(), listener));
    Ok(TestBackend {
        base: format!("http://127.0.0.1:{port}"),
        port,
        state,
    })
}

pub async fn spawn_backend(require_login: bool) -> Result<TestBackend> {
    let sessions = SessionStore::in_memory(Duration::from_secs(120))?;
    spawn_backend_with(api_state(sessions, require_login)).await
}

/// Bind the proxy first so `hosts` can be built around its own address.
pub async fn spawn_proxy<F>(hosts: F) -> Result<String>
where
    F: FnOnce(u16) -> Vec<VirtualHostConfig>,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let state = ProxyState {
        dispatcher: ProxyDispatcher::new(hosts(port), backend_client())
            .with_response_timeout(Duration::from_secs(10)),
    };
    tokio::spawn(peerhub_api::serve_proxy(state, listener));
    Ok(format!("http://127.0.0.1:{port}"))
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("client should build")
}

/// The proxy's own client. No total timeout, so event streams relay freely.
fn backend_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("client should build")
}

/// A JSON response: status, `Set-Cookie` (if any), and body.
pub struct Reply {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl Reply {
    /// The `name=value` part of the `Set-Cookie` header.
    pub fn cookie(&self) -> Option<String> {
        self.set_cookie
            .as_deref()
            .and_then(|c| c.split(';').next())
            .map(str::to_string)
    }
}

async fn into_reply(resp: reqwest::Response) -> Result<Reply> {
    let status = resp.status();
    let set_cookie = resp
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok(Reply {
        status,
        set_cookie,
        body,
    })
}

pub async fn post(base: &str, path: &str, body: Value, cookie: Option<&str>) -> Result<Reply> {
    let mut req = client().post(format!("{base}{path}")).json(&body);
    if let Some(c) = cookie {
        req = req.header(COOKIE, c);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("POST {path} failed"))?;
    into_reply(resp).await
}

pub async fn get(base: &str, path: &str, cookie: Option<&str>) -> Result<Reply> {
    let mut req = client().get(format!("{base}{path}"));
    if let Some(c) = cookie {
        req = req.header(COOKIE, c);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("GET {path} failed"))?;
    into_reply(resp).await
}

/// Log in as the test user and return the `sessionId=...` cookie.
pub async fn login(base: &str) -> Result<String> {
    let reply = post(
        base,
        "/login",
        serde_json::json!({"username": USER, "password": PASSWORD}),
        None,
    )
    .await?;
    anyhow::ensure!(reply.status == StatusCode::OK, "login failed: {}", reply.body);
    reply.cookie().context("login set no cookie")
}

/// Register `127.0.0.1:{port}` on `base`.
pub async fn register(base: &str, port: u16, cookie: Option<&str>) -> Result<String> {
    let reply = post(
        base,
        "/submit-info",
        serde_json::json!({"ip": "127.0.0.1", "port": port}),
        cookie,
    )
    .await?;
    anyhow::ensure!(reply.status == StatusCode::OK, "submit-info failed: {}", reply.body);
    Ok(format!("127.0.0.1:{port}"))
}

pub async fn connect(base: &str, a: &str, b: &str, cookie: Option<&str>) -> Result<Reply> {
    post(
        base,
        "/connect-peer",
        serde_json::json!({"peerA": a, "peerB": b}),
        cookie,
    )
    .await
}
