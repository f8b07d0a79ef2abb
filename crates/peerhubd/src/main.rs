//! peerhubd — peer signaling backend and reverse proxy.
//!
//! `peerhubd [backend|proxy] [port]`. Several backends run behind one proxy,
//! each on its own port.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use peerhub_api::{ApiState, ProxyState};
use peerhub_core::config::PeerhubConfig;
use peerhub_core::proxy_config;
use peerhub_services::{
    ChatHistoryStore, ConnectionGraph, DeliveryHub, P2PMessageRouter, PeerRegistry,
    ProxyDispatcher, SessionStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = PeerhubConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = PeerhubConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PeerhubConfig::default()
    });

    let mode = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "backend".to_string());
    let port_override = std::env::args()
        .nth(2)
        .map(|p| p.parse::<u16>().context("port argument must be a number"))
        .transpose()?;

    match mode.as_str() {
        "backend" => run_backend(config, port_override).await,
        "proxy" => run_proxy(config, port_override).await,
        other => anyhow::bail!("unknown mode {other:?}, expected \"backend\" or \"proxy\""),
    }
}

async fn run_backend(config: PeerhubConfig, port_override: Option<u16>) -> Result<()> {
    let port = port_override.unwrap_or(config.server.port);
    tracing::info!(port, "peerhubd backend starting");

    // Sessions
    let db_path = &config.session.db_path;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let sessions = SessionStore::open(db_path, Duration::from_secs(config.session.ttl_secs))
        .with_context(|| format!("failed to open session store {}", db_path.display()))?;
    tracing::info!(
        path = %db_path.display(),
        ttl_secs = config.session.ttl_secs,
        "session store ready"
    );
    if !config.session.require_login {
        tracing::warn!("require_login disabled, peer endpoints are open");
    }

    // Expired-session sweep
    {
        let sessions = sessions.clone();
        let every = Duration::from_secs(config.session.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match sessions.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(removed = n, "expired sessions swept"),
                    Err(e) => tracing::warn!(error = %e, "session sweep failed"),
                }
            }
        });
    }

    // Shared peer state
    let graph = ConnectionGraph::new(PeerRegistry::new());
    let router = P2PMessageRouter::new(graph, ChatHistoryStore::new(), DeliveryHub::new());

    let state = ApiState {
        sessions,
        router,
        users: Arc::new(config.auth.users.clone()),
        cookie_name: config.session.cookie_name.clone(),
        require_login: config.session.require_login,
    };

    let listener = TcpListener::bind((config.server.bind_addr.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{port}", config.server.bind_addr))?;
    peerhub_api::serve_backend(state, listener).await
}

async fn run_proxy(config: PeerhubConfig, port_override: Option<u16>) -> Result<()> {
    let port = port_override.unwrap_or(config.proxy.port);
    tracing::info!(port, "peerhubd proxy starting");

    let hosts = proxy_config::load(&config.proxy.config_path)?;
    if hosts.is_empty() {
        tracing::warn!(
            path = %config.proxy.config_path.display(),
            "no virtual hosts configured, every request will 404"
        );
    }

    // No overall timeout: event streams stay open for as long as the client listens.
    let forward_timeout = Duration::from_secs(config.proxy.forward_timeout_secs);
    let client = reqwest::Client::builder()
        .connect_timeout(forward_timeout)
        .no_proxy()
        .build()
        .context("failed to build HTTP client")?;
    let state = ProxyState {
        dispatcher: ProxyDispatcher::new(hosts, client).with_response_timeout(forward_timeout),
    };

    let listener = TcpListener::bind((config.proxy.bind_addr.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{port}", config.proxy.bind_addr))?;
    peerhub_api::serve_proxy(state, listener).await
}
