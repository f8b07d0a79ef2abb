mod cookie;
pub mod handlers;

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::{ApiState, ProxyState};

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Route table for one backend instance.
pub fn backend_router(state: ApiState) -> Router {
    let guarded = Router::new()
        .route("/submit-info", post(handlers::handle_submit_info))
        .route("/get-total-peer", get(handlers::handle_get_total_peer))
        .route("/get-list", post(handlers::handle_get_list))
        .route("/add-list", post(handlers::handle_connect_peer))
        .route("/connect-peer", post(handlers::handle_connect_peer))
        .route("/disconnect-peer", post(handlers::handle_disconnect_peer))
        .route("/get-connected", get(handlers::handle_get_connected))
        .route("/remove-peer", post(handlers::handle_remove_peer))
        .route("/send-peer", post(handlers::handle_send_peer))
        .route("/broadcast-peer", post(handlers::handle_broadcast_peer))
        .route("/get-messages", post(handlers::handle_get_messages))
        .route("/events/{peer}", get(handlers::handle_events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_session,
        ));

    Router::new()
        .route("/login", post(handlers::handle_login))
        .route("/logout", post(handlers::handle_logout))
        .route("/whoami", get(handlers::handle_whoami))
        .route("/status", get(handlers::handle_status))
        .merge(guarded)
        .with_state(state)
        .layer(cors())
}

pub async fn serve_backend(state: ApiState, listener: TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "backend listening");
    axum::serve(listener, backend_router(state)).await?;
    Ok(())
}

/// Every path goes through the proxy handler. Oversized request bodies get 413.
pub fn proxy_router(state: ProxyState) -> Router {
    Router::new()
        .fallback(handlers::handle_proxy)
        .layer(DefaultBodyLimit::max(handlers::proxy::MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn serve_proxy(state: ProxyState, listener: TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "proxy listening");
    axum::serve(
        listener,
        proxy_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
