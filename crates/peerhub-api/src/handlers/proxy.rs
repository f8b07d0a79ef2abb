//! Reverse-proxy front end. Every request is routed by its `Host` header.

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use peerhub_services::{ForwardRequest, ProxyDispatcher};

use super::proxy_error;

/// Largest request body the proxy will buffer before forwarding.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
    pub dispatcher: ProxyDispatcher,
}

pub async fn handle_proxy(
    State(state): State<ProxyState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(host) = headers.get(HOST).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing Host header").into_response();
    };
    let host = host.to_string();

    let backend = match state.dispatcher.select_backend(&host) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::info!(host = %host, error = %e, "no route");
            return proxy_error(e).into_response();
        }
    };

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let forward = ForwardRequest {
        method,
        path_and_query,
        headers,
        body,
        client_ip: Some(client.ip()),
    };

    match state.dispatcher.forward(forward, &backend).await {
        Ok(resp) => {
            let (status, headers, stream) = resp.into_parts();
            (status, headers, Body::from_stream(stream)).into_response()
        }
        Err(e) => proxy_error(e).into_response(),
    }
}
