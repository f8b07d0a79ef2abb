use std::time::Duration;

use serde_json::json;

use peerhub_core::{Backend, DistPolicy};

use crate::*;

fn vhost(name: String, ports: &[u16], policy: DistPolicy) -> VirtualHostConfig {
    VirtualHostConfig {
        name,
        backends: ports.iter().map(|&p| Backend::new("127.0.0.1", p)).collect(),
        policy,
    }
}

/// Round-robin alternates requests across two independent backends.
#[tokio::test]
async fn test_proxy_round_robin_across_backends() -> Result<()> {
    let one = spawn_backend(false).await?;
    let two = spawn_backend(false).await?;
    let ports = [one.port, two.port];
    let proxy = spawn_proxy(|port| {
        vec![vhost(format!("127.0.0.1:{port}"), &ports, DistPolicy::RoundRobin)]
    })
    .await?;

    for peer_port in 9001..=9004 {
        let reply = post(
            &proxy,
            "/submit-info",
            json!({"ip": "127.0.0.1", "port": peer_port}),
            None,
        )
        .await?;
        assert_eq!(reply.status, StatusCode::OK, "body: {}", reply.body);
    }

    let on = |b: &TestBackend| -> Vec<u16> { b.state.router.peers().iter().map(|p| p.port()).collect() };
    assert_eq!(on(&one), vec![9001, 9003]);
    assert_eq!(on(&two), vec![9002, 9004]);
    Ok(())
}

/// Login cookies and 401s pass through the proxy untouched.
#[tokio::test]
async fn test_proxy_relays_cookies_and_errors() -> Result<()> {
    let node = spawn_backend(true).await?;
    let proxy = spawn_proxy(|port| {
        vec![vhost(format!("127.0.0.1:{port}"), &[node.port], DistPolicy::Random)]
    })
    .await?;

    let denied = get(&proxy, "/get-total-peer", None).await?;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

    let cookie = login(&proxy).await?;
    let who = get(&proxy, "/whoami", Some(&cookie)).await?;
    assert_eq!(who.status, StatusCode::OK);
    assert_eq!(who.body["username"], USER);
    Ok(())
}

/// Unknown host, empty pool, and dead backend each fail once, without retry.
#[tokio::test]
async fn test_proxy_failures() -> Result<()> {
    let unrouted = spawn_proxy(|_| vec![vhost("elsewhere.test".into(), &[1], DistPolicy::RoundRobin)]).await?;
    let reply = get(&unrouted, "/status", None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let empty = spawn_proxy(|port| vec![vhost(format!("127.0.0.1:{port}"), &[], DistPolicy::RoundRobin)]).await?;
    let reply = get(&empty, "/status", None).await?;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);

    let closed = TcpListener::bind("127.0.0.1:0").await?;
    let dead_port = closed.local_addr()?.port();
    drop(closed);
    let live = spawn_backend(false).await?;
    let mixed = spawn_proxy(|port| {
        vec![vhost(
            format!("127.0.0.1:{port}"),
            &[dead_port, live.port],
            DistPolicy::RoundRobin,
        )]
    })
    .await?;

    // First pick is the dead backend: reported as 502, not retried on the live one.
    let reply = get(&mixed, "/status", None).await?;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    let reply = get(&mixed, "/status", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["peers"], 0);
    Ok(())
}

/// A live event stream opened through the proxy delivers pushes as they happen.
#[tokio::test]
async fn test_proxy_relays_event_stream() -> Result<()> {
    let node = spawn_backend(false).await?;
    let proxy = spawn_proxy(|port| {
        vec![vhost(format!("127.0.0.1:{port}"), &[node.port], DistPolicy::RoundRobin)]
    })
    .await?;

    let a = register(&proxy, 9001, None).await?;
    let b = register(&proxy, 9002, None).await?;
    connect(&proxy, &a, &b, None).await?;

    let mut stream = tokio::time::timeout(
        Duration::from_secs(5),
        client().get(format!("{proxy}/events/{b}")).send(),
    )
    .await
    .context("proxy held back the event stream head")??;
    assert_eq!(stream.status(), StatusCode::OK);
    let content_type = stream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "got {content_type:?}");

    let reply = post(
        &proxy,
        "/send-peer",
        json!({"from": a, "to": b, "message": "through the proxy"}),
        None,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);

    let mut received = String::new();
    while !received.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .context("no event through the proxy within 5s")??
            .context("event stream closed")?;
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: message"), "got {received:?}");
    assert!(received.contains("\"content\":\"through the proxy\""), "got {received:?}");
    Ok(())
}
