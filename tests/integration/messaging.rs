use std::time::Duration;

use serde_json::json;

use crate::*;

/// Direct send requires an edge; history is shared by both directions.
#[tokio::test]
async fn test_send_and_history() -> Result<()> {
    let node = spawn_backend(false).await?;
    let a = register(&node.base, 9001, None).await?;
    let b = register(&node.base, 9002, None).await?;

    let early = post(
        &node.base,
        "/send-peer",
        json!({"from": a, "to": b, "message": "too soon"}),
        None,
    )
    .await?;
    assert_eq!(early.status, StatusCode::CONFLICT);

    connect(&node.base, &a, &b, None).await?;
    let first = post(
        &node.base,
        "/send-peer",
        json!({"from": a, "to": b, "message": "hello"}),
        None,
    )
    .await?;
    assert_eq!(first.status, StatusCode::OK);
    let first_ts = first.body["timestamp"].as_u64().context("timestamp")?;

    post(
        &node.base,
        "/send-peer",
        json!({"from": b, "to": a, "message": "hi back"}),
        None,
    )
    .await?;

    let history = post(&node.base, "/get-messages", json!({"peerA": b, "peerB": a}), None).await?;
    assert_eq!(history.body["count"], 2);
    assert_eq!(history.body["messages"][0]["content"], "hello");
    assert_eq!(history.body["messages"][0]["sender"], a.as_str());
    assert_eq!(history.body["messages"][1]["content"], "hi back");

    let newer = post(
        &node.base,
        "/get-messages",
        json!({"peerA": a, "peerB": b, "since": first_ts}),
        None,
    )
    .await?;
    assert_eq!(newer.body["count"], 1);
    assert_eq!(newer.body["messages"][0]["content"], "hi back");
    Ok(())
}

/// Broadcast reaches every neighbor at call time and nobody else.
#[tokio::test]
async fn test_broadcast_fan_out() -> Result<()> {
    let node = spawn_backend(false).await?;
    let a = register(&node.base, 9001, None).await?;
    let b = register(&node.base, 9002, None).await?;
    let c = register(&node.base, 9003, None).await?;
    let d = register(&node.base, 9004, None).await?;
    connect(&node.base, &a, &b, None).await?;
    connect(&node.base, &a, &c, None).await?;

    let report = post(
        &node.base,
        "/broadcast-peer",
        json!({"from": a, "message": "all hands"}),
        None,
    )
    .await?;
    assert_eq!(report.status, StatusCode::OK);
    assert_eq!(report.body["delivered"].as_array().map(Vec::len), Some(2));
    assert_eq!(report.body["failed"], json!([]));

    for peer in [&b, &c] {
        let log = post(&node.base, "/get-messages", json!({"peerA": a, "peerB": peer}), None).await?;
        assert_eq!(log.body["messages"][0]["content"], "all hands");
    }
    let log = post(&node.base, "/get-messages", json!({"peerA": a, "peerB": d}), None).await?;
    assert_eq!(log.body["count"], 0);

    let unknown = post(
        &node.base,
        "/broadcast-peer",
        json!({"from": "127.0.0.1:9999", "message": "?"}),
        None,
    )
    .await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    Ok(())
}

/// A listening peer receives direct messages as server-sent events.
#[tokio::test]
async fn test_event_stream_push() -> Result<()> {
    let node = spawn_backend(false).await?;
    let a = register(&node.base, 9001, None).await?;
    let b = register(&node.base, 9002, None).await?;
    connect(&node.base, &a, &b, None).await?;

    let missing = client()
        .get(format!("{}/events/127.0.0.1:9999", node.base))
        .send()
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let mut stream = client()
        .get(format!("{}/events/{b}", node.base))
        .send()
        .await?;
    assert_eq!(stream.status(), StatusCode::OK);
    assert!(node.state.router.delivery().is_listening(&b.parse::<peerhub_core::PeerAddr>()?));

    post(
        &node.base,
        "/send-peer",
        json!({"from": a, "to": b, "message": "live"}),
        None,
    )
    .await?;

    let mut received = String::new();
    while !received.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .context("no event within 5s")??
            .context("event stream closed")?;
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: message"), "got {received:?}");
    assert!(received.contains("\"content\":\"live\""), "got {received:?}");
    Ok(())
}
