use serde_json::json;

use crate::*;

/// Register, connect, list, disconnect, and remove over HTTP.
#[tokio::test]
async fn test_peer_graph_lifecycle() -> Result<()> {
    let node = spawn_backend(false).await?;
    let a = register(&node.base, 9001, None).await?;
    let b = register(&node.base, 9002, None).await?;
    let c = register(&node.base, 9003, None).await?;

    // Re-registering is harmless.
    let again = post(
        &node.base,
        "/submit-info",
        json!({"ip": "127.0.0.1", "port": "9001"}),
        None,
    )
    .await?;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["registered"], false);

    let total = get(&node.base, "/get-total-peer", None).await?;
    assert_eq!(total.body["peers"], json!([a, b, c]));

    assert_eq!(connect(&node.base, &a, &b, None).await?.status, StatusCode::OK);
    let add = post(&node.base, "/add-list", json!({"peerA": a, "peerB": c}), None).await?;
    assert_eq!(add.status, StatusCode::OK);

    // Connection is symmetric.
    let list = post(&node.base, "/get-list", json!({"peer": b}), None).await?;
    assert_eq!(list.body["neighbors"], json!([a]));
    let list = post(&node.base, "/get-list", json!({"peer": a}), None).await?;
    assert_eq!(list.body["neighbors"], json!([b, c]));

    let edges = get(&node.base, "/get-connected", None).await?;
    assert_eq!(edges.body["connections"].as_array().map(Vec::len), Some(2));

    let off = post(
        &node.base,
        "/disconnect-peer",
        json!({"peerA": c, "peerB": a}),
        None,
    )
    .await?;
    assert_eq!(off.body["disconnected"], true);
    let list = post(&node.base, "/get-list", json!({"peer": a}), None).await?;
    assert_eq!(list.body["neighbors"], json!([b]));

    let removed = post(&node.base, "/remove-peer", json!({"peer": a}), None).await?;
    assert_eq!(removed.body["removed"], true);
    let list = post(&node.base, "/get-list", json!({"peer": b}), None).await?;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["neighbors"], json!([]));
    let list = post(&node.base, "/get-list", json!({"peer": a}), None).await?;
    assert_eq!(list.status, StatusCode::NOT_FOUND);

    let removed = post(&node.base, "/remove-peer", json!({"peer": a}), None).await?;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["removed"], false);
    Ok(())
}

/// Bad input and graph conflicts map to the documented statuses.
#[tokio::test]
async fn test_peer_errors() -> Result<()> {
    let node = spawn_backend(false).await?;
    let a = register(&node.base, 9001, None).await?;

    let bad = post(
        &node.base,
        "/submit-info",
        json!({"ip": "127.0.0.1", "port": 70000}),
        None,
    )
    .await?;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let unknown = connect(&node.base, &a, "127.0.0.1:9999", None).await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let selfie = connect(&node.base, &a, &a, None).await?;
    assert_eq!(selfie.status, StatusCode::BAD_REQUEST);

    let garbage = post(&node.base, "/get-list", json!({"peer": "not-a-peer"}), None).await?;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);

    let status = get(&node.base, "/status", None).await?;
    assert_eq!(status.body["peers"], 1);
    assert_eq!(status.body["connections"], 0);
    Ok(())
}
