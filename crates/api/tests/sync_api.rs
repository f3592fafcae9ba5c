//! Integration tests for publishing and listing sync items.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{body_json, get, post_json, register_device};
use serde_json::json;
use synchub_db::Store;
use uuid::Uuid;

fn parse_ts(value: &serde_json::Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

// ---------------------------------------------------------------------------
// Test: clipboard publish persists a pending item with default expiry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_clipboard_returns_created_item() {
    let hub = common::build_test_hub().await;
    let d1 = register_device(&hub.app, "t-u1", "Laptop").await;
    let d2 = register_device(&hub.app, "t-u1", "Phone").await;

    let response = post_json(
        &hub.app,
        "/api/v1/sync/clipboard",
        "t-u1",
        json!({ "content": "hello", "source_device": d1, "target_devices": [d2, d2] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let item = body_json(response).await;
    assert_eq!(item["type"], "clipboard");
    assert_eq!(item["user_id"], "u1");
    assert_eq!(item["content"]["text"], "hello");
    assert_eq!(item["source_device"], d1.to_string());
    assert_eq!(item["target_devices"], json!([d2]));
    // No session is open, so nothing was delivered.
    assert_eq!(item["status"], "pending");

    let lifetime = parse_ts(&item["expires_at"]) - parse_ts(&item["created_at"]);
    assert_eq!(lifetime, chrono::Duration::hours(24));
}

// ---------------------------------------------------------------------------
// Test: notification publish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_notification_returns_created_item() {
    let hub = common::build_test_hub().await;

    let response = post_json(
        &hub.app,
        "/api/v1/sync/notification",
        "t-u1",
        json!({ "title": "Build done", "body": "All green", "icon": "ok.png" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let item = body_json(response).await;
    assert_eq!(item["type"], "notification");
    assert_eq!(item["content"]["title"], "Build done");
    assert_eq!(item["content"]["body"], "All green");
    assert_eq!(item["content"]["icon"], "ok.png");
    assert_eq!(item["source_device"], serde_json::Value::Null);
    assert_eq!(item["target_devices"], json!([]));
}

#[tokio::test]
async fn notification_without_title_returns_400() {
    let hub = common::build_test_hub().await;

    let response = post_json(
        &hub.app,
        "/api/v1/sync/notification",
        "t-u1",
        json!({ "title": "", "body": "x" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: device references must belong to the caller
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_source_or_target_returns_404() {
    let hub = common::build_test_hub().await;
    let foreign = register_device(&hub.app, "t-u2", "Other").await;
    let own = register_device(&hub.app, "t-u1", "Mine").await;

    let response = post_json(
        &hub.app,
        "/api/v1/sync/clipboard",
        "t-u1",
        json!({ "content": "x", "source_device": foreign }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        &hub.app,
        "/api/v1/sync/clipboard",
        "t-u1",
        json!({ "content": "x", "source_device": own, "target_devices": [Uuid::new_v4()] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Nothing was persisted.
    assert!(hub.store.list_sync_items("u1", 100).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: listing is per user, newest first, and honors the limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_items_is_scoped_and_limited() {
    let hub = common::build_test_hub().await;

    for text in ["one", "two", "three"] {
        let response = post_json(
            &hub.app,
            "/api/v1/sync/clipboard",
            "t-u1",
            json!({ "content": text }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    post_json(&hub.app, "/api/v1/sync/clipboard", "t-u2", json!({ "content": "theirs" })).await;

    let all = body_json(get(&hub.app, "/api/v1/sync/items", Some("t-u1")).await).await;
    let texts: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["content"]["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["three", "two", "one"]);

    let limited = body_json(get(&hub.app, "/api/v1/sync/items?limit=2", Some("t-u1")).await).await;
    assert_eq!(limited.as_array().unwrap().len(), 2);

    // Out-of-range limits are clamped rather than rejected.
    let response = get(&hub.app, "/api/v1/sync/items?limit=0", Some("t-u1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: single item lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_item_is_owner_only() {
    let hub = common::build_test_hub().await;
    let item = body_json(
        post_json(&hub.app, "/api/v1/sync/clipboard", "t-u1", json!({ "content": "x" })).await,
    )
    .await;
    let uri = format!("/api/v1/sync/items/{}", item["id"].as_str().unwrap());

    let response = get(&hub.app, &uri, Some("t-u1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], item["id"]);

    assert_eq!(get(&hub.app, &uri, Some("t-u2")).await.status(), StatusCode::NOT_FOUND);
    let unknown = format!("/api/v1/sync/items/{}", Uuid::new_v4());
    assert_eq!(get(&hub.app, &unknown, Some("t-u1")).await.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: file-ref publishing is reserved
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_file_returns_501() {
    let hub = common::build_test_hub().await;

    let response = post_json(&hub.app, "/api/v1/sync/files", "t-u1", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body_json(response).await["code"], "NOT_IMPLEMENTED");
}
