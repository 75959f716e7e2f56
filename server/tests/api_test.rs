//! HTTP contract tests.
//!
//! Boot the full router on an ephemeral port and drive it with a real
//! client, checking the status codes and shapes the on-device sync
//! engine depends on.

use roadbook_server::clock::SystemClock;
use roadbook_server::config::Config;
use roadbook_server::kv::MemoryKv;
use roadbook_server::{build_router, AppState};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn_server(config: Config) -> String {
    let clock = Arc::new(SystemClock);
    let kv = Arc::new(MemoryKv::new(clock.clone()));
    let state = AppState::new(kv, clock, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_open_server() -> String {
    spawn_server(Config::default()).await
}

#[tokio::test]
async fn record_crud_contract() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    // Create: 201 with the stored record echoed back.
    let response = client
        .post(format!("{base}/api/trip"))
        .json(&json!({"date": "2024-02-01", "totalEarnings": 80.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["recordType"], "trip");
    assert_eq!(created["userId"], "anonymous");

    // List: one active record.
    let listed: Value = client
        .get(format!("{base}/api/trip"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Update: 200, earnings replaced.
    let response = client
        .put(format!("{base}/api/trip/{id}"))
        .json(&json!({"date": "2024-02-01", "totalEarnings": 95.5}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["totalEarnings"], 95.5);

    // Delete: 204, and the collection empties.
    let response = client
        .delete(format!("{base}/api/trip/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let listed: Value = client
        .get(format!("{base}/api/trip"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn trash_flow_over_http() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/api/expense"))
        .json(&json!({"date": "2024-02-01", "category": "fuel", "amount": 42.0}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    client
        .delete(format!("{base}/api/expense/{id}"))
        .send()
        .await
        .unwrap();

    // The tombstone shows up in the merged trash listing.
    let trash: Value = client
        .get(format!("{base}/api/trash"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = trash.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert_eq!(entries[0]["recordType"], "expense");

    // Restore without a type hint: the services are probed.
    let response = client
        .post(format!("{base}/api/trash/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let restored: Value = response.json().await.unwrap();
    assert_eq!(restored["amount"], 42.0);

    // Purge requires the type parameter.
    let response = client
        .delete(format!("{base}/api/trash/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delta_listing_reports_deletions() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/api/trip"))
        .json(&json!({"date": "2024-02-01"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    let since = created["createdAt"].as_u64().unwrap() - 1;

    client
        .delete(format!("{base}/api/trip/{id}"))
        .send()
        .await
        .unwrap();

    let delta: Value = client
        .get(format!("{base}/api/trip?since={since}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = delta.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["deleted"], true);
    assert_eq!(entries[0]["backup"]["id"], id.as_str());
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    // Unknown collection name.
    let response = client
        .get(format!("{base}/api/receipts"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unparseable watermark.
    let response = client
        .get(format!("{base}/api/trip?since=yesterday"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("since"));

    // Update of a record that does not exist.
    let response = client
        .put(format!("{base}/api/trip/ghost"))
        .json(&json!({"date": "2024-02-01"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Restore of a record that was never deleted.
    let response = client
        .post(format!("{base}/api/trash/ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mileage_write_against_deleted_trip_is_a_conflict() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/api/trip"))
        .json(&json!({"date": "2024-02-01"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let trip_id = created["id"].as_str().unwrap().to_string();

    client
        .delete(format!("{base}/api/trip/{trip_id}"))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{base}/api/mileage"))
        .json(&json!({
            "date": "2024-02-01",
            "tripId": trip_id,
            "startOdometer": 100.0,
            "endOdometer": 150.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("linked trip is missing or deleted"));
    assert!(message.contains(&trip_id));
}

#[tokio::test]
async fn bearer_tokens_scope_records_per_user() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/trip"))
        .bearer_auth("driver-a")
        .json(&json!({"date": "2024-02-01"}))
        .send()
        .await
        .unwrap();

    let other: Value = client
        .get(format!("{base}/api/trip"))
        .bearer_auth("driver-b")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(other.as_array().unwrap().is_empty());

    let own: Value = client
        .get(format!("{base}/api/trip"))
        .bearer_auth("driver-a")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(own.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_credentials_are_rejected_when_auth_is_configured() {
    let base = spawn_server(Config {
        auth_secret: Some("secret".to_string()),
        ..Config::default()
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/api/trip"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{base}/api/trip"))
        .bearer_auth("driver-a")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoints_respond() {
    let base = spawn_open_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["storage"], "ok");

    let root = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(root.status(), StatusCode::OK);
}
