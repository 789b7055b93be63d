//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use offline_sync::{
    api::create_router,
    clock::ManualClock,
    persistence::MemoryStore,
    queue::SyncOperation,
    transport::{Transport, TransportError},
    AppState, Collaborators, Config, OfflineManager,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

#[derive(Default)]
struct RecordingTransport {
    executed: AtomicUsize,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, _operation: &SyncOperation) -> Result<(), TransportError> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Value, TransportError> {
        match key {
            "/api/suppliers" => Ok(json!([{"id": 1, "name": "Acme"}])),
            _ => Err(TransportError::Status { status: 404 }),
        }
    }
}

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    transport: Arc<RecordingTransport>,
}

async fn create_test_app_with(config: Config) -> TestApp {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let transport = Arc::new(RecordingTransport::default());
    let collaborators = Collaborators::new(Arc::new(MemoryStore::new()), transport.clone())
        .with_clock(clock.clone());
    let manager = OfflineManager::open(&config, collaborators, false).await;

    TestApp {
        router: create_router(AppState::new(manager)),
        clock,
        transport,
    }
}

async fn create_test_app() -> TestApp {
    create_test_app_with(Config::default()).await
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_put_cache_endpoint_success() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/cache")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"key":"suppliers","value":[{"id":1}],"priority":"high"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "suppliers");
    assert_eq!(json["priority"], "high");
    assert_eq!(json["size_bytes"], 10);
    assert_eq!(json["evicted"], json!([]));
}

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let app = create_test_app().await;
    let value = json!({"name": "Acme", "tags": ["a", "b"]});

    let (status, _) = send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "supplier-1", "value": value})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app.router, "GET", "/cache/supplier-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], value);
}

#[tokio::test]
async fn test_percent_encoded_key() {
    let app = create_test_app().await;

    send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "/api/items", "value": 1})),
    )
    .await;

    let (status, json) = send(&app.router, "GET", "/cache/%2Fapi%2Fitems", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "/api/items");
}

#[tokio::test]
async fn test_get_expired_entry_returns_not_found() {
    let app = create_test_app().await;

    send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "short", "value": "v", "ttl": 5})),
    )
    .await;
    app.clock.advance(Duration::from_secs(5));

    let (status, json) = send(&app.router, "GET", "/cache/short", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("short"));

    let (_, json) = send(&app.router, "GET", "/cache/short/exists", None).await;
    assert_eq!(json["exists"], false);
}

#[tokio::test]
async fn test_put_oversized_entry_rejected() {
    let config = Config {
        cache_capacity_bytes: 16,
        ..Config::default()
    };
    let app = create_test_app_with(config).await;

    let (status, json) = send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "big", "value": "x".repeat(64)})),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].as_str().unwrap().contains("big"));
}

#[tokio::test]
async fn test_put_reports_evictions() {
    let config = Config {
        cache_capacity_bytes: 30,
        ..Config::default()
    };
    let app = create_test_app_with(config).await;

    // "aaaaaaaaaaaaaaaaaa" serializes to 20 bytes
    let filler = "a".repeat(18);
    send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "low", "value": filler, "priority": "low"})),
    )
    .await;
    app.clock.advance(Duration::from_millis(10));

    let (status, json) = send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "critical", "value": filler, "priority": "critical"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["evicted"], json!(["low"]));
}

#[tokio::test]
async fn test_put_empty_key_rejected() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "", "value": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_and_clear_cache() {
    let app = create_test_app().await;
    for key in ["a", "b", "c"] {
        send(
            &app.router,
            "PUT",
            "/cache",
            Some(json!({"key": key, "value": key})),
        )
        .await;
    }

    let (status, _) = send(&app.router, "DELETE", "/cache/a", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, "DELETE", "/cache/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app.router, "DELETE", "/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 2);

    let (_, json) = send(&app.router, "GET", "/status", None).await;
    assert_eq!(json["cache_entry_count"], 0);
    assert_eq!(json["cache_size_bytes"], 0);
}

#[tokio::test]
async fn test_clear_cache_by_pattern() {
    let app = create_test_app().await;
    for key in ["/api/items/1", "/api/items/2", "/api/users/1"] {
        send(
            &app.router,
            "PUT",
            "/cache",
            Some(json!({"key": key, "value": 1})),
        )
        .await;
    }

    let (status, json) = send(&app.router, "DELETE", "/cache?pattern=%5E%2Fapi%2Fitems%2F", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 2);

    let (status, _) = send(&app.router, "GET", "/cache/%2Fapi%2Fusers%2F1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app.router, "DELETE", "/cache?pattern=%28", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("invalid pattern"));

    let (_, json) = send(&app.router, "GET", "/status", None).await;
    assert_eq!(json["cache_entry_count"], 1);
}

// == Queue Endpoint Tests ==

#[tokio::test]
async fn test_enqueue_offline_then_drain_online() {
    let app = create_test_app().await;

    for resource in ["/api/orders", "/api/orders/2"] {
        let (status, json) = send(
            &app.router,
            "POST",
            "/queue",
            Some(json!({"method": "POST", "resource": resource, "payload": {"qty": 1}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["id"].as_str().is_some());
    }

    let (_, json) = send(&app.router, "GET", "/queue", None).await;
    assert_eq!(json["length"], 2);
    assert_eq!(json["operations"][0]["target"]["resource"], "/api/orders");

    // Drain while offline does nothing
    let (_, json) = send(&app.router, "POST", "/queue/drain", None).await;
    assert_eq!(json["skipped"], true);
    assert_eq!(app.transport.executed.load(Ordering::SeqCst), 0);

    let (status, json) = send(
        &app.router,
        "POST",
        "/connectivity",
        Some(json!({"online": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["changed"], true);

    let (_, json) = send(&app.router, "POST", "/queue/drain", None).await;
    assert_eq!(json["succeeded"], 2);
    assert_eq!(app.transport.executed.load(Ordering::SeqCst), 2);

    let (_, json) = send(&app.router, "GET", "/status", None).await;
    assert_eq!(json["queue_length"], 0);
    assert!(json["last_drain_at"].is_string());
}

#[tokio::test]
async fn test_enqueue_invalid_method_rejected() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/queue",
        Some(json!({"method": "GET", "resource": "/api/orders"})),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_clear_queue() {
    let app = create_test_app().await;
    send(
        &app.router,
        "POST",
        "/queue",
        Some(json!({"method": "DELETE", "resource": "/api/orders/1"})),
    )
    .await;

    let (status, json) = send(&app.router, "DELETE", "/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 1);

    let (_, json) = send(&app.router, "GET", "/queue", None).await;
    assert_eq!(json["length"], 0);
}

// == Connectivity & Prefetch Endpoint Tests ==

#[tokio::test]
async fn test_connectivity_report_without_state_rejected() {
    let app = create_test_app().await;

    let (status, _) = send(&app.router, "POST", "/connectivity", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prefetch_endpoint() {
    let app = create_test_app().await;

    let (_, json) = send(
        &app.router,
        "POST",
        "/prefetch",
        Some(json!({"keys": ["/api/suppliers"]})),
    )
    .await;
    assert_eq!(json["skipped_offline"], true);

    send(
        &app.router,
        "POST",
        "/connectivity",
        Some(json!({"quality": "good"})),
    )
    .await;

    let (status, json) = send(
        &app.router,
        "POST",
        "/prefetch",
        Some(json!({"keys": ["/api/suppliers", "/api/unknown"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["fetched"], json!(["/api/suppliers"]));
    assert_eq!(json["failed"], json!(["/api/unknown"]));

    let (status, json) = send(&app.router, "GET", "/cache/%2Fapi%2Fsuppliers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"][0]["name"], "Acme");
}

// == Health & Status Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_status_tracks_hits_and_misses() {
    let app = create_test_app().await;
    send(
        &app.router,
        "PUT",
        "/cache",
        Some(json!({"key": "k", "value": 1})),
    )
    .await;
    send(&app.router, "GET", "/cache/k", None).await;
    send(&app.router, "GET", "/cache/missing", None).await;

    let (_, json) = send(&app.router, "GET", "/status", None).await;
    assert_eq!(json["is_online"], false);
    assert_eq!(json["quality"], "offline");
    assert_eq!(json["cache_stats"]["hits"], 1);
    assert_eq!(json["cache_stats"]["misses"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}
