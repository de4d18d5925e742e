//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use community_sync::{
    api::create_router, clock::ManualClock, config::Config, sync::MemoryBackend, AppState,
    SyncCoordinator,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

struct TestApp {
    router: Router,
    backend: Arc<MemoryBackend>,
    clock: ManualClock,
}

fn create_test_app(online: bool) -> TestApp {
    let config = Config {
        start_online: online,
        ..Config::default()
    };
    let backend = Arc::new(MemoryBackend::new());
    let clock = ManualClock::new(0);
    let coordinator =
        SyncCoordinator::init_with_clock(&config, backend.clone(), Arc::new(clock.clone()));

    TestApp {
        router: create_router(AppState::new(coordinator)),
        backend,
        clock,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// == Document Endpoint Tests ==

#[tokio::test]
async fn test_put_then_get_reads_stamped_document() {
    let app = create_test_app(true);

    let (status, json) = send(
        &app.router,
        "PUT",
        "/cache/posts/p1",
        Some(json!({"payload": {"title": "Rice"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "applied");

    let (status, json) = send(&app.router, "GET", "/cache/posts/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"]["title"], "Rice");
    assert!(json["value"].get("updatedAt").is_some());
}

#[tokio::test]
async fn test_get_served_from_cache_until_ttl() {
    let app = create_test_app(true);
    app.backend.insert("posts", "p1", json!({"n": 1})).await;

    send(&app.router, "GET", "/cache/posts/p1", None).await;
    send(&app.router, "GET", "/cache/posts/p1", None).await;
    assert_eq!(app.backend.read_count(), 1);

    app.clock.advance(2 * 60 * 1000);
    send(&app.router, "GET", "/cache/posts/p1", None).await;
    assert_eq!(app.backend.read_count(), 2);

    let (_, stats) = send(&app.router, "GET", "/stats", None).await;
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["expirations"], 1);
}

#[tokio::test]
async fn test_get_not_found() {
    let app = create_test_app(true);

    let (status, json) = send(&app.router, "GET", "/cache/posts/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_get_offline_miss_is_unavailable() {
    let app = create_test_app(false);

    let (status, json) = send(&app.router, "GET", "/cache/users/u1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("users/u1"));
}

#[tokio::test]
async fn test_update_missing_document() {
    let app = create_test_app(true);

    let (status, _) = send(
        &app.router,
        "PUT",
        "/cache/users/ghost",
        Some(json!({"payload": {"bio": "hi"}, "mode": "update"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_id_rejected() {
    let app = create_test_app(true);
    let uri = format!("/cache/posts/{}", "x".repeat(300));

    let (status, json) = send(&app.router, "PUT", &uri, Some(json!({"payload": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_invalidate_endpoint() {
    let app = create_test_app(true);
    app.backend.insert("users", "u1", json!({"name": "Ana"})).await;
    send(&app.router, "GET", "/cache/users/u1", None).await;

    let (status, json) = send(&app.router, "POST", "/cache/users/u1/invalidate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["invalidated"], true);

    send(&app.router, "GET", "/cache/users/u1", None).await;
    assert_eq!(app.backend.read_count(), 2);
}

// == Offline Queue Tests ==

#[tokio::test]
async fn test_offline_writes_replay_on_reconnect() {
    let app = create_test_app(false);

    let (status, json) = send(
        &app.router,
        "PUT",
        "/cache/posts/a",
        Some(json!({"payload": {"title": "A"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "queued");
    assert_eq!(json["pending"], 1);

    let (_, json) = send(&app.router, "DELETE", "/cache/posts/b", None).await;
    assert_eq!(json["pending"], 2);

    let (_, pending) = send(&app.router, "GET", "/sync/pending?limit=1", None).await;
    assert_eq!(pending["count"], 2);
    assert_eq!(pending["actions"].as_array().unwrap().len(), 1);
    assert_eq!(pending["actions"][0]["mutation"]["type"], "create");

    let (_, pending) = send(&app.router, "GET", "/sync/pending?partition=posts&limit=5", None).await;
    assert_eq!(pending["count"], 2);
    assert_eq!(pending["actions"][1]["id"], "b");

    let (_, pending) = send(&app.router, "GET", "/sync/pending?partition=users", None).await;
    assert_eq!(pending["count"], 0);
    assert!(pending["actions"].as_array().unwrap().is_empty());

    let (status, json) = send(
        &app.router,
        "POST",
        "/sync/connectivity",
        Some(json!({"online": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "connected");
    assert_eq!(json["pending"], 0);
    assert_eq!(json["report"]["succeeded"].as_array().unwrap().len(), 2);

    assert!(app.backend.document("posts", "a").await.is_some());
}

#[tokio::test]
async fn test_sync_now_reports_failures() {
    let app = create_test_app(false);
    app.backend.set_unavailable(true);

    send(&app.router, "DELETE", "/cache/posts/a", None).await;
    let (_, json) = send(
        &app.router,
        "POST",
        "/sync/connectivity",
        Some(json!({"online": true})),
    )
    .await;
    assert_eq!(json["pending"], 1);
    assert_eq!(json["report"]["failed"][0]["retry_count"], 1);

    app.backend.set_unavailable(false);
    let (status, json) = send(&app.router, "POST", "/sync/now", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pending"], 0);
}

#[tokio::test]
async fn test_sync_now_offline_is_unavailable() {
    let app = create_test_app(false);

    let (status, _) = send(&app.router, "POST", "/sync/now", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// == Stats & Health Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app(true);

    let (status, json) = send(&app.router, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 0);
    assert_eq!(json["pending"], 0);
    assert_eq!(json["online"], true);
    assert_eq!(json["phase"], "connected");
    assert!(json.get("hit_rate").is_some());
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(true);

    let (status, json) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Live Server ==

#[tokio::test]
async fn test_live_server_round_trip() {
    let app = create_test_app(true);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app.router).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let response = client
        .put(format!("{}/cache/forum/t1", base))
        .json(&json!({"payload": {"title": "Harvest tips"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = client
        .get(format!("{}/cache/forum/t1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["value"]["title"], "Harvest tips");

    server.abort();
}
