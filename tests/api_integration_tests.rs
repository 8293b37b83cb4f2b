//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hoard::hoard::{ImmediateProtector, MAX_KEY_LENGTH};
use hoard::{api::create_router, AppState, HoardContext, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_app(config: ServerConfig) -> Router {
    let state = AppState::new(HoardContext::in_memory(), config)
        .with_protector(Arc::new(ImmediateProtector));
    create_router(state)
}

fn create_test_app() -> Router {
    create_app(ServerConfig::default())
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
    (status, body_to_json(response.into_body()).await)
}

async fn seed(app: &Router, namespace: &str, values: Value) {
    let (status, _) = send(
        app,
        "PUT",
        &format!("/hoards/{}/records", namespace),
        Some(json!({ "values": values })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// == PUT Records Tests ==

#[tokio::test]
async fn test_put_records_success() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/hoards/users/records",
        Some(json!({"values": [{"id": "a", "foo": "bar"}, {"id": "b", "foo": "quux"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored"], 2);
    assert!(json["message"].as_str().unwrap().contains("users"));
}

#[tokio::test]
async fn test_put_records_custom_key_field() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/hoards/users/records",
        Some(json!({"key_field": "email", "values": [{"email": "x@y.z", "n": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/hoards/users/records/x@y.z", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"]["n"], 1);
}

#[tokio::test]
async fn test_put_records_missing_key_field_writes_nothing() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/hoards/users/records",
        Some(json!({"values": [{"id": "a"}, {"name": "no id"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("id"));

    let (status, _) = send(&app, "GET", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_records_key_too_long_writes_nothing() {
    let app = create_test_app();
    let long = "k".repeat(MAX_KEY_LENGTH + 1);

    let (status, json) = send(
        &app,
        "PUT",
        "/hoards/users/records",
        Some(json!({"values": [{"id": "a"}, {"id": long}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("maximum length"));

    let (status, _) = send(&app, "GET", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == GET Records Tests ==

#[tokio::test]
async fn test_get_records_in_requested_order() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}, {"id": "b"}, {"id": "c"}])).await;

    let (status, json) = send(&app, "GET", "/hoards/users/records?keys=c,a,missing", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["namespace"], "users");
    assert_eq!(json["values"], json!([{"id": "c"}, {"id": "a"}]));
}

#[tokio::test]
async fn test_get_records_without_keys_is_empty() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}])).await;

    let (status, json) = send(&app, "GET", "/hoards/users/records", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["values"], json!([]));
}

#[tokio::test]
async fn test_lookup_reads_keys_with_commas() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a,b", "n": 1}, {"id": "c", "n": 2}])).await;

    let (status, json) = send(
        &app,
        "POST",
        "/hoards/users/lookup",
        Some(json!({"keys": ["c", "a,b", "missing"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["values"], json!([{"id": "c", "n": 2}, {"id": "a,b", "n": 1}]));

    let (_, json) = send(&app, "GET", "/hoards/users/records?keys=a,b", None).await;
    assert_eq!(json["values"], json!([]));
}

// == Single Record Tests ==

#[tokio::test]
async fn test_put_and_get_single_record() {
    let app = create_test_app();

    let (status, _) = send(&app, "PUT", "/hoards/users/records/k1", Some(json!("hello"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/hoards/users/records/k1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "k1");
    assert_eq!(json["value"], "hello");
}

#[tokio::test]
async fn test_get_record_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/hoards/users/records/nonexistent", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_get_record_key_too_long() {
    let app = create_test_app();
    let uri = format!("/hoards/users/records/{}", "k".repeat(MAX_KEY_LENGTH + 1));

    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == DELETE Tests ==

#[tokio::test]
async fn test_delete_record_success() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}])).await;

    let (status, json) = send(&app, "DELETE", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "a");

    let (status, _) = send(&app, "GET", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_record_not_found() {
    let app = create_test_app();

    let (status, _) = send(&app, "DELETE", "/hoards/users/records/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_namespace_leaves_others() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}])).await;
    seed(&app, "orders", json!([{"id": "a"}])).await;

    let (status, json) = send(&app, "DELETE", "/hoards/users/records", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("users"));

    let (status, _) = send(&app, "GET", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/hoards/orders/records/a", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == Excludes and Latest Tests ==

#[tokio::test]
async fn test_excludes_endpoint() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}, {"id": "b"}])).await;

    let (status, json) = send(
        &app,
        "POST",
        "/hoards/users/excludes",
        Some(json!({"keys": ["a", "c", "b", "d"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["missing"], json!(["c", "d"]));
}

#[tokio::test]
async fn test_latest_endpoint() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}])).await;
    sleep(Duration::from_millis(5));
    seed(&app, "users", json!([{"id": "b"}])).await;
    sleep(Duration::from_millis(5));
    seed(&app, "users", json!([{"id": "c"}])).await;

    let (status, json) = send(&app, "GET", "/hoards/users/latest?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["values"], json!([{"id": "c"}, {"id": "b"}]));

    let (_, json) = send(&app, "GET", "/hoards/users/latest", None).await;
    assert_eq!(json["values"].as_array().unwrap().len(), 3);
}

// == Capacity and TTL via API Tests ==

#[tokio::test]
async fn test_max_records_via_api() {
    let app = create_app(ServerConfig {
        max_records: Some(2),
        ..ServerConfig::default()
    });
    seed(&app, "users", json!([{"id": "a"}])).await;
    sleep(Duration::from_millis(5));
    seed(&app, "users", json!([{"id": "b"}])).await;
    sleep(Duration::from_millis(5));
    seed(&app, "users", json!([{"id": "c"}])).await;

    let (_, json) = send(&app, "GET", "/hoards/users/records?keys=a,b,c", None).await;
    assert_eq!(json["values"], json!([{"id": "b"}, {"id": "c"}]));

    let (_, json) = send(&app, "GET", "/hoards/users/stats", None).await;
    assert_eq!(json["evictions"], 1);
    assert_eq!(json["total_records"], 2);
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_app(ServerConfig {
        ttl_ms: Some(50),
        ..ServerConfig::default()
    });
    seed(&app, "users", json!([{"id": "a"}])).await;

    let (status, _) = send(&app, "GET", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::OK);

    sleep(Duration::from_millis(120));

    let (status, _) = send(&app, "GET", "/hoards/users/records/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&app, "GET", "/hoards/users/stats", None).await;
    assert_eq!(json["expirations"], 1);
}

// == VERSION Endpoint Tests ==

#[tokio::test]
async fn test_version_endpoint_unversioned() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/hoards/users/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["namespace"], "users");
    assert_eq!(json["version"], "");
}

#[tokio::test]
async fn test_version_endpoint_configured() {
    let app = create_app(ServerConfig {
        version: Some("3".to_string()),
        ..ServerConfig::default()
    });

    let (_, json) = send(&app, "GET", "/hoards/users/version", None).await;
    assert_eq!(json["version"], "3");
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();
    seed(&app, "users", json!([{"id": "a"}])).await;

    send(&app, "GET", "/hoards/users/records/a", None).await;
    send(&app, "GET", "/hoards/users/records/ghost", None).await;

    let (status, json) = send(&app, "GET", "/hoards/users/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_records"], 1);
    assert_eq!(json["fallback"], false);
    assert!((json["hit_rate"].as_f64().unwrap() - 0.5).abs() < 0.001);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/hoards/users/records")
                .header("content-type", "application/json")
                .body(Body::from("not valid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_values_request() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/hoards/users/records", Some(json!({"values": []}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}
