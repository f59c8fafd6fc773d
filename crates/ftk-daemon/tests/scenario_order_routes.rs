//! In-process scenario tests for ftk-daemon HTTP endpoints.
//!
//! These tests drive the Axum router via `tower::ServiceExt::oneshot`
//! without binding a TCP socket.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

use ftk_audit::{overrides, read_records, AuditWriter};
use ftk_daemon::{routes, state};
use ftk_notify::CollectingNotifier;
use ftk_order::OrderStatus;
use ftk_store::InMemoryOrderStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn call(
    router: axum::Router,
    req: Request<axum::body::Body>,
) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn post(uri: &str, body: Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

async fn create(router: &axum::Router, id: &str) -> Value {
    let (status, body) = call(router.clone(), post("/v1/orders", json!({ "orderId": id }))).await;
    assert_eq!(status, StatusCode::CREATED);
    parse_json(body)
}

// ---------------------------------------------------------------------------
// Basics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let (status, body) = call(router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "ftk-daemon");
}

#[tokio::test]
async fn transition_table_is_published() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let (status, body) = call(router, get("/v1/transitions")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    let rows = json["transitions"].as_array().unwrap();
    // 5 happy-path rows + CANCEL from each of the 5 non-terminal states.
    assert_eq!(rows.len(), 10);
    assert_eq!(json["terminal"], json!(["DONE", "CANCELLED"]));
}

#[tokio::test]
async fn create_get_and_duplicate() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let created = create(&router, "o1").await;
    assert_eq!(created["status"], "RECEIVED");

    let (status, body) = call(router.clone(), get("/v1/orders/o1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body), created);

    let (status, body) = call(router.clone(), post("/v1/orders", json!({ "orderId": "o1" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["error"]["code"], "ORDER_EXISTS");

    let (status, body) = call(router, get("/v1/orders/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["error"]["code"], "UNKNOWN_ORDER");
}

// ---------------------------------------------------------------------------
// POST /v1/orders/transition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accept_returns_ok_result_with_new_record() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let created = create(&router, "e2e-test-order").await;

    let (status, body) = call(
        router,
        post(
            "/v1/orders/transition",
            json!({ "orderId": "e2e-test-order", "action": "ACCEPT" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["result"]["ok"], true);
    assert_eq!(json["order"]["status"], "ACCEPTED");
    assert!(json["order"]["updatedAtMs"].as_i64().unwrap() > created["updatedAtMs"].as_i64().unwrap());
}

#[tokio::test]
async fn forbidden_status_field_is_422_naming_only_that_field() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    create(&router, "o1").await;

    let (status, body) = call(
        router.clone(),
        post(
            "/v1/orders/transition",
            json!({ "orderId": "o1", "action": "START", "nextKitchenStatus": "preparing" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let err = &parse_json(body)["error"];
    assert_eq!(err["code"], "INVALID_PAYLOAD");
    assert_eq!(
        err["faults"],
        json!([{ "field": "nextKitchenStatus", "kind": "forbidden" }])
    );

    // The record did not move.
    let (_, body) = call(router, get("/v1/orders/o1")).await;
    assert_eq!(parse_json(body)["status"], "RECEIVED");
}

#[tokio::test]
async fn non_json_body_is_invalid_payload() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let req = Request::builder()
        .method("POST")
        .uri("/v1/orders/transition")
        .body(axum::body::Body::from("not json"))
        .unwrap();
    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(parse_json(body)["error"]["faults"][0]["kind"], "not_an_object");
}

#[tokio::test]
async fn invalid_transition_is_409() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    create(&router, "o1").await;

    let (status, body) = call(
        router,
        post("/v1/orders/transition", json!({ "orderId": "o1", "action": "DONE" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let err = &parse_json(body)["error"];
    assert_eq!(err["code"], "INVALID_TRANSITION");
    assert_eq!(err["from"], "RECEIVED");
    assert_eq!(err["action"], "DONE");
}

#[tokio::test]
async fn stale_stamp_conflicts_and_override_is_audited() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.jsonl");
    let store = InMemoryOrderStore::new().with_audit(AuditWriter::new(&path, true).unwrap());
    let router = routes::build_router(Arc::new(state::AppState::with_store(store)));

    let stale = create(&router, "o1").await["updatedAtMs"].as_i64().unwrap();
    let (status, _) = call(
        router.clone(),
        post(
            "/v1/orders/transition",
            json!({ "orderId": "o1", "action": "ACCEPT", "expectedUpdatedAtMs": stale }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        router.clone(),
        post(
            "/v1/orders/transition",
            json!({ "orderId": "o1", "action": "CANCEL", "expectedUpdatedAtMs": stale }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let err = &parse_json(body)["error"];
    assert_eq!(err["code"], "CONCURRENCY_CONFLICT");
    assert_eq!(err["expected"], stale);

    let (status, body) = call(
        router,
        post(
            "/v1/orders/transition",
            json!({
                "orderId": "o1",
                "action": "CANCEL",
                "expectedUpdatedAtMs": stale,
                "managerOverride": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["order"]["status"], "CANCELLED");

    assert_eq!(read_records(&path).unwrap().len(), 2);
    let overridden = overrides(&path).unwrap();
    assert_eq!(overridden.len(), 1);
    assert_eq!(overridden[0].detail["action"], "CANCEL");
}

// ---------------------------------------------------------------------------
// Payment + stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payment_webhook_applies_once() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    create(&router, "o1").await;

    let (status, body) = call(router.clone(), post("/v1/orders/o1/paid", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse_json(body)["paidAt"].is_string());

    let (status, body) = call(router, post("/v1/orders/o1/paid", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["error"]["code"], "ALREADY_PAID");
}

#[tokio::test]
async fn stream_is_sse_for_known_orders_only() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    create(&router, "o1").await;

    let resp = router.clone().oneshot(get("/v1/orders/o1/stream")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(ct.starts_with("text/event-stream"), "{ct}");

    let (status, _) = call(router, get("/v1/orders/ghost/stream")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn created_orders_feed_the_notifier() {
    let sink = Arc::new(CollectingNotifier::new());
    let st = state::AppState::new().with_notifier(sink.clone());
    let router = routes::build_router(Arc::new(st));

    create(&router, "o1").await;
    let (status, _) = call(
        router,
        post("/v1/orders/transition", json!({ "orderId": "o1", "action": "CANCEL" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The listener is detached; wait for it to drain the feed.
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while sink.statuses().len() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(
        sink.statuses(),
        vec![OrderStatus::Received, OrderStatus::Cancelled]
    );
}
