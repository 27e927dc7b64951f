//! HTTP 接口测试
//!
//! 通过 tower::ServiceExt::oneshot 直接驱动路由，验证状态码和响应结构。

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bonus_service::{routes::build_router, state::AppState};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(state: &AppState) -> Router {
    build_router(state.clone())
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_earn_returns_created() {
    let state = AppState::in_memory();

    let (status, body) = send(
        &state,
        post_json(
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 100, "reason": "purchase", "description": "首单"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], "SUCCESS");
    assert_eq!(body["data"]["balance"], 100);
    assert_eq!(body["data"]["replayed"], false);
    assert_eq!(body["data"]["operation"]["balanceAfter"], 100);
    assert_eq!(body["data"]["operation"]["kind"], "earn");
    assert_eq!(body["data"]["operation"]["reason"], "purchase");
}

#[tokio::test]
async fn test_replay_returns_ok() {
    let state = AppState::in_memory();
    let payload = json!({"amount": 40, "reason": "referral", "externalOperationId": "invite-9"});

    let (status, first) = send(
        &state,
        post_json("/api/v1/bonus/users/u1/earn", payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = send(&state, post_json("/api/v1/bonus/users/u1/earn", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["code"], "REPLAYED");
    assert_eq!(second["data"]["replayed"], true);
    assert_eq!(
        second["data"]["operation"]["operationId"],
        first["data"]["operation"]["operationId"]
    );
}

#[tokio::test]
async fn test_mismatched_replay_returns_conflict() {
    let state = AppState::in_memory();
    send(
        &state,
        post_json(
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 40, "reason": "purchase", "externalOperationId": "ext-1"}),
        ),
    )
    .await;

    let (status, body) = send(
        &state,
        post_json(
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 41, "reason": "purchase", "externalOperationId": "ext-1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "IDEMPOTENCY_CONFLICT");
}

#[tokio::test]
async fn test_business_errors_map_to_bad_request() {
    let state = AppState::in_memory();

    let cases = [
        (
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 0, "reason": "purchase"}),
            "INVALID_AMOUNT",
        ),
        (
            "/api/v1/bonus/users/u1/apply",
            json!({"amount": 200, "reason": "order_payment"}),
            "INSUFFICIENT_BALANCE",
        ),
        (
            "/api/v1/bonus/users/u1/adjust",
            json!({"delta": -1, "reason": "support_adjustment"}),
            "NEGATIVE_BALANCE",
        ),
        (
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 5, "reason": "purchase", "description": "x".repeat(501)}),
            "VALIDATION_ERROR",
        ),
    ];

    for (uri, payload, code) in cases {
        let (status, body) = send(&state, post_json(uri, payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{code}");
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], code);
        assert!(body["data"].is_null());
    }

    let (_, balance) = send(&state, get("/api/v1/bonus/users/u1/balance")).await;
    assert_eq!(balance["data"]["balance"], 0);
}

#[tokio::test]
async fn test_oversized_user_id_rejected() {
    let state = AppState::in_memory();
    let long_user = "u".repeat(129);

    let (status, body) = send(
        &state,
        post_json(
            &format!("/api/v1/bonus/users/{}/earn", long_user),
            json!({"amount": 5, "reason": "purchase"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &state,
        get(&format!("/api/v1/bonus/users/{}/balance", long_user)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 上限本身可以写入
    let (status, _) = send(
        &state,
        post_json(
            &format!("/api/v1/bonus/users/{}/earn", "u".repeat(128)),
            json!({"amount": 5, "reason": "purchase"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_reason_rejected_at_parse() {
    let state = AppState::in_memory();

    let (status, _) = send(
        &state,
        post_json(
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 10, "reason": "jackpot"}),
        ),
    )
    .await;

    assert!(status.is_client_error());
    assert_ne!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_balance_without_history() {
    let state = AppState::in_memory();

    let (status, body) = send(&state, get("/api/v1/bonus/users/nobody/balance")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], 0);
    assert_eq!(body["data"]["hasHistory"], false);
    assert!(body["data"]["lastOperationId"].is_null());
    assert!(body["data"]["asOf"].is_string());
}

#[tokio::test]
async fn test_history_pagination() {
    let state = AppState::in_memory();
    for amount in [200, 150] {
        send(
            &state,
            post_json(
                "/api/v1/bonus/users/u1/earn",
                json!({"amount": amount, "reason": "purchase"}),
            ),
        )
        .await;
    }
    send(
        &state,
        post_json(
            "/api/v1/bonus/users/u1/apply",
            json!({"amount": 75, "reason": "order_payment"}),
        ),
    )
    .await;

    let (status, body) = send(
        &state,
        get("/api/v1/bonus/users/u1/history?page=1&pageSize=2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["totalPages"], 2);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["balanceAfter"], 275);
    assert_eq!(items[1]["balanceAfter"], 350);

    let (_, body) = send(
        &state,
        get("/api/v1/bonus/users/u1/history?page=5&pageSize=2"),
    )
    .await;
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["data"]["total"], 3);

    let (status, body) = send(
        &state,
        get("/api/v1/bonus/users/u1/history?page=1&pageSize=101"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_operation() {
    let state = AppState::in_memory();
    let (_, created) = send(
        &state,
        post_json(
            "/api/v1/bonus/users/u1/earn",
            json!({"amount": 10, "reason": "registration"}),
        ),
    )
    .await;
    let id = created["data"]["operation"]["operationId"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = send(&state, get(&format!("/api/v1/bonus/operations/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operationId"], id.as_str());
    assert_eq!(body["data"]["userId"], "u1");

    let missing = uuid::Uuid::now_v7();
    let (status, body) = send(
        &state,
        get(&format!("/api/v1/bonus/operations/{missing}")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "OPERATION_NOT_FOUND");

    let (status, _) = send(&state, get("/api/v1/bonus/operations/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_ready() {
    let state = AppState::in_memory();

    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&state, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "skipped");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let state = AppState::in_memory();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-123"
    );
}
