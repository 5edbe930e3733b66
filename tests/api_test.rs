//! HTTP surface driven through the router without a socket

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use luckybet::api::{build_app, AppState};
use luckybet::games::StepSource;
use luckybet::metrics::Metrics;
use luckybet::storage::OptimizedStorage;
use luckybet::LuckyBetConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_KEY: &str = "test-admin-key";

struct TestApp {
    _dir: tempfile::TempDir,
    app: Router,
    state: Arc<AppState>,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = LuckyBetConfig::testing(dir.path().to_str().unwrap());
    let storage = OptimizedStorage::new(dir.path()).unwrap();
    let state = Arc::new(AppState::build(
        &config,
        storage,
        Arc::new(StepSource::lowest()),
        Arc::new(Metrics::new().unwrap()),
    ));
    state.catalog.seed_defaults().unwrap();
    let app = build_app(state.clone(), &config.server);
    TestApp {
        _dir: dir,
        app,
        state,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, request_id, body)
}

fn json_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
}

fn user_post(uri: &str, token: &str, body: Value) -> Request<Body> {
    json_request("POST", uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn user_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn admin(method: &str, uri: &str, body: Value) -> Request<Body> {
    json_request(method, uri)
        .header("x-api-key", ADMIN_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Create a user through the admin API and return (id, token)
async fn create_user(app: &Router, name: &str, balance: f64) -> (String, String) {
    let (status, _, body) = send(
        app,
        admin("POST", "/api/admin/users", json!({ "displayName": name, "balance": balance })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["account"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health_carries_request_id() {
    let t = test_app();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (status, request_id, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request_id.as_deref(), Some("abc-123"));
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_wager_settles_and_reports_units() {
    let t = test_app();
    let (_, token) = create_user(&t.app, "alice", 100.0).await;

    let (status, _, body) = send(
        &t.app,
        user_post(
            "/api/wager",
            &token,
            json!({ "gameCode": "coin", "betAmount": 100.0, "isDemo": false, "choice": "heads" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"].as_str().unwrap().starts_with("Coin landed heads"));
    assert_eq!(body["outcome"], "win");
    assert_eq!(body["winAmount"], 190.0);
    assert_eq!(body["netAmount"], 90.0);
    assert_eq!(body["newBalance"], 190.0);

    let (_, _, balance) = send(&t.app, user_get("/api/user/balance", &token)).await;
    assert_eq!(balance["balance"], 190.0);

    let (_, _, history) = send(&t.app, user_get("/api/user/history", &token)).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["gameCode"], "coin");

    let (_, _, txs) = send(&t.app, user_get("/api/user/transactions", &token)).await;
    assert_eq!(txs[0]["type"], "game_win");
    assert_eq!(txs[0]["amount"], 90.0);
}

#[tokio::test]
async fn test_rejections_use_error_envelope() {
    let t = test_app();
    let (_, token) = create_user(&t.app, "bob", 1.0).await;

    // No credential
    let request = json_request("POST", "/api/wager")
        .body(Body::from(json!({ "gameCode": "coin", "betAmount": 1.0 }).to_string()))
        .unwrap();
    let (status, request_id, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["requestId"].as_str(), request_id.as_deref());

    // Unknown game
    let (status, _, body) = send(
        &t.app,
        user_post("/api/wager", &token, json!({ "gameCode": "nope", "betAmount": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_GAME");

    // More than the balance
    let (status, _, body) = send(
        &t.app,
        user_post(
            "/api/wager",
            &token,
            json!({ "gameCode": "coin", "betAmount": 5.0, "choice": "heads" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(body["error"]["details"]["available"], 1.0);

    // Malformed body
    let (status, _, body) = send(&t.app, user_post("/api/wager", &token, json!({ "betAmount": "lots" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    // Malformed query strings
    let (status, request_id, body) = send(&t.app, user_get("/api/user/history?limit=abc", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert_eq!(body["requestId"].as_str(), request_id.as_deref());

    let request = Request::builder()
        .uri("/api/admin/transactions?status=bogus")
        .header("x-api-key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    // Nothing moved
    let (_, _, balance) = send(&t.app, user_get("/api/user/balance", &token)).await;
    assert_eq!(balance["balance"], 1.0);
}

#[tokio::test]
async fn test_round_endpoints_follow_round_state() {
    let t = test_app();
    let (_, token) = create_user(&t.app, "carol", 50.0).await;

    let (status, _, body) = send(
        &t.app,
        user_post("/api/round/bet", &token, json!({ "betAmount": 10.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ROUND_CLOSED");

    t.state.scheduler.arm().await.unwrap();
    let (status, _, body) = send(
        &t.app,
        user_post("/api/round/bet", &token, json!({ "betAmount": 10.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newBalance"], 40.0);

    // Arming: cash-out is not open until the first tick
    let (status, _, body) = send(
        &t.app,
        user_post("/api/round/cashout", &token, json!({ "multiplier": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ROUND_CLOSED");

    // Default crash floor is 1.00x: the lowest draw crashes on the first tick
    t.state.scheduler.advance().await;
    let (_, _, round) = send(&t.app, user_get("/api/round", &token)).await;
    assert_eq!(round["phase"], "idle");
    assert_eq!(round["crashPoint"], 1.0);

    let (_, _, balance) = send(&t.app, user_get("/api/user/balance", &token)).await;
    assert_eq!(balance["balance"], 40.0);
}

#[tokio::test]
async fn test_deposit_approval_is_idempotent() {
    let t = test_app();
    let (user_id, token) = create_user(&t.app, "dana", 0.0).await;

    let (status, _, tx) = send(
        &t.app,
        user_post(
            "/api/user/deposit-request",
            &token,
            json!({ "amount": 25.0, "paymentMethod": "card" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tx["status"], "pending");
    let tx_id = tx["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/transactions/{}/status", tx_id);
    let (status, _, first) = send(&t.app, admin("PUT", &uri, json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["alreadySettled"], false);
    assert_eq!(first["newBalance"], 25.0);

    let (_, _, second) = send(&t.app, admin("PUT", &uri, json!({ "status": "completed" }))).await;
    assert_eq!(second["alreadySettled"], true);
    assert_eq!(second["newBalance"], 25.0);

    assert_eq!(t.state.ledger.account(&user_id).unwrap().balance, 2_500);

    send(
        &t.app,
        user_post(
            "/api/user/deposit-request",
            &token,
            json!({ "amount": 10.0, "paymentMethod": "card" }),
        ),
    )
    .await;
    let (status, _, stats) = send(&t.app, user_get("/api/user/transaction-stats", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalDeposits"], 25.0);
    assert_eq!(stats["pendingDeposits"], 1);
    assert_eq!(stats["totalWithdrawals"], 0.0);
    assert_eq!(stats["pendingWithdrawals"], 0);
}

#[tokio::test]
async fn test_admin_requires_key() {
    let t = test_app();
    let request = Request::builder()
        .uri("/api/admin/users")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _, body) = send(
        &t.app,
        admin("PUT", "/api/admin/games/dice/status", json!({ "isActive": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);

    let (_, _, games) = send(
        &t.app,
        Request::builder().uri("/api/games").body(Body::empty()).unwrap(),
    )
    .await;
    assert!(games.as_array().unwrap().iter().all(|g| g["code"] != "dice"));
}
