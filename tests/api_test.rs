//! HTTP surface driven through the router with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use common::*;
use wallet_ledger::gateway::GatewayStatus;
use wallet_ledger::middleware::auth::hash_api_key;
use wallet_ledger::models::wallet::WalletField;
use wallet_ledger::models::withdrawal::WithdrawalRequest;
use wallet_ledger::router;
use wallet_ledger::services::withdrawal_service;

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, api_key: Option<&str>, body: Value) -> Request<Body> {
    json_request("POST", uri, api_key, body)
}

fn json_request(method: &str, uri: &str, api_key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn api_routes_require_a_bearer_key() {
    // Never connects: the middleware rejects before touching the store
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://unused@127.0.0.1:1/unused")
        .unwrap();
    let app = router(state(pool, MockGateway::new(GatewayStatus::Success), MockIdentity::default()));

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/wallets", None, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_api_key");

    let basic = Request::builder()
        .uri("/api/v1/wallets/1/1")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(basic).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

async fn issue_api_key(pool: &sqlx::PgPool, client: i64) -> String {
    let api_key = format!("sk_test_{client}");
    sqlx::query("INSERT INTO api_keys (key_hash, client_name) VALUES ($1, 'back-office')")
        .bind(hash_api_key(&api_key))
        .execute(pool)
        .await
        .unwrap();
    api_key
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn wallet_lifecycle_over_http() {
    let pool = pool().await;
    let client = unique_client();
    let api_key = issue_api_key(&pool, client).await;
    let app = router(state(pool, MockGateway::new(GatewayStatus::Success), MockIdentity::default()));

    let wallet = json!({
        "user_id": 1,
        "client_id": client,
        "username": "08031234567",
        "currency": "NGN"
    });

    let created = app
        .clone()
        .oneshot(post_json("/api/v1/wallets", Some(&api_key), wallet.clone()))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = app
        .clone()
        .oneshot(post_json("/api/v1/wallets", Some(&api_key), wallet))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(duplicate).await["error"]["code"], "wallet_already_exists");

    let balance = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/wallets/{client}/1"))
                .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(balance.status(), StatusCode::OK);
    let body = body_json(balance).await;
    assert_eq!(body["available_balance"], 0);
    assert_eq!(body["currency"], "NGN");
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn admin_rejects_withdrawal_over_http() {
    let pool = pool().await;
    let client = unique_client();
    let api_key = issue_api_key(&pool, client).await;
    funded_wallet(&pool, client, 1, 100).await;
    let state = state(pool, MockGateway::new(GatewayStatus::Success), MockIdentity::default());

    let withdrawal = withdrawal_service::request_withdrawal(
        &state.pool,
        &state.queue,
        state.identity.as_ref(),
        INTERNAL,
        &WithdrawalRequest {
            user_id: 1,
            client_id: client,
            amount: 40,
            channel: "cash".to_string(),
            account_number: None,
            account_name: None,
            bank_code: None,
            bank_name: None,
            field: WalletField::Available,
            provider: None,
            transaction_no: None,
        },
    )
    .await
    .unwrap();
    let pool = state.pool.clone();
    let app = router(state);

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/withdrawals/{}", withdrawal.transaction_no),
            Some(&api_key),
            json!({ "action": "reject", "updated_by": 77 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");
    assert_eq!(balance(&pool, client, 1, WalletField::Available).await, 100);
}
