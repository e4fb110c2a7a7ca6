//! Deposit settlement through signed webhooks and gateway verification.

mod common;

use axum::http::{HeaderMap, HeaderValue};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use common::*;
use wallet_ledger::error::AppError;
use wallet_ledger::gateway::GatewayStatus;
use wallet_ledger::models::transaction::{InitiateDepositRequest, TransactionStatus};
use wallet_ledger::models::wallet::WalletField;
use wallet_ledger::models::withdrawal::{WithdrawalRequest, WithdrawalStatus};
use wallet_ledger::services::settlement_service::{self, SettlementOutcome};
use wallet_ledger::services::{ledger_service, transaction_service, withdrawal_service};
use wallet_ledger::state::AppState;

fn sign(body: &[u8]) -> HeaderMap {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-signature",
        HeaderValue::from_str(&hex::encode(mac.finalize().into_bytes())).unwrap(),
    );
    headers
}

fn event(transaction_no: &str, status: &str, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": format!("charge.{status}"),
        "data": { "reference": transaction_no, "status": status, "amount": amount }
    }))
    .unwrap()
}

/// Wallet with 100 available and a pending deposit of 50 through the mock provider.
async fn pending_deposit(gateway_status: GatewayStatus) -> (AppState, i64, String) {
    let pool = pool().await;
    let client = unique_client();
    funded_wallet(&pool, client, 1, 100).await;
    payment_method(&pool, client, "hmac_sha256").await;
    let state = state(pool, MockGateway::new(gateway_status), MockIdentity::default());

    let deposit = transaction_service::initiate_deposit(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        &InitiateDepositRequest {
            user_id: 1,
            client_id: client,
            amount: 50,
            provider: MOCK_PROVIDER.to_string(),
            email: None,
            callback_url: None,
            source: "test".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(deposit.status, TransactionStatus::Pending);
    assert!(deposit.authorization_url.is_some());
    (state, client, deposit.transaction_no)
}

async fn webhook(state: &AppState, client: i64, headers: &HeaderMap, body: &[u8]) -> Result<SettlementOutcome, AppError> {
    settlement_service::handle_webhook(&state.pool, &state.gateways, client, MOCK_PROVIDER, headers, body).await
}

async fn callback_statuses(state: &AppState, client: i64) -> Vec<String> {
    sqlx::query_scalar("SELECT status FROM callback_logs WHERE client_id = $1 ORDER BY id")
        .bind(client)
        .fetch_all(&state.pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn verified_webhook_credits_once() {
    let (state, client, no) = pending_deposit(GatewayStatus::Pending).await;
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);

    let body = event(&no, "success", 50);
    let headers = sign(&body);

    let first = webhook(&state, client, &headers, &body).await.unwrap();
    assert_eq!(first, SettlementOutcome::Settled { balance: 150 });

    let again = webhook(&state, client, &headers, &body).await.unwrap();
    assert_eq!(again, SettlementOutcome::Duplicate);

    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 150);
    let legs = ledger_service::find_legs(&state.pool, &no).await.unwrap();
    assert_eq!(legs.len(), 2);
    assert!(legs.iter().all(|l| l.status() == Some(TransactionStatus::Success)));
    assert_eq!(callback_statuses(&state, client).await, vec!["success", "duplicate"]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn bad_signature_is_rejected_and_logged() {
    let (state, client, no) = pending_deposit(GatewayStatus::Pending).await;

    let body = event(&no, "success", 50);
    let mut headers = HeaderMap::new();
    headers.insert("x-signature", HeaderValue::from_static("deadbeef"));

    let err = webhook(&state, client, &headers, &body).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    let missing = webhook(&state, client, &HeaderMap::new(), &body).await.unwrap_err();
    assert!(matches!(missing, AppError::InvalidSignature));

    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
    let legs = ledger_service::find_legs(&state.pool, &no).await.unwrap();
    assert!(legs.iter().all(|l| l.status() == Some(TransactionStatus::Pending)));
    assert_eq!(callback_statuses(&state, client).await, vec!["rejected", "rejected"]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn failed_payment_fails_legs_without_credit() {
    let (state, client, no) = pending_deposit(GatewayStatus::Pending).await;

    let body = event(&no, "failed", 50);
    let outcome = webhook(&state, client, &sign(&body), &body).await.unwrap();

    assert_eq!(outcome, SettlementOutcome::Failed);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
    let legs = ledger_service::find_legs(&state.pool, &no).await.unwrap();
    assert!(legs.iter().all(|l| l.status() == Some(TransactionStatus::Failed)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn amount_mismatch_is_not_credited() {
    let (state, client, no) = pending_deposit(GatewayStatus::Pending).await;

    let body = event(&no, "success", 5_000);
    let outcome = webhook(&state, client, &sign(&body), &body).await.unwrap();

    assert_eq!(outcome, SettlementOutcome::Failed);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn unknown_reference_is_reported_not_found() {
    let (state, client, _) = pending_deposit(GatewayStatus::Pending).await;

    let body = event("DEP-DOES-NOT-EXIST", "success", 50);
    let outcome = webhook(&state, client, &sign(&body), &body).await.unwrap();

    assert_eq!(outcome, SettlementOutcome::NotFound);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn withdrawal_reference_is_not_settled_as_a_deposit() {
    let (state, client, _) = pending_deposit(GatewayStatus::Pending).await;

    let withdrawal = withdrawal_service::request_withdrawal(
        &state.pool,
        &state.queue,
        state.identity.as_ref(),
        INTERNAL,
        &WithdrawalRequest {
            user_id: 1,
            client_id: client,
            amount: 30,
            channel: "bank".to_string(),
            account_number: Some("0123456789".to_string()),
            account_name: Some("ADA OKAFOR".to_string()),
            bank_code: Some("058".to_string()),
            bank_name: None,
            field: WalletField::Available,
            provider: None,
            transaction_no: None,
        },
    )
    .await
    .unwrap();
    let no = withdrawal.transaction_no;

    for status in ["failed", "success"] {
        let body = serde_json::to_vec(&json!({
            "event": format!("transfer.{status}"),
            "data": { "reference": no }
        }))
        .unwrap();
        let outcome = webhook(&state, client, &sign(&body), &body).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::NotFound);
    }

    let legs = ledger_service::find_legs(&state.pool, &no).await.unwrap();
    assert_eq!(legs.len(), 2);
    assert!(legs.iter().all(|l| l.status() == Some(TransactionStatus::Pending)));
    let withdrawal = withdrawal_service::get_withdrawal(&state.pool, &no).await.unwrap();
    assert_eq!(withdrawal.status().unwrap(), WithdrawalStatus::Pending);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 70);
    assert_eq!(callback_statuses(&state, client).await, vec!["not_found", "not_found"]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn failed_settlement_is_still_logged() {
    let (state, client, no) = pending_deposit(GatewayStatus::Pending).await;
    sqlx::query("DELETE FROM wallets WHERE client_id = $1")
        .bind(client)
        .execute(&state.pool)
        .await
        .unwrap();

    let body = event(&no, "success", 50);
    let err = webhook(&state, client, &sign(&body), &body).await.unwrap_err();
    assert!(matches!(err, AppError::WalletNotFound));

    let legs = ledger_service::find_legs(&state.pool, &no).await.unwrap();
    assert!(legs.iter().all(|l| l.status() == Some(TransactionStatus::Pending)));
    assert_eq!(callback_statuses(&state, client).await, vec!["error"]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn verification_settles_a_missed_webhook() {
    let (state, client, no) = pending_deposit(GatewayStatus::Success).await;

    let outcome = settlement_service::verify_deposit(&state.pool, &state.gateways, &no)
        .await
        .unwrap();
    assert_eq!(outcome, SettlementOutcome::Settled { balance: 150 });

    let again = settlement_service::verify_deposit(&state.pool, &state.gateways, &no)
        .await
        .unwrap();
    assert_eq!(again, SettlementOutcome::Duplicate);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 150);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn gateway_outage_fails_the_new_deposit() {
    let pool = pool().await;
    let client = unique_client();
    funded_wallet(&pool, client, 1, 0).await;
    payment_method(&pool, client, "hmac_sha256").await;
    let state = state(pool, MockGateway::unavailable(), MockIdentity::default());

    let err = transaction_service::initiate_deposit(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        &InitiateDepositRequest {
            user_id: 1,
            client_id: client,
            amount: 50,
            provider: MOCK_PROVIDER.to_string(),
            email: Some("player@example.com".to_string()),
            callback_url: None,
            source: "test".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let statuses: Vec<i16> = sqlx::query_scalar(
        "SELECT status FROM transactions WHERE client_id = $1 AND subject = 'Deposit'",
    )
    .bind(client)
    .fetch_all(&state.pool)
    .await
    .unwrap();
    assert_eq!(statuses, vec![TransactionStatus::Failed.code(); 2]);
}
