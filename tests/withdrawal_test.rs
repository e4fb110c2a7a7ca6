//! Withdrawal state machine, refunds and payouts against PostgreSQL.

mod common;

use std::sync::Arc;

use common::*;
use wallet_ledger::error::AppError;
use wallet_ledger::gateway::GatewayStatus;
use wallet_ledger::identity::WithdrawalSettings;
use wallet_ledger::models::job::{AffiliateWithdrawal, ShopWithdrawal};
use wallet_ledger::models::transaction::TransactionStatus;
use wallet_ledger::models::wallet::WalletField;
use wallet_ledger::models::withdrawal::{
    CancelWithdrawalRequest, RequesterRole, UpdateWithdrawalRequest, Withdrawal, WithdrawalAction,
    WithdrawalRequest, WithdrawalStatus,
};
use wallet_ledger::services::{commission_service, ledger_service, withdrawal_service};
use wallet_ledger::state::AppState;

fn bank_request(client_id: i64, user_id: i64, amount: i64) -> WithdrawalRequest {
    WithdrawalRequest {
        user_id,
        client_id,
        amount,
        channel: "bank".to_string(),
        account_number: Some("0123456789".to_string()),
        account_name: Some("ADA OKAFOR".to_string()),
        bank_code: Some("058".to_string()),
        bank_name: Some("GTBank".to_string()),
        field: WalletField::Available,
        provider: None,
        transaction_no: None,
    }
}

async fn setup(gateway: Arc<MockGateway>, identity: MockIdentity) -> (AppState, i64) {
    let pool = pool().await;
    let client = unique_client();
    funded_wallet(&pool, client, 1, 100).await;
    payment_method(&pool, client, "hmac_sha256").await;
    (state(pool, gateway, identity), client)
}

async fn request(state: &AppState, request: &WithdrawalRequest) -> Result<Withdrawal, AppError> {
    withdrawal_service::request_withdrawal(
        &state.pool,
        &state.queue,
        state.identity.as_ref(),
        INTERNAL,
        request,
    )
    .await
}

async fn decide(state: &AppState, no: &str, action: WithdrawalAction) -> Result<Withdrawal, AppError> {
    withdrawal_service::update_withdrawal(
        &state.pool,
        &state.gateways,
        INTERNAL,
        no,
        &UpdateWithdrawalRequest {
            action,
            comment: Some("reviewed".to_string()),
            updated_by: 77,
            provider: None,
        },
    )
    .await
}

async fn leg_statuses(state: &AppState, no: &str) -> Vec<Option<TransactionStatus>> {
    ledger_service::find_legs(&state.pool, no)
        .await
        .unwrap()
        .iter()
        .map(|l| l.status())
        .collect()
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn request_holds_funds_and_queues_payout() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;

    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();

    assert_eq!(withdrawal.status().unwrap(), WithdrawalStatus::Pending);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 70);
    assert_eq!(
        leg_statuses(&state, &withdrawal.transaction_no).await,
        vec![Some(TransactionStatus::Pending); 2]
    );

    let queued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE idempotency_key = $1")
        .bind(format!("withdrawal-request:{}", withdrawal.transaction_no))
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(queued, 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn repeated_request_returns_the_same_withdrawal() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;

    let mut req = bank_request(client, 1, 30);
    req.transaction_no = Some(format!("WD-{client}"));
    let first = request(&state, &req).await.unwrap();
    let second = request(&state, &req).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 70);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn request_outside_client_limits_is_refused() {
    let identity = MockIdentity {
        settings: WithdrawalSettings {
            minimum_withdrawal: 50,
            ..WithdrawalSettings::default()
        },
    };
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), identity).await;

    let err = request(&state, &bank_request(client, 1, 30)).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidRequest(_)));
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn request_beyond_balance_creates_nothing() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;

    let mut req = bank_request(client, 1, 101);
    req.transaction_no = Some(format!("WD-{client}"));
    let err = request(&state, &req).await.unwrap_err();

    assert!(matches!(err, AppError::InsufficientFunds));
    assert!(
        withdrawal_service::find_withdrawal(&state.pool, &format!("WD-{client}"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn approval_disburses_once() {
    let gateway = MockGateway::new(GatewayStatus::Success);
    let (state, client) = setup(gateway.clone(), MockIdentity::default()).await;
    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let no = withdrawal.transaction_no.clone();

    let approved = decide(&state, &no, WithdrawalAction::Approve).await.unwrap();
    assert_eq!(approved.status().unwrap(), WithdrawalStatus::Approved);
    assert_eq!(approved.updated_by, Some(77));
    assert_eq!(leg_statuses(&state, &no).await, vec![Some(TransactionStatus::Success); 2]);

    let again = decide(&state, &no, WithdrawalAction::Approve).await.unwrap_err();
    assert!(matches!(again, AppError::InvalidStateTransition { .. }));

    let refund = decide(&state, &no, WithdrawalAction::Process).await.unwrap_err();
    assert!(matches!(refund, AppError::InvalidStateTransition { .. }));

    assert_eq!(gateway.disbursed(), vec![no]);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 70);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn gateway_failure_keeps_withdrawal_pending() {
    let (state, client) = setup(MockGateway::unavailable(), MockIdentity::default()).await;
    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let no = withdrawal.transaction_no.clone();

    let err = decide(&state, &no, WithdrawalAction::Approve).await.unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let current = withdrawal_service::get_withdrawal(&state.pool, &no).await.unwrap();
    assert_eq!(current.status().unwrap(), WithdrawalStatus::Pending);
    assert_eq!(leg_statuses(&state, &no).await, vec![Some(TransactionStatus::Pending); 2]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn rejected_disbursement_keeps_withdrawal_pending() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Failed), MockIdentity::default()).await;
    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();

    let err = decide(&state, &withdrawal.transaction_no, WithdrawalAction::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let current = withdrawal_service::get_withdrawal(&state.pool, &withdrawal.transaction_no)
        .await
        .unwrap();
    assert_eq!(current.status().unwrap(), WithdrawalStatus::Pending);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn unconfirmed_disbursement_keeps_withdrawal_pending() {
    let gateway = MockGateway::new(GatewayStatus::Pending);
    let (state, client) = setup(gateway.clone(), MockIdentity::auto_disbursing(10, 50, 5)).await;
    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let no = withdrawal.transaction_no.clone();

    let err = decide(&state, &no, WithdrawalAction::Approve).await.unwrap_err();
    assert!(matches!(err, AppError::DisbursementPending(_)));
    assert_eq!(leg_statuses(&state, &no).await, vec![Some(TransactionStatus::Pending); 2]);

    let auto = withdrawal_service::auto_disburse(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        &no,
        None,
    )
    .await
    .unwrap();
    assert_eq!(auto.status().unwrap(), WithdrawalStatus::Pending);
    assert_eq!(gateway.disbursed().len(), 2);

    // Still refundable once the payout is known to have failed
    let rejected = decide(&state, &no, WithdrawalAction::Reject).await.unwrap();
    assert_eq!(rejected.status().unwrap(), WithdrawalStatus::Cancelled);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn bonus_balances_cannot_be_withdrawn() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;
    fund(&state.pool, client, 1, WalletField::SportBonus, 50).await;

    let mut req = bank_request(client, 1, 30);
    req.field = WalletField::SportBonus;
    let err = request(&state, &req).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidRequest(_)));
    assert_eq!(balance(&state.pool, client, 1, WalletField::SportBonus).await, 50);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn processing_refunds_the_wallet() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;
    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let no = withdrawal.transaction_no.clone();

    let processed = decide(&state, &no, WithdrawalAction::Process).await.unwrap();

    assert_eq!(processed.status().unwrap(), WithdrawalStatus::Processed);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
    assert_eq!(leg_statuses(&state, &no).await, vec![Some(TransactionStatus::Failed); 2]);

    let refund = ledger_service::find_legs(&state.pool, &ledger_service::refund_transaction_no(&no))
        .await
        .unwrap();
    assert_eq!(refund.len(), 2);
    assert!(refund.iter().all(|l| l.amount == 30));

    let again = decide(&state, &no, WithdrawalAction::Reject).await.unwrap_err();
    assert!(matches!(again, AppError::InvalidStateTransition { .. }));
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn player_cancels_own_withdrawal() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;
    let withdrawal = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let no = withdrawal.transaction_no.clone();

    let stranger = withdrawal_service::cancel_withdrawal(
        &state.pool,
        INTERNAL,
        &no,
        &CancelWithdrawalRequest {
            user_id: 2,
            role: RequesterRole::Player,
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(stranger, AppError::WithdrawalNotFound));

    let cancelled = withdrawal_service::cancel_withdrawal(
        &state.pool,
        INTERNAL,
        &no,
        &CancelWithdrawalRequest {
            user_id: 1,
            role: RequesterRole::Player,
            comment: Some("changed my mind".to_string()),
        },
    )
    .await
    .unwrap();

    assert_eq!(cancelled.status().unwrap(), WithdrawalStatus::UserCancelled);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);
    assert_eq!(
        leg_statuses(&state, &no).await,
        vec![Some(TransactionStatus::UserCancelled); 2]
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn cash_withdrawal_is_paid_at_a_shop_once() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;
    funded_wallet(&state.pool, client, 2, 0).await;

    let mut req = bank_request(client, 1, 40);
    req.channel = "cash".to_string();
    req.account_number = None;
    let withdrawal = request(&state, &req).await.unwrap();
    let code = withdrawal.withdrawal_code.clone().unwrap();
    let no = withdrawal.transaction_no.clone();

    let wrong = withdrawal_service::shop_payout(
        &state.pool,
        INTERNAL,
        &ShopWithdrawal {
            transaction_no: no.clone(),
            shop_user_id: 2,
            withdrawal_code: "WRONG".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(wrong, AppError::InvalidRequest(_)));

    let payout = ShopWithdrawal {
        transaction_no: no.clone(),
        shop_user_id: 2,
        withdrawal_code: code,
    };
    let paid = withdrawal_service::shop_payout(&state.pool, INTERNAL, &payout).await.unwrap();
    assert_eq!(paid.status().unwrap(), WithdrawalStatus::Approved);
    withdrawal_service::shop_payout(&state.pool, INTERNAL, &payout).await.unwrap();

    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 60);
    assert_eq!(balance(&state.pool, client, 2, WalletField::Available).await, 40);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn auto_disbursement_follows_policy() {
    let gateway = MockGateway::new(GatewayStatus::Success);
    let (state, client) = setup(gateway.clone(), MockIdentity::auto_disbursing(10, 50, 5)).await;

    let small = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let large = request(&state, &bank_request(client, 1, 60)).await.unwrap();

    let small = withdrawal_service::auto_disburse(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        &small.transaction_no,
        None,
    )
    .await
    .unwrap();
    let large = withdrawal_service::auto_disburse(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        &large.transaction_no,
        None,
    )
    .await
    .unwrap();

    assert_eq!(small.status().unwrap(), WithdrawalStatus::Approved);
    assert_eq!(large.status().unwrap(), WithdrawalStatus::Pending);
    assert_eq!(gateway.disbursed(), vec![small.transaction_no.clone()]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn rejected_commission_withdrawal_returns_to_commission() {
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), MockIdentity::default()).await;
    fund(&state.pool, client, 1, WalletField::Commission, 50).await;

    let affiliate = AffiliateWithdrawal::from_request(&bank_request(client, 1, 40), format!("AFW-{client}"));
    let withdrawal = withdrawal_service::create_commission_withdrawal(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        INTERNAL,
        &affiliate,
    )
    .await
    .unwrap();

    // Auto-disbursement is off for this client
    assert_eq!(withdrawal.status().unwrap(), WithdrawalStatus::Pending);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Commission).await, 10);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Available).await, 100);

    let reject = UpdateWithdrawalRequest {
        action: WithdrawalAction::Reject,
        comment: None,
        updated_by: 77,
        provider: None,
    };

    let player = request(&state, &bank_request(client, 1, 30)).await.unwrap();
    let err = commission_service::update_request(
        &state.pool,
        &state.gateways,
        INTERNAL,
        &player.transaction_no,
        &reject,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::WithdrawalNotFound));

    let rejected = commission_service::update_request(
        &state.pool,
        &state.gateways,
        INTERNAL,
        &withdrawal.transaction_no,
        &reject,
    )
    .await
    .unwrap();

    assert_eq!(rejected.status().unwrap(), WithdrawalStatus::Cancelled);
    assert_eq!(balance(&state.pool, client, 1, WalletField::Commission).await, 50);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn commission_withdrawal_outside_client_limits_is_refused() {
    let identity = MockIdentity {
        settings: WithdrawalSettings {
            minimum_withdrawal: 50,
            ..WithdrawalSettings::default()
        },
    };
    let (state, client) = setup(MockGateway::new(GatewayStatus::Success), identity).await;
    fund(&state.pool, client, 1, WalletField::Commission, 50).await;

    let affiliate = AffiliateWithdrawal::from_request(&bank_request(client, 1, 40), format!("AFW-{client}"));
    let err = withdrawal_service::create_commission_withdrawal(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        INTERNAL,
        &affiliate,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::InvalidRequest(_)));
    assert_eq!(balance(&state.pool, client, 1, WalletField::Commission).await, 50);
    assert!(
        withdrawal_service::find_withdrawal(&state.pool, &affiliate.transaction_no)
            .await
            .unwrap()
            .is_none()
    );
}
