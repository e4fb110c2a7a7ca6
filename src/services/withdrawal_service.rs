//! Withdrawal service - payout requests and their lifecycle.
//!
//! # Lifecycle
//!
//! - **Request**: the amount leaves the wallet field immediately and a
//!   pending withdrawal is created with a pending debit leg. Non-cash
//!   withdrawals enqueue a payout job in the same store transaction.
//! - **Approve**: the gateway disburses; only a successful call flips the
//!   withdrawal to `Approved`. On failure nothing changes.
//! - **Reject / Process / Cancel**: the amount is refunded to the field it
//!   came from under `{transaction_no}-REFUND`, and the original legs move
//!   in lockstep.
//! - **Shop payout**: a shop pays a cash withdrawal and is reimbursed from
//!   the system under `{transaction_no}-SHOP`.
//!
//! Every transition locks the withdrawal row (`FOR UPDATE`) first, so two
//! concurrent decisions on the same withdrawal are serialized and the
//! second one sees a terminal state.

use std::time::Duration;

use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::{PgConnection, PgExecutor};

use crate::db::DbPool;
use crate::error::AppError;
use crate::gateway::{DisbursementRequest, GatewayRegistry, GatewayStatus};
use crate::identity::IdentityService;
use crate::jobs::queue::JobQueue;
use crate::models::job::{AffiliateWithdrawal, Job, Payout, ShopWithdrawal};
use crate::models::transaction::{SYSTEM_USER_ID, TransactionStatus, TransferParty, TransferRecord};
use crate::models::wallet::WalletField;
use crate::models::withdrawal::{
    CASH_CHANNEL, CancelWithdrawalRequest, UpdateWithdrawalRequest, Withdrawal, WithdrawalAction,
    WithdrawalQuery, WithdrawalRequest, WithdrawalStatus,
};
use crate::services::disbursement_policy::should_auto_approve;
use crate::services::transaction_service::{self, Movement, Side};
use crate::services::{ledger_service, wallet_service};

pub const WITHDRAWAL_SUBJECT: &str = "Withdrawal";
pub const REFUND_SUBJECT: &str = "Withdrawal Refund";
pub const CASH_PAYOUT_SUBJECT: &str = "Cash Payout";

pub const MOBILE_MONEY_CHANNEL: &str = "mobile_money";
pub const SMILE_AND_PAY_CHANNEL: &str = "smileandpay";

const WITHDRAWAL_CODE_LEN: usize = 8;

/// Correlation id of the system credit that reimburses a paying shop.
pub fn shop_payout_transaction_no(transaction_no: &str) -> String {
    format!("{transaction_no}-SHOP")
}

/// Payout job for a freshly created withdrawal; cash withdrawals have none.
pub fn payout_job(withdrawal: &Withdrawal, provider: Option<String>) -> Option<Job> {
    let transaction_no = withdrawal.transaction_no.clone();
    match withdrawal.channel.as_str() {
        CASH_CHANNEL => None,
        MOBILE_MONEY_CHANNEL => Some(Job::MobileMoneyPayout(Payout {
            transaction_no,
            provider: provider.or_else(|| Some(MOBILE_MONEY_CHANNEL.to_string())),
        })),
        SMILE_AND_PAY_CHANNEL => Some(Job::SmileAndPayPayout(Payout {
            transaction_no,
            provider: provider.or_else(|| Some(SMILE_AND_PAY_CHANNEL.to_string())),
        })),
        _ => Some(Job::WithdrawalRequest(Payout {
            transaction_no,
            provider,
        })),
    }
}

fn generate_withdrawal_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(WITHDRAWAL_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

fn validate_request(request: &WithdrawalRequest) -> Result<(), AppError> {
    if request.amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    if !matches!(request.field, WalletField::Available | WalletField::Commission) {
        return Err(AppError::InvalidRequest(format!(
            "{} balance cannot be withdrawn",
            request.field.as_str()
        )));
    }
    if request.channel.trim().is_empty() {
        return Err(AppError::InvalidRequest("channel is required".to_string()));
    }
    let has_account = request
        .account_number
        .as_deref()
        .is_some_and(|n| !n.trim().is_empty());
    if request.channel != CASH_CHANNEL && !has_account {
        return Err(AppError::InvalidRequest(
            "account_number is required for non-cash withdrawals".to_string(),
        ));
    }
    Ok(())
}

/// Create a withdrawal request.
///
/// # Process
///
/// 1. Validate the request against the client's withdrawal limits
/// 2. Decrement the wallet field and insert the pending withdrawal
/// 3. Record the pending debit leg and remember the payout account
/// 4. Enqueue the payout job for the channel (same store transaction)
///
/// A repeated `transaction_no` returns the existing withdrawal unchanged.
///
/// # Errors
///
/// - `InsufficientFunds`: the wallet field cannot cover the amount
/// - `InvalidRequest`: missing account details or outside client limits
pub async fn request_withdrawal(
    pool: &DbPool,
    queue: &JobQueue,
    identity: &dyn IdentityService,
    internal_channel: &str,
    request: &WithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    validate_request(request)?;
    identity
        .withdrawal_settings(request.client_id)
        .await?
        .check_limits(request.amount)?;

    create_withdrawal(pool, Some(queue), internal_channel, request).await
}

async fn create_withdrawal(
    pool: &DbPool,
    queue: Option<&JobQueue>,
    internal_channel: &str,
    request: &WithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    let transaction_no = request
        .transaction_no
        .clone()
        .unwrap_or_else(|| ledger_service::new_transaction_no("WD"));

    if let Some(existing) = find_withdrawal(pool, &transaction_no).await? {
        tracing::info!(transaction_no = %transaction_no, "Withdrawal already exists");
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;
    let created = create_pending(&mut tx, internal_channel, request, &transaction_no).await;

    let withdrawal = match created {
        Ok(withdrawal) => withdrawal,
        Err(e) if ledger_service::is_duplicate(&e) => {
            tx.rollback().await?;
            return get_withdrawal(pool, &transaction_no).await;
        }
        Err(e) => return Err(e),
    };

    if let Some(queue) = queue {
        if let Some(job) = payout_job(&withdrawal, request.provider.clone()) {
            queue.enqueue_with(&mut *tx, &job, Duration::ZERO).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        transaction_no = %withdrawal.transaction_no,
        user_id = withdrawal.user_id,
        amount = withdrawal.amount,
        channel = %withdrawal.channel,
        "Withdrawal requested"
    );

    Ok(withdrawal)
}

/// Take the amount out of the wallet and create the pending withdrawal.
pub async fn create_pending(
    conn: &mut PgConnection,
    internal_channel: &str,
    request: &WithdrawalRequest,
    transaction_no: &str,
) -> Result<Withdrawal, AppError> {
    let wallet = wallet_service::get_wallet(&mut *conn, request.user_id, request.client_id).await?;
    let balance = wallet_service::decrement_balance(
        conn,
        request.user_id,
        request.client_id,
        request.field,
        request.amount,
    )
    .await?;

    let withdrawal_code = (request.channel == CASH_CHANNEL).then(generate_withdrawal_code);

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        INSERT INTO withdrawals (
            transaction_no,
            user_id,
            client_id,
            username,
            amount,
            wallet,
            channel,
            account_number,
            account_name,
            bank_code,
            bank_name,
            withdrawal_code,
            status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(transaction_no)
    .bind(request.user_id)
    .bind(request.client_id)
    .bind(&wallet.username)
    .bind(request.amount)
    .bind(request.field.as_str())
    .bind(&request.channel)
    .bind(&request.account_number)
    .bind(&request.account_name)
    .bind(&request.bank_code)
    .bind(&request.bank_name)
    .bind(&withdrawal_code)
    .bind(WithdrawalStatus::Pending.code())
    .fetch_one(&mut *conn)
    .await?;

    ledger_service::record_transfer(
        conn,
        &TransferRecord {
            transaction_no: transaction_no.to_string(),
            client_id: request.client_id,
            amount: request.amount,
            subject: WITHDRAWAL_SUBJECT.to_string(),
            description: format!("Withdrawal via {}", request.channel),
            channel: internal_channel.to_string(),
            source: "withdrawal".to_string(),
            from: TransferParty::new(request.user_id, wallet.username.clone(), balance),
            to: TransferParty::system(),
            status: TransactionStatus::Pending,
            wallet: request.field,
            to_wallet: None,
            affiliate_id: None,
        },
    )
    .await?;

    if let (Some(account_number), Some(account_name), Some(bank_code)) = (
        &request.account_number,
        &request.account_name,
        &request.bank_code,
    ) {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_accounts (user_id, client_id, account_number, account_name, bank_code, bank_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, client_id, account_number, bank_code) DO NOTHING
            "#,
        )
        .bind(request.user_id)
        .bind(request.client_id)
        .bind(account_number)
        .bind(account_name)
        .bind(bank_code)
        .bind(&request.bank_name)
        .execute(&mut *conn)
        .await?;
    }

    Ok(withdrawal)
}

/// Affiliate payout of commission: create the withdrawal, then try to
/// disburse it straight away.
pub async fn create_commission_withdrawal(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    identity: &dyn IdentityService,
    internal_channel: &str,
    job: &AffiliateWithdrawal,
) -> Result<Withdrawal, AppError> {
    let request = job.to_request();
    validate_request(&request)?;
    identity
        .withdrawal_settings(request.client_id)
        .await?
        .check_limits(request.amount)?;

    let withdrawal = create_withdrawal(pool, None, internal_channel, &request).await?;
    auto_disburse(
        pool,
        gateways,
        identity,
        &withdrawal.transaction_no,
        job.provider.as_deref(),
    )
    .await
}

/// Approve a pending withdrawal without an admin when policy allows.
///
/// Withdrawals already decided, clients with auto-disbursement off and
/// requests outside policy are left as they are.
pub async fn auto_disburse(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    identity: &dyn IdentityService,
    transaction_no: &str,
    provider: Option<&str>,
) -> Result<Withdrawal, AppError> {
    let withdrawal = get_withdrawal(pool, transaction_no).await?;
    if withdrawal.status()?.is_terminal() {
        tracing::info!(transaction_no, "Withdrawal already decided, skipping payout");
        return Ok(withdrawal);
    }

    let settings = identity.withdrawal_settings(withdrawal.client_id).await?;
    if !settings.allow_auto_disbursement {
        tracing::info!(transaction_no, "Auto-disbursement disabled for client");
        return Ok(withdrawal);
    }

    let approved_today =
        todays_approved_count(pool, withdrawal.user_id, withdrawal.client_id).await?;
    if !should_auto_approve(
        approved_today,
        withdrawal.amount,
        &withdrawal.channel,
        settings.auto_disbursement_min,
        settings.auto_disbursement_max,
        settings.auto_disbursement_count,
    ) {
        tracing::info!(
            transaction_no,
            amount = withdrawal.amount,
            approved_today,
            "Withdrawal left for manual review"
        );
        return Ok(withdrawal);
    }

    match approve(
        pool,
        gateways,
        transaction_no,
        provider,
        SYSTEM_USER_ID,
        Some("Auto disbursed".to_string()),
    )
    .await
    {
        Ok(approved) => Ok(approved),
        Err(AppError::InvalidStateTransition { .. }) => {
            tracing::info!(transaction_no, "Withdrawal decided concurrently, skipping payout");
            get_withdrawal(pool, transaction_no).await
        }
        Err(AppError::DisbursementPending(_)) => get_withdrawal(pool, transaction_no).await,
        Err(e) => Err(e),
    }
}

/// Disburse a pending withdrawal through the gateway and mark it approved.
///
/// The withdrawal row stays locked for the duration of the gateway call, so
/// a second approval waits and then fails the transition instead of paying
/// out twice.
///
/// # Errors
///
/// - `InvalidStateTransition`: the withdrawal is no longer pending
/// - `Gateway`: the gateway failed or rejected the transfer; the withdrawal
///   stays pending
/// - `DisbursementPending`: the gateway has not confirmed the transfer; the
///   withdrawal stays pending for an admin to decide
/// - `PaymentMethodNotFound`: the client has no disbursement method
pub async fn approve(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    transaction_no: &str,
    provider: Option<&str>,
    updated_by: i64,
    comment: Option<String>,
) -> Result<Withdrawal, AppError> {
    let mut tx = pool.begin().await?;
    let withdrawal = lock_withdrawal(&mut tx, transaction_no).await?;
    withdrawal.status()?.transition(WithdrawalStatus::Approved)?;

    if withdrawal.is_cash() {
        return Err(AppError::InvalidRequest(
            "Cash withdrawals are paid out at a shop".to_string(),
        ));
    }

    let account_number = withdrawal
        .account_number
        .clone()
        .ok_or_else(|| AppError::InvalidRequest("Withdrawal has no account number".to_string()))?;
    let wallet = wallet_service::get_wallet(&mut *tx, withdrawal.user_id, withdrawal.client_id).await?;
    let method = gateways
        .disbursement_method(&mut *tx, withdrawal.client_id, provider)
        .await?;

    let result = gateways
        .adapter(&method)
        .disburse_funds(&DisbursementRequest {
            transaction_no: withdrawal.transaction_no.clone(),
            amount: withdrawal.amount,
            currency: wallet.currency,
            account_number,
            account_name: withdrawal.account_name.clone(),
            bank_code: withdrawal.bank_code.clone(),
            narration: format!("Withdrawal {}", withdrawal.transaction_no),
        })
        .await?;

    match result.status {
        GatewayStatus::Success => {}
        GatewayStatus::Failed => {
            return Err(AppError::Gateway(format!(
                "{} rejected the disbursement",
                method.provider
            )));
        }
        GatewayStatus::Pending => {
            tracing::warn!(
                transaction_no,
                provider = %method.provider,
                gateway_reference = ?result.gateway_reference,
                "Disbursement accepted but not confirmed, withdrawal stays pending"
            );
            return Err(AppError::DisbursementPending(method.provider.clone()));
        }
    }

    let approved = set_status(
        &mut tx,
        withdrawal.id,
        WithdrawalStatus::Approved,
        comment,
        Some(updated_by),
    )
    .await?;
    ledger_service::update_pending_status(&mut tx, transaction_no, TransactionStatus::Success).await?;

    tx.commit().await?;

    tracing::info!(
        transaction_no,
        provider = %method.provider,
        gateway_reference = ?result.gateway_reference,
        amount = approved.amount,
        "Withdrawal approved"
    );

    Ok(approved)
}

/// Move a pending withdrawal to a refunding terminal state.
///
/// Flips the withdrawal and its legs, then credits the amount back to the
/// field it was taken from under `{transaction_no}-REFUND`.
pub async fn finalize_with_refund(
    conn: &mut PgConnection,
    withdrawal: &Withdrawal,
    target: WithdrawalStatus,
    comment: Option<String>,
    updated_by: Option<i64>,
    internal_channel: &str,
) -> Result<Withdrawal, AppError> {
    withdrawal.status()?.transition(target)?;
    if !target.refunds() {
        return Err(AppError::InvalidStateTransition {
            from: WithdrawalStatus::Pending.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }

    let updated = set_status(conn, withdrawal.id, target, comment, updated_by).await?;
    ledger_service::update_pending_status(conn, &withdrawal.transaction_no, target.ledger_status())
        .await?;

    transaction_service::apply_in(
        conn,
        &Movement {
            transaction_no: ledger_service::refund_transaction_no(&withdrawal.transaction_no),
            client_id: withdrawal.client_id,
            amount: withdrawal.amount,
            subject: REFUND_SUBJECT.to_string(),
            description: format!("Refund of {}", withdrawal.transaction_no),
            channel: internal_channel.to_string(),
            source: "withdrawal".to_string(),
            from: Side::System,
            to: Side::User {
                user_id: withdrawal.user_id,
                field: withdrawal.wallet_field()?,
            },
            affiliate_id: None,
        },
    )
    .await?;

    tracing::info!(
        transaction_no = %withdrawal.transaction_no,
        status = %target,
        amount = withdrawal.amount,
        "Withdrawal refunded"
    );

    Ok(updated)
}

/// Admin decision on a pending withdrawal.
pub async fn update_withdrawal(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    internal_channel: &str,
    transaction_no: &str,
    request: &UpdateWithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    match request.action {
        WithdrawalAction::Approve => {
            approve(
                pool,
                gateways,
                transaction_no,
                request.provider.as_deref(),
                request.updated_by,
                request.comment.clone(),
            )
            .await
        }
        WithdrawalAction::Reject | WithdrawalAction::Process => {
            let mut tx = pool.begin().await?;
            let withdrawal = lock_withdrawal(&mut tx, transaction_no).await?;
            let updated = finalize_with_refund(
                &mut tx,
                &withdrawal,
                request.action.target_status(),
                request.comment.clone(),
                Some(request.updated_by),
                internal_channel,
            )
            .await?;
            tx.commit().await?;
            Ok(updated)
        }
    }
}

/// A shop or player cancelling their own pending withdrawal.
///
/// # Errors
///
/// - `WithdrawalNotFound`: unknown id, or the withdrawal belongs to someone else
/// - `InvalidStateTransition`: already approved or otherwise decided
pub async fn cancel_withdrawal(
    pool: &DbPool,
    internal_channel: &str,
    transaction_no: &str,
    request: &CancelWithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    let mut tx = pool.begin().await?;
    let withdrawal = lock_withdrawal(&mut tx, transaction_no).await?;
    if withdrawal.user_id != request.user_id {
        return Err(AppError::WithdrawalNotFound);
    }

    let updated = finalize_with_refund(
        &mut tx,
        &withdrawal,
        request.role.cancel_status(),
        request.comment.clone(),
        Some(request.user_id),
        internal_channel,
    )
    .await?;
    tx.commit().await?;

    Ok(updated)
}

/// A shop pays out a cash withdrawal.
///
/// The player's code must match. The withdrawal becomes `Approved` and the
/// shop's available balance is reimbursed by the system. Paying an already
/// approved withdrawal again is a no-op.
pub async fn shop_payout(
    pool: &DbPool,
    internal_channel: &str,
    payout: &ShopWithdrawal,
) -> Result<Withdrawal, AppError> {
    let mut tx = pool.begin().await?;
    let withdrawal = lock_withdrawal(&mut tx, &payout.transaction_no).await?;

    if !withdrawal.is_cash() {
        return Err(AppError::InvalidRequest(
            "Only cash withdrawals are paid at a shop".to_string(),
        ));
    }
    if withdrawal.withdrawal_code.as_deref() != Some(payout.withdrawal_code.trim()) {
        return Err(AppError::InvalidRequest(
            "Invalid withdrawal code".to_string(),
        ));
    }

    let current = withdrawal.status()?;
    if current == WithdrawalStatus::Approved {
        tracing::info!(transaction_no = %withdrawal.transaction_no, "Cash withdrawal already paid");
        return Ok(withdrawal);
    }
    current.transition(WithdrawalStatus::Approved)?;

    let approved = set_status(
        &mut tx,
        withdrawal.id,
        WithdrawalStatus::Approved,
        Some(format!("Paid at shop {}", payout.shop_user_id)),
        Some(payout.shop_user_id),
    )
    .await?;
    ledger_service::update_pending_status(&mut tx, &withdrawal.transaction_no, TransactionStatus::Success)
        .await?;

    transaction_service::apply_in(
        &mut tx,
        &Movement {
            transaction_no: shop_payout_transaction_no(&withdrawal.transaction_no),
            client_id: withdrawal.client_id,
            amount: withdrawal.amount,
            subject: CASH_PAYOUT_SUBJECT.to_string(),
            description: format!("Cash paid for {}", withdrawal.transaction_no),
            channel: internal_channel.to_string(),
            source: "shop".to_string(),
            from: Side::System,
            to: Side::User {
                user_id: payout.shop_user_id,
                field: WalletField::Available,
            },
            affiliate_id: None,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        transaction_no = %approved.transaction_no,
        shop_user_id = payout.shop_user_id,
        amount = approved.amount,
        "Cash withdrawal paid at shop"
    );

    Ok(approved)
}

async fn lock_withdrawal(conn: &mut PgConnection, transaction_no: &str) -> Result<Withdrawal, AppError> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE transaction_no = $1 FOR UPDATE")
        .bind(transaction_no)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::WithdrawalNotFound)
}

async fn set_status(
    conn: &mut PgConnection,
    withdrawal_id: i64,
    status: WithdrawalStatus,
    comment: Option<String>,
    updated_by: Option<i64>,
) -> Result<Withdrawal, AppError> {
    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals
        SET status = $1,
            comment = COALESCE($2, comment),
            updated_by = COALESCE($3, updated_by),
            updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(status.code())
    .bind(comment)
    .bind(updated_by)
    .bind(withdrawal_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(withdrawal)
}

pub async fn find_withdrawal<'e>(
    executor: impl PgExecutor<'e>,
    transaction_no: &str,
) -> Result<Option<Withdrawal>, AppError> {
    let withdrawal =
        sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE transaction_no = $1")
            .bind(transaction_no)
            .fetch_optional(executor)
            .await?;

    Ok(withdrawal)
}

pub async fn get_withdrawal<'e>(
    executor: impl PgExecutor<'e>,
    transaction_no: &str,
) -> Result<Withdrawal, AppError> {
    find_withdrawal(executor, transaction_no)
        .await?
        .ok_or(AppError::WithdrawalNotFound)
}

/// Withdrawals of a client, newest first.
pub async fn list_withdrawals(pool: &DbPool, query: &WithdrawalQuery) -> Result<Vec<Withdrawal>, AppError> {
    let withdrawals = sqlx::query_as::<_, Withdrawal>(
        r#"
        SELECT * FROM withdrawals
        WHERE client_id = $1
          AND ($2::bigint IS NULL OR user_id = $2)
          AND ($3::smallint IS NULL OR status = $3)
          AND ($4::timestamptz IS NULL OR created_at >= $4)
          AND ($5::timestamptz IS NULL OR created_at < $5)
        ORDER BY created_at DESC
        LIMIT $6 OFFSET $7
        "#,
    )
    .bind(query.client_id)
    .bind(query.user_id)
    .bind(query.status)
    .bind(query.from)
    .bind(query.to)
    .bind(transaction_service::page_size(query.limit))
    .bind(query.offset.max(0))
    .fetch_all(pool)
    .await?;

    Ok(withdrawals)
}

/// Withdrawals of a user approved since midnight (database time).
pub async fn todays_approved_count<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    client_id: i64,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM withdrawals
        WHERE user_id = $1
          AND client_id = $2
          AND status = $3
          AND updated_at >= date_trunc('day', NOW())
        "#,
    )
    .bind(user_id)
    .bind(client_id)
    .bind(WithdrawalStatus::Approved.code())
    .fetch_one(executor)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn withdrawal(channel: &str) -> Withdrawal {
        Withdrawal {
            id: 1,
            transaction_no: "WD-1".into(),
            user_id: 7,
            client_id: 4,
            username: "ada".into(),
            amount: 10_000,
            wallet: "available".into(),
            channel: channel.into(),
            account_number: Some("0123456789".into()),
            account_name: None,
            bank_code: Some("058".into()),
            bank_name: None,
            withdrawal_code: None,
            status: 0,
            comment: None,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(channel: &str, account_number: Option<&str>) -> WithdrawalRequest {
        WithdrawalRequest {
            user_id: 7,
            client_id: 4,
            amount: 10_000,
            channel: channel.into(),
            account_number: account_number.map(String::from),
            account_name: None,
            bank_code: None,
            bank_name: None,
            field: WalletField::Available,
            provider: None,
            transaction_no: None,
        }
    }

    #[test]
    fn payout_job_follows_channel() {
        assert!(payout_job(&withdrawal("cash"), None).is_none());

        match payout_job(&withdrawal("mobile_money"), None) {
            Some(Job::MobileMoneyPayout(p)) => assert_eq!(p.provider.as_deref(), Some("mobile_money")),
            other => panic!("unexpected job {other:?}"),
        }
        match payout_job(&withdrawal("smileandpay"), None) {
            Some(Job::SmileAndPayPayout(p)) => assert_eq!(p.transaction_no, "WD-1"),
            other => panic!("unexpected job {other:?}"),
        }
        match payout_job(&withdrawal("bank"), Some("flutterwave".into())) {
            Some(Job::WithdrawalRequest(p)) => assert_eq!(p.provider.as_deref(), Some("flutterwave")),
            other => panic!("unexpected job {other:?}"),
        }
    }

    #[test]
    fn non_cash_requires_account() {
        assert!(validate_request(&request("bank", Some("0123456789"))).is_ok());
        assert!(validate_request(&request("cash", None)).is_ok());
        assert!(validate_request(&request("bank", None)).is_err());
        assert!(validate_request(&request("bank", Some("  "))).is_err());
    }

    #[test]
    fn only_cash_balances_are_withdrawable() {
        let mut commission = request("bank", Some("0123456789"));
        commission.field = WalletField::Commission;
        assert!(validate_request(&commission).is_ok());

        for field in [
            WalletField::SportBonus,
            WalletField::CasinoBonus,
            WalletField::VirtualBonus,
            WalletField::Trust,
        ] {
            let mut bonus = request("bank", Some("0123456789"));
            bonus.field = field;
            assert!(matches!(validate_request(&bonus), Err(AppError::InvalidRequest(_))));
        }
    }

    #[test]
    fn withdrawal_codes_are_upper_alphanumeric() {
        let code = generate_withdrawal_code();
        assert_eq!(code.len(), WITHDRAWAL_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn shop_payout_id_is_derived() {
        assert_eq!(shop_payout_transaction_no("WD-9"), "WD-9-SHOP");
    }
}
