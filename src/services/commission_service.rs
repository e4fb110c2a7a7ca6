//! Commission operations for agents and affiliates.
//!
//! Commission is its own wallet field. It is paid in by the system, can be
//! clawed back, moved into the available balance, or reversed entry by entry.

use crate::db::DbPool;
use crate::error::AppError;
use crate::gateway::GatewayRegistry;
use crate::models::job::{Commission, CommissionReversal};
use crate::models::transaction::{LegType, TransactionStatus};
use crate::models::wallet::WalletField;
use crate::models::withdrawal::{UpdateWithdrawalRequest, Withdrawal};
use crate::services::ledger_service::{self, TransferOutcome};
use crate::services::transaction_service::{self, Movement, Side};
use crate::services::withdrawal_service;

pub const COMMISSION_SUBJECT: &str = "Commission";
pub const COMMISSION_DEBIT_SUBJECT: &str = "Commission Debit";
pub const COMMISSION_WITHDRAWAL_SUBJECT: &str = "Commission Withdrawal";
pub const COMMISSION_REVERSAL_SUBJECT: &str = "Commission Reversal";

const SOURCE: &str = "commission";

fn commission_side(user_id: i64) -> Side {
    Side::User {
        user_id,
        field: WalletField::Commission,
    }
}

/// Pay commission from the system into a user's commission balance.
pub async fn deposit(pool: &DbPool, commission: &Commission, channel: &str) -> Result<TransferOutcome, AppError> {
    transaction_service::apply_movement(
        pool,
        &Movement {
            transaction_no: commission.transaction_no.clone(),
            client_id: commission.client_id,
            amount: commission.amount,
            subject: COMMISSION_SUBJECT.to_string(),
            description: commission.description.clone(),
            channel: channel.to_string(),
            source: SOURCE.to_string(),
            from: Side::System,
            to: commission_side(commission.user_id),
            affiliate_id: commission.affiliate_id,
        },
    )
    .await
}

/// Take commission back to the system.
pub async fn debit(pool: &DbPool, commission: &Commission, channel: &str) -> Result<TransferOutcome, AppError> {
    transaction_service::apply_movement(
        pool,
        &Movement {
            transaction_no: commission.transaction_no.clone(),
            client_id: commission.client_id,
            amount: commission.amount,
            subject: COMMISSION_DEBIT_SUBJECT.to_string(),
            description: commission.description.clone(),
            channel: channel.to_string(),
            source: SOURCE.to_string(),
            from: commission_side(commission.user_id),
            to: Side::System,
            affiliate_id: commission.affiliate_id,
        },
    )
    .await
}

/// Move a user's commission into their own available balance.
pub async fn withdraw_to_available(
    pool: &DbPool,
    commission: &Commission,
    channel: &str,
) -> Result<TransferOutcome, AppError> {
    transaction_service::apply_movement(
        pool,
        &Movement {
            transaction_no: commission.transaction_no.clone(),
            client_id: commission.client_id,
            amount: commission.amount,
            subject: COMMISSION_WITHDRAWAL_SUBJECT.to_string(),
            description: commission.description.clone(),
            channel: channel.to_string(),
            source: SOURCE.to_string(),
            from: commission_side(commission.user_id),
            to: Side::User {
                user_id: commission.user_id,
                field: WalletField::Available,
            },
            affiliate_id: commission.affiliate_id,
        },
    )
    .await
}

/// Reverse a successful commission deposit.
///
/// The reversal is recorded under `{transaction_no}-REV`, so reversing the
/// same deposit twice is a no-op.
///
/// # Errors
///
/// - `TransactionNotFound`: no commission credit exists under that id
/// - `InvalidRequest`: the original entry did not succeed
/// - `InsufficientFunds`: the commission has already been spent
pub async fn reverse(
    pool: &DbPool,
    reversal: &CommissionReversal,
    channel: &str,
) -> Result<TransferOutcome, AppError> {
    let legs = ledger_service::find_legs(pool, &reversal.transaction_no).await?;
    let credit = legs
        .iter()
        .find(|leg| leg.leg_type() == Some(LegType::Credit) && leg.subject == COMMISSION_SUBJECT)
        .ok_or(AppError::TransactionNotFound)?;

    if credit.status() != Some(TransactionStatus::Success) {
        return Err(AppError::InvalidRequest(format!(
            "Commission {} is not settled and cannot be reversed",
            reversal.transaction_no
        )));
    }

    let description = if reversal.reason.is_empty() {
        format!("Reversal of {}", reversal.transaction_no)
    } else {
        reversal.reason.clone()
    };

    transaction_service::apply_movement(
        pool,
        &Movement {
            transaction_no: ledger_service::reversal_transaction_no(&reversal.transaction_no),
            client_id: credit.client_id,
            amount: credit.amount,
            subject: COMMISSION_REVERSAL_SUBJECT.to_string(),
            description,
            channel: channel.to_string(),
            source: SOURCE.to_string(),
            from: commission_side(credit.user_id),
            to: Side::System,
            affiliate_id: credit.affiliate_id,
        },
    )
    .await
}

/// Admin decision on an affiliate's commission withdrawal request.
///
/// Only withdrawals drawn from the commission balance are addressable here;
/// anything else reads as not found.
pub async fn update_request(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    internal_channel: &str,
    transaction_no: &str,
    request: &UpdateWithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    let withdrawal = withdrawal_service::get_withdrawal(pool, transaction_no).await?;
    if !is_commission_request(&withdrawal) {
        return Err(AppError::WithdrawalNotFound);
    }

    withdrawal_service::update_withdrawal(pool, gateways, internal_channel, transaction_no, request).await
}

fn is_commission_request(withdrawal: &Withdrawal) -> bool {
    matches!(withdrawal.wallet_field(), Ok(WalletField::Commission))
}
