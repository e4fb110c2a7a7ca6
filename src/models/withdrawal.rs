//! Withdrawal models and the withdrawal state machine.
//!
//! A withdrawal starts `Pending` and moves exactly once to one of four
//! terminal states:
//!
//! ```text
//!            ┌──> Approved       (gateway disbursed / shop paid cash)
//! Pending ───┼──> Processed      (admin processed, amount refunded)
//!            ├──> Cancelled      (admin rejected, or shop cancelled)
//!            └──> UserCancelled  (player cancelled)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::transaction::{TransactionStatus, default_limit};
use crate::models::wallet::WalletField;

/// Channel for withdrawals paid out in cash at a shop.
pub const CASH_CHANNEL: &str = "cash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum WithdrawalStatus {
    Pending = 0,
    Approved = 1,
    Processed = 2,
    Cancelled = 3,
    UserCancelled = 4,
}

impl WithdrawalStatus {
    #[inline]
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(WithdrawalStatus::Pending),
            1 => Some(WithdrawalStatus::Approved),
            2 => Some(WithdrawalStatus::Processed),
            3 => Some(WithdrawalStatus::Cancelled),
            4 => Some(WithdrawalStatus::UserCancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Processed => "processed",
            WithdrawalStatus::Cancelled => "cancelled",
            WithdrawalStatus::UserCancelled => "user_cancelled",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }

    /// Only `Pending -> terminal` is a valid move.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(self, WithdrawalStatus::Pending) && next.is_terminal()
    }

    /// Validate a transition, returning the target state.
    pub fn transition(&self, next: WithdrawalStatus) -> Result<WithdrawalStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Status the linked ledger legs move to in lockstep.
    ///
    /// `Processed` refunds the amount, so the original debit did not go out
    /// and is recorded as failed.
    pub fn ledger_status(&self) -> TransactionStatus {
        match self {
            WithdrawalStatus::Pending => TransactionStatus::Pending,
            WithdrawalStatus::Approved => TransactionStatus::Success,
            WithdrawalStatus::Processed => TransactionStatus::Failed,
            WithdrawalStatus::Cancelled => TransactionStatus::Cancelled,
            WithdrawalStatus::UserCancelled => TransactionStatus::UserCancelled,
        }
    }

    /// Whether reaching this state returns the amount to the wallet.
    pub fn refunds(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Processed
                | WithdrawalStatus::Cancelled
                | WithdrawalStatus::UserCancelled
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is cancelling their own withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Shop,
    Player,
}

impl RequesterRole {
    pub fn cancel_status(&self) -> WithdrawalStatus {
        match self {
            RequesterRole::Shop => WithdrawalStatus::Cancelled,
            RequesterRole::Player => WithdrawalStatus::UserCancelled,
        }
    }
}

/// Admin decision on a pending withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalAction {
    Approve,
    Reject,
    Process,
}

impl WithdrawalAction {
    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            WithdrawalAction::Approve => WithdrawalStatus::Approved,
            WithdrawalAction::Reject => WithdrawalStatus::Cancelled,
            WithdrawalAction::Process => WithdrawalStatus::Processed,
        }
    }
}

/// Represents a withdrawal record from the `withdrawals` table.
///
/// Linked to its ledger legs by `transaction_no`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Withdrawal {
    pub id: i64,
    pub transaction_no: String,
    pub user_id: i64,
    pub client_id: i64,
    pub username: String,
    pub amount: i64,

    /// Wallet field the amount was taken from (and is refunded to)
    pub wallet: String,

    pub channel: String,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,

    /// Code a player presents at a shop for cash withdrawals
    pub withdrawal_code: Option<String>,

    pub status: i16,
    pub comment: Option<String>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Unknown codes surface as a failed transition rather than a panic.
    pub fn status(&self) -> Result<WithdrawalStatus, AppError> {
        WithdrawalStatus::from_code(self.status).ok_or_else(|| AppError::InvalidStateTransition {
            from: format!("unknown({})", self.status),
            to: "any".to_string(),
        })
    }

    pub fn wallet_field(&self) -> Result<WalletField, AppError> {
        self.wallet.parse().map_err(AppError::InvalidRequest)
    }

    pub fn is_cash(&self) -> bool {
        self.channel == CASH_CHANNEL
    }
}

/// Saved payout destination of a user.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WithdrawalAccount {
    pub id: i64,
    pub user_id: i64,
    pub client_id: i64,
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/withdrawals`.
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "amount": 250000,
///   "channel": "bank",
///   "account_number": "0123456789",
///   "bank_code": "058"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,
    pub channel: String,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,

    /// `available` for players, `commission` for agents and affiliates
    #[serde(default = "default_withdrawal_field")]
    pub field: WalletField,

    /// Disbursing provider; the client's default disbursement method when absent
    pub provider: Option<String>,

    /// Correlation id; generated when absent
    pub transaction_no: Option<String>,
}

fn default_withdrawal_field() -> WalletField {
    WalletField::Available
}

/// Request body for `PUT /api/v1/withdrawals/{transaction_no}`.
#[derive(Debug, Deserialize)]
pub struct UpdateWithdrawalRequest {
    pub action: WithdrawalAction,
    pub comment: Option<String>,
    pub updated_by: i64,
    pub provider: Option<String>,
}

/// Request body for `POST /api/v1/withdrawals/{transaction_no}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelWithdrawalRequest {
    pub user_id: i64,
    pub role: RequesterRole,
    pub comment: Option<String>,
}

/// Request body for `POST /api/v1/withdrawals/{transaction_no}/shop-payout`.
#[derive(Debug, Deserialize)]
pub struct ShopPayoutRequest {
    pub shop_user_id: i64,
    pub withdrawal_code: String,
}

/// Filters for listing withdrawals.
#[derive(Debug, Deserialize)]
pub struct WithdrawalQuery {
    pub client_id: i64,
    pub user_id: Option<i64>,
    pub status: Option<i16>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,

    #[serde(default = "default_limit")]
    pub limit: i64,

    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub transaction_no: String,
    pub user_id: i64,
    pub username: String,
    pub amount: i64,
    pub wallet: String,
    pub channel: String,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_name: Option<String>,
    pub withdrawal_code: Option<String>,
    pub status: Option<WithdrawalStatus>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(w: Withdrawal) -> Self {
        Self {
            status: WithdrawalStatus::from_code(w.status),
            transaction_no: w.transaction_no,
            user_id: w.user_id,
            username: w.username,
            amount: w.amount,
            wallet: w.wallet,
            channel: w.channel,
            account_number: w.account_number,
            account_name: w.account_name,
            bank_name: w.bank_name,
            withdrawal_code: w.withdrawal_code,
            comment: w.comment,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}
