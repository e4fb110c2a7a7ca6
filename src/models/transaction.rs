//! Ledger data models and API request/response types.
//!
//! This module defines:
//! - `LedgerEntry`: one leg (debit or credit) of a money movement
//! - `TransferRecord`: the input of `ledger_service::record_transfer`
//! - Request types for credit, debit, shop deposit and deposit operations
//! - `TransactionResponse`: Response body returned to clients

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::{BalanceAdjustment, PeerTransfer};
use crate::models::wallet::WalletField;

/// Ledger counterparty for system-initiated legs (deposits, payouts, bonuses).
pub const SYSTEM_USER_ID: i64 = 0;

/// Username recorded on system legs.
pub const SYSTEM_USERNAME: &str = "System";

/// Which side of a transfer a leg records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegType {
    Debit,
    Credit,
}

impl LegType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegType::Debit => "debit",
            LegType::Credit => "credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(LegType::Debit),
            "credit" => Some(LegType::Credit),
            _ => None,
        }
    }
}

/// Ledger entry status, stored as `SMALLINT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum TransactionStatus {
    Pending = 0,
    Success = 1,
    Failed = 2,
    Cancelled = 3,
    UserCancelled = 4,
}

impl TransactionStatus {
    #[inline]
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(TransactionStatus::Pending),
            1 => Some(TransactionStatus::Success),
            2 => Some(TransactionStatus::Failed),
            3 => Some(TransactionStatus::Cancelled),
            4 => Some(TransactionStatus::UserCancelled),
            _ => None,
        }
    }

    /// Everything except `Pending` is final.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::UserCancelled => "user_cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents one ledger leg from the `transactions` table.
///
/// # Double entry
///
/// Both legs of a transfer share `transaction_no` (the correlation id).
/// `(transaction_no, tranx_type)` is unique, so a correlation id can never
/// hold more than one debit and one credit.
///
/// # Balance snapshot
///
/// `balance` is the post-mutation balance supplied by the caller. The ledger
/// is an audit trail of outcomes; the wallet row is the source of truth.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: i64,

    /// Correlation id shared by both legs
    pub transaction_no: String,

    pub user_id: i64,
    pub client_id: i64,
    pub username: String,

    /// Amount in minor units, always positive
    pub amount: i64,

    /// "debit" or "credit"
    pub tranx_type: String,

    pub subject: String,
    pub description: String,
    pub channel: String,
    pub source: String,

    /// See `TransactionStatus`
    pub status: i16,

    /// Post-mutation balance of the `wallet` field
    pub balance: i64,

    pub affiliate_id: Option<i64>,

    /// Wallet field tag, see `WalletField::as_str`
    pub wallet: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_code(self.status)
    }

    pub fn leg_type(&self) -> Option<LegType> {
        LegType::parse(&self.tranx_type)
    }

    pub fn wallet_field(&self) -> Option<WalletField> {
        self.wallet.parse().ok()
    }

    /// Unknown status codes are treated as terminal so nothing mutates them.
    pub fn is_terminal(&self) -> bool {
        self.status().is_none_or(|s| s.is_terminal())
    }
}

/// Cold mirror of `LedgerEntry` in `archived_transactions`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ArchivedLedgerEntry {
    pub id: i64,
    pub transaction_no: String,
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,
    pub tranx_type: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

/// One side of a transfer as seen by the ledger recorder.
#[derive(Debug, Clone)]
pub struct TransferParty {
    pub user_id: i64,
    pub username: String,

    /// Post-mutation balance to snapshot on this leg
    pub balance: i64,
}

impl TransferParty {
    pub fn new(user_id: i64, username: impl Into<String>, balance: i64) -> Self {
        Self {
            user_id,
            username: username.into(),
            balance,
        }
    }

    /// The system counterparty; it has no wallet, so its balance is 0.
    pub fn system() -> Self {
        Self::new(SYSTEM_USER_ID, SYSTEM_USERNAME, 0)
    }
}

/// Input of `ledger_service::record_transfer`.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub transaction_no: String,
    pub client_id: i64,
    pub amount: i64,
    pub subject: String,
    pub description: String,
    pub channel: String,
    pub source: String,
    pub from: TransferParty,
    pub to: TransferParty,
    pub status: TransactionStatus,

    /// Wallet field tag of the debit leg, and of the credit leg unless `to_wallet` is set
    pub wallet: WalletField,

    /// Credit leg tag when money moves between two fields
    pub to_wallet: Option<WalletField>,

    pub affiliate_id: Option<i64>,
}

/// Request to credit a wallet field from the system account.
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "amount": 50000,
///   "field": "available",
///   "subject": "Bet Win",
///   "description": "Ticket 88ZX settled",
///   "source": "mobile",
///   "transaction_no": "WIN-88ZX"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,

    #[serde(default = "default_field")]
    pub field: WalletField,

    pub subject: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_source")]
    pub source: String,

    /// Correlation id; generated when absent
    pub transaction_no: Option<String>,
}

/// Request to debit a wallet field to the system account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,

    #[serde(default = "default_field")]
    pub field: WalletField,

    pub subject: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_source")]
    pub source: String,

    pub transaction_no: Option<String>,
}

impl CreditRequest {
    pub fn to_adjustment(&self, transaction_no: String) -> BalanceAdjustment {
        BalanceAdjustment {
            transaction_no,
            user_id: self.user_id,
            client_id: self.client_id,
            amount: self.amount,
            field: self.field,
            subject: self.subject.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
        }
    }
}

impl DebitRequest {
    pub fn to_adjustment(&self, transaction_no: String) -> BalanceAdjustment {
        BalanceAdjustment {
            transaction_no,
            user_id: self.user_id,
            client_id: self.client_id,
            amount: self.amount,
            field: self.field,
            subject: self.subject.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
        }
    }
}

/// Request for a user-to-user movement (shop deposit, agent credit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerTransferRequest {
    pub client_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub amount: i64,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_source")]
    pub source: String,

    pub transaction_no: Option<String>,
}

impl PeerTransferRequest {
    pub fn to_transfer(&self, transaction_no: String) -> PeerTransfer {
        PeerTransfer {
            transaction_no,
            client_id: self.client_id,
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            amount: self.amount,
            description: self.description.clone(),
            source: self.source.clone(),
        }
    }
}

/// Request to start a gateway deposit.
#[derive(Debug, Deserialize)]
pub struct InitiateDepositRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,

    /// Provider slug of the payment method
    pub provider: String,

    pub email: Option<String>,
    pub callback_url: Option<String>,

    #[serde(default = "default_source")]
    pub source: String,
}

/// Response of a started deposit.
#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub transaction_no: String,
    pub provider: String,
    pub amount: i64,

    /// Checkout URL returned by the gateway, when it has one
    pub authorization_url: Option<String>,
    pub status: TransactionStatus,
}

/// Filters for listing deposits.
#[derive(Debug, Deserialize)]
pub struct DepositQuery {
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

fn default_field() -> WalletField {
    WalletField::Available
}

fn default_source() -> String {
    "api".to_string()
}

pub(crate) fn default_limit() -> i64 {
    50
}

/// Response returned for ledger lookups.
///
/// ```json
/// {
///   "transaction_no": "DEP-01J9Z7",
///   "user_id": 1042,
///   "amount": 50000,
///   "tranx_type": "credit",
///   "subject": "Deposit",
///   "channel": "paystack",
///   "status": "success",
///   "balance": 150000,
///   "wallet": "available",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_no: String,
    pub user_id: i64,
    pub username: String,
    pub amount: i64,
    pub tranx_type: String,
    pub subject: String,
    pub description: String,
    pub channel: String,
    pub source: String,
    pub status: Option<TransactionStatus>,
    pub balance: i64,
    pub wallet: String,
    pub created_at: DateTime<Utc>,
}

/// Response of a synchronous credit or debit.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transaction_no: String,

    /// False when the correlation id had already been recorded
    pub applied: bool,
    pub legs: Vec<TransactionResponse>,
}

impl From<LedgerEntry> for TransactionResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            status: entry.status(),
            transaction_no: entry.transaction_no,
            user_id: entry.user_id,
            username: entry.username,
            amount: entry.amount,
            tranx_type: entry.tranx_type,
            subject: entry.subject,
            description: entry.description,
            channel: entry.channel,
            source: entry.source,
            balance: entry.balance,
            wallet: entry.wallet,
            created_at: entry.created_at,
        }
    }
}
