//! Queued job models.
//!
//! Producers build a `Job`, the queue stores it as a `JobEnvelope`
//! (`{type, payload, idempotencyKey}`) and workers decode it back. The enum
//! is the registry of every job the processor must handle, so adding a
//! variant without a handler does not compile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::models::wallet::WalletField;
use crate::models::withdrawal::WithdrawalRequest;

/// Queue tier. Higher tiers are always claimed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Priority {
    Low = 1,
    Default = 2,
    Critical = 3,
}

impl Priority {
    #[inline]
    pub fn weight(&self) -> i16 {
        *self as i16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::Critical => "critical",
        }
    }
}

/// Lifecycle of a row in the `jobs` table.
pub mod status {
    pub const QUEUED: &str = "queued";
    pub const RUNNING: &str = "running";
    pub const COMPLETED: &str = "completed";
    pub const DEAD: &str = "dead";
}

/// System credit or debit of one wallet field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub transaction_no: String,
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,
    pub field: WalletField,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub source: String,
}

/// Movement between two users of the same client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerTransfer {
    pub transaction_no: String,
    pub client_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    pub source: String,
}

/// Auto-disbursement evaluation of an existing pending withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub transaction_no: String,
    pub provider: Option<String>,
}

/// Cash payout of a pending withdrawal at a shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopWithdrawal {
    pub transaction_no: String,
    pub shop_user_id: i64,
    pub withdrawal_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub transaction_no: String,
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    pub affiliate_id: Option<i64>,
}

/// Request body for the commission endpoints.
#[derive(Debug, Deserialize)]
pub struct CommissionRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    pub affiliate_id: Option<i64>,

    /// Correlation id; generated when absent
    pub transaction_no: Option<String>,
}

impl CommissionRequest {
    pub fn to_commission(&self, transaction_no: String) -> Commission {
        Commission {
            transaction_no,
            user_id: self.user_id,
            client_id: self.client_id,
            amount: self.amount,
            description: self.description.clone(),
            affiliate_id: self.affiliate_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseCommissionRequest {
    #[serde(default)]
    pub reason: String,
}

/// Reversal of an earlier `CommissionDeposit`, addressed by its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionReversal {
    pub transaction_no: String,
    #[serde(default)]
    pub reason: String,
}

/// Affiliate payout of commission balance to a bank or mobile account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateWithdrawal {
    pub transaction_no: String,
    pub user_id: i64,
    pub client_id: i64,
    pub amount: i64,
    pub channel: String,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub provider: Option<String>,
}

impl AffiliateWithdrawal {
    pub fn from_request(request: &WithdrawalRequest, transaction_no: String) -> Self {
        Self {
            transaction_no,
            user_id: request.user_id,
            client_id: request.client_id,
            amount: request.amount,
            channel: request.channel.clone(),
            account_number: request.account_number.clone(),
            account_name: request.account_name.clone(),
            bank_code: request.bank_code.clone(),
            bank_name: request.bank_name.clone(),
            provider: request.provider.clone(),
        }
    }

    pub fn to_request(&self) -> WithdrawalRequest {
        WithdrawalRequest {
            user_id: self.user_id,
            client_id: self.client_id,
            amount: self.amount,
            channel: self.channel.clone(),
            account_number: self.account_number.clone(),
            account_name: self.account_name.clone(),
            bank_code: self.bank_code.clone(),
            bank_name: self.bank_name.clone(),
            field: WalletField::Commission,
            provider: self.provider.clone(),
            transaction_no: Some(self.transaction_no.clone()),
        }
    }
}

/// Every job the worker pool knows how to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Job {
    ShopDeposit(PeerTransfer),
    Credit(BalanceAdjustment),
    CreditPlayer(PeerTransfer),
    DebitUser(BalanceAdjustment),
    WithdrawalRequest(Payout),
    ShopWithdrawal(ShopWithdrawal),
    MobileMoneyPayout(Payout),
    SmileAndPayPayout(Payout),
    CommissionDeposit(Commission),
    CommissionDebit(Commission),
    CommissionWithdrawal(Commission),
    CommissionReverse(CommissionReversal),
    AffiliateCommissionWithdrawal(AffiliateWithdrawal),
}

impl Job {
    /// Wire name, identical to the serde tag.
    pub fn job_type(&self) -> &'static str {
        match self {
            Job::ShopDeposit(_) => "shop_deposit",
            Job::Credit(_) => "credit",
            Job::CreditPlayer(_) => "credit_player",
            Job::DebitUser(_) => "debit_user",
            Job::WithdrawalRequest(_) => "withdrawal_request",
            Job::ShopWithdrawal(_) => "shop_withdrawal",
            Job::MobileMoneyPayout(_) => "mobile_money_payout",
            Job::SmileAndPayPayout(_) => "smile_and_pay_payout",
            Job::CommissionDeposit(_) => "commission_deposit",
            Job::CommissionDebit(_) => "commission_debit",
            Job::CommissionWithdrawal(_) => "commission_withdrawal",
            Job::CommissionReverse(_) => "commission_reverse",
            Job::AffiliateCommissionWithdrawal(_) => "affiliate_commission_withdrawal",
        }
    }

    /// Correlation id of the business event behind this job.
    pub fn transaction_no(&self) -> &str {
        match self {
            Job::ShopDeposit(p) | Job::CreditPlayer(p) => &p.transaction_no,
            Job::Credit(p) | Job::DebitUser(p) => &p.transaction_no,
            Job::WithdrawalRequest(p) | Job::MobileMoneyPayout(p) | Job::SmileAndPayPayout(p) => {
                &p.transaction_no
            }
            Job::ShopWithdrawal(p) => &p.transaction_no,
            Job::CommissionDeposit(p) | Job::CommissionDebit(p) | Job::CommissionWithdrawal(p) => {
                &p.transaction_no
            }
            Job::CommissionReverse(p) => &p.transaction_no,
            Job::AffiliateCommissionWithdrawal(p) => &p.transaction_no,
        }
    }

    /// Deduplication key: the same business event always maps to the same key.
    ///
    /// e.g. `shop-deposit:SD-01J9Z7`
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}:{}",
            self.job_type().replace('_', "-"),
            self.transaction_no()
        )
    }

    pub fn priority(&self) -> Priority {
        match self {
            Job::WithdrawalRequest(_)
            | Job::ShopWithdrawal(_)
            | Job::MobileMoneyPayout(_)
            | Job::SmileAndPayPayout(_)
            | Job::AffiliateCommissionWithdrawal(_) => Priority::Critical,
            Job::ShopDeposit(_) | Job::Credit(_) | Job::CreditPlayer(_) | Job::DebitUser(_) => {
                Priority::Default
            }
            Job::CommissionDeposit(_)
            | Job::CommissionDebit(_)
            | Job::CommissionWithdrawal(_)
            | Job::CommissionReverse(_) => Priority::Low,
        }
    }

    pub fn to_envelope(&self) -> Result<JobEnvelope, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        let payload = value
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(JobEnvelope {
            job_type: self.job_type().to_string(),
            payload,
            idempotency_key: self.idempotency_key(),
        })
    }

    /// Decode a stored envelope. Unknown types and malformed payloads fail.
    pub fn from_envelope(job_type: &str, payload: &Value) -> Result<Job, serde_json::Error> {
        serde_json::from_value(json!({ "type": job_type, "payload": payload }))
    }
}

/// Wire contract between producers and consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Value,

    /// Derived from the payload when omitted
    #[serde(rename = "idempotencyKey", default)]
    pub idempotency_key: String,
}

/// Row of the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub job_type: String,
    pub payload: Value,
    pub idempotency_key: String,
    pub priority: i16,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response for endpoints that enqueue work instead of doing it inline.
#[derive(Debug, Serialize)]
pub struct EnqueuedResponse {
    pub transaction_no: String,
    pub job_type: &'static str,

    /// False when an identical job was already queued
    pub enqueued: bool,
}
