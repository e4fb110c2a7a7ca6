//! Job handler registry.
//!
//! `JobProcessor::process` matches on every `Job` variant, so a new job type
//! cannot be added without a handler. Each handler goes through a service
//! that checks the correlation id before mutating anything, which is what
//! makes at-least-once delivery safe.

use thiserror::Error;

use crate::error::AppError;
use crate::models::job::{Job, JobRecord};
use crate::models::wallet::WalletField;
use crate::services::{commission_service, transaction_service, withdrawal_service};
use crate::state::AppState;

pub const SHOP_DEPOSIT_SUBJECT: &str = "Shop Deposit";
pub const CREDIT_PLAYER_SUBJECT: &str = "Credit Player";

/// How a failed job should be treated.
#[derive(Debug, Error)]
pub enum JobError {
    /// Transient failure; run again after backoff
    #[error("{0}")]
    Retry(AppError),

    /// Permanent failure; dead-letter now
    #[error("{0}")]
    SkipRetry(String),
}

impl From<AppError> for JobError {
    fn from(error: AppError) -> Self {
        if error.is_retryable() {
            return JobError::Retry(error);
        }
        match error {
            AppError::InvalidRequest(detail) => JobError::SkipRetry(format!("Invalid request: {detail}")),
            other => JobError::SkipRetry(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct JobProcessor {
    state: AppState,
}

impl JobProcessor {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Decode a claimed row and run it.
    ///
    /// A payload that does not decode will never decode, so it is not retried.
    pub async fn run(&self, record: &JobRecord) -> Result<(), JobError> {
        let job = Job::from_envelope(&record.job_type, &record.payload).map_err(|e| {
            JobError::SkipRetry(format!("Undecodable {} payload: {}", record.job_type, e))
        })?;
        self.process(job).await
    }

    pub async fn process(&self, job: Job) -> Result<(), JobError> {
        let state = &self.state;
        let pool = &state.pool;
        let channel = state.internal_channel();

        match job {
            Job::ShopDeposit(transfer) => {
                transaction_service::peer_transfer(
                    pool,
                    &transfer,
                    WalletField::Available,
                    WalletField::Available,
                    SHOP_DEPOSIT_SUBJECT,
                    channel,
                )
                .await?;
            }
            Job::CreditPlayer(transfer) => {
                transaction_service::peer_transfer(
                    pool,
                    &transfer,
                    WalletField::Trust,
                    WalletField::Available,
                    CREDIT_PLAYER_SUBJECT,
                    channel,
                )
                .await?;
            }
            Job::Credit(adjustment) => {
                transaction_service::credit_user(pool, &adjustment, channel).await?;
            }
            Job::DebitUser(adjustment) => {
                transaction_service::debit_user(pool, &adjustment, channel).await?;
            }
            Job::WithdrawalRequest(payout)
            | Job::MobileMoneyPayout(payout)
            | Job::SmileAndPayPayout(payout) => {
                withdrawal_service::auto_disburse(
                    pool,
                    &state.gateways,
                    state.identity.as_ref(),
                    &payout.transaction_no,
                    payout.provider.as_deref(),
                )
                .await?;
            }
            Job::ShopWithdrawal(payout) => {
                withdrawal_service::shop_payout(pool, channel, &payout).await?;
            }
            Job::CommissionDeposit(commission) => {
                commission_service::deposit(pool, &commission, channel).await?;
            }
            Job::CommissionDebit(commission) => {
                commission_service::debit(pool, &commission, channel).await?;
            }
            Job::CommissionWithdrawal(commission) => {
                commission_service::withdraw_to_available(pool, &commission, channel).await?;
            }
            Job::CommissionReverse(reversal) => {
                commission_service::reverse(pool, &reversal, channel).await?;
            }
            Job::AffiliateCommissionWithdrawal(request) => {
                withdrawal_service::create_commission_withdrawal(
                    pool,
                    &state.gateways,
                    state.identity.as_ref(),
                    channel,
                    &request,
                )
                .await?;
            }
        }

        Ok(())
    }
}
