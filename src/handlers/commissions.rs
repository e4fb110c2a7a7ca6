//! Commission HTTP handlers.
//!
//! Balance changes are queued and applied by the worker pool:
//! - POST /api/v1/commissions/deposit
//! - POST /api/v1/commissions/debit
//! - POST /api/v1/commissions/withdraw - Commission into available balance
//! - POST /api/v1/commissions/{transaction_no}/reverse
//! - POST /api/v1/commissions/withdrawals - Affiliate payout request
//!
//! Admin decision, applied inline:
//! - PUT /api/v1/commissions/withdrawals/{transaction_no}

use crate::{
    error::AppError,
    handlers::jobs::submit,
    models::{
        job::{
            AffiliateWithdrawal, CommissionRequest, CommissionReversal, EnqueuedResponse, Job,
            ReverseCommissionRequest,
        },
        withdrawal::{UpdateWithdrawalRequest, WithdrawalRequest, WithdrawalResponse},
    },
    services::{commission_service, ledger_service},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

type Accepted = (StatusCode, Json<EnqueuedResponse>);

fn transaction_no(requested: &Option<String>, prefix: &str) -> String {
    requested
        .clone()
        .unwrap_or_else(|| ledger_service::new_transaction_no(prefix))
}

/// Queue a commission payment.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": 9,
///   "client_id": 4,
///   "amount": 1500,
///   "affiliate_id": 3,
///   "transaction_no": "COM-77"
/// }
/// ```
///
/// # Response (202)
///
/// ```json
/// { "transaction_no": "COM-77", "job_type": "commission_deposit", "enqueued": true }
/// ```
pub async fn deposit(
    State(state): State<AppState>,
    Json(request): Json<CommissionRequest>,
) -> Result<Accepted, AppError> {
    let no = transaction_no(&request.transaction_no, "COM");
    submit(&state.queue, Job::CommissionDeposit(request.to_commission(no))).await
}

pub async fn debit(
    State(state): State<AppState>,
    Json(request): Json<CommissionRequest>,
) -> Result<Accepted, AppError> {
    let no = transaction_no(&request.transaction_no, "CMD");
    submit(&state.queue, Job::CommissionDebit(request.to_commission(no))).await
}

pub async fn withdraw(
    State(state): State<AppState>,
    Json(request): Json<CommissionRequest>,
) -> Result<Accepted, AppError> {
    let no = transaction_no(&request.transaction_no, "CMW");
    submit(&state.queue, Job::CommissionWithdrawal(request.to_commission(no))).await
}

pub async fn reverse(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
    body: Option<Json<ReverseCommissionRequest>>,
) -> Result<Accepted, AppError> {
    let Json(request) = body.unwrap_or_default();
    submit(
        &state.queue,
        Job::CommissionReverse(CommissionReversal {
            transaction_no,
            reason: request.reason,
        }),
    )
    .await
}

/// Queue an affiliate's request to withdraw commission to a bank or mobile account.
///
/// The worker creates the pending withdrawal and then runs the
/// auto-disbursement check, exactly like a player withdrawal.
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Accepted, AppError> {
    let no = transaction_no(&request.transaction_no, "AFW");
    submit(
        &state.queue,
        Job::AffiliateCommissionWithdrawal(AffiliateWithdrawal::from_request(&request, no)),
    )
    .await
}

pub async fn update_request(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
    Json(request): Json<UpdateWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal = commission_service::update_request(
        &state.pool,
        &state.gateways,
        state.internal_channel(),
        &transaction_no,
        &request,
    )
    .await?;

    Ok(Json(withdrawal.into()))
}
