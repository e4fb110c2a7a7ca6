//! Withdrawal HTTP handlers.
//!
//! - POST /api/v1/withdrawals - Request a payout
//! - GET /api/v1/withdrawals - List withdrawals of a client
//! - GET /api/v1/withdrawals/{transaction_no} - One withdrawal
//! - PUT /api/v1/withdrawals/{transaction_no} - Admin approve / process / cancel
//! - POST /api/v1/withdrawals/{transaction_no}/cancel - Requester cancels
//! - POST /api/v1/withdrawals/{transaction_no}/shop-payout - Cash paid out at a shop

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        job::ShopWithdrawal,
        withdrawal::{
            CancelWithdrawalRequest, ShopPayoutRequest, UpdateWithdrawalRequest, WithdrawalQuery,
            WithdrawalRequest, WithdrawalResponse,
        },
    },
    services::withdrawal_service,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Request a withdrawal.
///
/// The amount leaves the wallet immediately and the withdrawal starts
/// pending. Non-cash withdrawals also queue an auto-disbursement check.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "amount": 250000,
///   "channel": "bank",
///   "account_number": "0123456789",
///   "account_name": "ADA OKAFOR",
///   "bank_code": "058"
/// }
/// ```
///
/// # Errors
///
/// - 400 when the amount is outside the client's withdrawal limits
/// - 422 `insufficient_funds`
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), AppError> {
    let withdrawal = withdrawal_service::request_withdrawal(
        &state.pool,
        &state.queue,
        state.identity.as_ref(),
        state.internal_channel(),
        &request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(withdrawal.into())))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Query(query): Query<WithdrawalQuery>,
) -> Result<Json<Vec<WithdrawalResponse>>, AppError> {
    let withdrawals = withdrawal_service::list_withdrawals(&state.pool, &query).await?;
    Ok(Json(withdrawals.into_iter().map(Into::into).collect()))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal = withdrawal_service::get_withdrawal(&state.pool, &transaction_no).await?;
    Ok(Json(withdrawal.into()))
}

/// Admin decision on a pending withdrawal.
///
/// `approve` pays out through the gateway and only then marks the
/// withdrawal approved; if the gateway fails the withdrawal stays pending
/// and the error is returned. `process` and `cancel` refund the wallet.
///
/// # Errors
///
/// - 409 `invalid_state_transition` when the withdrawal is already decided
/// - 409 `disbursement_pending` when the gateway has not confirmed the payout
/// - 502 `gateway_error` when the disbursement fails
pub async fn update_withdrawal(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthContext>,
    Path(transaction_no): Path<String>,
    Json(request): Json<UpdateWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    tracing::info!(
        transaction_no = %transaction_no,
        action = ?request.action,
        updated_by = request.updated_by,
        caller = %caller.client_name,
        api_key_id = %caller.api_key_id,
        "Withdrawal decision received"
    );

    let withdrawal = withdrawal_service::update_withdrawal(
        &state.pool,
        &state.gateways,
        state.internal_channel(),
        &transaction_no,
        &request,
    )
    .await?;

    Ok(Json(withdrawal.into()))
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
    Json(request): Json<CancelWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal = withdrawal_service::cancel_withdrawal(
        &state.pool,
        state.internal_channel(),
        &transaction_no,
        &request,
    )
    .await?;

    Ok(Json(withdrawal.into()))
}

/// A shop pays a cash withdrawal over the counter against the player's code.
pub async fn shop_payout(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
    Json(request): Json<ShopPayoutRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal = withdrawal_service::shop_payout(
        &state.pool,
        state.internal_channel(),
        &ShopWithdrawal {
            transaction_no,
            shop_user_id: request.shop_user_id,
            withdrawal_code: request.withdrawal_code,
        },
    )
    .await?;

    Ok(Json(withdrawal.into()))
}
