//! Deposit HTTP handlers.
//!
//! - POST /api/v1/deposits - Start a gateway deposit
//! - GET /api/v1/deposits - List deposits of a client
//! - POST /api/v1/deposits/{transaction_no}/verify - Ask the gateway and settle

use crate::{
    error::AppError,
    models::transaction::{DepositQuery, DepositResponse, InitiateDepositRequest, TransactionResponse},
    services::{settlement_service, settlement_service::SettlementOutcome, transaction_service},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Start a deposit.
///
/// Records a pending credit and returns the gateway's checkout URL. The
/// balance only moves once the gateway confirms, by webhook or by `verify`.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "amount": 50000,
///   "provider": "paystack",
///   "email": "player@example.com"
/// }
/// ```
pub async fn initiate_deposit(
    State(state): State<AppState>,
    Json(request): Json<InitiateDepositRequest>,
) -> Result<(StatusCode, Json<DepositResponse>), AppError> {
    let deposit = transaction_service::initiate_deposit(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        &request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(deposit)))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    Query(query): Query<DepositQuery>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let deposits = transaction_service::list_deposits(&state.pool, &query).await?;
    Ok(Json(deposits.into_iter().map(Into::into).collect()))
}

/// Re-query the gateway for a deposit whose webhook never arrived.
///
/// Settles exactly like a webhook would, so calling it after the webhook
/// was processed reports `duplicate` and changes nothing.
pub async fn verify_deposit(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
) -> Result<Json<SettlementOutcome>, AppError> {
    let outcome =
        settlement_service::verify_deposit(&state.pool, &state.gateways, &transaction_no).await?;
    Ok(Json(outcome))
}
