//! Transaction HTTP handlers.
//!
//! - POST /api/v1/transactions/credit - Credit a wallet field from the system
//! - POST /api/v1/transactions/debit - Debit a wallet field to the system
//! - POST /api/v1/transactions/shop-deposit - Queue a shop-to-player deposit
//! - POST /api/v1/transactions/credit-player - Queue an agent-to-player credit
//! - GET /api/v1/transactions/{transaction_no} - Both legs of a transfer

use crate::{
    error::AppError,
    handlers::jobs::submit,
    models::{
        job::{EnqueuedResponse, Job},
        transaction::{
            CreditRequest, DebitRequest, PeerTransferRequest, TransactionResponse, TransferResponse,
        },
    },
    services::{ledger_service, ledger_service::TransferOutcome, transaction_service},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

fn respond(outcome: TransferOutcome, transaction_no: String) -> (StatusCode, Json<TransferResponse>) {
    let status = if outcome.applied {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(TransferResponse {
            transaction_no,
            applied: outcome.applied,
            legs: outcome.legs.into_iter().map(Into::into).collect(),
        }),
    )
}

/// Credit a wallet field.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "amount": 50000,
///   "field": "available",
///   "subject": "Bet Win",
///   "transaction_no": "WIN-88ZX"
/// }
/// ```
///
/// # Response
///
/// 201 with both legs when applied; 200 with the existing legs when the
/// `transaction_no` was already recorded.
pub async fn create_credit(
    State(state): State<AppState>,
    Json(request): Json<CreditRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let transaction_no = request
        .transaction_no
        .clone()
        .unwrap_or_else(|| ledger_service::new_transaction_no("CR"));

    let outcome = transaction_service::credit_user(
        &state.pool,
        &request.to_adjustment(transaction_no.clone()),
        state.internal_channel(),
    )
    .await?;

    Ok(respond(outcome, transaction_no))
}

/// Debit a wallet field.
///
/// # Errors
///
/// - 422 `insufficient_funds` when the field holds less than `amount`
pub async fn create_debit(
    State(state): State<AppState>,
    Json(request): Json<DebitRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let transaction_no = request
        .transaction_no
        .clone()
        .unwrap_or_else(|| ledger_service::new_transaction_no("DR"));

    let outcome = transaction_service::debit_user(
        &state.pool,
        &request.to_adjustment(transaction_no.clone()),
        state.internal_channel(),
    )
    .await?;

    Ok(respond(outcome, transaction_no))
}

pub async fn create_shop_deposit(
    State(state): State<AppState>,
    Json(request): Json<PeerTransferRequest>,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    let transaction_no = request
        .transaction_no
        .clone()
        .unwrap_or_else(|| ledger_service::new_transaction_no("SD"));

    submit(&state.queue, Job::ShopDeposit(request.to_transfer(transaction_no))).await
}

pub async fn create_credit_player(
    State(state): State<AppState>,
    Json(request): Json<PeerTransferRequest>,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    let transaction_no = request
        .transaction_no
        .clone()
        .unwrap_or_else(|| ledger_service::new_transaction_no("CP"));

    submit(&state.queue, Job::CreditPlayer(request.to_transfer(transaction_no))).await
}

/// Both legs recorded under a correlation id.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_no): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let legs = transaction_service::get_transaction(&state.pool, &transaction_no).await?;
    Ok(Json(legs.into_iter().map(Into::into).collect()))
}
