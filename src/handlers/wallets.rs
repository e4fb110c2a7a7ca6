//! Wallet HTTP handlers.
//!
//! - POST /api/v1/wallets - Create the wallet of a new user
//! - GET /api/v1/wallets/{client_id}/{user_id} - Balances
//! - POST /api/v1/wallets/{client_id}/{user_id}/virtual-account - Dedicated deposit account

use crate::{
    db::DbPool,
    error::AppError,
    models::wallet::{BalanceResponse, CreateVirtualAccountRequest, CreateWalletRequest},
    services::wallet_service,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Create a wallet.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "username": "08031234567",
///   "currency": "NGN"
/// }
/// ```
///
/// # Errors
///
/// - 409 `wallet_already_exists` when the user already has a wallet with this client
pub async fn create_wallet(
    State(pool): State<DbPool>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), AppError> {
    let wallet = wallet_service::create_wallet(&pool, &request).await?;

    tracing::info!(
        user_id = wallet.user_id,
        client_id = wallet.client_id,
        "Wallet created"
    );

    Ok((StatusCode::CREATED, Json(wallet.into())))
}

pub async fn get_balance(
    State(pool): State<DbPool>,
    Path((client_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<BalanceResponse>, AppError> {
    let wallet = wallet_service::get_wallet(&pool, user_id, client_id).await?;
    Ok(Json(wallet.into()))
}

/// Provision a virtual account through the named provider.
///
/// Calling it again for a wallet that already has one returns the existing account.
pub async fn create_virtual_account(
    State(state): State<AppState>,
    Path((client_id, user_id)): Path<(i64, i64)>,
    Json(request): Json<CreateVirtualAccountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let wallet = wallet_service::provision_virtual_account(
        &state.pool,
        &state.gateways,
        state.identity.as_ref(),
        user_id,
        client_id,
        &request,
    )
    .await?;

    Ok(Json(wallet.into()))
}
