//! Inbound gateway webhooks.
//!
//! - POST /webhooks/{provider}/{client_id}
//!
//! Public route: gateways cannot send our API keys. The raw body is taken
//! as bytes because signatures are computed over the exact bytes sent.

use crate::{
    error::AppError,
    services::{settlement_service, settlement_service::SettlementOutcome},
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

/// Verify and settle a gateway event.
///
/// # Response (200 OK)
///
/// ```json
/// { "outcome": "settled", "balance": 150000 }
/// ```
///
/// Redelivered events answer `{"outcome": "duplicate"}` with 200 so the
/// gateway stops retrying.
///
/// # Errors
///
/// - 401 `invalid_signature` when the signature does not verify
/// - 404 `payment_method_not_found` for an unknown provider
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path((provider, client_id)): Path<(String, i64)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SettlementOutcome>, AppError> {
    let outcome = settlement_service::handle_webhook(
        &state.pool,
        &state.gateways,
        client_id,
        &provider,
        &headers,
        &body,
    )
    .await?;

    tracing::info!(%provider, client_id, outcome = outcome.as_str(), "Webhook handled");

    Ok(Json(outcome))
}
