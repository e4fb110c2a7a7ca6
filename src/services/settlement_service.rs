//! Webhook settlement - gateway-confirmed deposits.
//!
//! A deposit is recorded as two pending legs when it is initiated. The
//! gateway later confirms it, either by webhook or when we ask it
//! (`verify_deposit`). Both paths end in `settle`, which is idempotent:
//! only a pending credit leg is ever acted on.
//!
//! Every inbound callback, accepted or not, is appended to `callback_logs`.

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::PgExecutor;

use crate::db::DbPool;
use crate::error::AppError;
use crate::gateway::{GatewayEvent, GatewayRegistry, GatewayStatus};
use crate::models::callback_log::NewCallbackLog;
use crate::models::transaction::{LegType, SYSTEM_USER_ID, TransactionStatus};
use crate::models::wallet::WalletField;
use crate::services::signature::{self, SignatureAlgorithm};
use crate::services::transaction_service::DEPOSIT_SUBJECT;
use crate::services::{ledger_service, wallet_service};

/// What `settle` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// No ledger entry carries the correlation id
    NotFound,
    /// Already settled earlier; nothing changed
    Duplicate,
    /// Credited; `balance` is the new balance of the wallet field
    Settled { balance: i64 },
    /// Marked failed without touching the balance
    Failed,
    /// The gateway has no final answer yet
    StillPending,
}

impl SettlementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementOutcome::NotFound => "not_found",
            SettlementOutcome::Duplicate => "duplicate",
            SettlementOutcome::Settled { .. } => "success",
            SettlementOutcome::Failed => "failed",
            SettlementOutcome::StillPending => "pending",
        }
    }
}

/// Apply a normalized gateway event to its pending deposit.
///
/// # Process
///
/// 1. Lock the credit leg of the correlation id; anything but a user
///    deposit is reported as not found
/// 2. Terminal leg: duplicate, no mutation
/// 3. Gateway success: increment the wallet field, flip both legs to
///    success, store the new balance on the credit leg
/// 4. Gateway failure (or an amount that disagrees with ours): flip both
///    legs to failed
pub async fn settle(pool: &DbPool, event: &GatewayEvent) -> Result<SettlementOutcome, AppError> {
    let transaction_no = event.correlation_id.as_str();
    let mut tx = pool.begin().await?;

    let Some(credit) = ledger_service::lock_leg(&mut tx, transaction_no, LegType::Credit).await? else {
        tracing::warn!(transaction_no, "Callback for unknown transaction");
        return Ok(SettlementOutcome::NotFound);
    };

    // Withdrawal and transfer legs share the correlation-id space; only a
    // deposit into a user wallet is ever settled here
    if credit.subject != DEPOSIT_SUBJECT || credit.user_id == SYSTEM_USER_ID {
        tracing::warn!(transaction_no, subject = %credit.subject, "Callback for a non-deposit entry, ignoring");
        return Ok(SettlementOutcome::NotFound);
    }

    if credit.is_terminal() {
        tracing::info!(transaction_no, status = credit.status, "Callback for settled transaction, ignoring");
        return Ok(SettlementOutcome::Duplicate);
    }

    let amount_mismatch = event.amount.is_some_and(|amount| amount != credit.amount);
    let status = if amount_mismatch {
        tracing::warn!(
            transaction_no,
            expected = credit.amount,
            reported = ?event.amount,
            "Gateway amount does not match the ledger"
        );
        GatewayStatus::Failed
    } else {
        event.status
    };

    let outcome = match status {
        GatewayStatus::Pending => return Ok(SettlementOutcome::StillPending),
        GatewayStatus::Success => {
            let field = credit.wallet_field().unwrap_or(WalletField::Available);
            let balance = wallet_service::increment_balance(
                &mut tx,
                credit.user_id,
                credit.client_id,
                field,
                credit.amount,
            )
            .await?;
            ledger_service::update_pending_status(&mut tx, transaction_no, TransactionStatus::Success)
                .await?;
            ledger_service::set_balance(&mut tx, credit.id, balance).await?;
            SettlementOutcome::Settled { balance }
        }
        GatewayStatus::Failed => {
            ledger_service::update_pending_status(&mut tx, transaction_no, TransactionStatus::Failed)
                .await?;
            SettlementOutcome::Failed
        }
    };

    tx.commit().await?;

    tracing::info!(
        transaction_no,
        user_id = credit.user_id,
        amount = credit.amount,
        outcome = outcome.as_str(),
        "Deposit settled"
    );

    Ok(outcome)
}

/// Handle an inbound gateway webhook.
///
/// # Process
///
/// 1. Load the client's payment method for the provider
/// 2. Verify the signature header with the method's algorithm and secret;
///    reject on any failure
/// 3. Normalize the body through the provider's adapter
/// 4. Settle, then log the attempt whatever the result
///
/// # Errors
///
/// - `PaymentMethodNotFound`: unknown (client, provider)
/// - `InvalidSignature`: missing, malformed or mismatched signature
/// - `InvalidRequest`: body without a transaction reference
pub async fn handle_webhook(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    client_id: i64,
    provider: &str,
    headers: &HeaderMap,
    raw_body: &[u8],
) -> Result<SettlementOutcome, AppError> {
    let body: Value = serde_json::from_slice(raw_body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw_body).into_owned()));
    let log = NewCallbackLog::new(client_id, provider, body.clone());

    let method = match gateways.payment_method(pool, client_id, provider).await {
        Ok(method) => method,
        Err(e) => {
            record_callback(pool, &log.with_outcome(None, "unknown_provider", json!({}))).await?;
            return Err(e);
        }
    };

    let header_signature = headers
        .get(method.signature_header.as_str())
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let verified = match method.signature_algorithm.parse::<SignatureAlgorithm>() {
        Ok(algorithm) => signature::verify(raw_body, header_signature, &method.webhook_secret, algorithm),
        Err(e) => {
            tracing::error!(provider, client_id, error = %e, "Payment method has no usable signature algorithm");
            false
        }
    };

    if !verified {
        tracing::warn!(provider, client_id, "Webhook signature rejected");
        record_callback(
            pool,
            &log.with_outcome(None, "rejected", json!({ "error": "invalid_signature" })),
        )
        .await?;
        return Err(AppError::InvalidSignature);
    }

    let event = match gateways.adapter(&method).handle_webhook(&body) {
        Ok(event) => event,
        Err(e) => {
            record_callback(pool, &log.with_outcome(None, "unrecognized", json!({ "error": e.to_string() })))
                .await?;
            return Err(e);
        }
    };

    let outcome = match settle(pool, &event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(provider, client_id, transaction_no = %event.correlation_id, error = %e, "Settlement failed");
            record_callback(
                pool,
                &log.with_outcome(
                    Some(event.correlation_id.clone()),
                    "error",
                    json!({ "error": e.to_string() }),
                ),
            )
            .await?;
            return Err(e);
        }
    };
    record_callback(
        pool,
        &log.with_outcome(
            Some(event.correlation_id.clone()),
            outcome.as_str(),
            serde_json::to_value(outcome).unwrap_or(Value::Null),
        ),
    )
    .await?;

    Ok(outcome)
}

/// Ask the gateway about a pending deposit and settle with its answer.
pub async fn verify_deposit(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    transaction_no: &str,
) -> Result<SettlementOutcome, AppError> {
    let legs = ledger_service::find_legs(pool, transaction_no).await?;
    let credit = legs
        .iter()
        .find(|leg| leg.leg_type() == Some(LegType::Credit))
        .ok_or(AppError::TransactionNotFound)?;

    if credit.is_terminal() {
        return Ok(SettlementOutcome::Duplicate);
    }

    // Deposit legs carry the provider slug as their channel
    let method = gateways
        .payment_method(pool, credit.client_id, &credit.channel)
        .await?;
    let event = gateways
        .adapter(&method)
        .verify_transaction(transaction_no)
        .await?;

    let outcome = settle(pool, &event).await?;
    record_callback(
        pool,
        &NewCallbackLog::new(credit.client_id, &method.provider, json!({ "verify": transaction_no }))
            .with_outcome(
                Some(transaction_no.to_string()),
                outcome.as_str(),
                event.raw.clone(),
            ),
    )
    .await?;

    Ok(outcome)
}

/// Append one callback attempt to the audit log.
pub async fn record_callback<'e>(
    executor: impl PgExecutor<'e>,
    log: &NewCallbackLog,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO callback_logs (client_id, provider, transaction_no, request, response, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(log.client_id)
    .bind(&log.provider)
    .bind(&log.transaction_no)
    .bind(&log.request)
    .bind(&log.response)
    .bind(&log.status)
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(SettlementOutcome::Settled { balance: 150 }.as_str(), "success");
        assert_eq!(SettlementOutcome::Duplicate.as_str(), "duplicate");
        assert_eq!(SettlementOutcome::NotFound.as_str(), "not_found");
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let value = serde_json::to_value(SettlementOutcome::Settled { balance: 150 }).unwrap();
        assert_eq!(value, json!({ "outcome": "settled", "balance": 150 }));
        let value = serde_json::to_value(SettlementOutcome::Failed).unwrap();
        assert_eq!(value, json!({ "outcome": "failed" }));
    }
}
