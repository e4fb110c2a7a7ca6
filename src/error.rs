//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Infrastructure Errors**: database, payment gateway, identity service.
///   These are transient and the job pipeline retries them.
/// - **Authentication Errors**: invalid API key or webhook signature
/// - **Resource Errors**: wallet, ledger entry, withdrawal or payment method not found
/// - **Business Logic Errors**: insufficient funds, invalid state transitions
/// - **Validation Errors**: invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Webhook signature did not verify against the configured secret.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Wallet not found")]
    WalletNotFound,

    /// A wallet already exists for this (user, client) pair.
    #[error("Wallet already exists")]
    WalletAlreadyExists,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Withdrawal not found")]
    WithdrawalNotFound,

    #[error("Payment method not found")]
    PaymentMethodNotFound,

    /// The decrement would drive a wallet field negative.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Attempted a withdrawal transition that the state machine forbids.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Request body or parameters are invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// The payment gateway failed or reported an error.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// The identity service failed or returned an unexpected response.
    #[error("Identity service error: {0}")]
    Identity(String),

    /// The gateway accepted a payout but has not confirmed it.
    ///
    /// The withdrawal stays pending; repeating the call could pay out twice,
    /// so this is never retried automatically.
    #[error("Disbursement not confirmed by {0}")]
    DisbursementPending(String),
}

impl AppError {
    /// Whether a job that failed with this error may succeed if retried.
    ///
    /// Validation failures are final; only infrastructure errors are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Gateway(_) | AppError::Identity(_)
        )
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidApiKey`, `InvalidSignature` → 401 Unauthorized
/// - `*NotFound` → 404 Not Found
/// - `WalletAlreadyExists`, `InvalidStateTransition`, `DisbursementPending` → 409 Conflict
/// - `InsufficientFunds` → 422 Unprocessable Entity
/// - `InvalidRequest` → 400 Bad Request
/// - `Gateway`, `Identity` → 502 Bad Gateway
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::WalletNotFound => {
                (StatusCode::NOT_FOUND, "wallet_not_found", self.to_string())
            }
            AppError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                self.to_string(),
            ),
            AppError::WithdrawalNotFound => (
                StatusCode::NOT_FOUND,
                "withdrawal_not_found",
                self.to_string(),
            ),
            AppError::PaymentMethodNotFound => (
                StatusCode::NOT_FOUND,
                "payment_method_not_found",
                self.to_string(),
            ),
            AppError::WalletAlreadyExists => (
                StatusCode::CONFLICT,
                "wallet_already_exists",
                self.to_string(),
            ),
            AppError::InvalidStateTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_state_transition",
                self.to_string(),
            ),
            AppError::DisbursementPending(_) => (
                StatusCode::CONFLICT,
                "disbursement_pending",
                self.to_string(),
            ),
            AppError::InsufficientFunds => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Gateway(ref msg) => (StatusCode::BAD_GATEWAY, "gateway_error", msg.clone()),
            AppError::Identity(_) => (
                StatusCode::BAD_GATEWAY,
                "identity_error",
                "Identity service unavailable".to_string(),
            ),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_infrastructure_errors_are_retryable() {
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(AppError::Gateway("timeout".into()).is_retryable());
        assert!(AppError::Identity("503".into()).is_retryable());

        assert!(!AppError::InsufficientFunds.is_retryable());
        assert!(!AppError::WalletNotFound.is_retryable());
        assert!(!AppError::InvalidRequest("bad".into()).is_retryable());
        assert!(!AppError::DisbursementPending("mockpay".into()).is_retryable());
        assert!(
            !AppError::InvalidStateTransition {
                from: "approved".into(),
                to: "cancelled".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (AppError::WithdrawalNotFound, StatusCode::NOT_FOUND),
            (AppError::InsufficientFunds, StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::WalletAlreadyExists, StatusCode::CONFLICT),
            (AppError::DisbursementPending("mockpay".into()), StatusCode::CONFLICT),
            (AppError::Gateway("down".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::Database(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
