//! Payment gateway capability.
//!
//! Every provider (card processors, bank transfer, mobile money) is reached
//! through the `PaymentGateway` trait. Credentials and URLs come from the
//! client's `payment_methods` row, never from constants.
//!
//! `GatewayRegistry` resolves a `(client, provider)` pair to an adapter:
//! a registered adapter for the provider when there is one, otherwise the
//! configuration-driven `HttpGateway`.

pub mod http;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgExecutor;

use crate::error::AppError;
use crate::models::payment_method::PaymentMethod;

pub use http::HttpGateway;

/// Outcome of a payment as reported by a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Success,
    Failed,
    Pending,
}

impl GatewayStatus {
    /// Map a provider's status word onto the three outcomes.
    ///
    /// Anything unrecognised is `Pending`, so an unknown word never moves money.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "succeeded" | "completed" | "paid" | "approved"
            | "charge.success" | "transfer.success" => GatewayStatus::Success,
            "failed" | "failure" | "declined" | "cancelled" | "canceled" | "reversed"
            | "abandoned" | "charge.failed" | "transfer.failed" | "transfer.reversed" => {
                GatewayStatus::Failed
            }
            _ => GatewayStatus::Pending,
        }
    }
}

/// A gateway callback or verification result, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    /// Our transaction_no, echoed back by the gateway
    pub correlation_id: String,
    pub status: GatewayStatus,

    /// Amount in minor units when the gateway reports one
    pub amount: Option<i64>,

    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub transaction_no: String,
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub authorization_url: Option<String>,
    pub gateway_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisbursementRequest {
    pub transaction_no: String,
    pub amount: i64,
    pub currency: String,
    pub account_number: String,
    pub account_name: Option<String>,
    pub bank_code: Option<String>,
    pub narration: String,
}

#[derive(Debug, Clone)]
pub struct DisbursementResult {
    pub gateway_reference: Option<String>,

    /// `Pending` means the gateway accepted the transfer for processing
    pub status: GatewayStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedAccount {
    pub account_number: String,
    pub account_name: String,
    pub bank_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualAccount {
    pub account_no: String,
    pub account_name: String,
    pub bank_name: String,
}

/// Details needed to open a dedicated deposit account for a user.
#[derive(Debug, Clone, Serialize)]
pub struct VirtualAccountRequest {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Capability interface implemented once per provider.
///
/// Implementations only talk to the provider; they never touch balances or
/// the ledger. Settlement is done by the caller with the normalized result.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider slug, for logging
    fn provider(&self) -> &str;

    /// Start a collection; returns the checkout URL when the provider has one.
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInit, AppError>;

    /// Ask the provider for the current state of a collection.
    async fn verify_transaction(&self, transaction_no: &str) -> Result<GatewayEvent, AppError>;

    /// Normalize a verified webhook body.
    fn handle_webhook(&self, body: &Value) -> Result<GatewayEvent, AppError>;

    /// Send money out to a bank or mobile account.
    async fn disburse_funds(
        &self,
        request: &DisbursementRequest,
    ) -> Result<DisbursementResult, AppError>;

    /// Look up the holder name of a destination account.
    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, AppError>;

    async fn create_virtual_account(
        &self,
        _request: &VirtualAccountRequest,
    ) -> Result<VirtualAccount, AppError> {
        Err(AppError::InvalidRequest(format!(
            "{} does not support virtual accounts",
            self.provider()
        )))
    }
}

/// Resolves payment methods to gateway adapters.
pub struct GatewayRegistry {
    client: reqwest::Client,
    adapters: HashMap<String, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    /// Build a registry whose HTTP adapters share one client with `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Gateway(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            adapters: HashMap::new(),
        })
    }

    /// Register a dedicated adapter for a provider slug.
    pub fn with_adapter(mut self, provider: impl Into<String>, adapter: Arc<dyn PaymentGateway>) -> Self {
        self.adapters.insert(provider.into(), adapter);
        self
    }

    /// Adapter for a payment method row.
    pub fn adapter(&self, method: &PaymentMethod) -> Arc<dyn PaymentGateway> {
        match self.adapters.get(&method.provider) {
            Some(adapter) => Arc::clone(adapter),
            None => Arc::new(HttpGateway::new(self.client.clone(), method.clone())),
        }
    }

    /// Active payment method of a client for a provider.
    pub async fn payment_method<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        client_id: i64,
        provider: &str,
    ) -> Result<PaymentMethod, AppError> {
        sqlx::query_as::<_, PaymentMethod>(
            "SELECT * FROM payment_methods WHERE client_id = $1 AND provider = $2 AND is_active = true",
        )
        .bind(client_id)
        .bind(provider)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::PaymentMethodNotFound)
    }

    /// Payment method used for payouts: the named provider when given,
    /// otherwise the client's first active disbursement method.
    pub async fn disbursement_method<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        client_id: i64,
        provider: Option<&str>,
    ) -> Result<PaymentMethod, AppError> {
        sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT * FROM payment_methods
            WHERE client_id = $1
              AND is_active = true
              AND is_disbursement = true
              AND ($2::text IS NULL OR provider = $2)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(client_id)
        .bind(provider)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::PaymentMethodNotFound)
    }
}
