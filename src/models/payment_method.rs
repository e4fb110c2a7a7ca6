//! Payment method configuration.
//!
//! Owned by the client-configuration boundary; this service only reads it.
//! Credentials and URLs live here as data so gateway adapters carry no
//! embedded constants.

use chrono::{DateTime, Utc};

/// Row of the `payment_methods` table.
///
/// The secret fields are never serialized into API responses.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: i64,
    pub client_id: i64,

    /// Provider slug, e.g. "paystack", "flutterwave", "mobile_money"
    pub provider: String,

    pub display_name: String,
    pub base_url: String,
    pub public_key: Option<String>,
    pub secret_key: String,
    pub merchant_id: Option<String>,

    /// Key used to verify inbound webhooks (HMAC key, shared secret or PEM public key)
    pub webhook_secret: String,

    /// Header carrying the webhook signature
    pub signature_header: String,

    /// See `services::signature::SignatureAlgorithm`
    pub signature_algorithm: String,

    /// Whether this method may be used for payouts
    pub is_disbursement: bool,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
