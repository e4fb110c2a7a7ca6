//! Shared fixtures for database-backed tests.
//!
//! Every test works under its own random client id, so tests can share one
//! database and run in parallel.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;

use wallet_ledger::config::Config;
use wallet_ledger::db::{self, DbPool};
use wallet_ledger::error::AppError;
use wallet_ledger::gateway::{
    DisbursementRequest, DisbursementResult, GatewayEvent, GatewayRegistry, GatewayStatus,
    PaymentGateway, PaymentInit, PaymentRequest, ResolvedAccount, http::normalize_event,
};
use wallet_ledger::identity::{IdentityService, UserProfile, WithdrawalSettings};
use wallet_ledger::models::job::BalanceAdjustment;
use wallet_ledger::models::wallet::{CreateWalletRequest, Wallet, WalletField};
use wallet_ledger::services::{transaction_service, wallet_service};
use wallet_ledger::state::AppState;

pub const INTERNAL: &str = "internal";
pub const MOCK_PROVIDER: &str = "mockpay";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub async fn pool() -> DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .expect("connect to test database");
    db::run_migrations(&pool).await.expect("run migrations");
    pool
}

pub fn unique_client() -> i64 {
    rand::rng().random_range(1_000_000..i64::MAX / 2)
}

pub fn config() -> Config {
    envy::from_iter(vec![
        ("DATABASE_URL".to_string(), "postgres://unused".to_string()),
        ("IDENTITY_SERVICE_URL".to_string(), "http://unused".to_string()),
        ("JOB_MAX_ATTEMPTS".to_string(), "3".to_string()),
    ])
    .expect("test config")
}

/// Wallet with `available` already credited.
pub async fn funded_wallet(pool: &DbPool, client_id: i64, user_id: i64, available: i64) -> Wallet {
    wallet_service::create_wallet(
        pool,
        &CreateWalletRequest {
            user_id,
            client_id,
            username: format!("user-{user_id}"),
            currency: "NGN".to_string(),
        },
    )
    .await
    .expect("create wallet");

    if available > 0 {
        fund(pool, client_id, user_id, WalletField::Available, available).await;
    }

    wallet_service::get_wallet(pool, user_id, client_id)
        .await
        .expect("load wallet")
}

pub async fn fund(pool: &DbPool, client_id: i64, user_id: i64, field: WalletField, amount: i64) {
    transaction_service::credit_user(
        pool,
        &BalanceAdjustment {
            transaction_no: format!("FUND-{}", uuid::Uuid::new_v4().simple()),
            user_id,
            client_id,
            amount,
            field,
            subject: "Funding".to_string(),
            description: String::new(),
            source: "test".to_string(),
        },
        INTERNAL,
    )
    .await
    .expect("fund wallet");
}

pub async fn balance(pool: &DbPool, client_id: i64, user_id: i64, field: WalletField) -> i64 {
    wallet_service::get_wallet(pool, user_id, client_id)
        .await
        .expect("load wallet")
        .balance(field)
}

/// Register the mock provider as an active (disbursing) payment method.
pub async fn payment_method(pool: &DbPool, client_id: i64, algorithm: &str) {
    sqlx::query(
        r#"
        INSERT INTO payment_methods (
            client_id, provider, display_name, base_url, secret_key,
            webhook_secret, signature_header, signature_algorithm, is_disbursement
        )
        VALUES ($1, $2, 'Mock Pay', 'http://127.0.0.1:9', 'sk_test', $3, 'x-signature', $4, true)
        "#,
    )
    .bind(client_id)
    .bind(MOCK_PROVIDER)
    .bind(WEBHOOK_SECRET)
    .bind(algorithm)
    .execute(pool)
    .await
    .expect("insert payment method");
}

pub fn state(pool: DbPool, gateway: Arc<MockGateway>, identity: MockIdentity) -> AppState {
    let gateways = GatewayRegistry::new(std::time::Duration::from_secs(1))
        .expect("registry")
        .with_adapter(MOCK_PROVIDER, gateway);
    AppState::new(pool, gateways, Arc::new(identity), config())
}

/// Gateway answering every disbursement with a fixed status.
pub struct MockGateway {
    pub status: GatewayStatus,
    pub fail: bool,
    pub disbursed: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new(status: GatewayStatus) -> Arc<Self> {
        Arc::new(Self {
            status,
            fail: false,
            disbursed: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            status: GatewayStatus::Pending,
            fail: true,
            disbursed: Mutex::new(Vec::new()),
        })
    }

    pub fn disbursed(&self) -> Vec<String> {
        self.disbursed.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn provider(&self) -> &str {
        MOCK_PROVIDER
    }

    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInit, AppError> {
        if self.fail {
            return Err(AppError::Gateway("mock unavailable".into()));
        }
        Ok(PaymentInit {
            authorization_url: Some(format!("https://pay.test/{}", request.transaction_no)),
            gateway_reference: None,
        })
    }

    async fn verify_transaction(&self, transaction_no: &str) -> Result<GatewayEvent, AppError> {
        Ok(GatewayEvent {
            correlation_id: transaction_no.to_string(),
            status: self.status,
            amount: None,
            raw: Value::Null,
        })
    }

    fn handle_webhook(&self, body: &Value) -> Result<GatewayEvent, AppError> {
        normalize_event(body)
    }

    async fn disburse_funds(&self, request: &DisbursementRequest) -> Result<DisbursementResult, AppError> {
        if self.fail {
            return Err(AppError::Gateway("mock unavailable".into()));
        }
        if let Ok(mut disbursed) = self.disbursed.lock() {
            disbursed.push(request.transaction_no.clone());
        }
        Ok(DisbursementResult {
            gateway_reference: Some(format!("MOCK-{}", request.transaction_no)),
            status: self.status,
        })
    }

    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, AppError> {
        Ok(ResolvedAccount {
            account_number: account_number.to_string(),
            account_name: "TEST ACCOUNT".to_string(),
            bank_code: Some(bank_code.to_string()),
        })
    }
}

/// Identity service with fixed withdrawal settings.
#[derive(Clone, Default)]
pub struct MockIdentity {
    pub settings: WithdrawalSettings,
}

impl MockIdentity {
    pub fn auto_disbursing(min: i64, max: i64, count: i64) -> Self {
        Self {
            settings: WithdrawalSettings {
                allow_auto_disbursement: true,
                auto_disbursement_min: min,
                auto_disbursement_max: max,
                auto_disbursement_count: count,
                ..WithdrawalSettings::default()
            },
        }
    }
}

#[async_trait]
impl IdentityService for MockIdentity {
    async fn withdrawal_settings(&self, _client_id: i64) -> Result<WithdrawalSettings, AppError> {
        Ok(self.settings.clone())
    }

    async fn user(&self, _client_id: i64, user_id: i64) -> Result<UserProfile, AppError> {
        Ok(UserProfile {
            id: user_id,
            username: format!("user-{user_id}"),
            email: Some(format!("user-{user_id}@example.com")),
            phone: None,
            role: None,
        })
    }
}
