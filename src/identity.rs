//! Identity service collaborator.
//!
//! Users, client-level withdrawal settings and payment profiles are owned by
//! the identity service. This core only reads them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::AppError;

/// Per-client withdrawal rules.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalSettings {
    #[serde(default)]
    pub allow_auto_disbursement: bool,

    #[serde(default)]
    pub auto_disbursement_min: i64,

    #[serde(default)]
    pub auto_disbursement_max: i64,

    /// Approved withdrawals per user per day still eligible for auto approval
    #[serde(default)]
    pub auto_disbursement_count: i64,

    /// Smallest withdrawal accepted; 0 disables the check
    #[serde(default)]
    pub minimum_withdrawal: i64,

    /// Largest withdrawal accepted; 0 disables the check
    #[serde(default)]
    pub maximum_withdrawal: i64,
}

impl WithdrawalSettings {
    /// Reject amounts outside the client's limits.
    pub fn check_limits(&self, amount: i64) -> Result<(), AppError> {
        if self.minimum_withdrawal > 0 && amount < self.minimum_withdrawal {
            return Err(AppError::InvalidRequest(format!(
                "Minimum withdrawal is {}",
                self.minimum_withdrawal
            )));
        }
        if self.maximum_withdrawal > 0 && amount > self.maximum_withdrawal {
            return Err(AppError::InvalidRequest(format!(
                "Maximum withdrawal is {}",
                self.maximum_withdrawal
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn withdrawal_settings(&self, client_id: i64) -> Result<WithdrawalSettings, AppError>;

    async fn user(&self, client_id: i64, user_id: i64) -> Result<UserProfile, AppError>;
}

/// `IdentityService` over the identity service's REST API.
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Identity(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("GET {} failed: {}", path, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AppError::InvalidRequest(format!(
                "Identity record not found: {}",
                path
            ))),
            status if !status.is_success() => Err(AppError::Identity(format!(
                "GET {} returned {}",
                path,
                status.as_u16()
            ))),
            _ => response
                .json::<T>()
                .await
                .map_err(|e| AppError::Identity(format!("GET {} returned bad JSON: {}", path, e))),
        }
    }
}

#[async_trait]
impl IdentityService for HttpIdentityClient {
    async fn withdrawal_settings(&self, client_id: i64) -> Result<WithdrawalSettings, AppError> {
        self.get(&format!("/clients/{}/withdrawal-settings", client_id))
            .await
    }

    async fn user(&self, client_id: i64, user_id: i64) -> Result<UserProfile, AppError> {
        self.get(&format!("/clients/{}/users/{}", client_id, user_id))
            .await
    }
}
