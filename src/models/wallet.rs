//! Wallet data models and API request/response types.
//!
//! This module defines:
//! - `Wallet`: Database entity, one per (user, client)
//! - `WalletField`: the parallel balance columns of a wallet
//! - Request and response bodies for the wallet endpoints

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a wallet record from the database.
///
/// # Database Table
///
/// Maps to the `wallets` table. Each wallet:
/// - Is unique per `(user_id, client_id)`
/// - Holds several balance columns, all stored in minor units
///
/// # Balance Storage
///
/// Balances are `i64` minor units (kobo, cents). Every column carries a
/// `CHECK (>= 0)` constraint, and application code only ever changes them
/// through `wallet_service::increment_balance` / `decrement_balance`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub client_id: i64,
    pub username: String,
    pub available_balance: i64,
    pub trust_balance: i64,
    pub sport_bonus_balance: i64,
    pub virtual_bonus_balance: i64,
    pub casino_bonus_balance: i64,
    pub commission_balance: i64,
    pub currency: String,
    pub virtual_account_no: Option<String>,
    pub virtual_account_name: Option<String>,
    pub virtual_bank_name: Option<String>,
    pub virtual_account_provider: Option<String>,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Current value of one balance column.
    pub fn balance(&self, field: WalletField) -> i64 {
        match field {
            WalletField::Available => self.available_balance,
            WalletField::Trust => self.trust_balance,
            WalletField::SportBonus => self.sport_bonus_balance,
            WalletField::VirtualBonus => self.virtual_bonus_balance,
            WalletField::CasinoBonus => self.casino_bonus_balance,
            WalletField::Commission => self.commission_balance,
        }
    }
}

/// One of the parallel balance columns of a wallet.
///
/// The `column()` name is interpolated into SQL, so it must only ever come
/// from this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletField {
    Available,
    Trust,
    SportBonus,
    VirtualBonus,
    CasinoBonus,
    Commission,
}

impl WalletField {
    /// Database column backing this field.
    pub fn column(&self) -> &'static str {
        match self {
            WalletField::Available => "available_balance",
            WalletField::Trust => "trust_balance",
            WalletField::SportBonus => "sport_bonus_balance",
            WalletField::VirtualBonus => "virtual_bonus_balance",
            WalletField::CasinoBonus => "casino_bonus_balance",
            WalletField::Commission => "commission_balance",
        }
    }

    /// Tag stored on ledger legs (`transactions.wallet`).
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletField::Available => "available",
            WalletField::Trust => "trust",
            WalletField::SportBonus => "sport_bonus",
            WalletField::VirtualBonus => "virtual_bonus",
            WalletField::CasinoBonus => "casino_bonus",
            WalletField::Commission => "commission",
        }
    }
}

impl fmt::Display for WalletField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(WalletField::Available),
            "trust" => Ok(WalletField::Trust),
            "sport_bonus" => Ok(WalletField::SportBonus),
            "virtual_bonus" => Ok(WalletField::VirtualBonus),
            "casino_bonus" => Ok(WalletField::CasinoBonus),
            "commission" => Ok(WalletField::Commission),
            other => Err(format!("unknown wallet field: {other}")),
        }
    }
}

/// Request body for creating a wallet at account onboarding.
///
/// ```json
/// {
///   "user_id": 1042,
///   "client_id": 4,
///   "username": "08031234567",
///   "currency": "NGN"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub username: String,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "NGN".to_string()
}

/// Request body for provisioning a virtual (dedicated deposit) account.
#[derive(Debug, Deserialize)]
pub struct CreateVirtualAccountRequest {
    /// Provider slug of the payment method to provision with
    pub provider: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Response body for balance lookups.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub client_id: i64,
    pub username: String,
    pub currency: String,
    pub available_balance: i64,
    pub trust_balance: i64,
    pub sport_bonus_balance: i64,
    pub virtual_bonus_balance: i64,
    pub casino_bonus_balance: i64,
    pub commission_balance: i64,
    pub virtual_account_no: Option<String>,
    pub virtual_account_name: Option<String>,
    pub virtual_bank_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for BalanceResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            user_id: wallet.user_id,
            client_id: wallet.client_id,
            username: wallet.username,
            currency: wallet.currency,
            available_balance: wallet.available_balance,
            trust_balance: wallet.trust_balance,
            sport_bonus_balance: wallet.sport_bonus_balance,
            virtual_bonus_balance: wallet.virtual_bonus_balance,
            casino_bonus_balance: wallet.casino_bonus_balance,
            commission_balance: wallet.commission_balance,
            virtual_account_no: wallet.virtual_account_no,
            virtual_account_name: wallet.virtual_account_name,
            virtual_bank_name: wallet.virtual_bank_name,
            updated_at: wallet.updated_at,
        }
    }
}
