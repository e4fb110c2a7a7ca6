//! Wallet balance mutator.
//!
//! Balances change only through `increment_balance` and `decrement_balance`.
//! Both are a single `UPDATE ... SET col = col ± $n` statement, so the
//! database serializes concurrent writers on the wallet row; nothing here
//! reads a balance, computes a new one in memory and writes it back.

use sqlx::{PgConnection, PgExecutor};

use crate::db::DbPool;
use crate::error::AppError;
use crate::gateway::{GatewayRegistry, VirtualAccountRequest};
use crate::identity::IdentityService;
use crate::models::wallet::{CreateVirtualAccountRequest, CreateWalletRequest, Wallet, WalletField};

/// Create the wallet of a newly onboarded user.
///
/// # Errors
///
/// - `WalletAlreadyExists`: the (user, client) pair already has a wallet
/// - `InvalidRequest`: empty username
pub async fn create_wallet(pool: &DbPool, request: &CreateWalletRequest) -> Result<Wallet, AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "username must not be empty".to_string(),
        ));
    }

    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
        INSERT INTO wallets (user_id, client_id, username, currency)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, client_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(request.user_id)
    .bind(request.client_id)
    .bind(&request.username)
    .bind(&request.currency)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::WalletAlreadyExists)?;

    tracing::info!(
        user_id = wallet.user_id,
        client_id = wallet.client_id,
        "Wallet created"
    );

    Ok(wallet)
}

/// Fetch the wallet of a (user, client) pair.
pub async fn get_wallet<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    client_id: i64,
) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 AND client_id = $2")
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::WalletNotFound)
}

/// Add `amount` to one wallet field and return the new balance.
///
/// # Errors
///
/// - `InvalidRequest`: amount is zero or negative
/// - `WalletNotFound`: no wallet for (user, client)
pub async fn increment_balance(
    conn: &mut PgConnection,
    user_id: i64,
    client_id: i64,
    field: WalletField,
    amount: i64,
) -> Result<i64, AppError> {
    validate_amount(amount)?;

    // `column()` comes from a closed enum, never from input
    let sql = format!(
        "UPDATE wallets SET {col} = {col} + $1, updated_at = NOW() \
         WHERE user_id = $2 AND client_id = $3 RETURNING {col}",
        col = field.column()
    );

    sqlx::query_scalar::<_, i64>(&sql)
        .bind(amount)
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::WalletNotFound)
}

/// Subtract `amount` from one wallet field and return the new balance.
///
/// The affordability check is part of the `WHERE` clause, so two concurrent
/// decrements that can only be afforded once cannot both succeed.
///
/// # Errors
///
/// - `InvalidRequest`: amount is zero or negative
/// - `InsufficientFunds`: the field holds less than `amount`
/// - `WalletNotFound`: no wallet for (user, client)
pub async fn decrement_balance(
    conn: &mut PgConnection,
    user_id: i64,
    client_id: i64,
    field: WalletField,
    amount: i64,
) -> Result<i64, AppError> {
    validate_amount(amount)?;

    let sql = format!(
        "UPDATE wallets SET {col} = {col} - $1, updated_at = NOW() \
         WHERE user_id = $2 AND client_id = $3 AND {col} >= $1 RETURNING {col}",
        col = field.column()
    );

    let balance = sqlx::query_scalar::<_, i64>(&sql)
        .bind(amount)
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&mut *conn)
        .await?;

    match balance {
        Some(balance) => Ok(balance),
        None => {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM wallets WHERE user_id = $1 AND client_id = $2)",
            )
            .bind(user_id)
            .bind(client_id)
            .fetch_one(&mut *conn)
            .await?;

            if exists {
                Err(AppError::InsufficientFunds)
            } else {
                Err(AppError::WalletNotFound)
            }
        }
    }
}

/// Store virtual-account metadata returned by a gateway.
pub async fn set_virtual_account(
    pool: &DbPool,
    user_id: i64,
    client_id: i64,
    provider: &str,
    account_no: &str,
    account_name: &str,
    bank_name: &str,
) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET virtual_account_no = $1,
            virtual_account_name = $2,
            virtual_bank_name = $3,
            virtual_account_provider = $4,
            updated_at = NOW()
        WHERE user_id = $5 AND client_id = $6
        RETURNING *
        "#,
    )
    .bind(account_no)
    .bind(account_name)
    .bind(bank_name)
    .bind(provider)
    .bind(user_id)
    .bind(client_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::WalletNotFound)
}

/// Open a dedicated deposit account for a wallet with the given provider.
///
/// A wallet that already has one is returned unchanged. Missing contact
/// details are filled from the identity service.
pub async fn provision_virtual_account(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    identity: &dyn IdentityService,
    user_id: i64,
    client_id: i64,
    request: &CreateVirtualAccountRequest,
) -> Result<Wallet, AppError> {
    let wallet = get_wallet(pool, user_id, client_id).await?;
    if wallet.virtual_account_no.is_some() {
        return Ok(wallet);
    }

    let method = gateways.payment_method(pool, client_id, &request.provider).await?;

    let (email, phone) = match &request.email {
        Some(email) => (email.clone(), request.phone.clone()),
        None => {
            let profile = identity.user(client_id, user_id).await?;
            let email = profile.email.ok_or_else(|| {
                AppError::InvalidRequest("An email is required for a virtual account".to_string())
            })?;
            (email, request.phone.clone().or(profile.phone))
        }
    };

    let account = gateways
        .adapter(&method)
        .create_virtual_account(&VirtualAccountRequest {
            user_id,
            username: wallet.username.clone(),
            email,
            phone,
        })
        .await?;

    tracing::info!(user_id, client_id, provider = %method.provider, "Virtual account created");

    set_virtual_account(
        pool,
        user_id,
        client_id,
        &method.provider,
        &account.account_no,
        &account.account_name,
        &account.bank_name,
    )
    .await
}

fn validate_amount(amount: i64) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert!(matches!(validate_amount(0), Err(AppError::InvalidRequest(_))));
        assert!(matches!(validate_amount(-5), Err(AppError::InvalidRequest(_))));
        assert!(validate_amount(1).is_ok());
    }
}
