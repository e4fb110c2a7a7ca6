//! Transaction service - money movements between wallets and the system.
//!
//! This service handles:
//! - System credits and debits of one wallet field
//! - User-to-user movements (shop deposits, agent credits)
//! - Gateway deposits (pending legs, settled later by `settlement_service`)
//! - Ledger lookups
//!
//! # Atomicity Guarantees
//!
//! Every movement is one PostgreSQL transaction: the wallet adjustments and
//! both ledger legs commit together or not at all.
//!
//! # Idempotency
//!
//! A movement is keyed by its correlation id. If legs already exist for it
//! the call is a no-op that returns those legs; a concurrent redelivery that
//! races past that check hits the `(transaction_no, tranx_type)` unique
//! index and is rolled back the same way.

use sqlx::{PgConnection, Postgres, Transaction};

use crate::db::DbPool;
use crate::error::AppError;
use crate::gateway::{GatewayRegistry, PaymentRequest};
use crate::identity::IdentityService;
use crate::models::job::{BalanceAdjustment, PeerTransfer};
use crate::models::transaction::{
    DepositQuery, DepositResponse, InitiateDepositRequest, LedgerEntry, LegType, SYSTEM_USER_ID,
    TransactionStatus, TransferParty, TransferRecord,
};
use crate::models::wallet::WalletField;
use crate::services::ledger_service::{self, TransferOutcome};
use crate::services::wallet_service;

/// Subject of the legs recorded for gateway deposits.
pub const DEPOSIT_SUBJECT: &str = "Deposit";

const MAX_PAGE_SIZE: i64 = 200;

/// One end of a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The platform itself; has no wallet
    System,
    User { user_id: i64, field: WalletField },
}

impl Side {
    fn user_id(&self) -> i64 {
        match self {
            Side::System => SYSTEM_USER_ID,
            Side::User { user_id, .. } => *user_id,
        }
    }

    fn field(&self) -> Option<WalletField> {
        match self {
            Side::System => None,
            Side::User { field, .. } => Some(*field),
        }
    }
}

/// A balanced movement of `amount` from one side to the other.
#[derive(Debug, Clone)]
pub struct Movement {
    pub transaction_no: String,
    pub client_id: i64,
    pub amount: i64,
    pub subject: String,
    pub description: String,
    pub channel: String,
    pub source: String,
    pub from: Side,
    pub to: Side,
    pub affiliate_id: Option<i64>,
}

impl Movement {
    /// Whether recorded legs describe this same movement.
    fn is_recorded_by(&self, legs: &[LedgerEntry]) -> bool {
        legs.iter().all(|leg| {
            let party = match leg.leg_type() {
                Some(LegType::Debit) => self.from.user_id(),
                Some(LegType::Credit) => self.to.user_id(),
                None => return false,
            };
            leg.user_id == party
                && leg.client_id == self.client_id
                && leg.amount == self.amount
                && leg.subject == self.subject
        })
    }
}

/// Legs already recorded under the movement's id, or `InvalidRequest` when
/// they belong to a different movement.
fn replayed(movement: &Movement, legs: Vec<LedgerEntry>) -> Result<TransferOutcome, AppError> {
    if !movement.is_recorded_by(&legs) {
        tracing::warn!(
            transaction_no = %movement.transaction_no,
            subject = %movement.subject,
            "Correlation id already used by a different movement"
        );
        return Err(AppError::InvalidRequest(format!(
            "transaction_no {} is already used by a different operation",
            movement.transaction_no
        )));
    }
    Ok(TransferOutcome::duplicate(legs))
}

/// Apply a movement exactly once.
///
/// # Process
///
/// 1. Return the existing legs if the correlation id is already recorded
///    for the same parties, amount and subject
/// 2. Decrement the `from` wallet field, increment the `to` wallet field
/// 3. Record the debit and credit legs with the resulting balances
/// 4. Commit
///
/// # Errors
///
/// - `InsufficientFunds`: the `from` field cannot cover the amount
/// - `WalletNotFound`: a user side has no wallet for the client
/// - `InvalidRequest`: non-positive amount, a movement onto itself, or a
///   correlation id already recorded for a different movement
pub async fn apply_movement(pool: &DbPool, movement: &Movement) -> Result<TransferOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let existing = ledger_service::find_legs(&mut *tx, &movement.transaction_no).await?;
    if !existing.is_empty() {
        tracing::info!(
            transaction_no = %movement.transaction_no,
            "Movement already recorded, skipping"
        );
        return replayed(movement, existing);
    }

    let result = apply_in(&mut *tx, movement).await;
    finish(pool, tx, movement, result).await
}

/// Apply a movement inside a caller-owned store transaction.
///
/// No idempotency check is done here; the caller owns that.
pub async fn apply_in(
    conn: &mut PgConnection,
    movement: &Movement,
) -> Result<(LedgerEntry, LedgerEntry), AppError> {
    if movement.amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    if movement.from == movement.to || (movement.from.field().is_none() && movement.to.field().is_none()) {
        return Err(AppError::InvalidRequest(
            "Source and destination must differ".to_string(),
        ));
    }

    // Wallet rows are locked in user id order so opposite transfers cannot deadlock
    let (from, to) = if movement.to.user_id() < movement.from.user_id() {
        let to = credit_side(conn, movement.client_id, movement.to, movement.amount).await?;
        let from = debit_side(conn, movement.client_id, movement.from, movement.amount).await?;
        (from, to)
    } else {
        let from = debit_side(conn, movement.client_id, movement.from, movement.amount).await?;
        let to = credit_side(conn, movement.client_id, movement.to, movement.amount).await?;
        (from, to)
    };

    let wallet = movement
        .from
        .field()
        .or(movement.to.field())
        .unwrap_or(WalletField::Available);
    let to_wallet = match (movement.from.field(), movement.to.field()) {
        (Some(a), Some(b)) if a != b => Some(b),
        _ => None,
    };

    ledger_service::record_transfer(
        conn,
        &TransferRecord {
            transaction_no: movement.transaction_no.clone(),
            client_id: movement.client_id,
            amount: movement.amount,
            subject: movement.subject.clone(),
            description: movement.description.clone(),
            channel: movement.channel.clone(),
            source: movement.source.clone(),
            from,
            to,
            status: TransactionStatus::Success,
            wallet,
            to_wallet,
            affiliate_id: movement.affiliate_id,
        },
    )
    .await
}

async fn debit_side(
    conn: &mut PgConnection,
    client_id: i64,
    side: Side,
    amount: i64,
) -> Result<TransferParty, AppError> {
    match side {
        Side::System => Ok(TransferParty::system()),
        Side::User { user_id, field } => {
            let wallet = wallet_service::get_wallet(&mut *conn, user_id, client_id).await?;
            let balance =
                wallet_service::decrement_balance(conn, user_id, client_id, field, amount).await?;
            Ok(TransferParty::new(user_id, wallet.username, balance))
        }
    }
}

async fn credit_side(
    conn: &mut PgConnection,
    client_id: i64,
    side: Side,
    amount: i64,
) -> Result<TransferParty, AppError> {
    match side {
        Side::System => Ok(TransferParty::system()),
        Side::User { user_id, field } => {
            let wallet = wallet_service::get_wallet(&mut *conn, user_id, client_id).await?;
            let balance =
                wallet_service::increment_balance(conn, user_id, client_id, field, amount).await?;
            Ok(TransferParty::new(user_id, wallet.username, balance))
        }
    }
}

/// Commit a recorded movement, or turn a lost race into a duplicate outcome.
async fn finish(
    pool: &DbPool,
    tx: Transaction<'_, Postgres>,
    movement: &Movement,
    result: Result<(LedgerEntry, LedgerEntry), AppError>,
) -> Result<TransferOutcome, AppError> {
    let transaction_no = movement.transaction_no.as_str();
    match result {
        Ok((debit, credit)) => {
            tx.commit().await?;
            tracing::info!(transaction_no, amount = debit.amount, "Movement recorded");
            Ok(TransferOutcome::applied(vec![debit, credit]))
        }
        Err(e) if ledger_service::is_duplicate(&e) => {
            tx.rollback().await?;
            tracing::info!(transaction_no, "Concurrent delivery already recorded, rolled back");
            let legs = ledger_service::find_legs(pool, transaction_no).await?;
            replayed(movement, legs)
        }
        Err(e) => Err(e),
    }
}

/// Credit a wallet field from the system account.
pub async fn credit_user(
    pool: &DbPool,
    adjustment: &BalanceAdjustment,
    channel: &str,
) -> Result<TransferOutcome, AppError> {
    apply_movement(
        pool,
        &Movement {
            transaction_no: adjustment.transaction_no.clone(),
            client_id: adjustment.client_id,
            amount: adjustment.amount,
            subject: adjustment.subject.clone(),
            description: adjustment.description.clone(),
            channel: channel.to_string(),
            source: adjustment.source.clone(),
            from: Side::System,
            to: Side::User {
                user_id: adjustment.user_id,
                field: adjustment.field,
            },
            affiliate_id: None,
        },
    )
    .await
}

/// Debit a wallet field to the system account.
pub async fn debit_user(
    pool: &DbPool,
    adjustment: &BalanceAdjustment,
    channel: &str,
) -> Result<TransferOutcome, AppError> {
    apply_movement(
        pool,
        &Movement {
            transaction_no: adjustment.transaction_no.clone(),
            client_id: adjustment.client_id,
            amount: adjustment.amount,
            subject: adjustment.subject.clone(),
            description: adjustment.description.clone(),
            channel: channel.to_string(),
            source: adjustment.source.clone(),
            from: Side::User {
                user_id: adjustment.user_id,
                field: adjustment.field,
            },
            to: Side::System,
            affiliate_id: None,
        },
    )
    .await
}

/// Move money between two users of one client.
///
/// Shop deposits move available to available; agents crediting players
/// spend their trust balance.
pub async fn peer_transfer(
    pool: &DbPool,
    transfer: &PeerTransfer,
    from_field: WalletField,
    to_field: WalletField,
    subject: &str,
    channel: &str,
) -> Result<TransferOutcome, AppError> {
    if transfer.from_user_id == transfer.to_user_id {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to the same user".to_string(),
        ));
    }

    apply_movement(
        pool,
        &Movement {
            transaction_no: transfer.transaction_no.clone(),
            client_id: transfer.client_id,
            amount: transfer.amount,
            subject: subject.to_string(),
            description: transfer.description.clone(),
            channel: channel.to_string(),
            source: transfer.source.clone(),
            from: Side::User {
                user_id: transfer.from_user_id,
                field: from_field,
            },
            to: Side::User {
                user_id: transfer.to_user_id,
                field: to_field,
            },
            affiliate_id: None,
        },
    )
    .await
}

/// Start a gateway deposit.
///
/// # Process
///
/// 1. Resolve the client's payment method and the user's email
/// 2. Record a pending system debit and a pending user credit (channel = provider)
/// 3. Ask the gateway for a checkout; if it fails the legs are failed
///
/// The wallet is not touched here. The balance moves when the gateway
/// confirms, through `settlement_service`.
pub async fn initiate_deposit(
    pool: &DbPool,
    gateways: &GatewayRegistry,
    identity: &dyn IdentityService,
    request: &InitiateDepositRequest,
) -> Result<DepositResponse, AppError> {
    if request.amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let wallet = wallet_service::get_wallet(pool, request.user_id, request.client_id).await?;
    let method = gateways
        .payment_method(pool, request.client_id, &request.provider)
        .await?;

    let email = match &request.email {
        Some(email) => email.clone(),
        None => identity
            .user(request.client_id, request.user_id)
            .await?
            .email
            .ok_or_else(|| AppError::InvalidRequest("An email is required for deposits".to_string()))?,
    };

    let transaction_no = ledger_service::new_transaction_no("DEP");
    {
        let mut conn = pool.acquire().await?;
        ledger_service::record_transfer(
            &mut conn,
            &TransferRecord {
                transaction_no: transaction_no.clone(),
                client_id: request.client_id,
                amount: request.amount,
                subject: DEPOSIT_SUBJECT.to_string(),
                description: format!("Deposit via {}", method.display_name),
                channel: method.provider.clone(),
                source: request.source.clone(),
                from: TransferParty::system(),
                to: TransferParty::new(
                    wallet.user_id,
                    wallet.username.clone(),
                    wallet.available_balance,
                ),
                status: TransactionStatus::Pending,
                wallet: WalletField::Available,
                to_wallet: None,
                affiliate_id: None,
            },
        )
        .await?;
    }

    let adapter = gateways.adapter(&method);
    let init = adapter
        .initiate_payment(&PaymentRequest {
            transaction_no: transaction_no.clone(),
            amount: request.amount,
            currency: wallet.currency.clone(),
            email,
            callback_url: request.callback_url.clone(),
        })
        .await;

    match init {
        Ok(init) => {
            tracing::info!(
                transaction_no = %transaction_no,
                provider = %method.provider,
                amount = request.amount,
                "Deposit initiated"
            );
            Ok(DepositResponse {
                transaction_no,
                provider: method.provider,
                amount: request.amount,
                authorization_url: init.authorization_url,
                status: TransactionStatus::Pending,
            })
        }
        Err(e) => {
            tracing::warn!(
                transaction_no = %transaction_no,
                provider = %method.provider,
                error = %e,
                "Deposit initiation failed"
            );
            let mut conn = pool.acquire().await?;
            ledger_service::update_pending_status(&mut conn, &transaction_no, TransactionStatus::Failed)
                .await?;
            Err(e)
        }
    }
}

/// Deposit credit legs of a client, newest first.
pub async fn list_deposits(pool: &DbPool, query: &DepositQuery) -> Result<Vec<LedgerEntry>, AppError> {
    let deposits = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT * FROM transactions
        WHERE client_id = $1
          AND subject = $2
          AND tranx_type = $3
          AND ($4::bigint IS NULL OR user_id = $4)
          AND ($5::smallint IS NULL OR status = $5)
          AND ($6::timestamptz IS NULL OR created_at >= $6)
          AND ($7::timestamptz IS NULL OR created_at < $7)
        ORDER BY created_at DESC
        LIMIT $8 OFFSET $9
        "#,
    )
    .bind(query.client_id)
    .bind(DEPOSIT_SUBJECT)
    .bind(LegType::Credit.as_str())
    .bind(query.user_id)
    .bind(query.status)
    .bind(query.from)
    .bind(query.to)
    .bind(page_size(query.limit))
    .bind(query.offset.max(0))
    .fetch_all(pool)
    .await?;

    Ok(deposits)
}

/// Both legs of a correlation id.
pub async fn get_transaction(pool: &DbPool, transaction_no: &str) -> Result<Vec<LedgerEntry>, AppError> {
    let legs = ledger_service::find_legs(pool, transaction_no).await?;
    if legs.is_empty() {
        return Err(AppError::TransactionNotFound);
    }
    Ok(legs)
}

pub(crate) fn page_size(limit: i64) -> i64 {
    limit.clamp(1, MAX_PAGE_SIZE)
}
