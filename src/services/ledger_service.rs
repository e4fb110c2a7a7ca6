//! Ledger recorder - double-entry rows for every money movement.
//!
//! `record_transfer` writes the debit leg and the credit leg of one transfer
//! atomically. It never computes balances: callers mutate the wallet first
//! (through `wallet_service`, in the same store transaction) and pass the
//! resulting balances in.

use sqlx::{Connection, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::transaction::{LedgerEntry, LegType, TransactionStatus, TransferRecord};

/// Result of an idempotent ledger operation.
#[derive(Debug)]
pub struct TransferOutcome {
    /// Legs of the correlation id after the call
    pub legs: Vec<LedgerEntry>,

    /// False when the correlation id was already recorded and nothing changed
    pub applied: bool,
}

impl TransferOutcome {
    pub fn applied(legs: Vec<LedgerEntry>) -> Self {
        Self {
            legs,
            applied: true,
        }
    }

    pub fn duplicate(legs: Vec<LedgerEntry>) -> Self {
        Self {
            legs,
            applied: false,
        }
    }

    pub fn leg(&self, leg_type: LegType) -> Option<&LedgerEntry> {
        self.legs
            .iter()
            .find(|l| l.tranx_type == leg_type.as_str())
    }
}

/// Generate a correlation id, e.g. `DEP-4F1C0B9A2E7D4C1B9E3A5F6D7C8B9A0E`.
pub fn new_transaction_no(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple()).to_uppercase()
}

/// Correlation id of the offsetting entry that refunds a withdrawal.
pub fn refund_transaction_no(transaction_no: &str) -> String {
    format!("{transaction_no}-REFUND")
}

/// Correlation id of the entry that reverses an earlier transfer.
pub fn reversal_transaction_no(transaction_no: &str) -> String {
    format!("{transaction_no}-REV")
}

/// Record both legs of a transfer.
///
/// # Atomicity
///
/// The two inserts run inside a nested transaction (a savepoint when the
/// connection is already inside one), so either both legs exist or neither.
///
/// # Errors
///
/// - `InvalidRequest`: empty correlation id or non-positive amount
/// - `Database`: including a unique violation when the correlation id
///   already has legs; see `is_duplicate`
pub async fn record_transfer(
    conn: &mut PgConnection,
    record: &TransferRecord,
) -> Result<(LedgerEntry, LedgerEntry), AppError> {
    if record.transaction_no.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "transaction_no must not be empty".to_string(),
        ));
    }
    if record.amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let mut tx = conn.begin().await?;

    let debit = insert_leg(
        &mut tx,
        record,
        LegType::Debit,
        record.from.user_id,
        &record.from.username,
        record.from.balance,
        record.wallet.as_str(),
    )
    .await?;

    let credit_wallet = record.to_wallet.unwrap_or(record.wallet);
    let credit = insert_leg(
        &mut tx,
        record,
        LegType::Credit,
        record.to.user_id,
        &record.to.username,
        record.to.balance,
        credit_wallet.as_str(),
    )
    .await?;

    tx.commit().await?;

    Ok((debit, credit))
}

async fn insert_leg(
    conn: &mut PgConnection,
    record: &TransferRecord,
    leg_type: LegType,
    user_id: i64,
    username: &str,
    balance: i64,
    wallet: &str,
) -> Result<LedgerEntry, AppError> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO transactions (
            transaction_no,
            user_id,
            client_id,
            username,
            amount,
            tranx_type,
            subject,
            description,
            channel,
            source,
            status,
            balance,
            affiliate_id,
            wallet
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(&record.transaction_no)
    .bind(user_id)
    .bind(record.client_id)
    .bind(username)
    .bind(record.amount)
    .bind(leg_type.as_str())
    .bind(&record.subject)
    .bind(&record.description)
    .bind(&record.channel)
    .bind(&record.source)
    .bind(record.status.code())
    .bind(balance)
    .bind(record.affiliate_id)
    .bind(wallet)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

/// Whether an error is the unique violation raised by a second recording of
/// the same correlation id (a concurrent redelivery of the same job).
pub fn is_duplicate(error: &AppError) -> bool {
    match error {
        AppError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

/// All legs of a correlation id, debit first.
pub async fn find_legs<'e>(
    executor: impl PgExecutor<'e>,
    transaction_no: &str,
) -> Result<Vec<LedgerEntry>, AppError> {
    let legs = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM transactions WHERE transaction_no = $1 ORDER BY tranx_type DESC",
    )
    .bind(transaction_no)
    .fetch_all(executor)
    .await?;

    Ok(legs)
}

/// Lock one leg for the rest of the surrounding transaction.
pub async fn lock_leg(
    conn: &mut PgConnection,
    transaction_no: &str,
    leg_type: LegType,
) -> Result<Option<LedgerEntry>, AppError> {
    let leg = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM transactions WHERE transaction_no = $1 AND tranx_type = $2 FOR UPDATE",
    )
    .bind(transaction_no)
    .bind(leg_type.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(leg)
}

/// Move every still-pending leg of a correlation id to `status`.
///
/// Terminal legs are left alone, so both legs always flip together.
/// Returns the number of legs changed.
pub async fn update_pending_status(
    conn: &mut PgConnection,
    transaction_no: &str,
    status: TransactionStatus,
) -> Result<u64, AppError> {
    let updated = sqlx::query(
        r#"
        UPDATE transactions
        SET status = $1,
            updated_at = NOW()
        WHERE transaction_no = $2 AND status = $3
        "#,
    )
    .bind(status.code())
    .bind(transaction_no)
    .bind(TransactionStatus::Pending.code())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(updated)
}

/// Store the settled balance on a leg.
pub async fn set_balance(conn: &mut PgConnection, leg_id: i64, balance: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE transactions SET balance = $1, updated_at = NOW() WHERE id = $2")
        .bind(balance)
        .bind(leg_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
