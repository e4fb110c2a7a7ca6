//! Daily archival of cold ledger entries.
//!
//! At midnight UTC, settled entries older than `archive_after_months`
//! are copied into `archived_transactions` and deleted from the hot table
//! in one database transaction. Pending entries are never archived so
//! settlement can still find them.

use chrono::{DateTime, Days, Months, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::transaction::TransactionStatus;
use crate::state::AppState;

/// What one archival run moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub moved: u64,
    pub amount: i64,
}

/// Entries created before this instant are archived.
///
/// Month arithmetic clamps to the end of shorter months
/// (e.g. 30 June minus 4 months is 28/29 February).
pub fn archive_cutoff(now: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    now.checked_sub_months(Months::new(months))
}

/// Time left until the next 00:00 UTC.
pub fn until_next_midnight(now: DateTime<Utc>) -> std::time::Duration {
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .map(|day| day.and_time(NaiveTime::MIN).and_utc());

    match next {
        Some(next) => (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(1)),
        None => std::time::Duration::from_secs(24 * 60 * 60),
    }
}

/// Move every non-pending entry created before `cutoff` into the archive.
///
/// The copy and the delete commit together. The run aborts if the delete
/// removes fewer rows or less amount than were copied.
pub async fn archive_before(pool: &DbPool, cutoff: DateTime<Utc>) -> Result<ArchiveReport, AppError> {
    let mut tx = pool.begin().await?;

    let copied = copy_to_archive(&mut tx, cutoff).await?;
    let deleted = delete_archived(&mut tx, cutoff).await?;

    // A row already in the archive (an earlier run crashed after insert) is
    // deleted without being copied again, so only a shortfall is an error.
    if deleted.moved < copied.moved || deleted.amount < copied.amount {
        tx.rollback().await?;
        error!(
            copied = copied.moved,
            deleted = deleted.moved,
            copied_amount = copied.amount,
            deleted_amount = deleted.amount,
            "Archive totals diverged, rolled back"
        );
        return Ok(ArchiveReport::default());
    }

    tx.commit().await?;

    Ok(deleted)
}

/// Copy settled entries created before `cutoff` into `archived_transactions`.
pub async fn copy_to_archive(
    conn: &mut PgConnection,
    cutoff: DateTime<Utc>,
) -> Result<ArchiveReport, AppError> {
    let (copied, amount): (i64, Option<i64>) = sqlx::query_as(
        r#"
        WITH moved AS (
            INSERT INTO archived_transactions (
                id, transaction_no, user_id, client_id, username, amount, tranx_type,
                subject, description, channel, source, status, balance, affiliate_id,
                wallet, created_at, updated_at
            )
            SELECT id, transaction_no, user_id, client_id, username, amount, tranx_type,
                   subject, description, channel, source, status, balance, affiliate_id,
                   wallet, created_at, updated_at
            FROM transactions
            WHERE created_at < $1 AND status <> $2
            ON CONFLICT (id) DO NOTHING
            RETURNING amount
        )
        SELECT COUNT(*), SUM(amount)::BIGINT FROM moved
        "#,
    )
    .bind(cutoff)
    .bind(TransactionStatus::Pending.code())
    .fetch_one(&mut *conn)
    .await?;

    Ok(ArchiveReport {
        moved: copied as u64,
        amount: amount.unwrap_or(0),
    })
}

/// Delete hot entries before `cutoff` that already have an archive row.
///
/// Driven by the archive rather than by status, so an entry settled after
/// the copy stays in the hot table until the next run.
pub async fn delete_archived(
    conn: &mut PgConnection,
    cutoff: DateTime<Utc>,
) -> Result<ArchiveReport, AppError> {
    let (deleted, amount): (i64, Option<i64>) = sqlx::query_as(
        r#"
        WITH gone AS (
            DELETE FROM transactions t
            USING archived_transactions a
            WHERE t.id = a.id AND t.created_at < $1
            RETURNING t.amount
        )
        SELECT COUNT(*), SUM(amount)::BIGINT FROM gone
        "#,
    )
    .bind(cutoff)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ArchiveReport {
        moved: deleted as u64,
        amount: amount.unwrap_or(0),
    })
}

/// Run the archival at every midnight until shutdown.
pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let months = state.config.archive_after_months;
    info!(months, "Archival sweep started");

    loop {
        let wait = until_next_midnight(Utc::now());

        tokio::select! {
            _ = sleep(wait) => {
                let Some(cutoff) = archive_cutoff(Utc::now(), months) else {
                    error!(months, "Archive cutoff out of range");
                    continue;
                };
                match archive_before(&state.pool, cutoff).await {
                    Ok(report) => info!(moved = report.moved, amount = report.amount, %cutoff, "Archived ledger entries"),
                    Err(e) => error!(error = %e, "Archival sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Archival sweep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_subtracts_calendar_months() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let cutoff = archive_cutoff(now, 4).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2025, 2, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn cutoff_clamps_to_short_month() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();
        let cutoff = archive_cutoff(now, 4).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn next_midnight_from_late_evening() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 23, 30, 0).unwrap();
        assert_eq!(until_next_midnight(now), std::time::Duration::from_secs(30 * 60));
    }

    #[test]
    fn exactly_midnight_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(
            until_next_midnight(now),
            std::time::Duration::from_secs(24 * 60 * 60)
        );
    }
}
