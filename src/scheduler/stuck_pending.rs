//! Stuck-pending sweep.
//!
//! A ledger entry waiting on a gateway round-trip that never comes back
//! would otherwise stay pending forever. Every tick, entries on external
//! channels that have been pending longer than the configured age are
//! flipped to failed. Entries on the internal channel (withdrawal legs)
//! are settled by the withdrawal state machine and are never touched here.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::transaction::TransactionStatus;
use crate::state::AppState;

/// Entries created before this instant are considered stuck.
pub fn stuck_cutoff(now: DateTime<Utc>, after: chrono::Duration) -> DateTime<Utc> {
    now - after
}

/// Fail every pending entry outside `internal_channel` created before `cutoff`.
///
/// # Returns
///
/// Number of ledger legs flipped to failed
pub async fn fail_stuck_pending(
    pool: &DbPool,
    internal_channel: &str,
    cutoff: DateTime<Utc>,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = $1, updated_at = NOW()
        WHERE status = $2 AND channel <> $3 AND created_at < $4
        "#,
    )
    .bind(TransactionStatus::Failed.code())
    .bind(TransactionStatus::Pending.code())
    .bind(internal_channel)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Run the sweep every `stuck_sweep_interval` until shutdown.
pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.config.stuck_sweep_interval();
    let after = state.config.stuck_pending_after();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(period_secs = period.as_secs(), "Stuck-pending sweep started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cutoff = stuck_cutoff(Utc::now(), after);
                match fail_stuck_pending(&state.pool, state.internal_channel(), cutoff).await {
                    Ok(0) => {}
                    Ok(count) => info!(count, %cutoff, "Failed stuck pending entries"),
                    Err(e) => error!(error = %e, "Stuck-pending sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Stuck-pending sweep stopped");
}
