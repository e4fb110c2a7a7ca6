//! Out-of-band reconciliation sweeps, each on its own timer.

pub mod archival;
pub mod stuck_pending;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Spawn both sweeps. They exit once `shutdown` flips to true.
pub fn spawn_all(state: AppState, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(stuck_pending::run(state.clone(), shutdown.clone())),
        tokio::spawn(archival::run(state, shutdown)),
    ]
}
