//! Shared application state.
//!
//! One `AppState` is built at startup and cloned into the router, the
//! worker pool and the schedulers. Every field is cheap to clone.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::db::DbPool;
use crate::gateway::GatewayRegistry;
use crate::identity::IdentityService;
use crate::jobs::queue::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub queue: JobQueue,
    pub gateways: Arc<GatewayRegistry>,
    pub identity: Arc<dyn IdentityService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        gateways: GatewayRegistry,
        identity: Arc<dyn IdentityService>,
        config: Config,
    ) -> Self {
        Self {
            queue: JobQueue::new(pool.clone(), config.job_max_attempts),
            pool,
            gateways: Arc::new(gateways),
            identity,
            config: Arc::new(config),
        }
    }

    /// Channel of entries the platform settles itself.
    pub fn internal_channel(&self) -> &str {
        &self.config.internal_channel
    }
}

/// Lets the auth middleware and simple handlers extract just the pool.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
