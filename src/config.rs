//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `IDENTITY_SERVICE_URL` (required): base URL of the identity service
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
///
/// Every other field has a default matching production behaviour; see the
/// `default_*` functions below.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub identity_service_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Must exceed `worker_concurrency` so API requests still get connections
    /// while every worker holds one.
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[serde(default = "default_job_max_attempts")]
    pub job_max_attempts: i32,

    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,

    #[serde(default = "default_job_backoff_base_secs")]
    pub job_backoff_base_secs: u64,

    #[serde(default = "default_job_backoff_max_secs")]
    pub job_backoff_max_secs: u64,

    #[serde(default = "default_job_stale_after_secs")]
    pub job_stale_after_secs: u64,

    /// Timeout applied to every gateway and identity call.
    #[serde(default = "default_external_timeout_secs")]
    pub external_timeout_secs: u64,

    /// Channel name of ledger entries the platform settles itself.
    /// The stuck-pending sweep never touches these.
    #[serde(default = "default_internal_channel")]
    pub internal_channel: String,

    #[serde(default = "default_stuck_pending_after_minutes")]
    pub stuck_pending_after_minutes: i64,

    #[serde(default = "default_stuck_sweep_interval_secs")]
    pub stuck_sweep_interval_secs: u64,

    #[serde(default = "default_archive_after_months")]
    pub archive_after_months: u32,

    #[serde(default = "default_true")]
    pub enable_schedulers: bool,

    #[serde(default = "default_true")]
    pub enable_workers: bool,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    20
}

fn default_worker_concurrency() -> usize {
    10
}

fn default_job_max_attempts() -> i32 {
    5
}

fn default_job_poll_interval_ms() -> u64 {
    500
}

fn default_job_backoff_base_secs() -> u64 {
    2
}

fn default_job_backoff_max_secs() -> u64 {
    300
}

fn default_job_stale_after_secs() -> u64 {
    600
}

fn default_external_timeout_secs() -> u64 {
    5
}

fn default_internal_channel() -> String {
    "internal".to_string()
}

fn default_stuck_pending_after_minutes() -> i64 {
    7
}

fn default_stuck_sweep_interval_secs() -> u64 {
    600
}

fn default_archive_after_months() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    pub fn job_stale_after(&self) -> Duration {
        Duration::from_secs(self.job_stale_after_secs)
    }

    pub fn stuck_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.stuck_sweep_interval_secs)
    }

    pub fn stuck_pending_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stuck_pending_after_minutes)
    }
}
