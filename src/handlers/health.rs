//! Health check endpoint for service monitoring.

use std::collections::BTreeMap;

use crate::{error::AppError, state::AppState};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,

    /// Number of jobs per queue status, e.g. `{"queued": 3, "dead": 1}`
    pub jobs: BTreeMap<String, i64>,

    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "jobs": { "completed": 1520, "dead": 2, "queued": 4 },
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// A dead-letter count that keeps growing is the signal to page someone;
/// dead jobs are never retried automatically.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    let jobs = state.queue.counts().await?.into_iter().collect();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: "connected".to_string(),
        jobs,
        timestamp: Utc::now(),
    }))
}
