//! Job submission.
//!
//! - POST /api/v1/jobs - Enqueue a job given as a wire envelope
//!
//! The typed endpoints elsewhere build their `Job` themselves and share
//! [`submit`] with this one.

use crate::{
    error::AppError,
    jobs::JobQueue,
    models::job::{EnqueuedResponse, Job, JobEnvelope},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode};

/// Enqueue `job` and answer 202 Accepted.
///
/// Re-submitting the same business event is not an error: the response
/// simply reports `enqueued: false`.
pub async fn submit(
    queue: &JobQueue,
    job: Job,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    let enqueued = queue.enqueue(&job).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueuedResponse {
            transaction_no: job.transaction_no().to_string(),
            job_type: job.job_type(),
            enqueued,
        }),
    ))
}

/// Enqueue a job from its envelope.
///
/// # Request Body
///
/// ```json
/// {
///   "type": "commission_deposit",
///   "payload": { "transaction_no": "COM-77", "user_id": 9, "client_id": 4, "amount": 1500 },
///   "idempotencyKey": "commission-deposit:COM-77"
/// }
/// ```
///
/// # Errors
///
/// - 400 when the type is unknown, the payload does not match it, or the
///   idempotency key is not the one derived from the payload
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(envelope): Json<JobEnvelope>,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    let job = Job::from_envelope(&envelope.job_type, &envelope.payload).map_err(|e| {
        AppError::InvalidRequest(format!("Invalid {} payload: {}", envelope.job_type, e))
    })?;

    let expected = job.idempotency_key();
    if !envelope.idempotency_key.is_empty() && envelope.idempotency_key != expected {
        return Err(AppError::InvalidRequest(format!(
            "idempotencyKey must be {expected}"
        )));
    }

    submit(&state.queue, job).await
}
