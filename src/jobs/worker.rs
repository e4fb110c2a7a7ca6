//! Bounded worker pool.
//!
//! `concurrency` tasks each claim one job at a time from the queue, so at
//! most `concurrency` jobs run at once. A slow gateway call only holds up
//! the worker running that job. A separate task returns jobs abandoned by
//! crashed workers to the queue.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{Instrument, error, info, info_span, warn};

use super::processor::{JobError, JobProcessor};
use super::queue::JobQueue;
use super::retry::RetryPolicy;
use crate::models::job::JobRecord;
use crate::state::AppState;

/// Pause after a queue error before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct WorkerPool {
    queue: JobQueue,
    processor: JobProcessor,
    policy: RetryPolicy,
    concurrency: usize,
    poll_interval: Duration,
    stale_after: Duration,
}

impl WorkerPool {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        Self {
            queue: state.queue.clone(),
            processor: JobProcessor::new(state),
            policy: RetryPolicy::from_config(&config),
            concurrency: config.worker_concurrency.max(1),
            poll_interval: config.job_poll_interval(),
            stale_after: config.job_stale_after(),
        }
    }

    /// Start the workers and the stale-job reaper.
    ///
    /// Every task finishes its current job and exits once `shutdown` flips to true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(concurrency = self.concurrency, "Starting job workers");

        let mut handles = Vec::with_capacity(self.concurrency + 1);
        for worker_id in 0..self.concurrency {
            let worker = Worker {
                id: worker_id,
                queue: self.queue.clone(),
                processor: self.processor.clone(),
                policy: self.policy,
                poll_interval: self.poll_interval,
            };
            handles.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        handles.push(tokio::spawn(reap_stale(
            self.queue,
            self.stale_after,
            shutdown,
        )));
        handles
    }
}

struct Worker {
    id: usize,
    queue: JobQueue,
    processor: JobProcessor,
    policy: RetryPolicy,
    poll_interval: Duration,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.claim().await {
                Ok(Some(record)) => {
                    let span = info_span!(
                        "job",
                        worker = self.id,
                        job_id = record.id,
                        job_type = %record.job_type,
                        attempt = record.attempts
                    );
                    self.execute(record).instrument(span).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = sleep(self.poll_interval) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(worker = self.id, error = %e, "Failed to claim job");
                    sleep(ERROR_BACKOFF).await;
                }
            }
        }

        info!(worker = self.id, "Job worker stopped");
    }

    async fn execute(&self, record: JobRecord) {
        let result = self.processor.run(&record).await;

        let bookkeeping = match result {
            Ok(()) => {
                info!("Job completed");
                self.queue.complete(record.id).await
            }
            Err(JobError::Retry(e)) if self.policy.should_retry(record.attempts) => {
                let delay = self.policy.delay(record.attempts);
                warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Job failed, will retry");
                self.queue.retry_later(record.id, delay, &e.to_string()).await
            }
            Err(JobError::Retry(e)) => {
                error!(error = %e, "Job exhausted its attempts, dead-lettering");
                self.queue.dead_letter(record.id, &e.to_string()).await
            }
            Err(JobError::SkipRetry(reason)) => {
                error!(reason = %reason, "Job failed permanently, dead-lettering");
                self.queue.dead_letter(record.id, &reason).await
            }
        };

        // The row stays `running`; the reaper will hand it out again
        if let Err(e) = bookkeeping {
            error!(error = %e, "Failed to record job outcome");
        }
    }
}

async fn reap_stale(queue: JobQueue, stale_after: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(stale_after.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match queue.requeue_stale(stale_after).await {
                    Ok(0) => {}
                    Ok(count) => warn!(count, "Requeued jobs abandoned by workers"),
                    Err(e) => error!(error = %e, "Failed to requeue stale jobs"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
