//! Asynchronous job pipeline.
//!
//! API handlers and webhooks enqueue typed jobs; the worker pool executes
//! them at least once, with bounded retries and a dead-letter state.

pub mod processor;
pub mod queue;
pub mod retry;
pub mod worker;

pub use processor::{JobError, JobProcessor};
pub use queue::JobQueue;
pub use retry::RetryPolicy;
pub use worker::WorkerPool;
