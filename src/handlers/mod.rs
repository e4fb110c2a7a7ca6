//! HTTP request handlers (route handlers).
//!
//! Handlers only extract, call a service and shape the response. Anything
//! that moves money lives in `services` or is queued for the worker pool.

/// Commission jobs and commission withdrawal decisions
pub mod commissions;
/// Gateway deposits
pub mod deposits;
/// Service health
pub mod health;
/// Generic job submission
pub mod jobs;
/// Synchronous credits/debits and queued peer transfers
pub mod transactions;
/// Wallet onboarding and balances
pub mod wallets;
/// Gateway webhooks (public)
pub mod webhooks;
/// Withdrawal lifecycle
pub mod withdrawals;
