//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies built on them.

/// API key authentication model
pub mod api_key;
/// Gateway callback audit log
pub mod callback_log;
/// Queued job envelope and payloads
pub mod job;
/// Client gateway configuration (read-only)
pub mod payment_method;
/// Ledger legs
pub mod transaction;
/// Wallets and balance fields
pub mod wallet;
/// Withdrawals and their state machine
pub mod withdrawal;
