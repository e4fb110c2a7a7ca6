//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers and
//! job consumers. They own store transactions, validation and the calls to
//! external collaborators.

pub mod commission_service;
pub mod disbursement_policy;
pub mod ledger_service;
pub mod settlement_service;
pub mod signature;
pub mod transaction_service;
pub mod wallet_service;
pub mod withdrawal_service;
