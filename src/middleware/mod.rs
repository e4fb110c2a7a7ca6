//! HTTP middleware components.
//!
//! Middleware run before route handlers. They authenticate callers and can
//! short-circuit a request before it reaches any business logic.

/// API key authentication middleware
pub mod auth;
