//! Multi-tenant wallet and ledger service.
//!
//! Wallets hold several parallel balance fields per (user, client). Every
//! money movement is recorded as a pair of ledger legs sharing one
//! correlation id. Work arrives through an authenticated HTTP API, a
//! PostgreSQL-backed job queue drained by a bounded worker pool, and
//! signed gateway webhooks; two schedulers repair stuck state and archive
//! cold ledger rows.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod identity;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the HTTP router.
///
/// `/health` and `/webhooks/...` are public; everything under `/api/v1`
/// requires an API key.
pub fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Wallets
        .route("/api/v1/wallets", post(handlers::wallets::create_wallet))
        .route(
            "/api/v1/wallets/{client_id}/{user_id}",
            get(handlers::wallets::get_balance),
        )
        .route(
            "/api/v1/wallets/{client_id}/{user_id}/virtual-account",
            post(handlers::wallets::create_virtual_account),
        )
        // Transactions
        .route(
            "/api/v1/transactions/credit",
            post(handlers::transactions::create_credit),
        )
        .route(
            "/api/v1/transactions/debit",
            post(handlers::transactions::create_debit),
        )
        .route(
            "/api/v1/transactions/shop-deposit",
            post(handlers::transactions::create_shop_deposit),
        )
        .route(
            "/api/v1/transactions/credit-player",
            post(handlers::transactions::create_credit_player),
        )
        .route(
            "/api/v1/transactions/{transaction_no}",
            get(handlers::transactions::get_transaction),
        )
        // Deposits
        .route(
            "/api/v1/deposits",
            post(handlers::deposits::initiate_deposit).get(handlers::deposits::list_deposits),
        )
        .route(
            "/api/v1/deposits/{transaction_no}/verify",
            post(handlers::deposits::verify_deposit),
        )
        // Withdrawals
        .route(
            "/api/v1/withdrawals",
            post(handlers::withdrawals::request_withdrawal)
                .get(handlers::withdrawals::list_withdrawals),
        )
        .route(
            "/api/v1/withdrawals/{transaction_no}",
            get(handlers::withdrawals::get_withdrawal).put(handlers::withdrawals::update_withdrawal),
        )
        .route(
            "/api/v1/withdrawals/{transaction_no}/cancel",
            post(handlers::withdrawals::cancel_withdrawal),
        )
        .route(
            "/api/v1/withdrawals/{transaction_no}/shop-payout",
            post(handlers::withdrawals::shop_payout),
        )
        // Commissions
        .route(
            "/api/v1/commissions/deposit",
            post(handlers::commissions::deposit),
        )
        .route("/api/v1/commissions/debit", post(handlers::commissions::debit))
        .route(
            "/api/v1/commissions/withdraw",
            post(handlers::commissions::withdraw),
        )
        .route(
            "/api/v1/commissions/withdrawals",
            post(handlers::commissions::request_withdrawal),
        )
        .route(
            "/api/v1/commissions/withdrawals/{transaction_no}",
            put(handlers::commissions::update_request),
        )
        .route(
            "/api/v1/commissions/{transaction_no}/reverse",
            post(handlers::commissions::reverse),
        )
        // Jobs
        .route("/api/v1/jobs", post(handlers::jobs::enqueue_job))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/webhooks/{provider}/{client_id}",
            post(handlers::webhooks::receive_webhook),
        )
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
