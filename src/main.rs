//! Wallet Ledger Service - Main Application Entry Point
//!
//! Runs the HTTP API, the job worker pool and the reconciliation schedulers
//! in one process. Workers and schedulers can be switched off per process
//! (`ENABLE_WORKERS`, `ENABLE_SCHEDULERS`) to scale them separately.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Build gateway registry, identity client and shared state
//! 4. Spawn workers and schedulers
//! 5. Serve HTTP until Ctrl-C, then drain background tasks

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use wallet_ledger::{
    config::Config, db, gateway::GatewayRegistry, identity::HttpIdentityClient, jobs::WorkerPool,
    router, scheduler, state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let gateways = GatewayRegistry::new(config.external_timeout())?;
    let identity = HttpIdentityClient::new(&config.identity_service_url, config.external_timeout())?;

    let enable_workers = config.enable_workers;
    let enable_schedulers = config.enable_schedulers;
    let addr = format!("0.0.0.0:{}", config.server_port);

    let state = AppState::new(pool, gateways, Arc::new(identity), config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();

    if enable_workers {
        background.extend(WorkerPool::new(state.clone()).spawn(shutdown_rx.clone()));
    }
    if enable_schedulers {
        background.extend(scheduler::spawn_all(state.clone(), shutdown_rx.clone()));
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Workers finish the job in hand before exiting
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
