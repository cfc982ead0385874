//! HelpHive Backend Service
//!
//! Main entry point for the HelpHive local-services backend.
//! This service provides:
//! - REST API for accounts, bookings, emergencies, wallet, consultations and community help
//! - WebSocket server for live emergency, booking and help-request updates

use anyhow::Context;
use helphive_backend::config::AppConfig;
use helphive_backend::database::{create_pool_with_retry, run_migrations};
use helphive_backend::{build_router, AppState};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "helphive_backend={},sqlx=warn,tower_http=info",
            config.log_level
        )
        .into()
    });

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Configuration error")?;

    init_tracing(&config);

    info!("HelpHive backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool_with_retry(&config.database)
        .await
        .context("Failed to create database pool")?;
    info!(
        "Database connection pool created (max connections: {})",
        config.database.max_connections
    );

    run_migrations(&pool, None)
        .await
        .context("Database migration failed")?;
    info!("Database migrations completed");

    // =========================================================================
    // SERVICES
    // =========================================================================
    let state = Arc::new(AppState::new(pool, &config).context("Failed to initialize services")?);
    info!("Audit trail writing to {}", state.audit.log_file().display());

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let ws_handle = match config.ws_port {
        Some(ws_port) => {
            let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));
            let listener = TcpListener::bind(ws_addr)
                .await
                .with_context(|| format!("Failed to bind WebSocket server on {}", ws_addr))?;
            info!("WebSocket server listening on {}", ws_addr);
            Some(tokio::spawn(Arc::clone(&state.ws_server).serve(listener)))
        }
        None => {
            warn!("WS_PORT not configured - WebSocket server not started");
            None
        }
    };

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server on {}", http_addr))?;
    info!("HTTP API listening on {}", http_addr);

    let app = build_router(state);
    let http_server = axum::serve(listener, app).into_future();

    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        result = http_server => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = async {
            match ws_handle {
                Some(handle) => {
                    handle.await.ok();
                }
                None => futures::future::pending::<()>().await,
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    info!("HelpHive backend shutdown complete");
    Ok(())
}
