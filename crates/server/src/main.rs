//! `shop-api`: HTTP entry point of the shop backend.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Build the MongoDB client and verify the connection in the background.
//! 4. Spawn the health monitor.
//! 5. Build the Axum router and serve until SIGINT/SIGTERM.

mod auth;
mod config;
mod db;
mod server;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tracing::info;

use auth::MongoUserDirectory;
use config::Config;
use db::{HealthMonitor, Transition};
use server::{docs::ApiDocs, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        env = ?cfg.app_env,
        "shop-api starting"
    );

    // -----------------------------------------------------------------------
    // 3. Database
    // -----------------------------------------------------------------------
    let db = db::connect(&cfg).await?;
    let health = HealthMonitor::new();
    {
        let db = db.clone();
        let health = health.clone();
        tokio::spawn(async move {
            if let Transition::Restored { first: true } = db::verify_connection(&db, &health).await {
                db::models::register_all(&db).await;
            }
        });
    }

    // -----------------------------------------------------------------------
    // 4. Background tasks
    // -----------------------------------------------------------------------
    let _health_task = db::health::health_task(db.clone(), cfg.health_check_interval(), health.clone());

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let users = Arc::new(MongoUserDirectory::new(&db));
    let docs = ApiDocs::load()?;
    let state = AppState::new(&cfg, users, health, docs);
    let router = server::router::build(state);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("shop-api stopped");
    telemetry::shutdown();
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
