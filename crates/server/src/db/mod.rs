//! MongoDB client setup, model registration, and connection health.
//!
//! # Lifecycle
//!
//! 1. [`connect`] parses the connection string and builds the client. The
//!    driver connects lazily, so this does not wait for the server.
//! 2. [`verify_connection`] runs in the background and logs the outcome. A
//!    failed first connection does not stop the HTTP server; it starts in the
//!    DOWN state and the health monitor keeps probing.
//! 3. [`models::register_all`] creates the indexes each model declares. It
//!    runs on the first DOWN to UP transition, whether the startup check or
//!    the health task observes it.

pub mod health;
pub mod models;

pub use health::{HealthMonitor, Transition};

use std::sync::Arc;

use anyhow::{Context, Result};
use mongodb::{
    bson::doc,
    event::command::{
        CommandEventHandler, CommandFailedEvent, CommandStartedEvent, CommandSucceededEvent,
    },
    options::ClientOptions,
    Client, Database,
};
use tracing::{debug, error, info};

use crate::config::Config;

/// Build the MongoDB client and select the database.
///
/// The database named in the URL wins; `MONGODB_DATABASE` is the fallback.
/// Command logging is attached outside production.
///
/// # Errors
///
/// Returns an error if the connection string cannot be parsed.
pub async fn connect(cfg: &Config) -> Result<Database> {
    let mut options = ClientOptions::parse(&cfg.mongodb_url)
        .await
        .context("failed to parse MONGODB_URL")?;
    options.app_name = Some("shop-api".into());
    if cfg.mongo_debug() {
        options.command_event_handler = Some(Arc::new(CommandLogger));
    }

    let db_name = options
        .default_database
        .clone()
        .unwrap_or_else(|| cfg.mongodb_database.clone());

    let client = Client::with_options(options).context("failed to build MongoDB client")?;
    Ok(client.database(&db_name))
}

/// Round-trip a `ping` command to the server.
pub async fn ping(db: &Database) -> mongodb::error::Result<()> {
    db.run_command(doc! { "ping": 1 }, None).await.map(|_| ())
}

/// Check the first connection, log the outcome, and seed `health`.
pub async fn verify_connection(db: &Database, health: &HealthMonitor) -> Transition {
    match ping(db).await {
        Ok(()) => {
            info!(database = %db.name(), "MongoDB connected!");
            health.record(Ok(()))
        }
        Err(e) => {
            error!("MongoDB connection error. Please make sure MongoDB is running. {e}");
            health.record(Err(e.to_string()))
        }
    }
}

/// Logs every command the driver sends. Enabled outside production.
struct CommandLogger;

impl CommandEventHandler for CommandLogger {
    fn handle_command_started_event(&self, event: CommandStartedEvent) {
        debug!(
            request_id = event.request_id,
            db = %event.db,
            command = %event.command_name,
            body = %event.command,
            "mongo command started"
        );
    }

    fn handle_command_succeeded_event(&self, event: CommandSucceededEvent) {
        debug!(
            request_id = event.request_id,
            command = %event.command_name,
            duration_ms = event.duration.as_millis() as u64,
            "mongo command succeeded"
        );
    }

    fn handle_command_failed_event(&self, event: CommandFailedEvent) {
        debug!(
            request_id = event.request_id,
            command = %event.command_name,
            duration_ms = event.duration.as_millis() as u64,
            error = %event.failure,
            "mongo command failed"
        );
    }
}
