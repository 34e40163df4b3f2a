//! [`HealthMonitor`]: last known state of the MongoDB connection.
//!
//! The monitor backs the `/` and `/_health` health checks. Reads are lock-free
//! (`arc-swap`); the background [`health_task`] is the only regular writer.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use mongodb::Database;
use tokio::time;
use tracing::{info, warn};

/// Result of the most recent ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub up: bool,
    /// `None` until the first ping completes.
    pub checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl HealthSnapshot {
    fn initial() -> Self {
        Self {
            up: false,
            checked_at: None,
            last_error: None,
        }
    }
}

/// What a ping result changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same state as before.
    Unchanged,
    /// DOWN to UP. `first` is set only the first time the database is ever
    /// reached, across all clones of the monitor.
    Restored { first: bool },
    /// UP to DOWN.
    Lost,
}

/// Shared, lock-free view of database health.
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    inner: Arc<ArcSwap<HealthSnapshot>>,
    ever_up: Arc<AtomicBool>,
}

impl HealthMonitor {
    /// Create a monitor in the DOWN state: nothing has been pinged yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(HealthSnapshot::initial())),
            ever_up: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` when the last ping reached the database.
    pub fn is_up(&self) -> bool {
        self.inner.load().up
    }

    /// Copy of the most recent snapshot.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner.load().as_ref().clone()
    }

    /// Store the outcome of a ping and report the transition it caused.
    pub fn record(&self, ping: Result<(), String>) -> Transition {
        let was_up = self.is_up();
        match ping {
            Ok(()) => {
                self.inner.store(Arc::new(HealthSnapshot {
                    up: true,
                    checked_at: Some(Utc::now()),
                    last_error: None,
                }));
                let first = !self.ever_up.swap(true, Ordering::AcqRel);
                if was_up {
                    Transition::Unchanged
                } else {
                    Transition::Restored { first }
                }
            }
            Err(error) => {
                self.inner.store(Arc::new(HealthSnapshot {
                    up: false,
                    checked_at: Some(Utc::now()),
                    last_error: Some(error),
                }));
                if was_up {
                    Transition::Lost
                } else {
                    Transition::Unchanged
                }
            }
        }
    }

    #[cfg(test)]
    pub fn record_up(&self) {
        self.record(Ok(()));
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that pings MongoDB every `interval`.
///
/// The first tick is skipped: the startup verification has already pinged.
/// Only state transitions are logged. The first time the database is
/// reached, the declared models are registered.
pub fn health_task(
    db: Database,
    interval: Duration,
    monitor: HealthMonitor,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let outcome = super::ping(&db).await.map_err(|e| e.to_string());
            match monitor.record(outcome) {
                Transition::Restored { first } => {
                    info!("MongoDB connection restored");
                    if first {
                        super::models::register_all(&db).await;
                    }
                }
                Transition::Lost => {
                    let error = monitor.snapshot().last_error.unwrap_or_default();
                    warn!(error = %error, "MongoDB connection lost");
                }
                Transition::Unchanged => {}
            }
        }
    })
}
