//! Shared application state injected into every Axum handler.

use std::{sync::Arc, time::Duration};

use crate::auth::{Strategies, UserDirectory};
use crate::config::{AppEnv, Config};
use crate::db::HealthMonitor;
use crate::telemetry::ErrorMonitor;

use super::docs::ApiDocs;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Registered authentication strategies.
    pub strategies: Arc<Strategies>,
    /// Last known database health, read by the health endpoints.
    pub health: HealthMonitor,
    /// Receives every 5xx response.
    pub errors: ErrorMonitor,
    /// Controls whether internal error messages are returned.
    pub app_env: AppEnv,
    /// The OpenAPI document served under `/api-docs`.
    pub docs: Arc<ApiDocs>,
    pub request_timeout: Duration,
    pub body_limit: usize,
}

impl AppState {
    /// Create a new [`AppState`] from validated configuration.
    pub fn new(
        cfg: &Config,
        users: Arc<dyn UserDirectory>,
        health: HealthMonitor,
        docs: ApiDocs,
    ) -> Self {
        Self {
            strategies: Arc::new(Strategies::from_config(cfg, users)),
            health,
            errors: ErrorMonitor::new(),
            app_env: cfg.app_env,
            docs: Arc::new(docs),
            request_timeout: cfg.request_timeout(),
            body_limit: cfg.body_limit_bytes,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::strategy::tests::{directory, strategies};

    /// State with the test user directory and a DOWN health monitor.
    pub(crate) fn test_state() -> AppState {
        AppState {
            strategies: Arc::new(strategies(directory())),
            health: HealthMonitor::new(),
            errors: ErrorMonitor::new(),
            app_env: AppEnv::Test,
            docs: Arc::new(ApiDocs::load().unwrap()),
            request_timeout: Duration::from_secs(30),
            body_limit: 100 * 1024,
        }
    }

    #[tokio::test]
    async fn built_from_config() {
        let cfg = crate::config::tests::valid_config();
        let state = AppState::new(
            &cfg,
            Arc::new(directory()),
            HealthMonitor::new(),
            ApiDocs::load().unwrap(),
        );
        assert_eq!(state.request_timeout, Duration::from_secs(30));
        assert_eq!(state.body_limit, 102_400);
        assert!(!state.app_env.is_production());

        let master = crate::auth::strategy::Credentials {
            bearer: None,
            master_key: Some(cfg.master_key.clone()),
        };
        let principal = state
            .strategies
            .authenticate(crate::auth::strategy::Strategy::MasterKey, &master)
            .await
            .unwrap();
        assert_eq!(principal.user_id, None);
    }
}
