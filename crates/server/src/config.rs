//! Configuration loading and validation for the API service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Minimum byte length accepted for an HS256 signing secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Deployment environment, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }
}

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment.
    #[serde(default = "default_app_env")]
    pub app_env: AppEnv,

    /// MongoDB connection string. **Required.**
    pub mongodb_url: String,

    /// Database used when `mongodb_url` does not name one.
    #[serde(default = "default_mongodb_database")]
    pub mongodb_database: String,

    /// HS256 secret for customer access tokens. **Required.**
    pub jwt_customer_secret: String,

    /// HS256 secret for staff access tokens. **Required.**
    pub jwt_staff_secret: String,

    /// Shared key presented by internal callers in `x-master-key`. **Required.**
    pub master_key: String,

    /// OTLP collector endpoint. Export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// How often (seconds) the health monitor pings MongoDB.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
}

fn default_port() -> u16 {
    3000
}
fn default_app_env() -> AppEnv {
    AppEnv::Development
}
fn default_mongodb_database() -> String {
    "shop".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_body_limit() -> usize {
    100 * 1024
}
fn default_health_check_interval() -> u64 {
    15
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::default())
    }

    /// Values stay strings until deserialisation, so a secret made of digits
    /// keeps its leading zeros and length. Numeric fields parse from strings.
    fn load(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.mongodb_url, "MONGODB_URL")?;
        ensure_non_empty(&self.mongodb_database, "MONGODB_DATABASE")?;
        ensure_secret(&self.jwt_customer_secret, "JWT_CUSTOMER_SECRET")?;
        ensure_secret(&self.jwt_staff_secret, "JWT_STAFF_SECRET")?;
        ensure_non_empty(&self.master_key, "MASTER_KEY")?;

        if self.port == 0 {
            anyhow::bail!("PORT must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.body_limit_bytes == 0 {
            anyhow::bail!("BODY_LIMIT_BYTES must be > 0");
        }
        if self.health_check_interval_secs == 0 {
            anyhow::bail!("HEALTH_CHECK_INTERVAL_SECS must be > 0");
        }
        Ok(())
    }

    /// The OTLP endpoint, treating a blank value as unset.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// MongoDB command logging is on everywhere except production.
    pub fn mongo_debug(&self) -> bool {
        !self.app_env.is_production()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

fn ensure_secret(value: &str, name: &str) -> Result<()> {
    ensure_non_empty(value, name)?;
    if value.len() < MIN_SECRET_LEN {
        anyhow::bail!("{name} must be at least {MIN_SECRET_LEN} bytes");
    }
    Ok(())
}
