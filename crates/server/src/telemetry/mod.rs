//! Logging, tracing export, and error monitoring.
//!
//! Logs are JSON lines on stdout. When `OTEL_EXPORTER_OTLP_ENDPOINT` is set,
//! spans and metrics are also exported over OTLP/gRPC.
//!
//! # Telemetry invariants
//!
//! - **No credentials** (bearer tokens, master key) in any span attribute,
//!   metric label, or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod errors;
pub mod init;

pub use errors::ErrorMonitor;
pub use init::{init_telemetry, shutdown};
