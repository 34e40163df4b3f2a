//! Request and response types exposed by the HTTP API.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Liveness status reported by `GET /` and `GET /_health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// The service and its database are reachable.
    Up,
    /// The database could not be reached on the last ping.
    Down,
}

/// Response body for the health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"UP"` or `"DOWN"`.
    pub status: HealthStatus,
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// Standard error body returned on any non-2xx status, including the
/// catch-all 404.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// HTTP status code, repeated in the body.
    pub status: u16,
    /// Diagnostic message. Replaced by the status reason in production for
    /// non-operational errors.
    pub internal_message: String,
    /// Message safe to show to end users.
    pub external_message: String,
    /// Always `false`.
    pub success: bool,
}

impl ErrorEnvelope {
    /// Construct an [`ErrorEnvelope`] with `success: false`.
    pub fn new(
        status: u16,
        internal_message: impl Into<String>,
        external_message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            internal_message: internal_message.into(),
            external_message: external_message.into(),
            success: false,
        }
    }

    /// The fixed body of the catch-all 404 responder.
    pub fn route_not_found() -> Self {
        Self::new(404, "Route not found", "Route not found")
    }
}
