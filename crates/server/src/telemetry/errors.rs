//! Server-error capture: one structured `error!` event and one counter
//! increment per failed request.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use opentelemetry::{metrics::Counter, KeyValue};
use tracing::error;

/// Records 5xx responses. Cheap to clone; all clones share one counter.
#[derive(Clone)]
pub struct ErrorMonitor {
    errors: Counter<u64>,
    captured: Arc<AtomicU64>,
}

impl ErrorMonitor {
    /// Create a monitor reporting through the global meter provider.
    ///
    /// When no provider is installed the counter is a no-op and only the log
    /// event is emitted.
    pub fn new() -> Self {
        let errors = opentelemetry::global::meter("shop-api")
            .u64_counter("http.server.errors")
            .with_description("Requests that ended in a 5xx response")
            .init();
        Self {
            errors,
            captured: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Capture a failed request.
    ///
    /// `transaction` names the route as `"METHOD /path"`.
    pub fn capture(&self, transaction: &str, status: u16, message: &str) {
        error!(transaction, status, error = message, "request failed");
        self.errors.add(
            1,
            &[
                KeyValue::new("transaction", transaction.to_owned()),
                KeyValue::new("http.status_code", i64::from(status)),
            ],
        );
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of errors captured by this monitor since startup.
    #[cfg(test)]
    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }
}

impl Default for ErrorMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_capture_count() {
        let monitor = ErrorMonitor::new();
        let clone = monitor.clone();
        clone.capture("GET /debug-sentry", 500, "boom");
        monitor.capture("POST /api/v1/orders", 503, "db down");
        assert_eq!(monitor.captured(), 2);
    }
}
