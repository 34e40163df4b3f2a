//! [`ApiError`]: the HTTP-facing error every handler and extractor returns.
//!
//! Rendering an `ApiError` produces the [`ErrorEnvelope`] body and attaches
//! an [`ErrorReport`] to the response extensions. The error middleware reads
//! the report instead of re-parsing the body.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorEnvelope, ServiceError};

use crate::auth::AuthError;

/// A failed request, ready to render.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    internal_message: String,
    external_message: String,
    operational: bool,
}

/// Response extension describing an error produced by [`ApiError`].
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub envelope: ErrorEnvelope,
    pub operational: bool,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        internal_message: impl Into<String>,
        external_message: impl Into<String>,
        operational: bool,
    ) -> Self {
        Self {
            status,
            internal_message: internal_message.into(),
            external_message: external_message.into(),
            operational,
        }
    }

    /// An unexpected failure. The message is for logs and development only.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            reason(StatusCode::INTERNAL_SERVER_ERROR),
            false,
        )
    }

    /// Wrap a bare status, e.g. one produced by the framework. 4xx statuses
    /// are operational; 5xx are not.
    pub fn from_status(status: StatusCode, internal_message: impl Into<String>) -> Self {
        Self::new(
            status,
            internal_message,
            reason(status),
            !status.is_server_error(),
        )
    }

    /// The catch-all 404.
    pub fn route_not_found() -> Self {
        let envelope = ErrorEnvelope::route_not_found();
        Self::new(
            StatusCode::NOT_FOUND,
            envelope.internal_message,
            envelope.external_message,
            true,
        )
    }
}

/// Canonical reason phrase for `status`.
pub fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Error")
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let operational = e.is_operational();
        let message = e.message().to_owned();
        let external = if operational {
            message.clone()
        } else {
            reason(status).to_owned()
        };
        Self::new(status, message, external, operational)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ServiceError::from(e).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_status(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::from_status(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope::new(
            self.status.as_u16(),
            self.internal_message,
            self.external_message,
        );
        let report = ErrorReport {
            envelope: envelope.clone(),
            operational: self.operational,
        };
        let mut response = (self.status, Json(envelope)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}
