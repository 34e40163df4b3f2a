//! Axum middleware applied to the router.
//!
//! The error chain runs, innermost first: [`monitor_errors`] →
//! [`convert_errors`] → [`handle_errors`]. The remaining pieces are request
//! ids, the access log span, security headers, raw-body capture, and the
//! panic responder.

use std::{any::Any, net::SocketAddr};

use axum::{
    async_trait,
    body::{to_bytes, Body},
    extract::{ConnectInfo, FromRequestParts, MatchedPath, Request, State},
    http::{
        header::{self, CONTENT_LENGTH, CONTENT_TYPE},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tower_http::{
    request_id::{MakeRequestId, RequestId},
    set_header::SetResponseHeaderLayer,
};
use tracing::{debug, info_span, Span};
use uuid::Uuid;

use super::error::{reason, ApiError, ErrorReport};
use super::state::AppState;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Upper bound when reading a framework error body for conversion.
const CONVERT_BODY_LIMIT: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// Request ids and access log
// ---------------------------------------------------------------------------

/// Mints a UUID v4 request id when the caller did not send one.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Span for one request, carrying the fields of a "combined" access log line.
pub fn access_span(request: &axum::http::Request<Body>) -> Span {
    let header = |name: HeaderName| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_owned()
    };
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_owned(), |ConnectInfo(addr)| addr.to_string());

    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        remote_addr = %remote_addr,
        referrer = %header(header::REFERER),
        user_agent = %header(header::USER_AGENT),
        request_id = %header(REQUEST_ID_HEADER),
    )
}

// ---------------------------------------------------------------------------
// Security headers
// ---------------------------------------------------------------------------

/// `X-Frame-Options: SAMEORIGIN`
pub fn frame_options() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    )
}

/// `X-XSS-Protection: 1; mode=block`
pub fn xss_protection() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    )
}

// ---------------------------------------------------------------------------
// Raw body capture
// ---------------------------------------------------------------------------

/// The exact bytes of a JSON or form request body, kept for signature checks.
#[derive(Debug, Clone)]
pub struct RawBody(pub Bytes);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RawBody {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RawBody>()
            .cloned()
            .ok_or_else(|| ApiError::from_status(StatusCode::BAD_REQUEST, "request has no body"))
    }
}

/// Buffer JSON and urlencoded bodies and attach them as [`RawBody`].
/// Other content types stream through untouched.
pub async fn capture_raw_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_parsed_body(&request) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, state.body_limit).await.map_err(|e| {
        ApiError::from_status(StatusCode::PAYLOAD_TOO_LARGE, format!("request body rejected: {e}"))
    })?;
    if !bytes.is_empty() {
        parts.extensions.insert(RawBody(bytes.clone()));
    }
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn is_parsed_body(request: &Request) -> bool {
    mime(request.headers()).is_some_and(|m| {
        m == "application/json" || m.ends_with("+json") || m == "application/x-www-form-urlencoded"
    })
}

fn is_json(headers: &HeaderMap) -> bool {
    mime(headers).is_some_and(|m| m == "application/json" || m.ends_with("+json"))
}

/// Lower-cased media type of the `Content-Type` header, parameters dropped.
fn mime(headers: &HeaderMap) -> Option<String> {
    let ct = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = ct.split(';').next().unwrap_or_default();
    Some(essence.trim().to_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// Error chain
// ---------------------------------------------------------------------------

/// Report 5xx errors to the [`ErrorMonitor`](crate::telemetry::ErrorMonitor).
///
/// Only responses carrying an [`ErrorReport`] count: a handler that picks a
/// 5xx status for a plain JSON answer (the DOWN health check) is not an
/// error. The transaction is named `"METHOD /route/template"`, falling back
/// to the raw path for unmatched requests.
pub async fn monitor_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let transaction = format!("{} {}", request.method(), path);

    let response = next.run(request).await;
    let status = response.status();
    if status.is_server_error() {
        if let Some(report) = response.extensions().get::<ErrorReport>() {
            state
                .errors
                .capture(&transaction, status.as_u16(), &report.envelope.internal_message);
        }
    }
    response
}

/// Turn error responses the framework produced on its own (405, 408, 413,
/// 415, 422 ...) into the error envelope. Responses that already carry an
/// [`ErrorReport`], or a JSON body a handler chose, pass through.
pub async fn convert_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error())
        || response.extensions().get::<ErrorReport>().is_some()
        || is_json(response.headers())
    {
        return response;
    }

    let (parts, body) = response.into_parts();
    let text = to_bytes(body, CONVERT_BODY_LIMIT)
        .await
        .map(|b| String::from_utf8_lossy(&b).trim().to_owned())
        .unwrap_or_default();
    let internal = if text.is_empty() {
        reason(status).to_owned()
    } else {
        text
    };

    let mut converted = ApiError::from_status(status, internal).into_response();
    for (name, value) in &parts.headers {
        if name != CONTENT_TYPE && name != CONTENT_LENGTH {
            converted
                .headers_mut()
                .entry(name)
                .or_insert_with(|| value.clone());
        }
    }
    converted
}

/// Final error shaping. In production the internal message of a
/// non-operational error is replaced by the status reason.
pub async fn handle_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    if !state.app_env.is_production() {
        debug!(
            status = report.envelope.status,
            error = %report.envelope.internal_message,
            "request error"
        );
        return response;
    }
    if report.operational {
        return response;
    }

    let status = response.status();
    let (mut parts, _) = response.into_parts();
    let mut envelope = report.envelope.clone();
    envelope.internal_message = reason(status).to_owned();
    parts.headers.remove(CONTENT_LENGTH);
    let mut redacted = (parts, Json(envelope)).into_response();
    redacted.extensions_mut().insert(report);
    redacted
}

/// Render a handler panic as a 500 envelope.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "handler panicked".to_owned()
    };
    ApiError::internal(detail).into_response()
}
