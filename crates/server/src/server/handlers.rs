//! Axum request handlers for the top-level endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::{HealthResponse, HealthStatus};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{error::ApiError, middleware::RawBody, state::AppState};

/// Body of `/robots.txt`.
pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

/// `GET /` and `GET /_health`: liveness check.
///
/// Returns `200 {"status":"UP"}` while the database answered the last ping,
/// `500 {"status":"DOWN"}` otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.health.snapshot();
    if snapshot.up {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: HealthStatus::Up,
            }),
        )
    } else {
        debug!(
            checked_at = ?snapshot.checked_at,
            last_error = ?snapshot.last_error,
            "health check: database down"
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                status: HealthStatus::Down,
            }),
        )
    }
}

/// `GET /callback`: payment gateway return URL.
///
/// Echoes the query string back as a JSON object. A key that appears more
/// than once maps to an array of its values, in order.
pub async fn callback(
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(pairs) = query?;
    let echoed = Value::Object(collect_query(pairs));
    info!(query = %echoed, "payment callback");
    Ok(Json(echoed))
}

/// `POST /callback`: payment gateway notification.
///
/// Echoes the JSON body. The SHA-256 of the bytes as received is logged so a
/// notification can be matched against the gateway's signature.
pub async fn notification(
    raw: Option<RawBody>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(value) = body?;
    let digest = raw.map(|RawBody(bytes)| STANDARD.encode(Sha256::digest(&bytes)));
    info!(body_sha256 = ?digest, "payment notification");
    Ok(Json(value))
}

fn collect_query(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in pairs {
        match out.get_mut(&key) {
            None => {
                out.insert(key, Value::String(value));
            }
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    out
}

/// `GET /debug-sentry`: always fails, to check that 5xx responses reach
/// error monitoring.
pub async fn debug_error() -> Result<(), ApiError> {
    Err(ApiError::internal("debug error route: error monitoring check"))
}

/// `/robots.txt`: disallow all crawlers.
pub async fn robots() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], ROBOTS_TXT)
}

/// Catch-all 404 handler.
pub async fn not_found() -> ApiError {
    ApiError::route_not_found()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::tests::test_state;
    use axum::{body::Body, http::Request, routing::get, Router};
    use serde_json::json;
    use tower::ServiceExt;

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/_health", get(health))
            .with_state(state)
    }

    #[tokio::test]
    async fn health_is_down_until_pinged() {
        let app = test_router(test_state());
        let req = Request::builder()
            .uri("/_health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_is_up_after_successful_ping() {
        let state = test_state();
        state.health.record_up();
        let app = test_router(state);
        let req = Request::builder()
            .uri("/_health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn repeated_query_keys_become_arrays() {
        let pairs = vec![
            ("vnp_Amount".to_owned(), "100000".to_owned()),
            ("tag".to_owned(), "a".to_owned()),
            ("tag".to_owned(), "b".to_owned()),
            ("tag".to_owned(), "c".to_owned()),
        ];
        assert_eq!(
            Value::Object(collect_query(pairs)),
            json!({ "vnp_Amount": "100000", "tag": ["a", "b", "c"] })
        );
    }

    #[test]
    fn empty_query_is_empty_object() {
        assert!(collect_query(Vec::new()).is_empty());
    }
}
