//! Cross-origin policy: a fixed allow-list with credentials.

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, CorsLayer};

/// Origins allowed to make credentialed cross-origin requests.
pub const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3002",
    "http://localhost:8080",
    "https://shop.example.com",
    "https://admin-shop.example.com",
    "https://std-admin-shop.example.com",
    "https://customer.example.com",
    "https://inventory.example.com",
];

/// CORS layer for every route, preflight included.
///
/// Request headers named in `Access-Control-Request-Headers` are mirrored.
pub fn layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .map(|origin| HeaderValue::from_static(origin))
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}
