//! Axum router construction.

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use super::{
    api, cors, handlers,
    middleware::{self, MakeRequestUuidV4, REQUEST_ID_HEADER},
    state::AppState,
};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    let routes = routes().merge(state.docs.swagger_ui());
    apply_layers(routes, state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::health))
        .route("/_health", get(handlers::health))
        .nest("/api", api::router())
        .route("/callback", get(handlers::callback).post(handlers::notification))
        .route("/debug-sentry", get(handlers::debug_error))
        .route("/robots.txt", any(handlers::robots))
        .fallback(handlers::not_found)
}

/// Layers are listed innermost first; the request id is the outermost.
fn apply_layers(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(from_fn_with_state(state.clone(), middleware::capture_raw_body))
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(from_fn_with_state(state.clone(), middleware::monitor_errors))
        .layer(from_fn(middleware::convert_errors))
        .layer(from_fn_with_state(state.clone(), middleware::handle_errors))
        .layer(cors::layer())
        .layer(middleware::frame_options())
        .layer(middleware::xss_protection())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::access_span)
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuidV4))
        .with_state(state)
}
