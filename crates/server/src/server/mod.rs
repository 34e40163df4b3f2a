//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and the shared middleware stack.
//! - Shape every error into the JSON envelope.
//! - Inject shared application state (`AppState`) into handlers.

pub mod api;
pub mod cors;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
