//! Wire types and errors shared across the shop backend crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
