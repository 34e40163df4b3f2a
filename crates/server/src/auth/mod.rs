//! Session-less authentication.
//!
//! Four strategies are registered at startup under fixed names:
//! `jwtCustomer`, `jwtStaff`, `masterKey` and `jwtStaffWithoutRole`. Routes
//! pick one by taking the matching extractor from [`extract`].
//!
//! # Module invariants
//!
//! - Secrets and presented credentials are never logged.
//! - Signature and master-key comparisons are constant time.

pub mod cookies;
pub mod extract;
pub mod strategy;
pub mod token;
pub mod users;

pub use strategy::{AuthError, Principal, Strategies};
pub use users::{MongoUserDirectory, UserDirectory};
