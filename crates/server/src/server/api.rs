//! The `/api` router.
//!
//! Business resources are served by their own modules; the routes here let
//! each client type confirm its credentials against the strategy it uses.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::auth::extract::{CustomerAuth, MasterKeyAuth, StaffAuth, StaffWithoutRoleAuth};
use crate::auth::Principal;

use super::state::AppState;

/// Routes mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/customers/me", get(customer_me))
        .route("/v1/staff/me", get(staff_me))
        .route("/v1/staff/profile", get(staff_profile))
        .route("/v1/internal/ping", get(internal_ping))
}

/// `GET /api/v1/customers/me` (`jwtCustomer`)
async fn customer_me(CustomerAuth(principal): CustomerAuth) -> Json<Principal> {
    Json(principal)
}

/// `GET /api/v1/staff/me` (`jwtStaff`)
async fn staff_me(StaffAuth(principal): StaffAuth) -> Json<Principal> {
    Json(principal)
}

/// `GET /api/v1/staff/profile` (`jwtStaffWithoutRole`)
async fn staff_profile(StaffWithoutRoleAuth(principal): StaffWithoutRoleAuth) -> Json<Principal> {
    Json(principal)
}

/// `GET /api/v1/internal/ping` (`masterKey`)
async fn internal_ping(MasterKeyAuth(_): MasterKeyAuth) -> Json<Value> {
    Json(json!({ "ok": true }))
}
