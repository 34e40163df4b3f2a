//! Axum extractors that run a named strategy before the handler.
//!
//! A handler opts into a strategy by taking the matching extractor, e.g.
//! `async fn me(CustomerAuth(principal): CustomerAuth)`. A rejected request
//! never reaches the handler; it is answered with the error envelope.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::cookies::Cookies;
use super::strategy::{Credentials, Principal, Strategy};
use crate::server::{error::ApiError, state::AppState};

/// Header carrying the master key for internal callers.
pub const MASTER_KEY_HEADER: &str = "x-master-key";

/// Cookie consulted when no `Authorization` header is sent.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Caller authenticated by `jwtCustomer`.
#[derive(Debug, Clone)]
pub struct CustomerAuth(pub Principal);

/// Caller authenticated by `jwtStaff`.
#[derive(Debug, Clone)]
pub struct StaffAuth(pub Principal);

/// Caller authenticated by `jwtStaffWithoutRole`.
#[derive(Debug, Clone)]
pub struct StaffWithoutRoleAuth(pub Principal);

/// Caller authenticated by `masterKey`.
#[derive(Debug, Clone)]
pub struct MasterKeyAuth(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CustomerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        run(parts, state, Strategy::JwtCustomer).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for StaffAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        run(parts, state, Strategy::JwtStaff).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for StaffWithoutRoleAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        run(parts, state, Strategy::JwtStaffWithoutRole).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MasterKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        run(parts, state, Strategy::MasterKey).await.map(Self)
    }
}

async fn run(parts: &Parts, state: &AppState, strategy: Strategy) -> Result<Principal, ApiError> {
    let creds = credentials(&parts.headers);
    Ok(state.strategies.authenticate(strategy, &creds).await?)
}

/// Collect everything a strategy might look at from the request headers.
pub fn credentials(headers: &HeaderMap) -> Credentials {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .or_else(|| {
            Cookies::from_headers(headers)
                .get(ACCESS_TOKEN_COOKIE)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
        });
    let master_key = headers
        .get(MASTER_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned);
    Credentials { bearer, master_key }
}

fn bearer_token(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}
