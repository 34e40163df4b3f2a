//! The four named authentication strategies and their registry.

use std::{fmt, sync::Arc};

use chrono::Utc;
use common::ServiceError;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::token::{self, TokenError, TokenType};
use super::users::UserDirectory;
use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;


/// A named verification method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strategy {
    /// Customer bearer token.
    #[serde(rename = "jwtCustomer")]
    JwtCustomer,
    /// Staff bearer token; the user must hold a role.
    #[serde(rename = "jwtStaff")]
    JwtStaff,
    /// Shared key for internal callers.
    #[serde(rename = "masterKey")]
    MasterKey,
    /// Staff bearer token without the role requirement.
    #[serde(rename = "jwtStaffWithoutRole")]
    JwtStaffWithoutRole,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::JwtCustomer => "jwtCustomer",
            Strategy::JwtStaff => "jwtStaff",
            Strategy::MasterKey => "masterKey",
            Strategy::JwtStaffWithoutRole => "jwtStaffWithoutRole",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the caller presented.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub master_key: Option<String>,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub strategy: Strategy,
    /// `None` for master-key callers.
    pub user_id: Option<String>,
    pub role: Option<String>,
    /// The user document in its public JSON shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

/// Reasons a strategy rejects a request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials supplied")]
    MissingCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("token was not issued for this audience")]
    WrongTokenType,

    #[error("user not found")]
    UnknownUser,

    #[error("user is deactivated")]
    InactiveUser,

    #[error("staff user has no role")]
    MissingRole,

    #[error("invalid master key")]
    BadMasterKey,

    /// The user store failed; carries the underlying service error.
    #[error(transparent)]
    Lookup(ServiceError),
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingRole => ServiceError::Forbidden(e.to_string()),
            AuthError::Lookup(inner) => inner,
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Registry of configured strategies, built once at startup.
pub struct Strategies {
    customer_secret: Vec<u8>,
    staff_secret: Vec<u8>,
    /// Per-process random key; presented and configured master keys are
    /// both MACed under it and the tags compared.
    comparison_key: Vec<u8>,
    master_key_tag: Vec<u8>,
    users: Arc<dyn UserDirectory>,
}

impl Strategies {
    pub fn new(
        customer_secret: &[u8],
        staff_secret: &[u8],
        master_key: &[u8],
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let comparison_key = comparison_key();
        Self {
            customer_secret: customer_secret.to_vec(),
            staff_secret: staff_secret.to_vec(),
            master_key_tag: tag(&comparison_key, master_key).unwrap_or_default(),
            comparison_key,
            users,
        }
    }

    pub fn from_config(cfg: &Config, users: Arc<dyn UserDirectory>) -> Self {
        Self::new(
            cfg.jwt_customer_secret.as_bytes(),
            cfg.jwt_staff_secret.as_bytes(),
            cfg.master_key.as_bytes(),
            users,
        )
    }

    /// Run `strategy` against `creds`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] naming why the caller was rejected.
    pub async fn authenticate(
        &self,
        strategy: Strategy,
        creds: &Credentials,
    ) -> Result<Principal, AuthError> {
        let result = match strategy {
            Strategy::MasterKey => self.master_key(creds),
            Strategy::JwtCustomer => self.jwt(strategy, creds, TokenType::Customer, false).await,
            Strategy::JwtStaff => self.jwt(strategy, creds, TokenType::Staff, true).await,
            Strategy::JwtStaffWithoutRole => {
                self.jwt(strategy, creds, TokenType::Staff, false).await
            }
        };
        if let Err(e) = &result {
            debug!(strategy = %strategy, reason = %e, "authentication rejected");
        }
        result
    }

    fn master_key(&self, creds: &Credentials) -> Result<Principal, AuthError> {
        let presented = creds
            .master_key
            .as_deref()
            .ok_or(AuthError::MissingCredentials)?;
        if self.master_key_tag.is_empty() {
            return Err(AuthError::BadMasterKey);
        }
        let mut mac = HmacSha256::new_from_slice(&self.comparison_key)
            .map_err(|_| AuthError::BadMasterKey)?;
        mac.update(presented.as_bytes());
        mac.verify_slice(&self.master_key_tag)
            .map_err(|_| AuthError::BadMasterKey)?;
        Ok(Principal {
            strategy: Strategy::MasterKey,
            user_id: None,
            role: None,
            user: None,
        })
    }

    async fn jwt(
        &self,
        strategy: Strategy,
        creds: &Credentials,
        expected: TokenType,
        require_role: bool,
    ) -> Result<Principal, AuthError> {
        let bearer = creds.bearer.as_deref().ok_or(AuthError::MissingCredentials)?;
        let secret = match expected {
            TokenType::Customer => &self.customer_secret,
            TokenType::Staff => &self.staff_secret,
        };
        let claims = token::verify(bearer, secret, Utc::now().timestamp())?;
        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await
            .map_err(AuthError::Lookup)?
            .ok_or(AuthError::UnknownUser)?;
        if !user.active {
            return Err(AuthError::InactiveUser);
        }
        if require_role && user.role.is_none() {
            return Err(AuthError::MissingRole);
        }

        Ok(Principal {
            strategy,
            user_id: Some(user.id),
            role: user.role,
            user: Some(user.profile),
        })
    }
}

fn comparison_key() -> Vec<u8> {
    [Uuid::new_v4(), Uuid::new_v4()]
        .iter()
        .flat_map(|id| id.as_bytes().to_vec())
        .collect()
}

fn tag(key: &[u8], value: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(value);
    Some(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::token::Claims;
    use crate::auth::users::{MockUserDirectory, UserRecord};

    pub(crate) const CUSTOMER_SECRET: &[u8] = b"customer-secret-customer-secret-";
    pub(crate) const STAFF_SECRET: &[u8] = b"staff-secret-staff-secret-staff-";
    pub(crate) const MASTER_KEY: &str = "internal-master-key";

    pub(crate) fn token_for(sub: &str, token_type: TokenType, secret: &[u8], ttl: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.into(),
            token_type,
            iat: now,
            exp: now + ttl,
            nbf: None,
        };
        token::sign(&claims, secret)
    }

    /// A directory holding a customer `c1`, a staff manager `s1`, a staff
    /// user `s2` without a role, and a deactivated customer `c0`.
    pub(crate) fn directory() -> MockUserDirectory {
        let mut users = MockUserDirectory::new();
        users.expect_find_by_id().returning(|id| {
            let record = |role: Option<&str>, active: bool| UserRecord {
                id: id.to_owned(),
                role: role.map(str::to_owned),
                active,
                profile: serde_json::json!({ "id": id, "role": role }),
            };
            Ok(match id {
                "c1" => Some(record(None, true)),
                "c0" => Some(record(None, false)),
                "s1" => Some(record(Some("store_manager"), true)),
                "s2" => Some(record(None, true)),
                _ => None,
            })
        });
        users
    }

    pub(crate) fn strategies(users: MockUserDirectory) -> Strategies {
        Strategies::new(CUSTOMER_SECRET, STAFF_SECRET, MASTER_KEY.as_bytes(), Arc::new(users))
    }

    fn bearer(token: String) -> Credentials {
        Credentials {
            bearer: Some(token),
            master_key: None,
        }
    }

    #[test]
    fn serialised_names_match_registered_names() {
        for s in [
            Strategy::JwtCustomer,
            Strategy::JwtStaff,
            Strategy::MasterKey,
            Strategy::JwtStaffWithoutRole,
        ] {
            assert_eq!(serde_json::to_value(s).unwrap(), s.name());
            assert_eq!(s.to_string(), s.name());
        }
    }

    #[tokio::test]
    async fn customer_token_authenticates() {
        let s = strategies(directory());
        let creds = bearer(token_for("c1", TokenType::Customer, CUSTOMER_SECRET, 60));
        let principal = s.authenticate(Strategy::JwtCustomer, &creds).await.unwrap();
        assert_eq!(principal.user_id.as_deref(), Some("c1"));
        assert_eq!(principal.strategy, Strategy::JwtCustomer);
        assert_eq!(principal.user.unwrap()["id"], "c1");
    }

    #[tokio::test]
    async fn staff_token_is_not_a_customer_token() {
        let s = strategies(directory());
        // Signed with the staff secret, so the customer secret rejects it.
        let creds = bearer(token_for("s1", TokenType::Staff, STAFF_SECRET, 60));
        let err = s.authenticate(Strategy::JwtCustomer, &creds).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(TokenError::BadSignature)));
    }

    #[tokio::test]
    async fn wrong_type_with_right_secret_is_rejected() {
        let s = strategies(directory());
        let creds = bearer(token_for("c1", TokenType::Customer, STAFF_SECRET, 60));
        let err = s.authenticate(Strategy::JwtStaff, &creds).await.unwrap_err();
        assert!(matches!(err, AuthError::WrongTokenType));
    }

    #[tokio::test]
    async fn staff_without_role_is_forbidden_only_for_jwt_staff() {
        let s = strategies(directory());
        let creds = bearer(token_for("s2", TokenType::Staff, STAFF_SECRET, 60));

        let err = s.authenticate(Strategy::JwtStaff, &creds).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingRole));
        assert_eq!(ServiceError::from(err).http_status(), 403);

        let principal = s
            .authenticate(Strategy::JwtStaffWithoutRole, &creds)
            .await
            .unwrap();
        assert_eq!(principal.role, None);
    }

    #[tokio::test]
    async fn staff_with_role_passes_both_staff_strategies() {
        let s = strategies(directory());
        let creds = bearer(token_for("s1", TokenType::Staff, STAFF_SECRET, 60));
        for strategy in [Strategy::JwtStaff, Strategy::JwtStaffWithoutRole] {
            let principal = s.authenticate(strategy, &creds).await.unwrap();
            assert_eq!(principal.role.as_deref(), Some("store_manager"));
        }
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let s = strategies(directory());
        let creds = bearer(token_for("c1", TokenType::Customer, CUSTOMER_SECRET, -1));
        let err = s.authenticate(Strategy::JwtCustomer, &creds).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(TokenError::Expired)));
    }

    #[tokio::test]
    async fn unknown_and_inactive_users_are_rejected() {
        let s = strategies(directory());
        let ghost = bearer(token_for("nobody", TokenType::Customer, CUSTOMER_SECRET, 60));
        assert!(matches!(
            s.authenticate(Strategy::JwtCustomer, &ghost).await.unwrap_err(),
            AuthError::UnknownUser
        ));
        let inactive = bearer(token_for("c0", TokenType::Customer, CUSTOMER_SECRET, 60));
        assert!(matches!(
            s.authenticate(Strategy::JwtCustomer, &inactive).await.unwrap_err(),
            AuthError::InactiveUser
        ));
    }

    #[tokio::test]
    async fn lookup_failure_surfaces_as_unavailable() {
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_id()
            .returning(|_| Err(ServiceError::Unavailable("user store unreachable".into())));
        let s = strategies(users);
        let creds = bearer(token_for("c1", TokenType::Customer, CUSTOMER_SECRET, 60));
        let err = s.authenticate(Strategy::JwtCustomer, &creds).await.unwrap_err();
        assert_eq!(ServiceError::from(err).http_status(), 503);
    }

    #[tokio::test]
    async fn master_key_checks() {
        let mut users = MockUserDirectory::new();
        users.expect_find_by_id().never();
        let s = strategies(users);

        let good = Credentials {
            bearer: None,
            master_key: Some(MASTER_KEY.into()),
        };
        let principal = s.authenticate(Strategy::MasterKey, &good).await.unwrap();
        assert_eq!(principal.user_id, None);

        let bad = Credentials {
            bearer: None,
            master_key: Some("internal-master-kez".into()),
        };
        assert!(matches!(
            s.authenticate(Strategy::MasterKey, &bad).await.unwrap_err(),
            AuthError::BadMasterKey
        ));

        // HMAC zero-pads short keys; a padded variant must still differ.
        let padded = Credentials {
            bearer: None,
            master_key: Some(format!("{MASTER_KEY}\0\0")),
        };
        assert!(matches!(
            s.authenticate(Strategy::MasterKey, &padded).await.unwrap_err(),
            AuthError::BadMasterKey
        ));
        assert!(matches!(
            s.authenticate(Strategy::MasterKey, &Credentials::default())
                .await
                .unwrap_err(),
            AuthError::MissingCredentials
        ));
    }
}
