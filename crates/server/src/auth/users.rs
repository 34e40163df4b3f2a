//! User lookup behind the JWT strategies.

use async_trait::async_trait;
use common::ServiceError;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::ErrorKind,
    Collection, Database,
};

use serde_json::Value;

use crate::db::models;

/// The fields of a stored user the strategies care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    /// Staff role; `None` for customers and for staff not yet assigned one.
    pub role: Option<String>,
    pub active: bool,
    /// The document as the API exposes it (see [`models::ModelSpec::to_json`]).
    pub profile: Value,
}

/// Source of [`UserRecord`]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by id. `Ok(None)` when no such user exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unavailable`] when the store cannot be reached.
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, ServiceError>;
}

/// [`UserDirectory`] backed by the `users` collection.
#[derive(Clone, Debug)]
pub struct MongoUserDirectory {
    users: Collection<Document>,
}

impl MongoUserDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection(models::USERS.collection),
        }
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, ServiceError> {
        // Ids minted by the service are ObjectIds; imported users keep string ids.
        let filter = match ObjectId::parse_str(id) {
            Ok(oid) => doc! { "_id": oid },
            Err(_) => doc! { "_id": id },
        };
        let found = self
            .users
            .find_one(filter, None)
            .await
            .map_err(lookup_error)?;
        Ok(found.map(|d| user_from_document(id, d)))
    }
}

fn user_from_document(id: &str, doc: Document) -> UserRecord {
    let role = doc
        .get_str("role")
        .ok()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_owned);
    let active = doc.get_bool("isActive").unwrap_or(true);
    UserRecord {
        id: id.to_owned(),
        role,
        active,
        profile: models::USERS.to_json(doc),
    }
}

fn lookup_error(e: mongodb::error::Error) -> ServiceError {
    match *e.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            ServiceError::Unavailable("user store unreachable".into())
        }
        _ => ServiceError::Internal(format!("user lookup failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_role_and_active_flag() {
        let user = user_from_document(
            "u1",
            doc! { "_id": "u1", "role": "store_manager", "isActive": false },
        );
        assert_eq!(user.role.as_deref(), Some("store_manager"));
        assert!(!user.active);
    }

    #[test]
    fn blank_role_counts_as_missing() {
        let user = user_from_document("u1", doc! { "_id": "u1", "role": "  " });
        assert_eq!(user.role, None);
    }

    #[test]
    fn missing_active_flag_defaults_to_active() {
        let user = user_from_document("u1", doc! { "_id": "u1" });
        assert!(user.active);
        assert_eq!(user.role, None);
    }

    #[test]
    fn profile_hides_credentials() {
        let user = user_from_document(
            "u1",
            doc! { "_id": "u1", "phone": "0900000000", "password": "$2b$10$x", "salt": "s", "__v": 0 },
        );
        assert_eq!(
            user.profile,
            serde_json::json!({ "id": "u1", "phone": "0900000000" })
        );
    }
}
