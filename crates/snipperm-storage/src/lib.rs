//! Storage abstraction for the snippet permission manager.
//!
//! Backend crates (snipperm-store-sqlite, snipperm-store-postgres) implement the
//! [`Store`] trait so the server doesn't depend on any specific database engine
//! or schema details.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Uniform error type for all storage backends.
///
/// Absence of a record is never an error here: lookups return an empty vec or
/// `None`. `AlreadyExists` surfaces the conditional-write conflict from the
/// owner uniqueness index.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("already exists")]
    AlreadyExists,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PermissionId(pub Uuid);

/// Grantee identifier: an opaque token issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// Integer handle of the snippet being access-controlled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnippetId(pub i64);

/// Permission level of a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PermissionType {
    Owner,
    Viewer,
}

/// Error type for parsing PermissionType from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePermissionTypeError(pub String);

impl std::fmt::Display for ParsePermissionTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid permission type: {}", self.0)
    }
}

impl std::error::Error for ParsePermissionTypeError {}

impl FromStr for PermissionType {
    type Err = ParsePermissionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OWNER" => Ok(PermissionType::Owner),
            "VIEWER" => Ok(PermissionType::Viewer),
            _ => Err(ParsePermissionTypeError(s.to_string())),
        }
    }
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Owner => "OWNER",
            PermissionType::Viewer => "VIEWER",
        }
    }
}

/// One (user, snippet, level) association.
#[derive(Clone, Debug)]
pub struct Permission {
    pub id: PermissionId,
    pub user_id: UserId,
    pub snippet_id: SnippetId,
    pub permission_type: PermissionType,
    /// Display name resolved from the user directory at assignment time,
    /// denormalized onto the record.
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a grant. The store generates `id` and `created_at`.
#[derive(Clone, Debug)]
pub struct NewPermission {
    pub user_id: UserId,
    pub snippet_id: SnippetId,
    pub permission_type: PermissionType,
    pub username: Option<String>,
}

/// The storage trait the server depends on.
///
/// All list results come back in insertion order. At most one `Owner` row can
/// exist per snippet: backends enforce it with a partial unique index, and
/// `save` reports a violation as [`StoreError::AlreadyExists`].
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────── Lookups ─────────────────────────────────

    /// Every grant in the store. Bulk test setup only.
    async fn find_all(&self) -> Result<Vec<Permission>, StoreError>;

    /// All grants held by a user.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Permission>, StoreError>;

    /// All grants on a snippet.
    async fn find_by_snippet(&self, snippet_id: SnippetId) -> Result<Vec<Permission>, StoreError>;

    /// The grant for a (user, snippet) pair, if any.
    async fn find_by_user_and_snippet(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
    ) -> Result<Option<Permission>, StoreError>;

    /// Grants on a snippet at a given level (0 or 1 rows for `Owner`).
    async fn find_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<Vec<Permission>, StoreError>;

    /// Grants of a given level held by a user.
    async fn find_by_user_and_type(
        &self,
        user_id: &UserId,
        permission_type: PermissionType,
    ) -> Result<Vec<Permission>, StoreError>;

    /// Existence check backing the owner-uniqueness precondition.
    async fn exists_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<bool, StoreError>;

    // ──────────────────────────────── Mutations ────────────────────────────────

    /// Insert a grant; the store generates the id.
    async fn save(&self, new: &NewPermission) -> Result<Permission, StoreError>;

    /// Remove a grant by id. Removing an absent id is not an error.
    async fn delete(&self, id: &PermissionId) -> Result<(), StoreError>;

    /// Remove every grant on a snippet at a given level in one statement.
    /// Returns the number of rows removed.
    async fn delete_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_type_roundtrip() {
        for ty in [PermissionType::Owner, PermissionType::Viewer] {
            let parsed: PermissionType = ty.as_str().parse().unwrap();
            assert_eq!(ty, parsed);
        }
    }

    #[test]
    fn permission_type_parse_invalid() {
        assert!("ADMIN".parse::<PermissionType>().is_err());
        assert!("owner".parse::<PermissionType>().is_err()); // case sensitive
        assert!("".parse::<PermissionType>().is_err());
    }

    #[test]
    fn parse_error_names_the_input() {
        let err = "DEV".parse::<PermissionType>().unwrap_err();
        assert!(err.to_string().contains("DEV"));
    }

    // Tiny compile-time smoke test for trait object usage.
    struct NoopStore;

    #[async_trait::async_trait]
    impl Store for NoopStore {
        async fn find_all(&self) -> Result<Vec<Permission>, StoreError> {
            Ok(vec![])
        }

        async fn find_by_user(&self, _user_id: &UserId) -> Result<Vec<Permission>, StoreError> {
            Ok(vec![])
        }

        async fn find_by_snippet(
            &self,
            _snippet_id: SnippetId,
        ) -> Result<Vec<Permission>, StoreError> {
            Ok(vec![])
        }

        async fn find_by_user_and_snippet(
            &self,
            _user_id: &UserId,
            _snippet_id: SnippetId,
        ) -> Result<Option<Permission>, StoreError> {
            Ok(None)
        }

        async fn find_by_snippet_and_type(
            &self,
            _snippet_id: SnippetId,
            _permission_type: PermissionType,
        ) -> Result<Vec<Permission>, StoreError> {
            Ok(vec![])
        }

        async fn find_by_user_and_type(
            &self,
            _user_id: &UserId,
            _permission_type: PermissionType,
        ) -> Result<Vec<Permission>, StoreError> {
            Ok(vec![])
        }

        async fn exists_by_snippet_and_type(
            &self,
            _snippet_id: SnippetId,
            _permission_type: PermissionType,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn save(&self, new: &NewPermission) -> Result<Permission, StoreError> {
            Ok(Permission {
                id: PermissionId(Uuid::new_v4()),
                user_id: new.user_id.clone(),
                snippet_id: new.snippet_id,
                permission_type: new.permission_type,
                username: new.username.clone(),
                created_at: Utc::now(),
            })
        }

        async fn delete(&self, _id: &PermissionId) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_by_snippet_and_type(
            &self,
            _snippet_id: SnippetId,
            _permission_type: PermissionType,
        ) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn trait_smoke() {
        let s: &dyn Store = &NoopStore;

        let saved = s
            .save(&NewPermission {
                user_id: UserId("user-1".into()),
                snippet_id: SnippetId(1),
                permission_type: PermissionType::Owner,
                username: Some("User One".into()),
            })
            .await
            .unwrap();
        assert_eq!(saved.snippet_id, SnippetId(1));

        assert!(s.find_by_user(&saved.user_id).await.unwrap().is_empty());
        assert!(s
            .find_by_user_and_snippet(&saved.user_id, saved.snippet_id)
            .await
            .unwrap()
            .is_none());
        assert!(!s
            .exists_by_snippet_and_type(saved.snippet_id, PermissionType::Owner)
            .await
            .unwrap());
        s.delete(&saved.id).await.unwrap();
    }
}
