use std::collections::HashMap;
use std::sync::Arc;

use snipperm_directory::Directory;
use snipperm_storage::{
    NewPermission, Permission, PermissionType, SnippetId, Store, UserId,
};
use snipperm_store_postgres::PostgresStore;
use snipperm_store_sqlite::SqliteStore;

use crate::backend::StoreBackend;
use crate::error::{ApiError, ApiResult};

/// A grant joined with the display name of its snippet's owner, as returned
/// by the per-user listing.
#[derive(Clone, Debug)]
pub struct PermissionWithOwner {
    pub permission: Permission,
    pub owner_username: String,
}

/// The permission service: every business rule lives here. Handlers stay thin
/// and callers arrive pre-authenticated; this layer only authorizes.
#[derive(Clone)]
pub struct PermissionServer {
    pub store: StoreBackend,
    pub directory: Arc<dyn Directory>,
}

/// Coerce an external permission-type string into the closed enum.
pub fn parse_permission_type(s: &str) -> ApiResult<PermissionType> {
    s.parse::<PermissionType>()
        .map_err(|_| ApiError::BadRequest("invalid permission type".into()))
}

impl PermissionServer {
    pub fn new_sqlite(store: Arc<SqliteStore>, directory: Arc<dyn Directory>) -> Self {
        Self {
            store: StoreBackend::Sqlite(store),
            directory,
        }
    }

    pub fn new_postgres(store: Arc<PostgresStore>, directory: Arc<dyn Directory>) -> Self {
        Self {
            store: StoreBackend::Postgres(store),
            directory,
        }
    }

    // ─────────────────────────────── Mutations ───────────────────────────────

    /// Grant `permission_type` on a snippet to a user. Owner grants are unique
    /// per snippet: the pre-check gives the friendly conflict on the fast
    /// path, and the store's conditional insert closes the race (a losing
    /// concurrent insert comes back as `Conflict` too).
    pub async fn assign_permission(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> ApiResult<Permission> {
        if permission_type == PermissionType::Owner
            && self
                .store
                .exists_by_snippet_and_type(snippet_id, PermissionType::Owner)
                .await?
        {
            return Err(ApiError::Conflict("snippet already has an owner".into()));
        }

        let username = self.directory.resolve_display_name(&user_id.0).await?;

        let saved = self
            .store
            .save(&NewPermission {
                user_id: user_id.clone(),
                snippet_id,
                permission_type,
                username: Some(username),
            })
            .await?;
        Ok(saved)
    }

    /// Remove the caller's grant on a snippet and return it. Removing an
    /// owner grant revokes every viewer grant on the snippet in the same
    /// logical operation.
    pub async fn remove_permission(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
    ) -> ApiResult<Permission> {
        let permission = self
            .store
            .find_by_user_and_snippet(user_id, snippet_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("permission not found".into()))?;

        self.store.delete(&permission.id).await?;

        if permission.permission_type == PermissionType::Owner {
            let revoked = self
                .store
                .delete_by_snippet_and_type(snippet_id, PermissionType::Viewer)
                .await?;
            if revoked > 0 {
                tracing::info!(
                    snippet_id = snippet_id.0,
                    revoked,
                    "cascaded viewer revocation after owner removal"
                );
            }
        }

        Ok(permission)
    }

    /// Replace the caller's grant on a snippet with one of a new level. The
    /// replacement keeps the (user, snippet) pair but carries a fresh id.
    pub async fn update_permission(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> ApiResult<Permission> {
        let existing = self
            .store
            .find_by_user_and_snippet(user_id, snippet_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("permission not found".into()))?;

        self.store.delete(&existing.id).await?;

        let username = self.directory.resolve_display_name(&user_id.0).await?;
        let replacement = self
            .store
            .save(&NewPermission {
                user_id: user_id.clone(),
                snippet_id,
                permission_type,
                username: Some(username),
            })
            .await?;
        Ok(replacement)
    }

    /// Grant viewer access on a snippet to another user. Only the snippet's
    /// owner may share.
    pub async fn share_permission(
        &self,
        caller: &UserId,
        target_user: &UserId,
        snippet_id: SnippetId,
    ) -> ApiResult<Permission> {
        if !self.is_owner(caller, snippet_id).await? {
            return Err(ApiError::Forbidden("not the owner".into()));
        }
        self.assign_permission(target_user, snippet_id, PermissionType::Viewer)
            .await
    }

    // ─────────────────────────────── Lookups ───────────────────────────────

    /// Every grant held by a user, each joined with the display name of its
    /// snippet's owner. Owner lookups are batched per distinct snippet; a
    /// snippet without an owner fails the whole call.
    pub async fn permissions_by_user(&self, user_id: &UserId) -> ApiResult<Vec<PermissionWithOwner>> {
        let grants = self.store.find_by_user(user_id).await?;

        let mut owner_names: HashMap<i64, String> = HashMap::new();
        for grant in &grants {
            if owner_names.contains_key(&grant.snippet_id.0) {
                continue;
            }
            let owner = self.owner_by_snippet(grant.snippet_id).await?;
            let name = owner.username.unwrap_or_else(|| owner.user_id.0.clone());
            owner_names.insert(grant.snippet_id.0, name);
        }

        Ok(grants
            .into_iter()
            .map(|permission| {
                let owner_username = owner_names[&permission.snippet_id.0].clone();
                PermissionWithOwner {
                    permission,
                    owner_username,
                }
            })
            .collect())
    }

    pub async fn permissions_by_snippet(&self, snippet_id: SnippetId) -> ApiResult<Vec<Permission>> {
        Ok(self.store.find_by_snippet(snippet_id).await?)
    }

    pub async fn permission_by_user_and_snippet(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
    ) -> ApiResult<Permission> {
        self.store
            .find_by_user_and_snippet(user_id, snippet_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("permission not found".into()))
    }

    pub async fn permissions_by_user_and_type(
        &self,
        user_id: &UserId,
        permission_type: &str,
    ) -> ApiResult<Vec<Permission>> {
        let permission_type = parse_permission_type(permission_type)?;
        Ok(self
            .store
            .find_by_user_and_type(user_id, permission_type)
            .await?)
    }

    pub async fn permissions_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: &str,
    ) -> ApiResult<Vec<Permission>> {
        let permission_type = parse_permission_type(permission_type)?;
        Ok(self
            .store
            .find_by_snippet_and_type(snippet_id, permission_type)
            .await?)
    }

    /// The unique owner grant for a snippet.
    pub async fn owner_by_snippet(&self, snippet_id: SnippetId) -> ApiResult<Permission> {
        self.store
            .find_by_snippet_and_type(snippet_id, PermissionType::Owner)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound("owner not found".into()))
    }

    pub async fn has_owner(&self, snippet_id: SnippetId) -> ApiResult<bool> {
        Ok(self
            .store
            .exists_by_snippet_and_type(snippet_id, PermissionType::Owner)
            .await?)
    }

    /// True iff the caller holds the owner grant on the snippet.
    pub async fn is_owner(&self, user_id: &UserId, snippet_id: SnippetId) -> ApiResult<bool> {
        let owners = self
            .store
            .find_by_snippet_and_type(snippet_id, PermissionType::Owner)
            .await?;
        Ok(owners.iter().any(|p| p.user_id == *user_id))
    }
}
