use std::sync::Arc;

use snipperm_storage::*;
use snipperm_store_postgres::PostgresStore;
use snipperm_store_sqlite::SqliteStore;

/// StoreBackend abstracts over the SQLite and PostgreSQL implementations
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Arc<SqliteStore>),
    Postgres(Arc<PostgresStore>),
}

#[async_trait::async_trait]
impl Store for StoreBackend {
    async fn find_all(&self) -> Result<Vec<Permission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.find_all().await,
            StoreBackend::Postgres(s) => s.find_all().await,
        }
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Permission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.find_by_user(user_id).await,
            StoreBackend::Postgres(s) => s.find_by_user(user_id).await,
        }
    }

    async fn find_by_snippet(&self, snippet_id: SnippetId) -> Result<Vec<Permission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.find_by_snippet(snippet_id).await,
            StoreBackend::Postgres(s) => s.find_by_snippet(snippet_id).await,
        }
    }

    async fn find_by_user_and_snippet(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
    ) -> Result<Option<Permission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.find_by_user_and_snippet(user_id, snippet_id).await,
            StoreBackend::Postgres(s) => s.find_by_user_and_snippet(user_id, snippet_id).await,
        }
    }

    async fn find_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<Vec<Permission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => {
                s.find_by_snippet_and_type(snippet_id, permission_type).await
            }
            StoreBackend::Postgres(s) => {
                s.find_by_snippet_and_type(snippet_id, permission_type).await
            }
        }
    }

    async fn find_by_user_and_type(
        &self,
        user_id: &UserId,
        permission_type: PermissionType,
    ) -> Result<Vec<Permission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.find_by_user_and_type(user_id, permission_type).await,
            StoreBackend::Postgres(s) => s.find_by_user_and_type(user_id, permission_type).await,
        }
    }

    async fn exists_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<bool, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => {
                s.exists_by_snippet_and_type(snippet_id, permission_type).await
            }
            StoreBackend::Postgres(s) => {
                s.exists_by_snippet_and_type(snippet_id, permission_type).await
            }
        }
    }

    async fn save(&self, new: &NewPermission) -> Result<Permission, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.save(new).await,
            StoreBackend::Postgres(s) => s.save(new).await,
        }
    }

    async fn delete(&self, id: &PermissionId) -> Result<(), StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.delete(id).await,
            StoreBackend::Postgres(s) => s.delete(id).await,
        }
    }

    async fn delete_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<u64, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => {
                s.delete_by_snippet_and_type(snippet_id, permission_type).await
            }
            StoreBackend::Postgres(s) => {
                s.delete_by_snippet_and_type(snippet_id, permission_type).await
            }
        }
    }
}
