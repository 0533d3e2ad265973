use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use snipperm_storage::{
    NewPermission, Permission, PermissionId, PermissionType, SnippetId, Store, StoreError, UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape shared by every query: (id, user_id, snippet_id, type, username, created_at).
type PermissionRow = (Uuid, String, i64, String, Option<String>, DateTime<Utc>);

fn row_to_permission(row: PermissionRow) -> Result<Permission, StoreError> {
    let (id, user_id, snippet_id, permission_type, username, created_at) = row;
    let permission_type = permission_type
        .parse::<PermissionType>()
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(Permission {
        id: PermissionId(id),
        user_id: UserId(user_id),
        snippet_id: SnippetId(snippet_id),
        permission_type,
        username,
        created_at,
    })
}

fn rows_to_permissions(rows: Vec<PermissionRow>) -> Result<Vec<Permission>, StoreError> {
    rows.into_iter().map(row_to_permission).collect()
}

/// Postgres reports unique-index violations with SQLSTATE 23505.
fn map_insert_err(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::AlreadyExists;
        }
    }
    StoreError::Backend(e.to_string())
}

impl PostgresStore {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn find_all(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows_to_permissions(rows)
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions WHERE user_id=$1 ORDER BY seq",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows_to_permissions(rows)
    }

    async fn find_by_snippet(&self, snippet_id: SnippetId) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions WHERE snippet_id=$1 ORDER BY seq",
        )
        .bind(snippet_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows_to_permissions(rows)
    }

    async fn find_by_user_and_snippet(
        &self,
        user_id: &UserId,
        snippet_id: SnippetId,
    ) -> Result<Option<Permission>, StoreError> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions WHERE user_id=$1 AND snippet_id=$2 ORDER BY seq LIMIT 1",
        )
        .bind(&user_id.0)
        .bind(snippet_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_permission).transpose()
    }

    async fn find_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions WHERE snippet_id=$1 AND permission_type=$2 ORDER BY seq",
        )
        .bind(snippet_id.0)
        .bind(permission_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows_to_permissions(rows)
    }

    async fn find_by_user_and_type(
        &self,
        user_id: &UserId,
        permission_type: PermissionType,
    ) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions WHERE user_id=$1 AND permission_type=$2 ORDER BY seq",
        )
        .bind(&user_id.0)
        .bind(permission_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows_to_permissions(rows)
    }

    async fn exists_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM permissions WHERE snippet_id=$1 AND permission_type=$2)",
        )
        .bind(snippet_id.0)
        .bind(permission_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(row.0)
    }

    async fn save(&self, new: &NewPermission) -> Result<Permission, StoreError> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO permissions(id,user_id,snippet_id,permission_type,username,created_at)
             VALUES($1,$2,$3,$4,$5,$6)",
        )
        .bind(id)
        .bind(&new.user_id.0)
        .bind(new.snippet_id.0)
        .bind(new.permission_type.as_str())
        .bind(&new.username)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;
        Ok(Permission {
            id: PermissionId(id),
            user_id: new.user_id.clone(),
            snippet_id: new.snippet_id,
            permission_type: new.permission_type,
            username: new.username.clone(),
            created_at,
        })
    }

    async fn delete(&self, id: &PermissionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM permissions WHERE id=$1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_snippet_and_type(
        &self,
        snippet_id: SnippetId,
        permission_type: PermissionType,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM permissions WHERE snippet_id=$1 AND permission_type=$2")
                .bind(snippet_id.0)
                .bind(permission_type.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests;
