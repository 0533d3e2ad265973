use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use snipperm_storage::{
    NewPermission, Permission, PermissionId, PermissionType, SnippetId, Store, StoreError, UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

/// Row shape shared by every query: (id, user_id, snippet_id, type, username, created_at).
type PermissionRow = (String, String, i64, String, Option<String>, DateTime<Utc>);

fn row_to_permission(row: PermissionRow) -> Result<Permission, StoreError> {
    let (id, user_id, snippet_id, permission_type, username, created_at) = row;
    let id = Uuid::try_parse(&id).map_err(|e| StoreError::Backend(e.to_string()))?;
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

impl SqliteStore {
    /// `~/.snipperm/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".snipperm");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
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
impl Store for SqliteStore {
    async fn find_all(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows_to_permissions(rows)
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id,user_id,snippet_id,permission_type,username,created_at
             FROM permissions WHERE user_id=? ORDER BY rowid",
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
             FROM permissions WHERE snippet_id=? ORDER BY rowid",
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
             FROM permissions WHERE user_id=? AND snippet_id=? ORDER BY rowid LIMIT 1",
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
             FROM permissions WHERE snippet_id=? AND permission_type=? ORDER BY rowid",
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
             FROM permissions WHERE user_id=? AND permission_type=? ORDER BY rowid",
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
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(1) FROM permissions WHERE snippet_id=? AND permission_type=?",
        )
        .bind(snippet_id.0)
        .bind(permission_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(row.0 > 0)
    }

    async fn save(&self, new: &NewPermission) -> Result<Permission, StoreError> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO permissions(id,user_id,snippet_id,permission_type,username,created_at)
             VALUES(?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(&new.user_id.0)
        .bind(new.snippet_id.0)
        .bind(new.permission_type.as_str())
        .bind(&new.username)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;
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
        sqlx::query("DELETE FROM permissions WHERE id=?")
            .bind(id.0.to_string())
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
        let result = sqlx::query("DELETE FROM permissions WHERE snippet_id=? AND permission_type=?")
            .bind(snippet_id.0)
            .bind(permission_type.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
