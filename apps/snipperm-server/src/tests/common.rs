//! Common test helpers for server tests.

use std::sync::Arc;

use snipperm_directory::{Directory, DirectoryError, DirectoryUser, StaticDirectory};
use snipperm_store_sqlite::SqliteStore;

use crate::server::PermissionServer;

/// Users known to the test directory.
pub fn directory_users() -> Vec<(String, String)> {
    vec![
        ("1".to_string(), "User One".to_string()),
        ("2".to_string(), "User Two".to_string()),
        ("3".to_string(), "User Three".to_string()),
        ("4".to_string(), "User Four".to_string()),
    ]
}

/// Test helper: in-memory SQLite plus a fixed directory.
pub async fn create_test_server() -> PermissionServer {
    create_test_server_with_directory(StaticDirectory::new(directory_users())).await
}

pub async fn create_test_server_with_directory(
    directory: impl Directory + 'static,
) -> PermissionServer {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    PermissionServer::new_sqlite(store, Arc::new(directory))
}

/// A directory that is down: every call fails `Unavailable`.
pub struct UnavailableDirectory;

#[async_trait::async_trait]
impl Directory for UnavailableDirectory {
    async fn resolve_display_name(&self, _user_id: &str) -> Result<String, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".into()))
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".into()))
    }
}
