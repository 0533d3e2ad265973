//! Postgres backend tests. These need a reachable PostgreSQL server, so they
//! are ignored by default; run them with `cargo test -- --ignored` against a
//! local instance (credentials via POSTGRES_* env vars).

use super::*;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};
use snipperm_storage::{NewPermission, PermissionType, SnippetId, Store, StoreError, UserId};

fn admin_url() -> (String, String, String, String) {
    let pg_user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let pg_pass = std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
    let pg_host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let pg_port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    (pg_user, pg_pass, pg_host, pg_port)
}

/// Create a unique test database and return the PostgresStore
async fn test_store() -> (PostgresStore, String) {
    let test_id = std::process::id();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let db_name = format!("snipperm_test_{}_{}", test_id, timestamp);

    let (pg_user, pg_pass, pg_host, pg_port) = admin_url();
    let admin = format!(
        "postgres://{}:{}@{}:{}/postgres",
        pg_user, pg_pass, pg_host, pg_port
    );
    let mut conn = PgConnection::connect(&admin).await.unwrap();

    let drop_query = format!("DROP DATABASE IF EXISTS {}", db_name);
    let _ = conn.execute(drop_query.as_str()).await;
    let create_query = format!("CREATE DATABASE {}", db_name);
    conn.execute(create_query.as_str()).await.unwrap();
    drop(conn);

    let db_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        pg_user, pg_pass, pg_host, pg_port, db_name
    );
    let store = PostgresStore::open(&db_url).await.unwrap();

    (store, db_name)
}

async fn cleanup_db(db_name: &str) {
    let (pg_user, pg_pass, pg_host, pg_port) = admin_url();
    let admin = format!(
        "postgres://{}:{}@{}:{}/postgres",
        pg_user, pg_pass, pg_host, pg_port
    );
    if let Ok(mut conn) = PgConnection::connect(&admin).await {
        let drop_query = format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", db_name);
        let _ = conn.execute(drop_query.as_str()).await;
    }
}

fn grant(user: &str, snippet: i64, ty: PermissionType) -> NewPermission {
    NewPermission {
        user_id: UserId(user.to_string()),
        snippet_id: SnippetId(snippet),
        permission_type: ty,
        username: Some(format!("user-{user}")),
    }
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL server"]
async fn save_query_and_delete_round_trip() {
    let (s, db) = test_store().await;

    let owner = s.save(&grant("1", 1, PermissionType::Owner)).await.unwrap();
    s.save(&grant("2", 1, PermissionType::Viewer)).await.unwrap();
    s.save(&grant("1", 2, PermissionType::Viewer)).await.unwrap();

    assert_eq!(s.find_all().await.unwrap().len(), 3);
    assert_eq!(s.find_by_user(&UserId("1".into())).await.unwrap().len(), 2);
    assert_eq!(s.find_by_snippet(SnippetId(1)).await.unwrap().len(), 2);

    let pair = s
        .find_by_user_and_snippet(&UserId("1".into()), SnippetId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pair.id, owner.id);

    let owners = s
        .find_by_snippet_and_type(SnippetId(1), PermissionType::Owner)
        .await
        .unwrap();
    assert_eq!(owners.len(), 1);

    assert!(s
        .exists_by_snippet_and_type(SnippetId(1), PermissionType::Owner)
        .await
        .unwrap());

    s.delete(&owner.id).await.unwrap();
    s.delete(&owner.id).await.unwrap(); // idempotent
    assert!(!s
        .exists_by_snippet_and_type(SnippetId(1), PermissionType::Owner)
        .await
        .unwrap());

    cleanup_db(&db).await;
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL server"]
async fn second_owner_insert_conflicts() {
    let (s, db) = test_store().await;

    s.save(&grant("1", 1, PermissionType::Owner)).await.unwrap();
    let err = s
        .save(&grant("2", 1, PermissionType::Owner))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    s.save(&grant("2", 2, PermissionType::Owner)).await.unwrap();

    cleanup_db(&db).await;
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL server"]
async fn cascade_primitive_counts_and_scopes() {
    let (s, db) = test_store().await;

    s.save(&grant("1", 1, PermissionType::Owner)).await.unwrap();
    s.save(&grant("2", 1, PermissionType::Viewer)).await.unwrap();
    s.save(&grant("3", 1, PermissionType::Viewer)).await.unwrap();
    s.save(&grant("2", 2, PermissionType::Viewer)).await.unwrap();

    let removed = s
        .delete_by_snippet_and_type(SnippetId(1), PermissionType::Viewer)
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(s.find_by_snippet(SnippetId(1)).await.unwrap().len(), 1);
    assert_eq!(s.find_by_snippet(SnippetId(2)).await.unwrap().len(), 1);

    cleanup_db(&db).await;
}
