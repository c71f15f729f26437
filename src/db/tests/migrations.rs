use crate::db::*;
use tempfile::{NamedTempFile, TempDir};

#[tokio::test]
async fn test_migrations_are_recorded_once() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let db = Database::new(&path).await.unwrap();
    db.close().await;

    // Reopening must not re-run v1 (CREATE TABLE would fail)
    let db = Database::new(&path).await.unwrap();
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);

    db.close().await;
}

#[tokio::test]
async fn test_new_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state").join("media-dl.db");

    let db = Database::new(&path).await.unwrap();
    assert!(path.exists());
    assert_eq!(db.count_history().await.unwrap(), 0);

    db.close().await;
}
