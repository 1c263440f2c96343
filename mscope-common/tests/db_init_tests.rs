//! Database initialization tests

use mscope_common::db::{get_setting_i64, init_database, SETTING_MAX_LOCK_WAIT_MS};
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_init_creates_database_and_tables() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("mscope.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "database file should be created");
    let tables = table_names(&pool).await;
    for expected in [
        "recording_claims",
        "recording_files",
        "recording_info",
        "recordings",
        "settings",
    ] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("mscope.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '9000' WHERE key = ?")
        .bind(SETTING_MAX_LOCK_WAIT_MS)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    // Reopening keeps existing settings
    let pool = init_database(&db_path).await.unwrap();
    let wait = get_setting_i64(&pool, SETTING_MAX_LOCK_WAIT_MS, 0).await.unwrap();
    assert_eq!(wait, 9000);
}

#[tokio::test]
async fn test_missing_setting_uses_default() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mscope.db")).await.unwrap();

    let value = get_setting_i64(&pool, "no_such_setting", 42).await.unwrap();
    assert_eq!(value, 42);
}
