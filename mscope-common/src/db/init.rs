//! Database initialization
//!
//! Opens (or creates) the SQLite database and applies the idempotent schema.
//! Safe to call on every startup and from several processes at once.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Setting key: total time a write keeps retrying on lock contention
pub const SETTING_MAX_LOCK_WAIT_MS: &str = "db_max_lock_wait_ms";

/// SQLite busy timeout applied to every pooled connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Open the database file, creating it and its parent directory if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas are per connection, so they go on the connect options
    // rather than through a single query on the pool.
    // WAL lets readers proceed while one worker commits a recording.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and default settings (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_recordings_table(pool).await?;
    create_recording_info_table(pool).await?;
    create_recording_files_table(pool).await?;
    create_recording_claims_table(pool).await?;

    ensure_setting(pool, SETTING_MAX_LOCK_WAIT_MS, "5000").await?;

    Ok(())
}

/// Key-value settings shared by all workers
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Registered recordings (written by the registration front-end, read-only to ingest)
pub async fn create_recordings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            subject TEXT NOT NULL,
            session_datetime TEXT NOT NULL,
            recording_id INTEGER NOT NULL,
            acquisition_software TEXT NOT NULL,
            recording_directory TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (subject, session_datetime, recording_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One computed metadata row per recording
pub async fn create_recording_info_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recording_info (
            subject TEXT NOT NULL,
            session_datetime TEXT NOT NULL,
            recording_id INTEGER NOT NULL,
            acquisition_software TEXT NOT NULL,
            total_frames INTEGER NOT NULL CHECK (total_frames >= 1),
            frame_rate REAL NOT NULL CHECK (frame_rate > 0),
            px_width INTEGER NOT NULL,
            px_height INTEGER NOT NULL,
            channels INTEGER NOT NULL,
            depths INTEGER NOT NULL,
            duration_seconds REAL NOT NULL,
            segment_count INTEGER NOT NULL,
            recording_path TEXT NOT NULL,
            data_root TEXT NOT NULL,
            nominal_frame_rate REAL,
            gain REAL,
            led_power REAL,
            frame_interval_cv REAL NOT NULL,
            timestamp_source TEXT NOT NULL,
            timestamps TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (subject, session_datetime, recording_id),
            FOREIGN KEY (subject, session_datetime, recording_id)
                REFERENCES recordings(subject, session_datetime, recording_id)
                ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Part table: the ordered segment files of each computed recording
pub async fn create_recording_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recording_files (
            subject TEXT NOT NULL,
            session_datetime TEXT NOT NULL,
            recording_id INTEGER NOT NULL,
            file_ordinal INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            frame_count INTEGER NOT NULL,
            PRIMARY KEY (subject, session_datetime, recording_id, file_ordinal),
            FOREIGN KEY (subject, session_datetime, recording_id)
                REFERENCES recording_info(subject, session_datetime, recording_id)
                ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-recording claims serializing workers that race on the same key
pub async fn create_recording_claims_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recording_claims (
            subject TEXT NOT NULL,
            session_datetime TEXT NOT NULL,
            recording_id INTEGER NOT NULL,
            worker_id TEXT NOT NULL,
            claimed_at INTEGER NOT NULL,
            PRIMARY KEY (subject, session_datetime, recording_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a setting with its default value unless it already has one
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE: several workers may initialize concurrently
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

/// Read an integer setting, falling back to `default` when absent or malformed
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<String> = sqlx::query_scalar::<_, Option<String>>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .flatten();

    Ok(value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default))
}
