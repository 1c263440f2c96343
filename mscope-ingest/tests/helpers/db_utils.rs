//! Database Test Utilities

use chrono::NaiveDate;
use mscope_common::db::init_database;
use mscope_common::IngestConfig;
use mscope_ingest::db::recordings::register_recording;
use mscope_ingest::{RecordingKey, RecordingReference, SqliteMetadataStore};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Temporary database with the schema applied.
///
/// Returns (TempDir, store); the TempDir must outlive the test.
pub async fn create_test_db() -> (TempDir, Arc<SqliteMetadataStore>) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("test_mscope.db")).await.unwrap();
    (temp_dir, Arc::new(SqliteMetadataStore::new(pool)))
}

/// Key on a fixed session date
pub fn key(subject: &str, recording_id: u32) -> RecordingKey {
    let session = NaiveDate::from_ymd_opt(2023, 5, 17)
        .unwrap()
        .and_hms_opt(14, 2, 33)
        .unwrap();
    RecordingKey::new(subject, session, recording_id)
}

pub async fn register(pool: &SqlitePool, key: &RecordingKey, software: &str, directory: &str) {
    let reference = RecordingReference {
        key: key.clone(),
        acquisition_software: software.to_string(),
        recording_directory: directory.to_string(),
    };
    assert!(register_recording(pool, &reference).await.unwrap());
}

pub fn test_config(roots: Vec<PathBuf>) -> IngestConfig {
    IngestConfig {
        data_roots: roots,
        ..Default::default()
    }
}
