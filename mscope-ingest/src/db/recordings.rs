//! Registered recordings and the pending set

use crate::models::{RecordingKey, RecordingReference, SESSION_DATETIME_FORMAT};
use chrono::NaiveDateTime;
use mscope_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Register a recording. Returns false when the key already exists;
/// an existing reference is never modified.
pub async fn register_recording(pool: &SqlitePool, reference: &RecordingReference) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO recordings (subject, session_datetime, recording_id, acquisition_software, recording_directory)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(subject, session_datetime, recording_id) DO NOTHING
        "#,
    )
    .bind(&reference.key.subject)
    .bind(reference.key.session_datetime_text())
    .bind(reference.key.recording_id as i64)
    .bind(&reference.acquisition_software)
    .bind(&reference.recording_directory)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// All registered recordings, in key order
pub async fn list_references(pool: &SqlitePool) -> Result<Vec<RecordingReference>> {
    let rows = sqlx::query(
        r#"
        SELECT subject, session_datetime, recording_id, acquisition_software, recording_directory
        FROM recordings
        ORDER BY subject, session_datetime, recording_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(reference_from_row).collect()
}

/// Registered recordings without computed metadata, in key order
pub async fn list_missing(pool: &SqlitePool) -> Result<Vec<RecordingReference>> {
    let rows = sqlx::query(
        r#"
        SELECT r.subject, r.session_datetime, r.recording_id, r.acquisition_software, r.recording_directory
        FROM recordings r
        LEFT JOIN recording_info i
            ON i.subject = r.subject
            AND i.session_datetime = r.session_datetime
            AND i.recording_id = r.recording_id
        WHERE i.subject IS NULL
        ORDER BY r.subject, r.session_datetime, r.recording_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(reference_from_row).collect()
}

/// Key columns (`subject`, `session_datetime`, `recording_id`) of any row
pub(crate) fn key_from_row(row: &SqliteRow) -> Result<RecordingKey> {
    let subject: String = row.try_get("subject")?;
    let datetime_text: String = row.try_get("session_datetime")?;
    let recording_id: i64 = row.try_get("recording_id")?;

    let session_datetime = NaiveDateTime::parse_from_str(&datetime_text, SESSION_DATETIME_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("session_datetime '{}': {}", datetime_text, e)))?;
    let recording_id = u32::try_from(recording_id)
        .map_err(|_| Error::InvalidInput(format!("recording_id {} out of range", recording_id)))?;

    Ok(RecordingKey::new(subject, session_datetime, recording_id))
}

fn reference_from_row(row: &SqliteRow) -> Result<RecordingReference> {
    Ok(RecordingReference {
        key: key_from_row(row)?,
        acquisition_software: row.try_get("acquisition_software")?,
        recording_directory: row.try_get("recording_directory")?,
    })
}
