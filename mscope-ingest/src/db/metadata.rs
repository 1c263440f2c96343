//! Computed recording metadata (`recording_info` + `recording_files`)

use super::recordings::key_from_row;
use crate::models::{RecordingFile, RecordingKey, RecordingMetadata, TimestampSource};
use chrono::{DateTime, Utc};
use mscope_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;

/// What a metadata write did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    /// Prior record and its file rows were replaced (force)
    Replaced,
    /// A record already existed and force was not set
    Unchanged,
}

pub async fn has_metadata(pool: &SqlitePool, key: &RecordingKey) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM recording_info
        WHERE subject = ? AND session_datetime = ? AND recording_id = ?
        "#,
    )
    .bind(&key.subject)
    .bind(key.session_datetime_text())
    .bind(key.recording_id as i64)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Write the info row and its file rows in one transaction.
///
/// With `replace == false` an existing record is left untouched. With
/// `replace == true` the existing record is deleted first; its file rows go
/// with it through the cascade.
pub async fn write_metadata(pool: &SqlitePool, metadata: &RecordingMetadata, replace: bool) -> Result<UpsertOutcome> {
    let key = &metadata.key;
    let datetime_text = key.session_datetime_text();
    let timestamps = serde_json::to_string(&metadata.timestamps)
        .map_err(|e| Error::Internal(format!("Failed to serialize timestamps: {}", e)))?;

    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM recording_info
        WHERE subject = ? AND session_datetime = ? AND recording_id = ?
        "#,
    )
    .bind(&key.subject)
    .bind(&datetime_text)
    .bind(key.recording_id as i64)
    .fetch_optional(&mut *tx)
    .await?;

    let outcome = match (existing.is_some(), replace) {
        (true, false) => {
            tx.rollback().await?;
            return Ok(UpsertOutcome::Unchanged);
        }
        (true, true) => {
            sqlx::query(
                r#"
                DELETE FROM recording_info
                WHERE subject = ? AND session_datetime = ? AND recording_id = ?
                "#,
            )
            .bind(&key.subject)
            .bind(&datetime_text)
            .bind(key.recording_id as i64)
            .execute(&mut *tx)
            .await?;
            UpsertOutcome::Replaced
        }
        (false, _) => UpsertOutcome::Inserted,
    };

    sqlx::query(
        r#"
        INSERT INTO recording_info (
            subject, session_datetime, recording_id, acquisition_software,
            total_frames, frame_rate, px_width, px_height, channels, depths,
            duration_seconds, segment_count, recording_path, data_root,
            nominal_frame_rate, gain, led_power, frame_interval_cv,
            timestamp_source, timestamps, computed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&key.subject)
    .bind(&datetime_text)
    .bind(key.recording_id as i64)
    .bind(&metadata.acquisition_software)
    .bind(metadata.total_frames as i64)
    .bind(metadata.frame_rate)
    .bind(metadata.width as i64)
    .bind(metadata.height as i64)
    .bind(metadata.channels as i64)
    .bind(metadata.depths as i64)
    .bind(metadata.duration_seconds)
    .bind(metadata.segment_count as i64)
    .bind(metadata.recording_path.to_string_lossy().into_owned())
    .bind(metadata.data_root.to_string_lossy().into_owned())
    .bind(metadata.nominal_frame_rate)
    .bind(metadata.gain)
    .bind(metadata.led_power)
    .bind(metadata.frame_interval_cv)
    .bind(metadata.timestamp_source.as_str())
    .bind(&timestamps)
    .bind(metadata.computed_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    for file in &metadata.files {
        sqlx::query(
            r#"
            INSERT INTO recording_files (
                subject, session_datetime, recording_id, file_ordinal, file_path, size_bytes, frame_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key.subject)
        .bind(&datetime_text)
        .bind(key.recording_id as i64)
        .bind(file.ordinal as i64)
        .bind(&file.relative_path)
        .bind(file.size_bytes as i64)
        .bind(file.frame_count as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(outcome)
}

/// Load a computed record with its file rows
pub async fn load_metadata(pool: &SqlitePool, key: &RecordingKey) -> Result<Option<RecordingMetadata>> {
    let datetime_text = key.session_datetime_text();

    let row = sqlx::query(
        r#"
        SELECT subject, session_datetime, recording_id, acquisition_software,
               total_frames, frame_rate, px_width, px_height, channels, depths,
               duration_seconds, segment_count, recording_path, data_root,
               nominal_frame_rate, gain, led_power, frame_interval_cv,
               timestamp_source, timestamps, computed_at
        FROM recording_info
        WHERE subject = ? AND session_datetime = ? AND recording_id = ?
        "#,
    )
    .bind(&key.subject)
    .bind(&datetime_text)
    .bind(key.recording_id as i64)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let file_rows = sqlx::query(
        r#"
        SELECT file_ordinal, file_path, size_bytes, frame_count
        FROM recording_files
        WHERE subject = ? AND session_datetime = ? AND recording_id = ?
        ORDER BY file_ordinal
        "#,
    )
    .bind(&key.subject)
    .bind(&datetime_text)
    .bind(key.recording_id as i64)
    .fetch_all(pool)
    .await?;

    let files = file_rows
        .iter()
        .map(|r| -> Result<RecordingFile> {
            Ok(RecordingFile {
                ordinal: r.try_get::<i64, _>("file_ordinal")? as u32,
                relative_path: r.try_get("file_path")?,
                size_bytes: r.try_get::<i64, _>("size_bytes")? as u64,
                frame_count: r.try_get::<i64, _>("frame_count")? as u64,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let source_text: String = row.try_get("timestamp_source")?;
    let timestamp_source = TimestampSource::parse(&source_text)
        .ok_or_else(|| Error::InvalidInput(format!("timestamp_source '{}'", source_text)))?;

    let timestamps_text: String = row.try_get("timestamps")?;
    let timestamps: Vec<f64> = serde_json::from_str(&timestamps_text)
        .map_err(|e| Error::InvalidInput(format!("timestamps: {}", e)))?;

    let computed_text: String = row.try_get("computed_at")?;
    let computed_at = DateTime::parse_from_rfc3339(&computed_text)
        .map_err(|e| Error::InvalidInput(format!("computed_at '{}': {}", computed_text, e)))?
        .with_timezone(&Utc);

    Ok(Some(RecordingMetadata {
        key: key_from_row(&row)?,
        acquisition_software: row.try_get("acquisition_software")?,
        total_frames: row.try_get::<i64, _>("total_frames")? as u64,
        frame_rate: row.try_get("frame_rate")?,
        width: row.try_get::<i64, _>("px_width")? as u32,
        height: row.try_get::<i64, _>("px_height")? as u32,
        channels: row.try_get::<i64, _>("channels")? as u32,
        depths: row.try_get::<i64, _>("depths")? as u32,
        duration_seconds: row.try_get("duration_seconds")?,
        segment_count: row.try_get::<i64, _>("segment_count")? as u32,
        recording_path: PathBuf::from(row.try_get::<String, _>("recording_path")?),
        data_root: PathBuf::from(row.try_get::<String, _>("data_root")?),
        nominal_frame_rate: row.try_get("nominal_frame_rate")?,
        gain: row.try_get("gain")?,
        led_power: row.try_get("led_power")?,
        frame_interval_cv: row.try_get("frame_interval_cv")?,
        timestamp_source,
        timestamps,
        files,
        computed_at,
    }))
}
