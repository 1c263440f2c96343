//! Per-recording claims
//!
//! A claim row marks a recording as being processed by one worker. Claims
//! older than the TTL are considered abandoned and can be taken over.

use crate::models::RecordingKey;
use chrono::Utc;
use mscope_common::Result;
use sqlx::SqlitePool;

/// Claim `key` for `worker_id`. Returns false while another worker holds a live claim.
pub async fn try_claim(pool: &SqlitePool, key: &RecordingKey, worker_id: &str, ttl_seconds: u64) -> Result<bool> {
    let now = Utc::now().timestamp();
    let stale_before = now.saturating_sub(ttl_seconds as i64);

    let result = sqlx::query(
        r#"
        INSERT INTO recording_claims (subject, session_datetime, recording_id, worker_id, claimed_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(subject, session_datetime, recording_id) DO UPDATE SET
            worker_id = excluded.worker_id,
            claimed_at = excluded.claimed_at
        WHERE recording_claims.claimed_at < ?
            OR recording_claims.worker_id = excluded.worker_id
        "#,
    )
    .bind(&key.subject)
    .bind(key.session_datetime_text())
    .bind(key.recording_id as i64)
    .bind(worker_id)
    .bind(now)
    .bind(stale_before)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Drop the claim on `key` if `worker_id` still holds it
pub async fn release(pool: &SqlitePool, key: &RecordingKey, worker_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM recording_claims
        WHERE subject = ? AND session_datetime = ? AND recording_id = ? AND worker_id = ?
        "#,
    )
    .bind(&key.subject)
    .bind(key.session_datetime_text())
    .bind(key.recording_id as i64)
    .bind(worker_id)
    .execute(pool)
    .await?;

    Ok(())
}
