//! Persistence boundary for the population scheduler
//!
//! The scheduler only talks to [`MetadataStore`]. [`SqliteMetadataStore`] is
//! the production implementation; writes go through `retry_on_lock` so
//! concurrent workers on one database do not fail on transient locks.

use crate::db::{self, UpsertOutcome};
use crate::models::{RecordingKey, RecordingMetadata, RecordingReference};
use crate::utils::retry_on_lock;
use async_trait::async_trait;
use mscope_common::db::{get_setting_i64, SETTING_MAX_LOCK_WAIT_MS};
use mscope_common::Result;
use sqlx::SqlitePool;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All registered recordings
    async fn list_references(&self) -> Result<Vec<RecordingReference>>;

    /// Registered recordings without computed metadata
    async fn list_missing(&self) -> Result<Vec<RecordingReference>> {
        let mut missing = Vec::new();
        for reference in self.list_references().await? {
            if !self.has_metadata(&reference.key).await? {
                missing.push(reference);
            }
        }
        Ok(missing)
    }

    async fn has_metadata(&self, key: &RecordingKey) -> Result<bool>;

    async fn load_metadata(&self, key: &RecordingKey) -> Result<Option<RecordingMetadata>>;

    /// Write `metadata` atomically; an existing record is replaced only with `force`
    async fn upsert_metadata(&self, metadata: &RecordingMetadata, force: bool) -> Result<UpsertOutcome>;

    /// Claim `key` for `worker_id`; false while another live claim exists
    async fn claim(&self, key: &RecordingKey, worker_id: &str, ttl_seconds: u64) -> Result<bool>;

    async fn release(&self, key: &RecordingKey, worker_id: &str) -> Result<()>;
}

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn max_lock_wait_ms(&self) -> Result<u64> {
        let ms = get_setting_i64(&self.pool, SETTING_MAX_LOCK_WAIT_MS, 5000).await?;
        Ok(ms.max(0) as u64)
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn list_references(&self) -> Result<Vec<RecordingReference>> {
        db::recordings::list_references(&self.pool).await
    }

    async fn list_missing(&self) -> Result<Vec<RecordingReference>> {
        db::recordings::list_missing(&self.pool).await
    }

    async fn has_metadata(&self, key: &RecordingKey) -> Result<bool> {
        db::metadata::has_metadata(&self.pool, key).await
    }

    async fn load_metadata(&self, key: &RecordingKey) -> Result<Option<RecordingMetadata>> {
        db::metadata::load_metadata(&self.pool, key).await
    }

    async fn upsert_metadata(&self, metadata: &RecordingMetadata, force: bool) -> Result<UpsertOutcome> {
        let max_wait = self.max_lock_wait_ms().await?;
        retry_on_lock("metadata upsert", max_wait, || {
            db::metadata::write_metadata(&self.pool, metadata, force)
        })
        .await
    }

    async fn claim(&self, key: &RecordingKey, worker_id: &str, ttl_seconds: u64) -> Result<bool> {
        let max_wait = self.max_lock_wait_ms().await?;
        retry_on_lock("recording claim", max_wait, || {
            db::claims::try_claim(&self.pool, key, worker_id, ttl_seconds)
        })
        .await
    }

    async fn release(&self, key: &RecordingKey, worker_id: &str) -> Result<()> {
        let max_wait = self.max_lock_wait_ms().await?;
        retry_on_lock("claim release", max_wait, || {
            db::claims::release(&self.pool, key, worker_id)
        })
        .await
    }
}
