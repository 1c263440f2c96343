//! Population scheduler
//!
//! Computes metadata for every registered recording that lacks it. Each
//! recording is claimed, run through the pipeline on the blocking pool, and
//! released. A failure is recorded in the report and never stops the pass;
//! the recording stays pending and is retried on the next call.

use crate::db::UpsertOutcome;
use crate::error::{IngestError, IngestResult};
use crate::formats::detect;
use crate::models::{FailedRecording, PopulateReport, RecordingMetadata, RecordingReference, RecordingWarning};
use crate::services::{aggregate, enumerate, extract, persist, reconcile, resolve};
use crate::store::MetadataStore;
use futures::stream::{self, StreamExt};
use mscope_common::IngestConfig;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Registered / computed / pending totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub registered: usize,
    pub computed: usize,
    pub pending: usize,
}

enum RecordingOutcome {
    Computed { warning: Option<IngestError> },
    Skipped(&'static str),
    Failed(IngestError),
}

pub struct PopulationScheduler<S: MetadataStore> {
    store: Arc<S>,
    config: Arc<IngestConfig>,
    worker_id: String,
}

impl<S: MetadataStore> PopulationScheduler<S> {
    pub fn new(store: Arc<S>, config: IngestConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            worker_id: Uuid::new_v4().to_string(),
        }
    }

    /// Use a fixed worker identity instead of a random one
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Compute metadata for every pending recording.
    ///
    /// With `force`, every registered recording is recomputed and its
    /// existing record replaced. Only a failure to list the pending set is
    /// returned as an error.
    pub async fn populate(&self, force: bool) -> IngestResult<PopulateReport> {
        let pending = if force {
            self.store.list_references().await?
        } else {
            self.store.list_missing().await?
        };

        let concurrency = self.config.max_concurrent_recordings.max(1);
        tracing::info!(
            pending = pending.len(),
            force,
            concurrency,
            worker_id = %self.worker_id,
            "Starting population pass"
        );

        let outcomes: Vec<(RecordingReference, RecordingOutcome)> = stream::iter(pending)
            .map(|reference| async move {
                let outcome = self.process(&reference, force).await;
                (reference, outcome)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = PopulateReport::default();
        for (reference, outcome) in outcomes {
            let key = reference.key;
            match outcome {
                RecordingOutcome::Computed { warning } => {
                    if let Some(w) = warning {
                        report.warnings.push(RecordingWarning {
                            key: key.clone(),
                            kind: w.kind(),
                            message: w.to_string(),
                        });
                    }
                    report.succeeded.push(key);
                }
                RecordingOutcome::Skipped(reason) => {
                    tracing::debug!(recording = %key, reason, "Skipped recording");
                    report.skipped.push(key);
                }
                RecordingOutcome::Failed(err) => {
                    report.failed.push(FailedRecording {
                        key,
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        report.succeeded.sort();
        report.skipped.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        report.warnings.sort_by(|a, b| a.key.cmp(&b.key));

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            warnings = report.warnings.len(),
            "Population pass completed"
        );

        Ok(report)
    }

    /// Registered / computed / pending counts
    pub async fn status(&self) -> IngestResult<StatusCounts> {
        let registered = self.store.list_references().await?.len();
        let pending = self.store.list_missing().await?.len();
        Ok(StatusCounts {
            registered,
            computed: registered.saturating_sub(pending),
            pending,
        })
    }

    async fn process(&self, reference: &RecordingReference, force: bool) -> RecordingOutcome {
        let key = &reference.key;

        match self.store.claim(key, &self.worker_id, self.config.claim_ttl_seconds).await {
            Ok(true) => {}
            Ok(false) => return RecordingOutcome::Skipped("claimed by another worker"),
            Err(e) => return self.fail(reference, e.into()),
        }

        let outcome = self.process_claimed(reference, force).await;

        if let Err(e) = self.store.release(key, &self.worker_id).await {
            tracing::warn!(recording = %key, error = %e, "Failed to release claim");
        }

        outcome
    }

    async fn process_claimed(&self, reference: &RecordingReference, force: bool) -> RecordingOutcome {
        // Another worker may have finished it between listing and claiming
        if !force {
            match self.store.has_metadata(&reference.key).await {
                Ok(true) => return RecordingOutcome::Skipped("already computed"),
                Ok(false) => {}
                Err(e) => return self.fail(reference, e.into()),
            }
        }

        let task_reference = reference.clone();
        let config = self.config.clone();
        let computed = tokio::task::spawn_blocking(move || compute_metadata(&task_reference, &config))
            .await
            .map_err(|e| IngestError::Internal(format!("pipeline task failed: {}", e)))
            .and_then(|result| result);

        let (metadata, warning) = match computed {
            Ok(v) => v,
            Err(e) => return self.fail(reference, e),
        };

        match persist(self.store.as_ref(), &metadata, force).await {
            Ok(UpsertOutcome::Unchanged) => RecordingOutcome::Skipped("already computed"),
            Ok(outcome) => {
                tracing::info!(
                    recording = %reference.key,
                    software = %metadata.acquisition_software,
                    segments = metadata.segment_count,
                    frames = metadata.total_frames,
                    frame_rate = metadata.frame_rate,
                    ?outcome,
                    "Recording metadata computed"
                );
                RecordingOutcome::Computed { warning }
            }
            Err(e) => self.fail(reference, e),
        }
    }

    fn fail(&self, reference: &RecordingReference, err: IngestError) -> RecordingOutcome {
        log_failure(reference, &err);
        RecordingOutcome::Failed(err)
    }
}

fn log_failure(reference: &RecordingReference, err: &IngestError) {
    tracing::warn!(
        recording = %reference.key,
        directory = %reference.recording_directory,
        error_kind = %err.kind(),
        error = %err,
        "Recording metadata computation failed"
    );
}

/// Run the synchronous pipeline for one recording.
///
/// Returns the record and the non-fatal frame-rate warning, if any.
pub fn compute_metadata(
    reference: &RecordingReference,
    config: &IngestConfig,
) -> IngestResult<(RecordingMetadata, Option<IngestError>)> {
    let location = resolve(&config.data_roots, &reference.recording_directory, config.root_policy)?;
    let format = detect(&reference.acquisition_software)?;
    let files = enumerate(format.as_ref(), &location.directory)?;
    let (segments, settings) = extract(format.as_ref(), &location.directory, &files)?;

    let nominal_rate = settings
        .frame_rate
        .or_else(|| segments.first().and_then(|s| s.nominal_frame_rate));
    let mut timeline = reconcile(&segments, nominal_rate, config.frame_rate_cv_threshold)?;
    let warning = timeline.warning.take();

    let metadata = aggregate(reference, format.as_ref(), &location, &files, &segments, &settings, timeline)?;
    Ok((metadata, warning))
}
