//! Recording metadata aggregation
//!
//! Combines per-segment metadata and the reconciled timeline into the single
//! canonical record, and hands it to the store.

use crate::db::UpsertOutcome;
use crate::error::{IngestError, IngestResult};
use crate::formats::{AcquisitionFormat, AcquisitionSettings};
use crate::models::{FileMetadata, RecordingFile, RecordingFiles, RecordingMetadata, RecordingReference, ResolvedLocation};
use crate::services::path_resolver::relative_to_root;
use crate::services::timestamp_reconciler::Timeline;
use crate::store::MetadataStore;
use chrono::Utc;

/// Build the canonical record for one recording.
///
/// Fails with `InconsistentSegmentGeometry` when any segment differs from the
/// first in width, height, channels or depths.
pub fn aggregate(
    reference: &RecordingReference,
    format: &dyn AcquisitionFormat,
    location: &ResolvedLocation,
    files: &RecordingFiles,
    segments: &[FileMetadata],
    settings: &AcquisitionSettings,
    timeline: Timeline,
) -> IngestResult<RecordingMetadata> {
    let first = segments
        .first()
        .ok_or_else(|| IngestError::Internal(format!("{}: no segment metadata", reference.key)))?;
    check_geometry(first, segments)?;

    let total_frames: u64 = segments.iter().map(|s| s.frame_count).sum();
    if timeline.timestamps.len() as u64 != total_frames {
        return Err(IngestError::Internal(format!(
            "{}: timeline has {} entries for {} frames",
            reference.key,
            timeline.timestamps.len(),
            total_frames
        )));
    }

    let record_files = files
        .segments
        .iter()
        .zip(segments)
        .map(|(descriptor, meta)| RecordingFile {
            ordinal: descriptor.ordinal,
            relative_path: relative_to_root(&location.root, &descriptor.path),
            size_bytes: descriptor.size_bytes,
            frame_count: meta.frame_count,
        })
        .collect();

    Ok(RecordingMetadata {
        key: reference.key.clone(),
        acquisition_software: format.software().tag().to_string(),
        total_frames,
        frame_rate: timeline.frame_rate,
        width: first.width,
        height: first.height,
        channels: first.channels,
        depths: first.depths,
        duration_seconds: timeline.duration_seconds,
        segment_count: segments.len() as u32,
        recording_path: location.directory.clone(),
        data_root: location.root.clone(),
        nominal_frame_rate: settings.frame_rate.or(first.nominal_frame_rate),
        gain: settings.gain,
        led_power: settings.led_power,
        frame_interval_cv: timeline.interval_cv,
        timestamp_source: timeline.source,
        timestamps: timeline.timestamps,
        files: record_files,
        computed_at: Utc::now(),
    })
}

/// Write the record; an existing record is replaced only with `force`
pub async fn persist<S>(store: &S, metadata: &RecordingMetadata, force: bool) -> IngestResult<UpsertOutcome>
where
    S: MetadataStore + ?Sized,
{
    let outcome = store.upsert_metadata(metadata, force).await?;
    tracing::debug!(recording = %metadata.key, ?outcome, "Persisted recording metadata");
    Ok(outcome)
}

fn check_geometry(first: &FileMetadata, segments: &[FileMetadata]) -> IngestResult<()> {
    for segment in &segments[1..] {
        let fields: [(&'static str, u32, u32); 4] = [
            ("width", first.width, segment.width),
            ("height", first.height, segment.height),
            ("channels", first.channels, segment.channels),
            ("depths", first.depths, segment.depths),
        ];
        if let Some((field, expected, found)) = fields.into_iter().find(|(_, e, f)| e != f) {
            return Err(IngestError::InconsistentSegmentGeometry {
                ordinal: segment.ordinal,
                field,
                expected: expected as u64,
                found: found as u64,
            });
        }
    }
    Ok(())
}
