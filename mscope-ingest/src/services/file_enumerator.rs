//! File enumeration
//!
//! Turns the format's file matches into an ordinal-ordered segment list.
//! Directory listing order is never trusted: `10.avi` sorts after `9.avi`.

use crate::error::{IngestError, IngestResult};
use crate::formats::AcquisitionFormat;
use crate::models::{FileRole, RawFileDescriptor, RecordingFiles};
use std::path::Path;

/// Enumerate the segments and companion files of the recording in `dir`
pub fn enumerate(format: &dyn AcquisitionFormat, dir: &Path) -> IngestResult<RecordingFiles> {
    let mut candidates = format.match_files(dir)?;
    if candidates.is_empty() {
        return Err(IngestError::NoRecordingFilesFound {
            directory: dir.to_path_buf(),
            software: format.software().tag(),
        });
    }

    // Ties broken by path so conflict reports are stable
    candidates.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.path.cmp(&b.path)));

    if let Some(pair) = candidates.windows(2).find(|w| w[0].ordinal == w[1].ordinal) {
        return Err(IngestError::SegmentOrdinalConflict {
            ordinal: pair[0].ordinal,
            first: pair[0].path.clone(),
            second: pair[1].path.clone(),
        });
    }

    let mut segments = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let size_bytes = file_size(&candidate.path)?;
        segments.push(RawFileDescriptor {
            path: candidate.path,
            role: FileRole::PrimaryData,
            ordinal: candidate.ordinal,
            size_bytes,
        });
    }

    let mut companions = Vec::new();
    for (position, (path, role)) in format.companion_files(dir).into_iter().enumerate() {
        let size_bytes = file_size(&path)?;
        companions.push(RawFileDescriptor {
            path,
            role,
            ordinal: position as u32,
            size_bytes,
        });
    }

    let files = RecordingFiles { segments, companions };
    tracing::debug!(
        directory = %dir.display(),
        segments = files.segments.len(),
        companions = files.companions.len(),
        total_bytes = files.total_size_bytes(),
        "Enumerated recording files"
    );

    Ok(files)
}

fn file_size(path: &Path) -> IngestResult<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| IngestError::io(path, e))
}
