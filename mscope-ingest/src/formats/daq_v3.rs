//! Miniscope DAQ software v3
//!
//! - Data: `msCam1.avi`, `msCam2.avi`, ... (1-based; ordinal = N - 1).
//!   `behavCam<N>.avi` files from the behaviour camera share the directory and are ignored.
//! - Timestamps: `timestamp.dat`, tab separated with a header row
//!   `camNum frameNum sysClock buffer`; `sysClock` is in milliseconds and the
//!   log interleaves every camera attached to the DAQ box.

use super::{
    avi_raw_header, avi_stem, list_files, ms_to_relative_seconds, parse_clock, parse_index,
    split_by_frame_counts, AcquisitionFormat, AcquisitionSoftware, RawHeader, SegmentCandidate,
};
use crate::error::{IngestError, IngestResult};
use crate::models::FileRole;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SEGMENT_PREFIX: &str = "msCam";
pub const TIMESTAMP_FILE: &str = "timestamp.dat";

/// Miniscope DAQ v3 format
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniscopeDaqV3;

impl MiniscopeDaqV3 {
    /// `msCam<N>.avi` → N - 1
    fn segment_ordinal(path: &Path) -> Option<u32> {
        let stem = avi_stem(path)?;
        let index = parse_index(stem.strip_prefix(SEGMENT_PREFIX)?)?;
        index.checked_sub(1)
    }
}

impl AcquisitionFormat for MiniscopeDaqV3 {
    fn software(&self) -> AcquisitionSoftware {
        AcquisitionSoftware::MiniscopeDaqV3
    }

    fn match_files(&self, dir: &Path) -> IngestResult<Vec<SegmentCandidate>> {
        Ok(list_files(dir)?
            .into_iter()
            .filter_map(|path| {
                Self::segment_ordinal(&path).map(|ordinal| SegmentCandidate { path, ordinal })
            })
            .collect())
    }

    fn companion_files(&self, dir: &Path) -> Vec<(PathBuf, FileRole)> {
        let path = dir.join(TIMESTAMP_FILE);
        if path.is_file() {
            vec![(path, FileRole::TimestampCompanion)]
        } else {
            Vec::new()
        }
    }

    fn parse_header(&self, file: &Path) -> IngestResult<RawHeader> {
        avi_raw_header(file)
    }

    fn parse_timestamps(&self, dir: &Path, frame_counts: &[u64]) -> IngestResult<Option<Vec<Vec<f64>>>> {
        let path = dir.join(TIMESTAMP_FILE);
        if !path.is_file() {
            tracing::debug!(dir = %dir.display(), "No {} in recording directory", TIMESTAMP_FILE);
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| IngestError::corrupt(&path, format!("cannot read: {}", e)))?;
        let cameras = parse_timestamp_log(&content).map_err(|reason| IngestError::corrupt(&path, reason))?;

        // The imaging camera is the one whose log length matches the video frames
        let expected: u64 = frame_counts.iter().sum();
        let mut matching = cameras
            .into_iter()
            .filter(|(_, rows)| rows.len() as u64 == expected);

        let (camera, mut rows) = match (matching.next(), matching.next()) {
            (Some(only), None) => only,
            (None, _) => {
                tracing::warn!(
                    file = %path.display(),
                    expected_frames = expected,
                    "No camera in timestamp log matches the recording frame count"
                );
                return Ok(None);
            }
            (Some(_), Some(_)) => {
                tracing::warn!(
                    file = %path.display(),
                    expected_frames = expected,
                    "Several cameras in timestamp log match the recording frame count"
                );
                return Ok(None);
            }
        };

        rows.sort_by_key(|(frame, _)| *frame);
        let clock: Vec<f64> = rows.into_iter().map(|(_, ms)| ms).collect();

        tracing::debug!(camera, frames = clock.len(), "Using camera from timestamp log");

        Ok(split_by_frame_counts(ms_to_relative_seconds(&clock), frame_counts))
    }
}

/// camNum → [(frameNum, sysClock ms)]
fn parse_timestamp_log(content: &str) -> Result<BTreeMap<u32, Vec<(u64, f64)>>, String> {
    let mut cameras: BTreeMap<u32, Vec<(u64, f64)>> = BTreeMap::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Header row
        if line.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(format!("line {}: expected at least 3 columns", line_no + 1));
        }
        let camera: u32 = fields[0]
            .parse()
            .map_err(|_| format!("line {}: bad camNum '{}'", line_no + 1, fields[0]))?;
        let frame: u64 = fields[1]
            .parse()
            .map_err(|_| format!("line {}: bad frameNum '{}'", line_no + 1, fields[1]))?;
        let clock = parse_clock(fields[2])
            .ok_or_else(|| format!("line {}: bad sysClock '{}'", line_no + 1, fields[2]))?;

        cameras.entry(camera).or_default().push((frame, clock));
    }

    Ok(cameras)
}
