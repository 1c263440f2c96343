//! Acquisition-software formats
//!
//! Each acquisition-software version writes its own file-naming pattern,
//! timestamp log and settings file. A format is one implementation of
//! [`AcquisitionFormat`]; [`detect`] maps a declared tag to it. Adding a
//! version means adding a variant to [`AcquisitionSoftware`] and a type
//! implementing the trait.

pub mod avi;
pub mod daq_v3;
pub mod daq_v4;

pub use daq_v3::MiniscopeDaqV3;
pub use daq_v4::MiniscopeDaqV4;

use crate::error::{IngestError, IngestResult};
use crate::models::FileRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Supported acquisition-software versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionSoftware {
    /// UCLA Miniscope DAQ software v3: `msCam<N>.avi` + `timestamp.dat`
    MiniscopeDaqV3,
    /// UCLA Miniscope DAQ software v4: `<N>.avi` + `timeStamps.csv` + `metaData.json`
    MiniscopeDaqV4,
}

impl AcquisitionSoftware {
    pub const ALL: [AcquisitionSoftware; 2] = [
        AcquisitionSoftware::MiniscopeDaqV3,
        AcquisitionSoftware::MiniscopeDaqV4,
    ];

    /// Canonical tag as stored in `recordings.acquisition_software`
    pub fn tag(&self) -> &'static str {
        match self {
            AcquisitionSoftware::MiniscopeDaqV3 => "Miniscope-DAQ-V3",
            AcquisitionSoftware::MiniscopeDaqV4 => "Miniscope-DAQ-V4",
        }
    }
}

impl fmt::Display for AcquisitionSoftware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AcquisitionSoftware {
    type Err = IngestError;

    fn from_str(tag: &str) -> IngestResult<Self> {
        let trimmed = tag.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.tag().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| IngestError::UnsupportedAcquisitionFormat(tag.to_string()))
    }
}

/// A data file matched by a format, with the ordinal parsed from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCandidate {
    pub path: PathBuf,
    pub ordinal: u32,
}

/// Unvalidated structural fields of one data file
#[derive(Debug, Clone, PartialEq)]
pub struct RawHeader {
    pub width: u32,
    pub height: u32,
    /// 0 when the header does not map to a known channel layout
    pub channels: u32,
    pub depths: u32,
    pub frame_count: u64,
    pub nominal_frame_rate: Option<f64>,
}

/// Recording-level settings written by the acquisition software
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionSettings {
    pub frame_rate: Option<f64>,
    pub gain: Option<f64>,
    pub led_power: Option<f64>,
}

/// File-naming, header and timestamp conventions of one acquisition-software version
pub trait AcquisitionFormat: Send + Sync {
    fn software(&self) -> AcquisitionSoftware;

    /// Data files in `dir` with their segment ordinals, in no particular order
    fn match_files(&self, dir: &Path) -> IngestResult<Vec<SegmentCandidate>>;

    /// Timestamp and settings files present in `dir`
    fn companion_files(&self, _dir: &Path) -> Vec<(PathBuf, FileRole)> {
        Vec::new()
    }

    /// Structural fields of one data file, read without decoding frames
    fn parse_header(&self, file: &Path) -> IngestResult<RawHeader>;

    /// Per-segment timestamps in seconds, split according to `frame_counts`
    /// (one entry per segment, in ordinal order). `None` when the recording
    /// has no usable timestamp log.
    fn parse_timestamps(&self, dir: &Path, frame_counts: &[u64]) -> IngestResult<Option<Vec<Vec<f64>>>>;

    /// Recording-level settings, empty when the format has none
    fn acquisition_settings(&self, _dir: &Path) -> IngestResult<AcquisitionSettings> {
        Ok(AcquisitionSettings::default())
    }
}

/// Strategy for a declared acquisition-software tag
pub fn detect(tag: &str) -> IngestResult<Box<dyn AcquisitionFormat>> {
    let software: AcquisitionSoftware = tag.parse()?;
    Ok(match software {
        AcquisitionSoftware::MiniscopeDaqV3 => Box::new(MiniscopeDaqV3),
        AcquisitionSoftware::MiniscopeDaqV4 => Box::new(MiniscopeDaqV4),
    })
}

/// Regular files directly inside `dir` (symlinks followed, no recursion)
pub(crate) fn list_files(dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            match e.into_io_error() {
                Some(io) => IngestError::io(path, io),
                None => IngestError::Internal(format!("symlink loop under {}", dir.display())),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `<stem>.avi` (extension case-insensitive) → `<stem>`
pub(crate) fn avi_stem(path: &Path) -> Option<&str> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case("avi") {
        return None;
    }
    path.file_stem()?.to_str()
}

/// Parse an unsigned decimal made only of ASCII digits
pub(crate) fn parse_index(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// AVI header mapped to raw structural fields
pub(crate) fn avi_raw_header(file: &Path) -> IngestResult<RawHeader> {
    let header = avi::read_header(file)?;
    let (width, height) = header.dimensions();
    Ok(RawHeader {
        width,
        height,
        channels: header.channels().unwrap_or(0),
        depths: 1,
        frame_count: header.frame_count(),
        nominal_frame_rate: header.frame_rate(),
    })
}

/// Split a recording-wide timeline into per-segment runs; `None` when the
/// total does not match the segment frame counts
pub(crate) fn split_by_frame_counts(timeline: Vec<f64>, frame_counts: &[u64]) -> Option<Vec<Vec<f64>>> {
    let expected: u64 = frame_counts.iter().sum();
    if timeline.len() as u64 != expected {
        return None;
    }

    let mut rest = timeline.into_iter();
    Some(
        frame_counts
            .iter()
            .map(|&n| rest.by_ref().take(n as usize).collect())
            .collect(),
    )
}

/// Finite clock reading; `NaN` and infinities are rejected
pub(crate) fn parse_clock(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Millisecond clock readings → seconds relative to the first reading
pub(crate) fn ms_to_relative_seconds(ms: &[f64]) -> Vec<f64> {
    match ms.first() {
        Some(&t0) => ms.iter().map(|t| (t - t0) / 1000.0).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_tags() {
        assert_eq!(detect("Miniscope-DAQ-V3").unwrap().software(), AcquisitionSoftware::MiniscopeDaqV3);
        assert_eq!(detect(" miniscope-daq-v4 ").unwrap().software(), AcquisitionSoftware::MiniscopeDaqV4);
    }

    #[test]
    fn test_detect_unknown_tag() {
        match detect("Inscopix") {
            Err(IngestError::UnsupportedAcquisitionFormat(tag)) => assert_eq!(tag, "Inscopix"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected UnsupportedAcquisitionFormat"),
        }
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("012"), Some(12));
        assert_eq!(parse_index(""), None);
        assert_eq!(parse_index("1a"), None);
        assert_eq!(parse_index("-1"), None);
    }

    #[test]
    fn test_split_by_frame_counts() {
        let split = split_by_frame_counts(vec![0.0, 0.1, 0.2, 0.3, 0.4], &[2, 3]).unwrap();
        assert_eq!(split, vec![vec![0.0, 0.1], vec![0.2, 0.3, 0.4]]);
        assert!(split_by_frame_counts(vec![0.0, 0.1], &[2, 3]).is_none());
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("1050.5"), Some(1050.5));
        assert_eq!(parse_clock("NaN"), None);
        assert_eq!(parse_clock("inf"), None);
        assert_eq!(parse_clock("-infinity"), None);
        assert_eq!(parse_clock(""), None);
    }

    #[test]
    fn test_ms_to_relative_seconds() {
        assert_eq!(ms_to_relative_seconds(&[1000.0, 1050.0, 1100.0]), vec![0.0, 0.05, 0.1]);
        assert!(ms_to_relative_seconds(&[]).is_empty());
    }
}
