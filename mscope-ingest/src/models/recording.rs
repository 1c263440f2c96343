//! Recording identity, discovered files and computed metadata

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Storage format of `session_datetime`
pub const SESSION_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Composite key of one logical recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordingKey {
    pub subject: String,
    pub session_datetime: NaiveDateTime,
    pub recording_id: u32,
}

impl RecordingKey {
    pub fn new(subject: impl Into<String>, session_datetime: NaiveDateTime, recording_id: u32) -> Self {
        Self {
            subject: subject.into(),
            session_datetime,
            recording_id,
        }
    }

    /// Session datetime in its stored text form
    pub fn session_datetime_text(&self) -> String {
        self.session_datetime.format(SESSION_DATETIME_FORMAT).to_string()
    }
}

impl fmt::Display for RecordingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subject,
            self.session_datetime_text(),
            self.recording_id
        )
    }
}

/// A registered recording as declared by the registration step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingReference {
    pub key: RecordingKey,
    /// Declared acquisition-software tag, e.g. `Miniscope-DAQ-V4`
    pub acquisition_software: String,
    /// Directory relative to one of the data roots
    pub recording_directory: String,
}

/// Absolute recording directory and the root it was found under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub root: PathBuf,
    pub directory: PathBuf,
}

/// What a physical file contributes to a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    PrimaryData,
    TimestampCompanion,
    MetadataCompanion,
}

/// One physical file of a recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileDescriptor {
    pub path: PathBuf,
    pub role: FileRole,
    /// Segment position for primary data; list position for companions
    pub ordinal: u32,
    pub size_bytes: u64,
}

/// Enumerated files of one recording
#[derive(Debug, Clone, Default)]
pub struct RecordingFiles {
    /// Primary data files in ordinal order, ordinals unique
    pub segments: Vec<RawFileDescriptor>,
    pub companions: Vec<RawFileDescriptor>,
}

impl RecordingFiles {
    /// Segment bytes; companions excluded
    pub fn total_size_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes).sum()
    }
}

/// Structure of one segment, built once by the extractor
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub ordinal: u32,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub depths: u32,
    pub frame_count: u64,
    /// Frame rate declared in the file header
    pub nominal_frame_rate: Option<f64>,
    /// Per-frame timestamps in seconds, when the format records them
    pub timestamps: Option<Vec<f64>>,
}

/// Where the stored timeline came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Timestamps written by the acquisition software
    Recorded,
    /// Derived from the nominal frame rate and frame index
    Synthetic,
}

impl TimestampSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampSource::Recorded => "recorded",
            TimestampSource::Synthetic => "synthetic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "recorded" => Some(TimestampSource::Recorded),
            "synthetic" => Some(TimestampSource::Synthetic),
            _ => None,
        }
    }
}

/// Part record: one segment file of a computed recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingFile {
    pub ordinal: u32,
    /// Path relative to the data root
    pub relative_path: String,
    pub size_bytes: u64,
    pub frame_count: u64,
}

/// Canonical per-recording metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub key: RecordingKey,
    pub acquisition_software: String,
    pub total_frames: u64,
    /// Effective rate, reciprocal of the median inter-frame interval
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub depths: u32,
    pub duration_seconds: f64,
    pub segment_count: u32,
    pub recording_path: PathBuf,
    pub data_root: PathBuf,
    /// Rate declared by the acquisition software or file headers
    pub nominal_frame_rate: Option<f64>,
    pub gain: Option<f64>,
    pub led_power: Option<f64>,
    /// Coefficient of variation of inter-frame intervals
    pub frame_interval_cv: f64,
    pub timestamp_source: TimestampSource,
    pub timestamps: Vec<f64>,
    pub files: Vec<RecordingFile>,
    pub computed_at: DateTime<Utc>,
}
