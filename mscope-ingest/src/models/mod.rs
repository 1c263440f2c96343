//! Data models for recording ingest

pub mod recording;
pub mod report;

pub use recording::{
    FileMetadata, FileRole, RawFileDescriptor, RecordingFile, RecordingFiles, RecordingKey,
    RecordingMetadata, RecordingReference, ResolvedLocation, TimestampSource,
    SESSION_DATETIME_FORMAT,
};
pub use report::{FailedRecording, PopulateReport, RecordingWarning};
