//! Error types for mscope-ingest
//!
//! Every pipeline error is scoped to a single recording. The scheduler catches
//! them at its boundary and reports them by [`ErrorKind`]; none of them abort a batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error for one recording
#[derive(Debug, Error)]
pub enum IngestError {
    /// No configured root contains the recording directory
    #[error("Recording directory '{relative}' not found under any data root {roots:?}")]
    DataRootNotFound { relative: String, roots: Vec<PathBuf> },

    /// Several roots contain the directory and the policy forbids picking one
    #[error("Recording directory '{relative}' exists under several data roots: {matches:?}")]
    AmbiguousDataRoot { relative: String, matches: Vec<PathBuf> },

    /// Declared acquisition-software tag has no format strategy
    #[error("Unsupported acquisition software: '{0}'")]
    UnsupportedAcquisitionFormat(String),

    /// Directory resolved but holds no data files for the format
    #[error("No {software} recording files found in {}", directory.display())]
    NoRecordingFilesFound {
        directory: PathBuf,
        software: &'static str,
    },

    /// Two data files map to the same segment ordinal
    #[error("Segment ordinal {ordinal} claimed by both {} and {}", first.display(), second.display())]
    SegmentOrdinalConflict {
        ordinal: u32,
        first: PathBuf,
        second: PathBuf,
    },

    /// Unreadable or malformed header or companion file
    #[error("Corrupt recording file {}: {reason}", path.display())]
    CorruptRecordingFile { path: PathBuf, reason: String },

    /// Segment geometry differs from the first segment
    #[error("Segment {ordinal} has {field} = {found}, expected {expected}")]
    InconsistentSegmentGeometry {
        ordinal: u32,
        field: &'static str,
        expected: u64,
        found: u64,
    },

    /// Inter-frame intervals vary too much (warning, never fatal)
    #[error("Inconsistent frame rate: interval CV {cv:.3} exceeds threshold {threshold:.3}")]
    InconsistentFrameRate { cv: f64, threshold: f64 },

    /// Neither recorded timestamps nor a nominal rate are available
    #[error("Cannot determine frame rate: no timestamps and no nominal rate in headers")]
    MissingFrameRate,

    /// Filesystem access failed outside header parsing
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persistent storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] mscope_common::Error),

    /// Unexpected failure (e.g. a panicked worker task)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::DataRootNotFound { .. } => ErrorKind::DataRootNotFound,
            IngestError::AmbiguousDataRoot { .. } => ErrorKind::AmbiguousDataRoot,
            IngestError::UnsupportedAcquisitionFormat(_) => ErrorKind::UnsupportedAcquisitionFormat,
            IngestError::NoRecordingFilesFound { .. } => ErrorKind::NoRecordingFilesFound,
            IngestError::SegmentOrdinalConflict { .. } => ErrorKind::SegmentOrdinalConflict,
            IngestError::CorruptRecordingFile { .. } => ErrorKind::CorruptRecordingFile,
            IngestError::InconsistentSegmentGeometry { .. } => {
                ErrorKind::InconsistentSegmentGeometry
            }
            IngestError::InconsistentFrameRate { .. } => ErrorKind::InconsistentFrameRate,
            IngestError::MissingFrameRate => ErrorKind::MissingFrameRate,
            IngestError::Io { .. } => ErrorKind::Io,
            IngestError::Storage(_) => ErrorKind::Storage,
            IngestError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IngestError::CorruptRecordingFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Error category reported to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DataRootNotFound,
    AmbiguousDataRoot,
    UnsupportedAcquisitionFormat,
    NoRecordingFilesFound,
    SegmentOrdinalConflict,
    CorruptRecordingFile,
    InconsistentSegmentGeometry,
    InconsistentFrameRate,
    MissingFrameRate,
    Io,
    Storage,
    Internal,
}

impl ErrorKind {
    /// Only `InconsistentFrameRate` is a warning; everything else fails the recording
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::InconsistentFrameRate)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result type for pipeline stages
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = IngestError::UnsupportedAcquisitionFormat("Inscopix".to_string());
        assert_eq!(err.kind(), ErrorKind::UnsupportedAcquisitionFormat);
        assert!(err.kind().is_fatal());

        let warn = IngestError::InconsistentFrameRate {
            cv: 0.4,
            threshold: 0.1,
        };
        assert_eq!(warn.kind(), ErrorKind::InconsistentFrameRate);
        assert!(!warn.kind().is_fatal());
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: IngestError = mscope_common::Error::Internal("boom".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(ErrorKind::Storage.to_string(), "Storage");
    }
}
