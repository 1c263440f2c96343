//! Outcome of one `populate()` pass

use crate::error::ErrorKind;
use crate::models::RecordingKey;
use serde::Serialize;

/// A recording whose pipeline failed
#[derive(Debug, Clone, Serialize)]
pub struct FailedRecording {
    pub key: RecordingKey,
    pub kind: ErrorKind,
    pub message: String,
}

/// A non-fatal condition on a recording that was still accepted
#[derive(Debug, Clone, Serialize)]
pub struct RecordingWarning {
    pub key: RecordingKey,
    pub kind: ErrorKind,
    pub message: String,
}

/// Partition of the pending set after one pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    /// Metadata written during this pass
    pub succeeded: Vec<RecordingKey>,
    /// Pipeline failed; no record written, retried on the next pass
    pub failed: Vec<FailedRecording>,
    /// Claimed by another worker or already computed by the time we got to it
    pub skipped: Vec<RecordingKey>,
    pub warnings: Vec<RecordingWarning>,
}

impl PopulateReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_keys(&self) -> Vec<&RecordingKey> {
        self.failed.iter().map(|f| &f.key).collect()
    }
}
