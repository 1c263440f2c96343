//! Timestamp reconciliation
//!
//! Builds one recording-wide timeline from per-segment timestamps and derives
//! the effective frame rate from it.
//!
//! Recorded timestamps are used only when every segment has a complete set;
//! otherwise the whole recording gets a synthetic `i / nominal_rate` timeline.
//! Mixing the two would make intervals at segment boundaries meaningless.

use crate::error::{IngestError, IngestResult};
use crate::models::{FileMetadata, TimestampSource};

/// Recording-wide timeline and the quantities derived from it
#[derive(Debug)]
pub struct Timeline {
    /// Seconds, one per frame. Segment starts never precede the previous
    /// segment's end; steps within a segment are kept as recorded.
    pub timestamps: Vec<f64>,
    pub source: TimestampSource,
    /// Reciprocal of the median inter-frame interval
    pub frame_rate: f64,
    pub duration_seconds: f64,
    /// Coefficient of variation of inter-frame intervals
    pub interval_cv: f64,
    /// `InconsistentFrameRate` when the CV exceeds the threshold
    pub warning: Option<IngestError>,
}

/// Reconcile `segments` (ordinal order) into a single timeline
pub fn reconcile(segments: &[FileMetadata], nominal_rate: Option<f64>, cv_threshold: f64) -> IngestResult<Timeline> {
    let nominal_rate = nominal_rate.filter(|r| r.is_finite() && *r > 0.0);
    let total_frames: u64 = segments.iter().map(|s| s.frame_count).sum();

    let recorded = segments.iter().all(|s| {
        s.timestamps
            .as_ref()
            .is_some_and(|ts| ts.len() as u64 == s.frame_count)
    });

    let (timestamps, source) = if recorded && total_frames > 0 {
        (concatenate(segments, nominal_rate), TimestampSource::Recorded)
    } else {
        let rate = nominal_rate.ok_or(IngestError::MissingFrameRate)?;
        if segments.iter().any(|s| s.timestamps.is_some()) {
            tracing::debug!("Timestamps incomplete for some segments, using synthetic timeline");
        }
        let synthetic = (0..total_frames).map(|i| i as f64 / rate).collect();
        (synthetic, TimestampSource::Synthetic)
    };

    let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    let median_interval = median(&intervals)
        .filter(|m| *m > 0.0)
        .or_else(|| nominal_rate.map(|r| 1.0 / r))
        .ok_or(IngestError::MissingFrameRate)?;

    let interval_cv = coefficient_of_variation(&intervals);
    let warning = (interval_cv > cv_threshold).then(|| {
        tracing::warn!(cv = interval_cv, threshold = cv_threshold, "Irregular inter-frame intervals");
        IngestError::InconsistentFrameRate {
            cv: interval_cv,
            threshold: cv_threshold,
        }
    });

    let span = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };

    Ok(Timeline {
        frame_rate: 1.0 / median_interval,
        duration_seconds: span + median_interval,
        interval_cv,
        warning,
        timestamps,
        source,
    })
}

/// Concatenate per-segment timestamps, shifting any segment that starts
/// before the previous one ended to one interval after it
fn concatenate(segments: &[FileMetadata], nominal_rate: Option<f64>) -> Vec<f64> {
    let gap = nominal_rate.map(|r| 1.0 / r).unwrap_or_else(|| {
        let within: Vec<f64> = segments
            .iter()
            .filter_map(|s| s.timestamps.as_ref())
            .flat_map(|ts| ts.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>())
            .collect();
        median(&within).unwrap_or(0.0)
    });

    let mut timeline: Vec<f64> = Vec::new();
    for segment in segments {
        let ts = match &segment.timestamps {
            Some(ts) if !ts.is_empty() => ts,
            _ => continue,
        };
        let offset = match timeline.last() {
            Some(&prev) if ts[0] < prev => {
                tracing::debug!(
                    ordinal = segment.ordinal,
                    start = ts[0],
                    previous_end = prev,
                    "Segment timestamps restart, shifting"
                );
                prev + gap - ts[0]
            }
            _ => 0.0,
        };
        timeline.extend(ts.iter().map(|t| t + offset));
    }
    timeline
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Population standard deviation over mean; 0 for fewer than two values
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
