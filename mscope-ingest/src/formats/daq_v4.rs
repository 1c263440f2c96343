//! Miniscope DAQ software v4
//!
//! - Data: `0.avi`, `1.avi`, ... (0-based; ordinal = N)
//! - Timestamps: `timeStamps.csv` with header `Frame Number,Time Stamp (ms),Buffer Index`
//! - Settings: `metaData.json` (`frameRate`, `gain`, `led0`)

use super::{
    avi_raw_header, avi_stem, list_files, ms_to_relative_seconds, parse_clock, parse_index,
    split_by_frame_counts, AcquisitionFormat, AcquisitionSettings, AcquisitionSoftware, RawHeader,
    SegmentCandidate,
};
use crate::error::{IngestError, IngestResult};
use crate::models::FileRole;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FILE: &str = "timeStamps.csv";
pub const METADATA_FILE: &str = "metaData.json";

const FRAME_COLUMN: &str = "Frame Number";
const TIME_COLUMN: &str = "Time Stamp (ms)";

/// Miniscope DAQ v4 format
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniscopeDaqV4;

impl AcquisitionFormat for MiniscopeDaqV4 {
    fn software(&self) -> AcquisitionSoftware {
        AcquisitionSoftware::MiniscopeDaqV4
    }

    fn match_files(&self, dir: &Path) -> IngestResult<Vec<SegmentCandidate>> {
        Ok(list_files(dir)?
            .into_iter()
            .filter_map(|path| {
                let ordinal = avi_stem(&path).and_then(parse_index)?;
                Some(SegmentCandidate { path, ordinal })
            })
            .collect())
    }

    fn companion_files(&self, dir: &Path) -> Vec<(PathBuf, FileRole)> {
        [
            (TIMESTAMP_FILE, FileRole::TimestampCompanion),
            (METADATA_FILE, FileRole::MetadataCompanion),
        ]
        .into_iter()
        .map(|(name, role)| (dir.join(name), role))
        .filter(|(path, _)| path.is_file())
        .collect()
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
        let mut rows = parse_timestamp_csv(&content).map_err(|reason| IngestError::corrupt(&path, reason))?;
        rows.sort_by_key(|(frame, _)| *frame);
        let clock: Vec<f64> = rows.into_iter().map(|(_, ms)| ms).collect();

        let split = split_by_frame_counts(ms_to_relative_seconds(&clock), frame_counts);
        if split.is_none() {
            tracing::warn!(
                file = %path.display(),
                rows = clock.len(),
                expected_frames = frame_counts.iter().sum::<u64>(),
                "Timestamp log length does not match recording frame count"
            );
        }
        Ok(split)
    }

    fn acquisition_settings(&self, dir: &Path) -> IngestResult<AcquisitionSettings> {
        let path = dir.join(METADATA_FILE);
        if !path.is_file() {
            return Ok(AcquisitionSettings::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| IngestError::corrupt(&path, format!("cannot read: {}", e)))?;
        let json: Value = serde_json::from_str(&content)
            .map_err(|e| IngestError::corrupt(&path, format!("invalid JSON: {}", e)))?;

        Ok(AcquisitionSettings {
            frame_rate: json.get("frameRate").and_then(leading_number),
            gain: json.get("gain").and_then(gain_value),
            led_power: json.get("led0").and_then(leading_number),
        })
    }
}

/// (Frame Number, Time Stamp ms) rows; columns located by header name
fn parse_timestamp_csv(content: &str) -> Result<Vec<(u64, f64)>, String> {
    let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or_else(|| "empty timestamp file".to_string())?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let frame_col = columns.iter().position(|c| *c == FRAME_COLUMN).unwrap_or(0);
    let time_col = columns.iter().position(|c| *c == TIME_COLUMN).unwrap_or(1);

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |col: usize| {
            fields
                .get(col)
                .copied()
                .ok_or_else(|| format!("line {}: missing column {}", line_no + 1, col))
        };
        let frame_text = field(frame_col)?;
        let time_text = field(time_col)?;
        let frame: u64 = frame_text
            .parse()
            .map_err(|_| format!("line {}: bad frame number '{}'", line_no + 1, frame_text))?;
        let time = parse_clock(time_text)
            .ok_or_else(|| format!("line {}: bad timestamp '{}'", line_no + 1, time_text))?;
        rows.push((frame, time));
    }
    Ok(rows)
}

/// Number, or the numeric prefix of a string such as `"30FPS"`
fn leading_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

/// Gain as number, or the DAQ preset names
fn gain_value(value: &Value) -> Option<f64> {
    if let Value::String(s) = value {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => return Some(1.0),
            "medium" => return Some(2.0),
            "high" => return Some(3.5),
            _ => {}
        }
    }
    leading_number(value)
}
