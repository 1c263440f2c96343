//! Per-segment metadata extraction
//!
//! Reads each segment header once, in ordinal order, then attaches the
//! format's per-segment timestamps. A single unreadable segment fails the
//! whole recording; partial results are never returned.

use crate::error::{IngestError, IngestResult};
use crate::formats::{AcquisitionFormat, AcquisitionSettings, RawHeader};
use crate::models::{FileMetadata, RecordingFiles};
use std::path::Path;

/// Headers, timestamps and acquisition settings for every segment
pub fn extract(
    format: &dyn AcquisitionFormat,
    dir: &Path,
    files: &RecordingFiles,
) -> IngestResult<(Vec<FileMetadata>, AcquisitionSettings)> {
    let mut headers = Vec::with_capacity(files.segments.len());
    for segment in &files.segments {
        let header = format.parse_header(&segment.path)?;
        validate(&segment.path, &header)?;
        tracing::trace!(
            file = %segment.path.display(),
            ordinal = segment.ordinal,
            frames = header.frame_count,
            "Parsed segment header"
        );
        headers.push((segment.ordinal, header));
    }

    let frame_counts: Vec<u64> = headers.iter().map(|(_, h)| h.frame_count).collect();
    let mut timestamps = format
        .parse_timestamps(dir, &frame_counts)?
        .map(|per_segment| per_segment.into_iter().map(Some).collect::<Vec<_>>())
        .unwrap_or_else(|| vec![None; headers.len()]);
    timestamps.resize(headers.len(), None);

    let settings = format.acquisition_settings(dir)?;

    let segments = headers
        .into_iter()
        .zip(timestamps)
        .map(|((ordinal, header), timestamps)| FileMetadata {
            ordinal,
            width: header.width,
            height: header.height,
            channels: header.channels,
            depths: header.depths,
            frame_count: header.frame_count,
            nominal_frame_rate: header.nominal_frame_rate,
            timestamps,
        })
        .collect();

    Ok((segments, settings))
}

fn validate(path: &Path, header: &RawHeader) -> IngestResult<()> {
    let checks: [(&str, u64); 4] = [
        ("width", header.width as u64),
        ("height", header.height as u64),
        ("channels", header.channels as u64),
        ("depths", header.depths as u64),
    ];
    if let Some((field, _)) = checks.iter().find(|(_, v)| *v == 0) {
        return Err(IngestError::corrupt(path, format!("{} is zero or unknown", field)));
    }
    if header.frame_count == 0 {
        return Err(IngestError::corrupt(path, "file declares no frames"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::avi::tests::synthetic_avi;
    use crate::formats::MiniscopeDaqV4;
    use crate::services::file_enumerator::enumerate;
    use tempfile::TempDir;

    #[test]
    fn test_extract_segments_with_timestamps() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0.avi"), synthetic_avi(32, 24, 2, 20.0, 8)).unwrap();
        std::fs::write(dir.path().join("1.avi"), synthetic_avi(32, 24, 3, 20.0, 8)).unwrap();
        std::fs::write(
            dir.path().join("timeStamps.csv"),
            "Frame Number,Time Stamp (ms),Buffer Index\n0,0,0\n1,50,0\n2,100,0\n3,150,0\n4,200,0\n",
        )
        .unwrap();

        let files = enumerate(&MiniscopeDaqV4, dir.path()).unwrap();
        let (segments, settings) = extract(&MiniscopeDaqV4, dir.path(), &files).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].frame_count, 2);
        assert_eq!(segments[1].frame_count, 3);
        assert_eq!(segments[1].width, 32);
        assert_eq!(segments[1].channels, 1);
        assert_eq!(segments[0].nominal_frame_rate, Some(20.0));
        assert_eq!(segments[1].timestamps.as_ref().unwrap().len(), 3);
        assert_eq!(settings, AcquisitionSettings::default());
    }

    #[test]
    fn test_corrupt_segment_fails_recording() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0.avi"), synthetic_avi(32, 24, 2, 20.0, 8)).unwrap();
        std::fs::write(dir.path().join("1.avi"), b"RIFF garbage").unwrap();

        let files = enumerate(&MiniscopeDaqV4, dir.path()).unwrap();
        let err = extract(&MiniscopeDaqV4, dir.path(), &files).unwrap_err();
        assert!(matches!(err, IngestError::CorruptRecordingFile { .. }));
    }

    #[test]
    fn test_unknown_channel_layout_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0.avi"), synthetic_avi(32, 24, 2, 20.0, 12)).unwrap();

        let files = enumerate(&MiniscopeDaqV4, dir.path()).unwrap();
        let err = extract(&MiniscopeDaqV4, dir.path(), &files).unwrap_err();
        match err {
            IngestError::CorruptRecordingFile { reason, .. } => assert!(reason.contains("channels")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
