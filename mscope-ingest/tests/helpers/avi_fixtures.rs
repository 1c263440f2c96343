//! Synthetic recording files
//!
//! Minimal but structurally valid AVI files (RIFF header, one video stream,
//! empty frame chunks) plus the companion files each DAQ version writes.

use std::path::Path;

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn list(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = kind.to_vec();
    for c in children {
        body.extend_from_slice(c);
    }
    chunk(b"LIST", &body)
}

fn le_words(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// 8-bit grayscale AVI with `frames` frames at `fps`
pub fn avi_bytes(width: u32, height: u32, frames: u32, fps: u32) -> Vec<u8> {
    let avih = le_words(&[1_000_000 / fps, 0, 0, 0x10, frames, 0, 1, 0, width, height, 0, 0, 0, 0]);

    let mut strh = b"vidsY800".to_vec();
    strh.extend(le_words(&[0, 0, 0, 1, fps, 0, frames, 0, 0, 0]));
    strh.extend_from_slice(&[0u8; 8]);

    let mut strf = le_words(&[40, width, height]);
    strf.extend_from_slice(&1u16.to_le_bytes());
    strf.extend_from_slice(&8u16.to_le_bytes());
    strf.extend_from_slice(b"Y800");
    strf.extend_from_slice(&[0u8; 20]);

    let hdrl = list(
        b"hdrl",
        &[chunk(b"avih", &avih), list(b"strl", &[chunk(b"strh", &strh), chunk(b"strf", &strf)])],
    );
    let frame_chunks: Vec<Vec<u8>> = (0..frames).map(|_| chunk(b"00db", &[0u8; 4])).collect();

    let mut body = b"AVI ".to_vec();
    body.extend(hdrl);
    body.extend(list(b"movi", &frame_chunks));
    chunk(b"RIFF", &body)
}

pub fn write_avi(path: &Path, width: u32, height: u32, frames: u32, fps: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, avi_bytes(width, height, frames, fps)).unwrap();
}

/// `timeStamps.csv` with one row per entry of `ms`
pub fn write_v4_timestamps(dir: &Path, ms: &[f64]) {
    let mut csv = String::from("Frame Number,Time Stamp (ms),Buffer Index\n");
    for (i, t) in ms.iter().enumerate() {
        csv.push_str(&format!("{},{},0\n", i, t));
    }
    std::fs::write(dir.join("timeStamps.csv"), csv).unwrap();
}

pub fn write_v4_metadata(dir: &Path, json: &serde_json::Value) {
    std::fs::write(dir.join("metaData.json"), json.to_string()).unwrap();
}

/// `timestamp.dat` for the scope camera (camNum 0) plus a behaviour camera (camNum 1)
pub fn write_v3_timestamps(dir: &Path, scope_ms: &[f64], behaviour_frames: usize) {
    let mut log = String::from("camNum\tframeNum\tsysClock\tbuffer\n");
    for (i, t) in scope_ms.iter().enumerate() {
        log.push_str(&format!("0\t{}\t{}\t1\n", i + 1, t));
        if i < behaviour_frames {
            log.push_str(&format!("1\t{}\t{}\t0\n", i + 1, t + 3.0));
        }
    }
    std::fs::write(dir.join("timestamp.dat"), log).unwrap();
}
