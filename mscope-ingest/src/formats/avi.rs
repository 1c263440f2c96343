//! AVI (RIFF) header reader
//!
//! Walks the first RIFF list only as far as the `hdrl` list and seeks past every
//! other chunk. Reading stops at `movi`, so the pixel payload is never touched
//! regardless of file size.
//!
//! Layout consulted:
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     'avih'              main header (frame period, total frames, size)
//!     LIST 'strl'         one per stream
//!       'strh'            stream header (type, scale, rate, length)
//!       'strf'            BITMAPINFOHEADER for video streams
//!     LIST 'odml'
//!       'dmlh'            OpenDML total frame count (files > 1 GiB)
//!   LIST 'movi'           frame data (never read)
//! ```

use crate::error::{IngestError, IngestResult};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

type FourCC = [u8; 4];

const RIFF: &FourCC = b"RIFF";
const AVI: &FourCC = b"AVI ";
const LIST: &FourCC = b"LIST";
const HDRL: &FourCC = b"hdrl";
const MOVI: &FourCC = b"movi";
const AVIH: &FourCC = b"avih";
const STRL: &FourCC = b"strl";
const STRH: &FourCC = b"strh";
const STRF: &FourCC = b"strf";
const ODML: &FourCC = b"odml";
const DMLH: &FourCC = b"dmlh";
const VIDS: &FourCC = b"vids";

/// Header chunks are small; anything larger than this is read only up to here
const MAX_HEADER_CHUNK: u32 = 1024;

/// Video stream fields from `strh` + `strf`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoStream {
    pub handler: FourCC,
    pub scale: u32,
    pub rate: u32,
    pub length: u32,
    pub width: i32,
    pub height: i32,
    pub bit_count: u16,
    pub compression: FourCC,
}

/// Structural fields of an AVI file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AviHeader {
    pub micro_sec_per_frame: u32,
    pub total_frames: u32,
    pub streams: u32,
    pub width: u32,
    pub height: u32,
    pub video: Option<VideoStream>,
    pub odml_total_frames: Option<u32>,
}

impl AviHeader {
    /// Frame count, preferring the OpenDML total (the `avih` count only
    /// covers the first RIFF list of a large file)
    pub fn frame_count(&self) -> u64 {
        if let Some(total) = self.odml_total_frames.filter(|n| *n > 0) {
            return total as u64;
        }
        match &self.video {
            Some(v) if v.length > 0 => v.length as u64,
            _ => self.total_frames as u64,
        }
    }

    /// Declared frame rate, stream rate/scale first, then the main header period
    pub fn frame_rate(&self) -> Option<f64> {
        if let Some(v) = &self.video {
            if v.rate > 0 && v.scale > 0 {
                return Some(v.rate as f64 / v.scale as f64);
            }
        }
        if self.micro_sec_per_frame > 0 {
            return Some(1_000_000.0 / self.micro_sec_per_frame as f64);
        }
        None
    }

    /// (width, height); `strf` height may be negative for top-down bitmaps
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.video {
            Some(v) if v.width != 0 && v.height != 0 => {
                (v.width.unsigned_abs(), v.height.unsigned_abs())
            }
            _ => (self.width, self.height),
        }
    }

    /// Colour channels implied by the bitmap bit depth
    pub fn channels(&self) -> Option<u32> {
        let bit_count = self.video.as_ref()?.bit_count;
        match bit_count {
            8 | 16 => Some(1),
            24 | 48 => Some(3),
            32 | 64 => Some(4),
            _ => None,
        }
    }
}

/// Read the header of an AVI file on disk
pub fn read_header(path: &Path) -> IngestResult<AviHeader> {
    let file = File::open(path)
        .map_err(|e| IngestError::corrupt(path, format!("cannot open: {}", e)))?;
    let file_len = file
        .metadata()
        .map_err(|e| IngestError::corrupt(path, format!("cannot stat: {}", e)))?
        .len();

    let mut reader = BufReader::new(file);
    let header = parse_header(&mut reader, file_len).map_err(|reason| IngestError::corrupt(path, reason))?;

    tracing::trace!(
        file = %path.display(),
        frames = header.frame_count(),
        rate = ?header.frame_rate(),
        "Parsed AVI header"
    );

    Ok(header)
}

/// Parse an AVI header from any seekable source of `len` bytes
pub fn parse_header<R: Read + Seek>(r: &mut R, len: u64) -> Result<AviHeader, String> {
    if len < 12 {
        return Err(format!("file too short for a RIFF header ({} bytes)", len));
    }

    let mut riff = [0u8; 12];
    read_at(r, 0, &mut riff)?;
    if &riff[0..4] != RIFF || &riff[8..12] != AVI {
        return Err("not a RIFF/AVI file".to_string());
    }

    let riff_end = (8 + le_u32(&riff, 4) as u64).min(len);
    let mut pos = 12u64;
    let mut header = None;

    while pos + 8 <= riff_end {
        let (id, size) = read_chunk_header(r, pos)?;
        let body = pos + 8;
        let end = body + size as u64;
        if end > riff_end {
            return Err(format!(
                "chunk '{}' at offset {} overruns the RIFF list",
                fourcc_str(&id),
                pos
            ));
        }

        if &id == LIST && size >= 4 {
            let list_type = read_fourcc(r, body)?;
            if &list_type == HDRL {
                header = Some(parse_hdrl(r, body + 4, end)?);
                break;
            }
            if &list_type == MOVI {
                break;
            }
        }

        pos = next_chunk(end, size);
    }

    let header = header.ok_or_else(|| "missing 'hdrl' header list".to_string())?;
    if header.video.is_none() && header.width == 0 {
        return Err("no video stream in header".to_string());
    }
    Ok(header)
}

fn parse_hdrl<R: Read + Seek>(r: &mut R, start: u64, end: u64) -> Result<AviHeader, String> {
    let mut header = AviHeader::default();
    let mut saw_avih = false;
    let mut pos = start;

    while pos + 8 <= end {
        let (id, size) = read_chunk_header(r, pos)?;
        let body = pos + 8;
        let chunk_end = body + size as u64;
        if chunk_end > end {
            return Err(format!("chunk '{}' overruns the 'hdrl' list", fourcc_str(&id)));
        }

        match &id {
            id if id == AVIH => {
                let buf = read_body(r, body, size, 40)?;
                header.micro_sec_per_frame = le_u32(&buf, 0);
                header.total_frames = le_u32(&buf, 16);
                header.streams = le_u32(&buf, 24);
                header.width = le_u32(&buf, 32);
                header.height = le_u32(&buf, 36);
                saw_avih = true;
            }
            id if id == LIST && size >= 4 => {
                let list_type = read_fourcc(r, body)?;
                if &list_type == STRL && header.video.is_none() {
                    header.video = parse_strl(r, body + 4, chunk_end)?;
                } else if &list_type == ODML {
                    header.odml_total_frames = parse_odml(r, body + 4, chunk_end)?;
                }
            }
            _ => {}
        }

        pos = next_chunk(chunk_end, size);
    }

    if !saw_avih {
        return Err("missing 'avih' main header".to_string());
    }
    Ok(header)
}

/// Returns the stream only if it is a video stream
fn parse_strl<R: Read + Seek>(r: &mut R, start: u64, end: u64) -> Result<Option<VideoStream>, String> {
    let mut stream = VideoStream::default();
    let mut is_video = false;
    let mut pos = start;

    while pos + 8 <= end {
        let (id, size) = read_chunk_header(r, pos)?;
        let body = pos + 8;
        let chunk_end = body + size as u64;
        if chunk_end > end {
            return Err(format!("chunk '{}' overruns its 'strl' list", fourcc_str(&id)));
        }

        if &id == STRH {
            let buf = read_body(r, body, size, 36)?;
            is_video = &buf[0..4] == VIDS;
            stream.handler.copy_from_slice(&buf[4..8]);
            stream.scale = le_u32(&buf, 20);
            stream.rate = le_u32(&buf, 24);
            stream.length = le_u32(&buf, 32);
        } else if &id == STRF && is_video {
            let buf = read_body(r, body, size, 20)?;
            stream.width = le_i32(&buf, 4);
            stream.height = le_i32(&buf, 8);
            stream.bit_count = le_u16(&buf, 14);
            stream.compression.copy_from_slice(&buf[16..20]);
        }

        pos = next_chunk(chunk_end, size);
    }

    Ok(is_video.then_some(stream))
}

fn parse_odml<R: Read + Seek>(r: &mut R, start: u64, end: u64) -> Result<Option<u32>, String> {
    let mut pos = start;
    while pos + 8 <= end {
        let (id, size) = read_chunk_header(r, pos)?;
        if &id == DMLH {
            let buf = read_body(r, pos + 8, size, 4)?;
            return Ok(Some(le_u32(&buf, 0)));
        }
        pos = next_chunk(pos + 8 + size as u64, size);
    }
    Ok(None)
}

/// Chunks are word aligned
fn next_chunk(end: u64, size: u32) -> u64 {
    end + (size & 1) as u64
}

fn read_at<R: Read + Seek>(r: &mut R, pos: u64, buf: &mut [u8]) -> Result<(), String> {
    r.seek(SeekFrom::Start(pos))
        .map_err(|e| format!("seek to {} failed: {}", pos, e))?;
    r.read_exact(buf)
        .map_err(|e| format!("read of {} bytes at {} failed: {}", buf.len(), pos, e))
}

fn read_chunk_header<R: Read + Seek>(r: &mut R, pos: u64) -> Result<(FourCC, u32), String> {
    let mut buf = [0u8; 8];
    read_at(r, pos, &mut buf)?;
    let mut id = [0u8; 4];
    id.copy_from_slice(&buf[0..4]);
    Ok((id, le_u32(&buf, 4)))
}

fn read_fourcc<R: Read + Seek>(r: &mut R, pos: u64) -> Result<FourCC, String> {
    let mut id = [0u8; 4];
    read_at(r, pos, &mut id)?;
    Ok(id)
}

/// Read a header chunk body of at least `min` bytes
fn read_body<R: Read + Seek>(r: &mut R, pos: u64, size: u32, min: u32) -> Result<Vec<u8>, String> {
    if size < min {
        return Err(format!("header chunk at {} too short: {} < {} bytes", pos, size, min));
    }
    let mut buf = vec![0u8; size.min(MAX_HEADER_CHUNK) as usize];
    read_at(r, pos, &mut buf)?;
    Ok(buf)
}

fn le_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn le_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn le_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn fourcc_str(id: &FourCC) -> String {
    String::from_utf8_lossy(id).into_owned()
}
