use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::agent::{ShapeMismatch, TrainingState};

const MAGIC: &[u8; 4] = b"A2Q1"; // ASCII magic
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1;
const TRAILER_LEN: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("{0}")]
    ShapeMismatch(#[from] ShapeMismatch),
}

fn check_consistent(state: &TrainingState) -> Result<(), SerializationError> {
    state.validate(state.shape())?;
    Ok(())
}

/// Encode a training state as JSON, the form carried on the wire.
pub fn to_json(state: &TrainingState) -> Result<String, SerializationError> {
    Ok(serde_json::to_string(state)?)
}

/// Decode a training state from JSON and check its weight buffers.
pub fn from_json(text: &str) -> Result<TrainingState, SerializationError> {
    let state: TrainingState = serde_json::from_str(text)?;
    check_consistent(&state)?;
    Ok(state)
}

/// Binary layout: `MAGIC | VERSION | postcard(state) | crc32c(all preceding bytes) LE`.
pub fn to_bytes(state: &TrainingState) -> Result<Vec<u8>, SerializationError> {
    let payload = postcard::to_allocvec(state)?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&payload);
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn from_bytes(bytes: &[u8]) -> Result<TrainingState, SerializationError> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(SerializationError::Malformed);
    }
    // Checksum first so a truncated or corrupted file never reaches postcard.
    let (content, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    let file_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if file_crc != crc32c::crc32c(content) {
        return Err(SerializationError::Checksum);
    }
    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(SerializationError::MagicOrVersion);
    }
    let state: TrainingState = postcard::from_bytes(&content[HEADER_LEN..])?;
    check_consistent(&state)?;
    Ok(state)
}

pub fn write_to_path<P: AsRef<Path>>(path: P, state: &TrainingState) -> Result<(), SerializationError> {
    let data = to_bytes(state)?;
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<TrainingState, SerializationError> {
    let bytes = fs::read(path)?;
    from_bytes(&bytes)
}
