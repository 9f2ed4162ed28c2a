//! Error types for carving operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for carving operations.
pub type Result<T> = std::result::Result<T, CarveError>;

#[derive(Error, Debug)]
pub enum CarveError {
    /// IO error on the dump itself (fatal for that dump).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Dump file smaller than any carvable payload.
    #[error("Dump too small to carve: {path} ({size} bytes)")]
    DumpTooSmall { path: PathBuf, size: u64 },

    /// Read beyond the mapped dump bounds.
    #[error("Read beyond dump bounds: offset={offset}, length={length}, size={size}")]
    OutOfBounds { offset: u64, length: u64, size: u64 },

    /// Manifest (de)serialization failure.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Unknown file type name at the external surface.
    #[error("Unknown file type: {0}")]
    UnknownFileType(String),
}
