//! Error types for minidump parsing and module reassembly.

use thiserror::Error;

/// Result type for minidump operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid MDMP magic bytes
    #[error("Not a minidump: expected \"MDMP\", got {0:?}")]
    InvalidMagic([u8; 4]),

    /// A structure ran past the end of the dump
    #[error("Truncated minidump while reading {0}")]
    Truncated(&'static str),

    /// Implausible module count in the module list stream
    #[error("Implausible module count: {0}")]
    ImplausibleModuleCount(u32),

    /// Implausible range count in the memory64 stream
    #[error("Implausible memory range count: {0}")]
    ImplausibleRangeCount(u64),
}
