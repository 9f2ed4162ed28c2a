//! Error types for coverage analysis.

use thiserror::Error;

/// Result type for coverage operations.
pub type Result<T> = std::result::Result<T, CoverageError>;

#[derive(Error, Debug)]
pub enum CoverageError {
    /// IO error writing report files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON report serialization failure
    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
