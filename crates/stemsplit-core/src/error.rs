//! Error types for StemSplit.

use thiserror::Error;

/// Main error type for StemSplit operations.
#[derive(Error, Debug)]
pub enum StemSplitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for StemSplit operations.
pub type Result<T> = std::result::Result<T, StemSplitError>;
