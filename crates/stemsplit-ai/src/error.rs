//! Error types for the separation subsystem.

use std::path::PathBuf;
use stemsplit_core::StemSplitError;
use thiserror::Error;

/// Errors that can occur while separating a song.
#[derive(Debug, Error)]
pub enum AiError {
    /// The model file is not on disk.
    #[error("Model not found: {model_id} (expected at {})", path.display())]
    ModelNotFound { model_id: String, path: PathBuf },

    /// A handle was released that the cache does not hold.
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    /// A configured model name is missing from the catalog.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The model catalog could not be parsed or is inconsistent.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The inference call failed.
    #[error("Inference failed for {model}: {reason}")]
    InferenceFailed { model: String, reason: String },

    /// The model returned a batch of the wrong shape.
    #[error("Malformed model output: expected {expected:?}, got {actual:?}")]
    MalformedOutput {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// ONNX Runtime error.
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxError(String),

    /// Preprocessing error (shape or transform issues).
    #[error("Preprocessing error: {0}")]
    PreprocessError(String),

    /// The input mixture could not be read. The song is skipped.
    #[error("Cannot read {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        source: StemSplitError,
    },

    /// Configuration (de)serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Audio, persistence or cancellation error from the core crates.
    #[error(transparent)]
    Core(#[from] StemSplitError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    /// Whether this error only concerns the current input file.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InputUnreadable { .. })
    }

    /// Whether the run was cancelled by the user.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Core(StemSplitError::Cancelled))
    }
}

#[cfg(feature = "onnx")]
pub(crate) fn onnx_error(e: impl std::fmt::Display) -> AiError {
    AiError::OnnxError(e.to_string())
}

/// Result type alias for separation operations.
pub type AiResult<T> = std::result::Result<T, AiError>;
