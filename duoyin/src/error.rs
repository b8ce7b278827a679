//! Error types for duoyin
//!
//! Per-unit failures (one source, one phrase) are contained where they happen
//! and only logged. Anything that reaches the caller of the pipeline is fatal
//! for that run.

use thiserror::Error;

/// Main error type for the dictionary builder
#[derive(Error, Debug)]
pub enum Error {
    /// A single dictionary source could not be decoded or parsed
    #[error("Failed to load source '{source_id}': {reason}")]
    SourceLoad { source_id: String, reason: String },

    /// The phonetic capability failed or returned unusable data for a phrase
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The persisted progress snapshot is unreadable or malformed
    #[error("Checkpoint is corrupt: {0}")]
    CheckpointCorrupt(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or output serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dictionary download errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Archive extraction errors
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A worker task panicked or was cancelled by the runtime
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Invalid pipeline settings
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Conversion failure for one phrase
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to convert '{phrase}': {reason}")]
pub struct ConversionError {
    pub phrase: String,
    pub reason: String,
}

impl ConversionError {
    pub fn new(phrase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience Result type using the duoyin Error
pub type Result<T> = std::result::Result<T, Error>;
