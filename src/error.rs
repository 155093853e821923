use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid preset: {0}. Expected one of: fast, balanced, quality")]
    InvalidPreset(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported pixel mode: {0}")]
    UnsupportedPixelMode(String),

    #[error("{format} encoding failed: {reason}")]
    EncodeFailure {
        format: &'static str,
        reason: String,
    },

    #[error("Failed to write metadata to {path}: {reason}")]
    MetadataWriteFailure { path: PathBuf, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Input directory does not exist or is not a directory: {0}")]
    InvalidInputDirectory(PathBuf),

    #[error("Failed to create output directory: {0}")]
    DirectoryCreationFailed(PathBuf),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),
}

impl CompressionError {
    pub(crate) fn encode(format: &'static str, reason: impl ToString) -> Self {
        CompressionError::EncodeFailure {
            format,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressionError>;
