//! Error types for imagelab operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for imagelab operations.
pub type Result<T> = std::result::Result<T, LabError>;

/// Errors that can occur while classifying, dispatching or processing media.
#[derive(Debug, Error)]
pub enum LabError {
    #[error("File ({}) does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Unable to open video capture {uri:?}")]
    Open { uri: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File ({}) already exists, pass --overwrite to replace it", .0.display())]
    Conflict(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    Ffmpeg {
        message: String,
        stderr: Option<String>,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "opencv")]
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}

impl LabError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Ffmpeg {
            message: message.into(),
            stderr,
        }
    }

    /// Create a configuration validation error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
