//! Error types for detection and scanning.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during detection and video scanning.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Image decode failed: {0}")]
    DecodeFailure(String),

    #[error("Letterbox resize failed: {0}")]
    ResizeFailure(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a model-not-loaded error.
    pub fn model_not_loaded(id: impl Into<String>) -> Self {
        Self::ModelNotLoaded(id.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a decode failure error.
    pub fn decode_failure(message: impl Into<String>) -> Self {
        Self::DecodeFailure(message.into())
    }

    /// Create a resize failure error.
    pub fn resize_failure(message: impl Into<String>) -> Self {
        Self::ResizeFailure(message.into())
    }

    /// Create an inference failure, wrapping the runtime's message.
    pub fn inference_failure(message: impl Into<String>) -> Self {
        Self::InferenceFailure(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create an asset unavailable error.
    pub fn asset_unavailable(message: impl Into<String>) -> Self {
        Self::AssetUnavailable(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for failures that only cost one frame during a scan.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::DecodeFailure(_)
                | Self::ResizeFailure(_)
                | Self::InferenceFailure(_)
                | Self::InvalidOutput(_)
                | Self::AssetUnavailable(_)
        )
    }
}

impl From<image::ImageError> for MediaError {
    fn from(e: image::ImageError) -> Self {
        Self::DecodeFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_local_errors() {
        assert!(MediaError::asset_unavailable("t=3.0").is_frame_local());
        assert!(MediaError::decode_failure("bad png").is_frame_local());
        assert!(!MediaError::Cancelled.is_frame_local());
        assert!(!MediaError::model_not_loaded("abc").is_frame_local());
    }

    #[test]
    fn test_inference_failure_keeps_message() {
        let err = MediaError::inference_failure("shape mismatch");
        assert_eq!(err.to_string(), "Inference failed: shape mismatch");
    }
}
