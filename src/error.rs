//! Error types for background removal operations

use std::collections::TryReserveError;
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, GlazierError>;

/// Message reported when the cached source image is read before anything was loaded
pub const CACHE_NOT_LOADED_MESSAGE: &str =
    "Cached image is not loaded. Ensure that an image is properly set before accessing.";

/// Error types for the background removal pipeline
#[derive(Error, Debug)]
pub enum GlazierError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration (de)serialization errors
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid argument passed to a pipeline component
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tensor with an unexpected shape or layout
    #[error("Invalid tensor: {0}")]
    InvalidTensor(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Pixel processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// The source image cache was read while empty
    #[error("{}", CACHE_NOT_LOADED_MESSAGE)]
    CacheNotLoaded,

    /// The cached source image could not be copied out of the cache
    #[error("Failed to clone the cached image.")]
    CacheClone {
        #[source]
        source: TryReserveError,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GlazierError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new invalid tensor error
    pub fn invalid_tensor<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTensor(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {} model '{}': {}.{}",
            operation, path_display, error, suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create a processing error naming the pipeline stage that failed
    pub fn processing_stage_error(stage: &str, details: &str, context: Option<&str>) -> Self {
        let context_text = context.map(|c| format!(" ({})", c)).unwrap_or_default();
        Self::Processing(format!("{} failed: {}{}", stage, details, context_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_not_loaded_message_is_literal() {
        let err = GlazierError::CacheNotLoaded;
        assert_eq!(
            err.to_string(),
            "Cached image is not loaded. Ensure that an image is properly set before accessing."
        );
    }

    #[test]
    fn test_cache_clone_preserves_source() {
        use std::error::Error as _;

        let reserve_error = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
        let err = GlazierError::CacheClone {
            source: reserve_error,
        };

        assert_eq!(err.to_string(), "Failed to clone the cached image.");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_value_error_formatting() {
        let err = GlazierError::config_value_error("saturation boost", 2.0, "1.0-1.5", Some(1.2));
        let message = err.to_string();
        assert!(message.contains("saturation boost"));
        assert!(message.contains("1.0-1.5"));
        assert!(message.contains("Recommended: 1.2"));
    }

    #[test]
    fn test_model_error_with_suggestions() {
        let err = GlazierError::model_error_with_context(
            "load",
            "/models/u2net.onnx",
            "file not found",
            &["check the path", "download the model"],
        );
        let message = err.to_string();
        assert!(message.contains("/models/u2net.onnx"));
        assert!(message.contains("check the path, download the model"));
    }

    #[test]
    fn test_processing_stage_error_context() {
        let err = GlazierError::processing_stage_error("image loading", "bad header", Some("42 bytes"));
        assert_eq!(
            err.to_string(),
            "Processing error: image loading failed: bad header (42 bytes)"
        );
    }
}
