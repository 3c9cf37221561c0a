//! Configuration types for background removal operations

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GlazierError, Result};

/// Default edge length of the square model input
pub const DEFAULT_MODEL_SIZE: u32 = 320;

/// Default Gaussian kernel size used to pre-smooth the mask
pub const DEFAULT_EDGE_SMOOTHING_KERNEL: u32 = 5;

/// Default saturation multiplier when enhancement is enabled
pub const DEFAULT_SATURATION_BOOST: f32 = crate::processing::color::DEFAULT_SATURATION_BOOST;

/// Default Gaussian blur amount applied after compositing
pub const DEFAULT_BLUR_AMOUNT: u32 = 3;

/// Valid saturation boost range
pub const SATURATION_BOOST_RANGE: (f32, f32) = (1.0, 1.5);

/// Valid mask pre-smoothing kernel range (0 disables smoothing)
pub const EDGE_SMOOTHING_KERNEL_RANGE: (u32, u32) =
    (0, crate::processing::convolution::EDGE_SMOOTHING_KERNEL_MAX);

/// Valid blur amount range
pub const BLUR_AMOUNT_RANGE: (u32, u32) = (
    crate::processing::convolution::BLUR_AMOUNT_MIN,
    crate::processing::convolution::BLUR_AMOUNT_MAX,
);

/// Inference backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (native, supports GPU execution providers)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, CPU only)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration through `CoreML`
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// 32-bit BMP with alpha channel
    Bmp,
}

impl OutputFormat {
    /// File extension without the leading dot
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Bmp => "bmp",
        }
    }
}

/// Configuration for a [`BackgroundRemover`](crate::BackgroundRemover)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoverConfig {
    /// Inference backend used when building from a model path
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Model input width in pixels
    pub model_width: u32,

    /// Model input height in pixels
    pub model_height: u32,

    /// Gaussian kernel size used to pre-smooth the mask (0 disables smoothing)
    pub edge_smoothing_kernel_size: u32,

    /// Sharpen the composited result
    pub sharpen_edges: bool,

    /// Boost saturation of the composited result
    pub enhance_saturation: bool,

    /// Saturation multiplier used when `enhance_saturation` is set (1.0-1.5)
    pub saturation_boost: f32,

    /// Gaussian blur amount applied to the composited result (1-15)
    pub blur_amount: u32,

    /// Encoding used when saving results
    pub output_format: OutputFormat,
}

impl Default for RemoverConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            model_width: DEFAULT_MODEL_SIZE,
            model_height: DEFAULT_MODEL_SIZE,
            edge_smoothing_kernel_size: DEFAULT_EDGE_SMOOTHING_KERNEL,
            sharpen_edges: false,
            enhance_saturation: false,
            saturation_boost: DEFAULT_SATURATION_BOOST,
            blur_amount: DEFAULT_BLUR_AMOUNT,
            output_format: OutputFormat::default(),
        }
    }
}

impl RemoverConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use glazier_bgremove::{BackendType, RemoverConfig};
    ///
    /// let config = RemoverConfig::builder()
    ///     .backend_type(BackendType::Tract)
    ///     .sharpen_edges(true)
    ///     .build()
    ///     .unwrap();
    /// assert!(config.sharpen_edges);
    /// ```
    #[must_use]
    pub fn builder() -> RemoverConfigBuilder {
        RemoverConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values. The result is validated.
    ///
    /// # Errors
    /// - The file cannot be read
    /// - The contents are not valid JSON for this structure
    /// - A value is out of range
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GlazierError::file_io_error("read config", path, &e))?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Model input size as `(width, height)`
    #[must_use]
    pub fn model_size(&self) -> (u32, u32) {
        (self.model_width, self.model_height)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero model width or height
    /// - Saturation boost outside 1.0-1.5
    /// - Blur amount outside 1-15
    /// - Edge smoothing kernel size above 63
    pub fn validate(&self) -> Result<()> {
        if self.model_width == 0 || self.model_height == 0 {
            return Err(GlazierError::config_value_error(
                "model size",
                format!("{}x{}", self.model_width, self.model_height),
                "at least 1x1",
                Some(format!("{DEFAULT_MODEL_SIZE}x{DEFAULT_MODEL_SIZE}")),
            ));
        }

        let (min_boost, max_boost) = SATURATION_BOOST_RANGE;
        if !(min_boost..=max_boost).contains(&self.saturation_boost) {
            return Err(GlazierError::config_value_error(
                "saturation boost",
                self.saturation_boost,
                "1.0-1.5",
                Some(DEFAULT_SATURATION_BOOST),
            ));
        }

        let (_, max_kernel) = EDGE_SMOOTHING_KERNEL_RANGE;
        if self.edge_smoothing_kernel_size > max_kernel {
            return Err(GlazierError::config_value_error(
                "edge smoothing kernel size",
                self.edge_smoothing_kernel_size,
                "0-63",
                Some(DEFAULT_EDGE_SMOOTHING_KERNEL),
            ));
        }

        let (min_blur, max_blur) = BLUR_AMOUNT_RANGE;
        if !(min_blur..=max_blur).contains(&self.blur_amount) {
            return Err(GlazierError::config_value_error(
                "blur amount",
                self.blur_amount,
                "1-15",
                Some(DEFAULT_BLUR_AMOUNT),
            ));
        }

        Ok(())
    }
}

/// Builder for `RemoverConfig`
#[derive(Debug, Default)]
pub struct RemoverConfigBuilder {
    config: RemoverConfig,
}

impl RemoverConfigBuilder {
    /// Set the inference backend
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set intra-op threads to `threads` and inter-op threads to half of it
    ///
    /// `0` leaves both on auto-detection.
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Set the model input size
    #[must_use]
    pub fn model_size(mut self, width: u32, height: u32) -> Self {
        self.config.model_width = width;
        self.config.model_height = height;
        self
    }

    /// Set the mask pre-smoothing kernel size, clamped to 0-63
    #[must_use]
    pub fn edge_smoothing_kernel_size(mut self, size: u32) -> Self {
        self.config.edge_smoothing_kernel_size = size.min(EDGE_SMOOTHING_KERNEL_RANGE.1);
        self
    }

    /// Enable or disable edge sharpening
    #[must_use]
    pub fn sharpen_edges(mut self, enabled: bool) -> Self {
        self.config.sharpen_edges = enabled;
        self
    }

    /// Enable or disable saturation enhancement
    #[must_use]
    pub fn enhance_saturation(mut self, enabled: bool) -> Self {
        self.config.enhance_saturation = enabled;
        self
    }

    /// Set the saturation multiplier, clamped to 1.0-1.5
    #[must_use]
    pub fn saturation_boost(mut self, boost: f32) -> Self {
        let (min_boost, max_boost) = SATURATION_BOOST_RANGE;
        self.config.saturation_boost = if boost.is_nan() {
            DEFAULT_SATURATION_BOOST
        } else {
            boost.clamp(min_boost, max_boost)
        };
        self
    }

    /// Set the post-composite blur amount, clamped to 1-15
    #[must_use]
    pub fn blur_amount(mut self, amount: u32) -> Self {
        let (min_blur, max_blur) = BLUR_AMOUNT_RANGE;
        self.config.blur_amount = amount.clamp(min_blur, max_blur);
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Zero model width or height
    pub fn build(self) -> Result<RemoverConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RemoverConfig::default();
        assert_eq!(config.backend_type, BackendType::Onnx);
        assert_eq!(config.model_size(), (320, 320));
        assert_eq!(config.edge_smoothing_kernel_size, 5);
        assert_eq!(config.blur_amount, 3);
        assert!((config.saturation_boost - 1.2).abs() < f32::EPSILON);
        assert!(!config.sharpen_edges);
        assert!(!config.enhance_saturation);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RemoverConfig::builder()
            .backend_type(BackendType::Tract)
            .model_size(1024, 768)
            .sharpen_edges(true)
            .enhance_saturation(true)
            .output_format(OutputFormat::Bmp)
            .build()
            .unwrap();

        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.model_size(), (1024, 768));
        assert!(config.sharpen_edges);
        assert!(config.enhance_saturation);
        assert_eq!(config.output_format, OutputFormat::Bmp);
    }

    #[test]
    fn test_builder_clamps_ranges() {
        let config = RemoverConfig::builder()
            .saturation_boost(3.0)
            .blur_amount(40)
            .build()
            .unwrap();
        assert!((config.saturation_boost - 1.5).abs() < f32::EPSILON);
        assert_eq!(config.blur_amount, 15);

        let config = RemoverConfig::builder()
            .saturation_boost(0.2)
            .blur_amount(0)
            .build()
            .unwrap();
        assert!((config.saturation_boost - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.blur_amount, 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RemoverConfig::default();
        config.model_width = 0;
        assert!(config.validate().is_err());

        let mut config = RemoverConfig::default();
        config.saturation_boost = 2.0;
        assert!(config.validate().is_err());

        let mut config = RemoverConfig::default();
        config.blur_amount = 16;
        assert!(config.validate().is_err());

        let mut config = RemoverConfig::default();
        config.edge_smoothing_kernel_size = 20_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("edge smoothing kernel size"));

        let config = RemoverConfig::builder()
            .edge_smoothing_kernel_size(20_000)
            .build()
            .unwrap();
        assert_eq!(config.edge_smoothing_kernel_size, 63);

        assert!(RemoverConfig::builder().model_size(0, 10).build().is_err());
    }

    #[test]
    fn test_num_threads_ratio() {
        let config = RemoverConfig::builder().num_threads(8).build().unwrap();
        assert_eq!(config.intra_threads, 8);
        assert_eq!(config.inter_threads, 4);

        let config = RemoverConfig::builder().num_threads(1).build().unwrap();
        assert_eq!(config.inter_threads, 1);

        let config = RemoverConfig::builder().num_threads(0).build().unwrap();
        assert_eq!(config.intra_threads, 0);
        assert_eq!(config.inter_threads, 0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RemoverConfig =
            serde_json::from_str(r#"{"backend_type": "tract", "sharpen_edges": true}"#).unwrap();
        assert_eq!(config.backend_type, BackendType::Tract);
        assert!(config.sharpen_edges);
        assert_eq!(config.model_size(), (320, 320));
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"execution_provider": "coreml", "blur_amount": 5, "output_format": "bmp"}}"#
        )
        .unwrap();

        let config = RemoverConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.execution_provider, ExecutionProvider::CoreMl);
        assert_eq!(config.blur_amount, 5);
        assert_eq!(config.output_format, OutputFormat::Bmp);
    }

    #[test]
    fn test_from_json_file_rejects_out_of_range_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"saturation_boost": 4.0}}"#).unwrap();

        let err = RemoverConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, GlazierError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_file_missing_file() {
        let err = RemoverConfig::from_json_file("/nonexistent/glazier.json").unwrap_err();
        assert!(matches!(err, GlazierError::Io(_)));
        assert!(err.to_string().contains("read config"));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert_eq!(BackendType::Tract.to_string(), "tract");
        assert_eq!(OutputFormat::Bmp.extension(), "bmp");
    }
}
