#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Glazier Background Removal
//!
//! Neural-assisted background removal. A segmentation model (run through ONNX
//! Runtime or Tract) produces a per-pixel foreground probability map, which is
//! thresholded into an alpha mask, upscaled to the source resolution and
//! composited back onto the original image. Edge, saturation and blur passes
//! are driven by a processing mode detected from image statistics.
//!
//! ## Features
//!
//! - **Two Backends**: ONNX Runtime (CUDA, `CoreML`, CPU) and Tract (pure Rust)
//! - **Single Inference per Image**: the model output is cached, so different
//!   tolerances can be previewed without re-running the model
//! - **Adaptive Post-Processing**: brightness, contrast, edge sharpness and
//!   complexity metrics pick one of `Portrait`, `Landscape`, `LowLight`, `HighKey`
//! - **Cooperative Cancellation**: every per-pixel loop polls a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Sync and Async APIs**: async twins run the same work on tokio's blocking pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glazier_bgremove::{BackgroundRemover, OutputFormat, RemoverConfig};
//! use glazier_bgremove::services::ImageIOService;
//! use tokio_util::sync::CancellationToken;
//!
//! # fn example() -> glazier_bgremove::Result<()> {
//! let config = RemoverConfig::builder().sharpen_edges(true).build()?;
//! let mut remover = BackgroundRemover::from_model_path("u2net.onnx", config)?;
//! let token = CancellationToken::new();
//!
//! if let Some(mode) = remover.load_source_image("portrait.jpg", &token)? {
//!     println!("Detected mode: {mode}");
//! }
//!
//! for tolerance in [40, 80, 120] {
//!     if let Some(result) = remover.remove_background(tolerance, &token)? {
//!         ImageIOService::save(&result, format!("out_{tolerance}.png"), OutputFormat::Png)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! glazier-bgremove = { version = "0.1", default-features = false, features = ["onnx"] }
//! ```

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod mask;
pub mod parallel;
pub mod processing;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::*;
pub use cache::{CacheEntry, SourceCache};
pub use compositor::{Compositor, CompositorOptions};
pub use config::{
    BackendType, ExecutionProvider, OutputFormat, RemoverConfig, RemoverConfigBuilder,
};
pub use error::{GlazierError, Result};
pub use inference::InferenceBackend;
pub use mask::MaskProcessor;
pub use processing::{Kernel, ModeDetector, ModeScores, SceneAnalysis};
pub use processor::{BackendFactory, BackgroundRemover, DefaultBackendFactory};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{ImageSize, PixelBuffer, PixelLayout, ProcessingMode};
pub use utils::{upscale_image, ImagePreprocessor};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat};
