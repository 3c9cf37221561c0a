//! Pixel-level image processing: kernels, convolution, statistics, mode
//! detection and colour adjustment

pub mod color;
pub mod convolution;
pub mod kernel;
pub mod metrics;
pub mod mode;

pub use color::enhance_saturation;
pub use convolution::{convolve, edge_smoothing, gaussian_blur, sharpen_edges};
pub use kernel::Kernel;
pub use mode::{ModeDetector, ModeScores, SceneAnalysis};
