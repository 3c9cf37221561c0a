//! Shared utilities

pub mod preprocessing;

pub use preprocessing::{upscale_image, ImagePreprocessor};
