//! Merges the original image with the upscaled mask and applies finishing passes

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::RemoverConfig;
use crate::error::{GlazierError, Result};
use crate::parallel;
use crate::processing::{enhance_saturation, gaussian_blur, sharpen_edges};
use crate::types::{PixelBuffer, PixelLayout, ProcessingMode};

/// Finishing passes run after the mask is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositorOptions {
    /// Gaussian blur amount, clamped to 1..=15 when applied
    pub blur_amount: u32,
    pub sharpen_edges: bool,
    pub enhance_saturation: bool,
    /// Saturation multiplier, clamped to 1.0..=1.5 when applied
    pub saturation_boost: f32,
    /// Mode that drives the sharpening threshold
    pub mode: ProcessingMode,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self::from_config(&RemoverConfig::default(), ProcessingMode::None)
    }
}

impl CompositorOptions {
    /// Options taken from a remover configuration and the active mode
    #[must_use]
    pub fn from_config(config: &RemoverConfig, mode: ProcessingMode) -> Self {
        Self {
            blur_amount: config.blur_amount,
            sharpen_edges: config.sharpen_edges,
            enhance_saturation: config.enhance_saturation,
            saturation_boost: config.saturation_boost,
            mode,
        }
    }
}

/// Produces the transparent-background result image
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    /// Build an RGBA image from `original` with alpha taken from `mask`
    ///
    /// A pixel is opaque when `mask_value * 255 > tolerance`, where `mask_value` is
    /// the first channel of the mask byte, and fully transparent otherwise. RGB is
    /// copied unchanged. The result is then blurred and optionally sharpened and
    /// saturated. Only the per-pixel loop polls the token; the finishing passes
    /// always run to completion.
    ///
    /// # Errors
    /// - `mask` and `original` differ in size
    /// - Kernel generation for the blur failed
    #[instrument(skip_all, fields(size = %original.size(), tolerance = tolerance))]
    pub fn apply_mask(
        original: &PixelBuffer,
        mask: &PixelBuffer,
        tolerance: i32,
        options: &CompositorOptions,
        token: Option<&CancellationToken>,
    ) -> Result<PixelBuffer> {
        if mask.size() != original.size() {
            return Err(GlazierError::invalid_parameter(format!(
                "Mask size {} does not match image size {}",
                mask.size(),
                original.size()
            )));
        }

        let mut result = PixelBuffer::new(original.width(), original.height(), PixelLayout::Rgba8);
        let source_channels = original.channels();
        let mask_channels = mask.channels();

        let completed = parallel::for_each_row_mut(&mut result, token, |y, row| {
            let source = original.row(y);
            let mask_row = mask.row(y);

            for ((dst, src), edge) in row
                .chunks_exact_mut(4)
                .zip(source.chunks_exact(source_channels))
                .zip(mask_row.chunks_exact(mask_channels))
            {
                dst[..3].copy_from_slice(&src[..3]);
                dst[3] = if i32::from(edge[0]) * 255 > tolerance { 255 } else { 0 };
            }
        });
        debug!(completed, "Applied mask");

        let mut result = gaussian_blur(&result, options.blur_amount)?;
        if options.sharpen_edges {
            result = sharpen_edges(&result, options.mode);
        }
        if options.enhance_saturation {
            result = enhance_saturation(&result, options.saturation_boost);
        }

        Ok(result)
    }

    /// [`apply_mask`](Self::apply_mask) on the blocking thread pool
    ///
    /// # Errors
    /// - Any error from `apply_mask`
    /// - The blocking task panicked or was aborted
    pub async fn apply_mask_async(
        original: PixelBuffer,
        mask: PixelBuffer,
        tolerance: i32,
        options: CompositorOptions,
        token: CancellationToken,
    ) -> Result<PixelBuffer> {
        tokio::task::spawn_blocking(move || {
            Self::apply_mask(&original, &mask, tolerance, &options, Some(&token))
        })
        .await
        .map_err(|e| GlazierError::internal(format!("Compositing task failed: {e}")))?
    }
}
