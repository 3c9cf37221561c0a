//! Conversion of model probabilities into a binary alpha mask

use ndarray::{Array4, Axis};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{GlazierError, Result};
use crate::parallel;
use crate::processing::{edge_smoothing, metrics};
use crate::types::{ImageSize, PixelBuffer, PixelLayout};

/// Builds masks from the `[1, 1, H, W]` probability tensor a segmentation model emits
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskProcessor;

impl MaskProcessor {
    /// Threshold the first output channel into an RGB mask of `target_size`
    ///
    /// A pixel is foreground (255 in all three channels) when
    /// `probability * 255 > tolerance + edge_compensation`, background (0)
    /// otherwise. Probabilities are clamped to `[0, 1]` and NaN reads as 0.
    ///
    /// The edge compensation is measured on a blank, pre-smoothed mask and
    /// therefore does not depend on the tensor. The token is polled per row; a
    /// cancelled run returns the rows written so far.
    ///
    /// # Errors
    /// - `target_size` is empty
    /// - The tensor is not four-dimensional or cannot cover `target_size`
    #[instrument(skip(tensor, token), fields(shape = ?tensor.shape()))]
    pub fn process_output(
        tensor: &Array4<f32>,
        target_size: ImageSize,
        tolerance: i32,
        kernel_size: u32,
        token: Option<&CancellationToken>,
    ) -> Result<PixelBuffer> {
        if target_size.is_empty() {
            return Err(GlazierError::invalid_parameter(format!(
                "Mask size must be positive, got {target_size}"
            )));
        }
        Self::validate_tensor(tensor, target_size)?;

        let mut mask = edge_smoothing(
            &PixelBuffer::new(target_size.width, target_size.height, PixelLayout::Rgb8),
            kernel_size,
        )?;
        let edge_compensation = metrics::edge_sharpness(&mask) as f32;
        let threshold = tolerance as f32 + edge_compensation;

        let probabilities = tensor.index_axis(Axis(0), 0).index_axis_move(Axis(0), 0);

        let completed = parallel::for_each_row_mut(&mut mask, token, |y, row| {
            for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
                let probability = clamp_probability(probabilities[[y as usize, x]]);
                let value = if probability * 255.0 > threshold { 255 } else { 0 };
                pixel.fill(value);
            }
        });

        debug!(tolerance, edge_compensation, completed, "Generated mask");
        Ok(mask)
    }

    /// Compensation added to the tolerance for a mask of `size`
    ///
    /// # Errors
    /// - Kernel generation failed
    pub fn edge_compensation(size: ImageSize, kernel_size: u32) -> Result<i32> {
        let blank = PixelBuffer::new(size.width, size.height, PixelLayout::Rgb8);
        let smoothed = edge_smoothing(&blank, kernel_size)?;
        Ok(metrics::edge_sharpness(&smoothed))
    }

    fn validate_tensor(tensor: &Array4<f32>, target_size: ImageSize) -> Result<()> {
        let shape = tensor.shape();
        let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
        if batch == 0 || channels == 0 {
            return Err(GlazierError::invalid_tensor(format!(
                "Output tensor {shape:?} has no probability plane"
            )));
        }
        if height < target_size.height as usize || width < target_size.width as usize {
            return Err(GlazierError::invalid_tensor(format!(
                "Output tensor {shape:?} is smaller than the mask size {target_size}"
            )));
        }
        Ok(())
    }
}

fn clamp_probability(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
