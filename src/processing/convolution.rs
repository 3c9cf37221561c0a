//! Alpha-aware 2D convolution and the filters built on it
//!
//! Only neighbours with a non-zero alpha contribute to a pixel. The sum of the
//! weights that did contribute is the normalizer, so transparent pixels never
//! bleed colour into opaque ones. Pixels closer to the border than the kernel
//! reach are copied from the source unchanged.
//!
//! Convolution passes do not poll a cancellation token.

use tracing::trace;

use crate::error::Result;
use crate::parallel;
use crate::processing::kernel::Kernel;
use crate::processing::metrics;
use crate::types::{PixelBuffer, ProcessingMode};

/// Valid range of the blur amount accepted by [`gaussian_blur`]
pub const BLUR_AMOUNT_MIN: u32 = 1;
pub const BLUR_AMOUNT_MAX: u32 = 15;

/// Largest accepted mask pre-smoothing kernel
pub const EDGE_SMOOTHING_KERNEL_MAX: u32 = 63;

/// Convolve `source` with `kernel`, producing a buffer of the same size and layout
#[must_use]
pub fn convolve(source: &PixelBuffer, kernel: &Kernel) -> PixelBuffer {
    let mut output = source.clone();

    let size = kernel.size();
    let reach_before = size / 2;
    let reach_after = size - 1 - reach_before;
    let width = source.width() as usize;
    let height = source.height() as usize;

    if width < size || height < size {
        return output;
    }

    let x_range = reach_before..width - reach_after;
    let y_range = reach_before..height - reach_after;
    let channels = source.channels();
    let has_alpha = source.layout().has_alpha();

    parallel::for_each_row_mut(&mut output, None, |y, row| {
        let y = y as usize;
        if !y_range.contains(&y) {
            return;
        }

        for x in x_range.clone() {
            let mut sums = [0.0f32; 3];
            let mut alpha_sum = 0.0f32;
            let mut kernel_total = 0.0f32;

            for ky in 0..size {
                let sy = (y + ky - reach_before) as u32;
                for kx in 0..size {
                    let sx = (x + kx - reach_before) as u32;
                    let pixel = source.pixel(sx, sy);
                    let alpha = if has_alpha { pixel[3] } else { 255 };
                    if alpha == 0 {
                        continue;
                    }

                    let weight = kernel.weight(kx, ky);
                    sums[0] += f32::from(pixel[0]) * weight;
                    sums[1] += f32::from(pixel[1]) * weight;
                    sums[2] += f32::from(pixel[2]) * weight;
                    alpha_sum += f32::from(alpha) * weight;
                    kernel_total += weight;
                }
            }

            let dst = &mut row[x * channels..(x + 1) * channels];
            if kernel_total > 0.0 {
                for (out, sum) in dst.iter_mut().zip(sums) {
                    *out = to_channel(sum / kernel_total);
                }
                if has_alpha {
                    dst[3] = to_channel(alpha_sum / kernel_total);
                }
            } else {
                dst.fill(0);
            }
        }
    });

    output
}

/// Gaussian blur with a kernel of `amount`×`amount`, amount clamped to 1..=15
///
/// # Errors
/// - Kernel generation failed
pub fn gaussian_blur(image: &PixelBuffer, amount: u32) -> Result<PixelBuffer> {
    let amount = amount.clamp(BLUR_AMOUNT_MIN, BLUR_AMOUNT_MAX);
    let kernel = Kernel::gaussian(amount)?;
    trace!(amount, size = %image.size(), "Applying Gaussian blur");
    Ok(convolve(image, &kernel))
}

/// Smooth a mask with a Gaussian kernel of `kernel_size`
///
/// Size 0, or a kernel wider or taller than the mask, returns a copy without
/// building the kernel.
///
/// # Errors
/// - Kernel generation failed
pub fn edge_smoothing(mask: &PixelBuffer, kernel_size: u32) -> Result<PixelBuffer> {
    if kernel_size == 0 || kernel_size > mask.width() || kernel_size > mask.height() {
        return Ok(mask.clone());
    }
    let kernel = Kernel::gaussian(kernel_size)?;
    Ok(convolve(mask, &kernel))
}

/// Sharpen with an amount derived from the image complexity under `mode`
#[must_use]
pub fn sharpen_edges(image: &PixelBuffer, mode: ProcessingMode) -> PixelBuffer {
    let complexity = metrics::complexity(image, mode);
    let amount = (complexity * 1.2).clamp(0.5, 3.0);
    trace!(complexity, amount, "Sharpening edges");
    convolve(image, &Kernel::sharpen(amount))
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
