//! Scalar image statistics used for mode detection and adaptive filtering
//!
//! Every metric reads the first three channels of the buffer as R, G, B and
//! reduces per-row partial sums with an atomic accumulator. Luminance values are
//! truncated to integers before they are summed.

use rayon::prelude::*;
use std::sync::atomic::Ordering;

use crate::parallel;
use crate::types::{PixelBuffer, ProcessingMode};

/// Default edge length of the regional brightness grid
pub const DEFAULT_REGION_GRID: u32 = 4;

/// Row step used by the sampled metrics
pub const SAMPLE_STEP: usize = 8;

const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Truncated perceptual luminance of one pixel
fn luminance(pixel: &[u8]) -> i64 {
    match pixel {
        [r, g, b, ..] => {
            (f32::from(*r) * LUMA_R + f32::from(*g) * LUMA_G + f32::from(*b) * LUMA_B) as i64
        }
        _ => 0,
    }
}

/// Sum of absolute first-channel differences against the four direct neighbours
fn neighbour_difference(image: &PixelBuffer, x: u32, y: u32) -> i64 {
    let center = i64::from(image.pixel(x, y)[0]);
    [
        image.pixel(x - 1, y),
        image.pixel(x + 1, y),
        image.pixel(x, y - 1),
        image.pixel(x, y + 1),
    ]
    .iter()
    .map(|p| (center - i64::from(p[0])).abs())
    .sum()
}

/// Average perceptual brightness in `[0, 1]`
#[must_use]
pub fn brightness(image: &PixelBuffer) -> f32 {
    let total_pixels = image.size().pixel_count();
    if total_pixels == 0 {
        return 0.0;
    }

    let channels = image.channels();
    let sum = parallel::atomic_sum((0..image.height()).into_par_iter(), |y| {
        image.row(y).chunks_exact(channels).map(luminance).sum()
    });

    sum as f32 / (total_pixels as f32 * 255.0)
}

/// Brightness of each cell in a `grid`×`grid` partition, row-major, in `[0, 1]`
///
/// Pixels left over when the size is not a multiple of `grid` fold into the last
/// row or column of cells. Each cell is normalized by the number of pixels that
/// landed in it; cells no pixel maps to (images smaller than the grid) read 0.
#[must_use]
pub fn regional_brightness(image: &PixelBuffer, grid: u32) -> Vec<f32> {
    let grid = grid.max(1);
    let cells = (grid * grid) as usize;
    let region_width = (image.width() / grid).max(1);
    let region_height = (image.height() / grid).max(1);
    let channels = image.channels();

    // First `cells` bins hold luminance sums, the rest pixel counts
    let bins = parallel::atomic_bins((0..image.height()).into_par_iter(), cells * 2, |y, bins| {
        let region_y = (y / region_height).min(grid - 1);
        for (x, pixel) in image.row(y).chunks_exact(channels).enumerate() {
            let region_x = (x as u32 / region_width).min(grid - 1);
            let index = (region_y * grid + region_x) as usize;
            bins[index].fetch_add(luminance(pixel), Ordering::Relaxed);
            bins[cells + index].fetch_add(1, Ordering::Relaxed);
        }
    });

    let (sums, counts) = bins.split_at(cells);
    sums.iter()
        .zip(counts)
        .map(|(&sum, &count)| {
            if count == 0 {
                0.0
            } else {
                sum as f32 / (count as f32 * 255.0)
            }
        })
        .collect()
}

/// Mean of [`regional_brightness`] over the default grid
#[must_use]
pub fn average_regional_brightness(image: &PixelBuffer) -> f32 {
    let regions = regional_brightness(image, DEFAULT_REGION_GRID);
    if regions.is_empty() {
        return 0.0;
    }
    regions.iter().sum::<f32>() / regions.len() as f32
}

/// Local contrast sampled on every eighth row, in `[0, 1]`
///
/// Each sample compares red with the left neighbour, green with the right one and
/// blue with the one above; neighbours outside the image fall back to the pixel.
#[must_use]
pub fn contrast(image: &PixelBuffer) -> f32 {
    let total_pixels = image.size().pixel_count();
    if total_pixels == 0 {
        return 0.0;
    }

    let width = image.width();
    let sum = parallel::atomic_sum(parallel::stepped_rows(0, image.height(), SAMPLE_STEP), |y| {
        (0..width)
            .map(|x| {
                let pixel = image.pixel(x, y);
                let left = if x > 0 { image.pixel(x - 1, y) } else { pixel };
                let right = if x + 1 < width { image.pixel(x + 1, y) } else { pixel };
                let top = if y > 0 { image.pixel(x, y - 1) } else { pixel };

                let value = f32::from(pixel[0].abs_diff(left[0])) * LUMA_R
                    + f32::from(pixel[1].abs_diff(right[1])) * LUMA_G
                    + f32::from(pixel[2].abs_diff(top[2])) * LUMA_B;
                value as i64
            })
            .sum()
    });

    sum as f32 / (total_pixels as f32 * 255.0)
}

/// Edge sharpness score in `1..=10`
///
/// Sums the first-channel differences to the four neighbours on every eighth row
/// starting at row 1, scaled by 100 over the pixel count.
#[must_use]
pub fn edge_sharpness(image: &PixelBuffer) -> i32 {
    let total_pixels = image.size().pixel_count() as i64;
    if total_pixels == 0 {
        return 1;
    }

    let sum = sampled_interior(image, |diff| diff);
    (sum * 100 / total_pixels).clamp(1, 10) as i32
}

/// Fraction of pixels that sit on an edge, judged with a mode-dependent threshold
#[must_use]
pub fn complexity(image: &PixelBuffer, mode: ProcessingMode) -> f32 {
    let total_pixels = image.size().pixel_count();
    if total_pixels == 0 {
        return 0.0;
    }

    let threshold = complexity_threshold(contrast(image), mode);
    let edge_pixels = sampled_interior(image, |diff| i64::from(diff > threshold));
    edge_pixels as f32 / total_pixels as f32
}

/// Difference threshold above which a pixel counts as an edge
#[must_use]
pub fn complexity_threshold(contrast: f32, mode: ProcessingMode) -> i64 {
    match mode {
        ProcessingMode::Portrait => (contrast * 30.0) as i64,
        ProcessingMode::Landscape => (contrast * 50.0) as i64,
        ProcessingMode::LowLight => (contrast * 20.0) as i64,
        ProcessingMode::None | ProcessingMode::HighKey => 40,
    }
}

/// Brightness rescaled for very dark and very bright images, then for `mode`
#[must_use]
pub fn adjust_brightness_sensitivity(image: &PixelBuffer, mode: ProcessingMode) -> f32 {
    let brightness = brightness(image);

    let adjusted = if brightness < 0.1 {
        brightness * 1.8
    } else if brightness > 0.9 {
        brightness * 0.6
    } else {
        brightness
    };

    match mode {
        ProcessingMode::LowLight => adjusted * 1.5,
        ProcessingMode::HighKey => adjusted * 0.7,
        ProcessingMode::None | ProcessingMode::Portrait | ProcessingMode::Landscape => adjusted,
    }
}

/// Sum `score(diff)` over interior pixels of every eighth row starting at row 1
fn sampled_interior<F>(image: &PixelBuffer, score: F) -> i64
where
    F: Fn(i64) -> i64 + Sync + Send,
{
    let width = image.width();
    let height = image.height();
    if width < 3 || height < 3 {
        return 0;
    }

    parallel::atomic_sum(parallel::stepped_rows(1, height - 1, SAMPLE_STEP), |y| {
        (1..width - 1)
            .map(|x| score(neighbour_difference(image, x, y)))
            .sum()
    })
}
