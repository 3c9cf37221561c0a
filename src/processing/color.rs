//! Colour adjustments applied after compositing

use crate::parallel;
use crate::types::PixelBuffer;

/// Saturation boost used when none is configured
pub const DEFAULT_SATURATION_BOOST: f32 = 1.2;

/// Boost saturation with a luminance-weighted colour matrix
///
/// `boost` is clamped to `1.0..=1.5`. For a pixel `(r, g, b)` each output channel
/// is `lum_c * (r + g + b) + boost * c` where the luminance weights are
/// `0.3086`, `0.6094` and `0.0820` scaled by `1 - boost`; green carries an extra
/// `0.05`. Alpha is left untouched and black stays black.
#[must_use]
pub fn enhance_saturation(image: &PixelBuffer, boost: f32) -> PixelBuffer {
    let boost = if boost.is_nan() {
        DEFAULT_SATURATION_BOOST
    } else {
        boost.clamp(1.0, 1.5)
    };
    let lum_r = 0.3086 * (1.0 - boost);
    let lum_g = 0.6094 * (1.0 - boost) + 0.05;
    let lum_b = 0.0820 * (1.0 - boost);

    let mut output = image.clone();
    let channels = output.channels();

    parallel::for_each_row_mut(&mut output, None, |_, row| {
        for pixel in row.chunks_exact_mut(channels) {
            let r = f32::from(pixel[0]);
            let g = f32::from(pixel[1]);
            let b = f32::from(pixel[2]);
            let total = r + g + b;

            pixel[0] = to_channel(lum_r * total + boost * r);
            pixel[1] = to_channel(lum_g * total + boost * g);
            pixel[2] = to_channel(lum_b * total + boost * b);
        }
    });

    output
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
