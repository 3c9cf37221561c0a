//! Core types for background removal operations

use image::{DynamicImage, RgbImage, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;
use std::fmt;
use std::str::FromStr;

use crate::error::{GlazierError, Result};

/// Channel layout of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    /// Three opaque channels in R, G, B order
    Rgb8,
    /// Four channels in R, G, B, A order
    Rgba8,
}

impl PixelLayout {
    /// Number of bytes per pixel
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// Whether the layout carries an alpha channel
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8)
    }
}

/// Width and height of an image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when either dimension is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Coarse scene classification used to pick adaptive thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// No scene-specific tuning
    #[default]
    None,
    /// Preserves facial details, avoids over-sharpening
    Portrait,
    /// Enhances sharpness while keeping natural gradients
    Landscape,
    /// Adjusts edge sensitivity for a dark image
    LowLight,
    /// Adjusts edge sensitivity for a bright image
    HighKey,
}

impl ProcessingMode {
    /// All modes in declaration order
    pub const ALL: [ProcessingMode; 5] = [
        Self::None,
        Self::Portrait,
        Self::Landscape,
        Self::LowLight,
        Self::HighKey,
    ];

    /// Stable lowercase identifier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::LowLight => "low-light",
            Self::HighKey => "high-key",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = GlazierError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized || mode.as_str().replace('-', "") == normalized)
            .ok_or_else(|| {
                GlazierError::invalid_parameter(format!(
                    "Unknown processing mode '{}'. Expected one of: none, portrait, landscape, low-light, high-key",
                    s
                ))
            })
    }
}

/// Stride-aware 8-bit pixel buffer
///
/// Rows may be padded: `stride` is the distance in bytes between the starts of two
/// consecutive rows and is never smaller than `width * channels`.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    stride: usize,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Create a zero-filled buffer with tightly packed rows
    #[must_use]
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        let stride = width as usize * layout.channels();
        Self {
            width,
            height,
            layout,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    /// Create a zero-filled buffer whose rows are `stride` bytes apart
    ///
    /// # Errors
    /// - `stride` is smaller than one row of pixels
    pub fn with_stride(width: u32, height: u32, layout: PixelLayout, stride: usize) -> Result<Self> {
        let row_bytes = width as usize * layout.channels();
        if stride < row_bytes {
            return Err(GlazierError::invalid_parameter(format!(
                "Stride {} is smaller than the row size {} for a {}-pixel-wide {:?} buffer",
                stride, row_bytes, width, layout
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            stride,
            data: vec![0; stride * height as usize],
        })
    }

    /// Wrap existing bytes
    ///
    /// # Errors
    /// - `stride` is smaller than one row of pixels
    /// - `data` does not hold exactly `stride * height` bytes
    pub fn from_raw(
        width: u32,
        height: u32,
        layout: PixelLayout,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        let row_bytes = width as usize * layout.channels();
        if stride < row_bytes {
            return Err(GlazierError::invalid_parameter(format!(
                "Stride {} is smaller than the row size {}",
                stride, row_bytes
            )));
        }
        let expected = stride * height as usize;
        if data.len() != expected {
            return Err(GlazierError::invalid_parameter(format!(
                "Pixel data holds {} bytes, expected {} for {}x{} with stride {}",
                data.len(),
                expected,
                width,
                height,
                stride
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            stride,
            data,
        })
    }

    /// Create a buffer where every pixel has the given color
    ///
    /// Only the first `layout.channels()` components of `rgba` are used.
    #[must_use]
    pub fn filled(width: u32, height: u32, layout: PixelLayout, rgba: [u8; 4]) -> Self {
        let channels = layout.channels();
        let mut buffer = Self::new(width, height, layout);
        let color = rgba.get(..channels).unwrap_or(&rgba[..]);
        for pixel in buffer.data.chunks_exact_mut(channels) {
            pixel.copy_from_slice(color);
        }
        buffer
    }

    /// Copy a decoded image into a buffer with the requested layout
    #[must_use]
    pub fn from_dynamic_image(image: &DynamicImage, layout: PixelLayout) -> Self {
        match layout {
            PixelLayout::Rgb8 => Self::from_rgb_image(image.to_rgb8()),
            PixelLayout::Rgba8 => Self::from_rgba_image(image.to_rgba8()),
        }
    }

    /// Take ownership of an RGB image
    #[must_use]
    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            stride: width as usize * 3,
            data: image.into_raw(),
        }
    }

    /// Take ownership of an RGBA image
    #[must_use]
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgba8,
            stride: width as usize * 4,
            data: image.into_raw(),
        }
    }

    /// Copy the pixels into an `image` crate buffer, dropping row padding
    #[must_use]
    pub fn to_dynamic_image(&self) -> DynamicImage {
        let packed = self.packed_bytes();
        match self.layout {
            PixelLayout::Rgb8 => RgbImage::from_raw(self.width, self.height, packed)
                .map_or_else(|| DynamicImage::new_rgb8(self.width, self.height), DynamicImage::ImageRgb8),
            PixelLayout::Rgba8 => RgbaImage::from_raw(self.width, self.height, packed)
                .map_or_else(|| DynamicImage::new_rgba8(self.width, self.height), DynamicImage::ImageRgba8),
        }
    }

    /// Convert to the given layout; adding an alpha channel makes every pixel opaque
    #[must_use]
    pub fn to_layout(&self, layout: PixelLayout) -> Self {
        if layout == self.layout {
            return self.clone();
        }
        let mut converted = Self::new(self.width, self.height, layout);
        let src_channels = self.channels();
        let dst_channels = converted.channels();
        for y in 0..self.height {
            let src_row = self.row(y);
            let dst_row = converted.row_mut(y);
            for (src, dst) in src_row
                .chunks_exact(src_channels)
                .zip(dst_row.chunks_exact_mut(dst_channels))
            {
                dst[..3].copy_from_slice(&src[..3]);
                if dst_channels == 4 {
                    dst[3] = 255;
                }
            }
        }
        converted
    }

    /// Clone the buffer, reporting allocation failure instead of aborting
    ///
    /// # Errors
    /// - The allocator cannot provide room for a copy of the pixel data
    pub fn try_clone(&self) -> std::result::Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())?;
        data.extend_from_slice(&self.data);
        Ok(Self {
            width: self.width,
            height: self.height,
            layout: self.layout,
            stride: self.stride,
            data,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    #[must_use]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Distance in bytes between the starts of consecutive rows
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes of pixel data in one row, excluding padding
    #[must_use]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Raw bytes including row padding
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes of row `y`, without padding
    ///
    /// # Panics
    /// Panics if `y` is out of bounds
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Mutable pixel bytes of row `y`, without padding
    ///
    /// # Panics
    /// Panics if `y` is out of bounds
    #[allow(clippy::indexing_slicing)]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let row_bytes = self.row_bytes();
        &mut self.data[start..start + row_bytes]
    }

    /// Channel bytes of the pixel at (`x`, `y`)
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.channels();
        let start = y as usize * self.stride + x as usize * channels;
        &self.data[start..start + channels]
    }

    /// Mutable channel bytes of the pixel at (`x`, `y`)
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds
    #[allow(clippy::indexing_slicing)]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let channels = self.channels();
        let start = y as usize * self.stride + x as usize * channels;
        &mut self.data[start..start + channels]
    }

    /// Alpha of the pixel at (`x`, `y`); 255 for layouts without alpha
    #[must_use]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        match self.layout {
            PixelLayout::Rgb8 => 255,
            PixelLayout::Rgba8 => self.pixel(x, y).get(3).copied().unwrap_or(255),
        }
    }

    /// Parallel iterator over `(y, row)` pairs, rows without padding
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &mut [u8])> + '_ {
        let row_bytes = self.row_bytes();
        let stride = self.stride.max(1);
        self.data
            .par_chunks_mut(stride)
            .map(move |row| {
                let end = row_bytes.min(row.len());
                row.get_mut(..end).unwrap_or_default()
            })
            .enumerate()
    }

    /// Pixel bytes with padding removed
    fn packed_bytes(&self) -> Vec<u8> {
        if self.stride == self.row_bytes() {
            return self.data.clone();
        }
        let mut packed = Vec::with_capacity(self.row_bytes() * self.height as usize);
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_stride_addressing() {
        let mut buffer = PixelBuffer::with_stride(3, 2, PixelLayout::Rgb8, 12).unwrap();
        buffer.pixel_mut(2, 1).copy_from_slice(&[10, 20, 30]);

        assert_eq!(buffer.stride(), 12);
        assert_eq!(buffer.row_bytes(), 9);
        assert_eq!(buffer.pixel(2, 1), &[10, 20, 30]);
        assert_eq!(buffer.as_raw()[12 + 6..12 + 9], [10, 20, 30]);
        assert_eq!(buffer.row(1).len(), 9);
    }

    #[test]
    fn test_stride_smaller_than_row_is_rejected() {
        assert!(PixelBuffer::with_stride(4, 4, PixelLayout::Rgba8, 15).is_err());
        assert!(PixelBuffer::from_raw(2, 2, PixelLayout::Rgb8, 6, vec![0; 11]).is_err());
    }

    #[test]
    fn test_alpha_defaults_to_opaque_without_alpha_channel() {
        let rgb = PixelBuffer::filled(2, 2, PixelLayout::Rgb8, [1, 2, 3, 0]);
        let rgba = PixelBuffer::filled(2, 2, PixelLayout::Rgba8, [1, 2, 3, 0]);

        assert_eq!(rgb.alpha(1, 1), 255);
        assert_eq!(rgba.alpha(1, 1), 0);
    }

    #[test]
    fn test_layout_conversion_adds_opaque_alpha() {
        let rgb = PixelBuffer::filled(4, 3, PixelLayout::Rgb8, [9, 8, 7, 0]);
        let rgba = rgb.to_layout(PixelLayout::Rgba8);

        assert_eq!(rgba.layout(), PixelLayout::Rgba8);
        assert_eq!(rgba.pixel(3, 2), &[9, 8, 7, 255]);
        assert_eq!(rgba.to_layout(PixelLayout::Rgb8), rgb);
    }

    #[test]
    fn test_dynamic_image_conversion_drops_padding() {
        let mut buffer = PixelBuffer::with_stride(2, 2, PixelLayout::Rgb8, 8).unwrap();
        buffer.pixel_mut(1, 1).copy_from_slice(&[200, 100, 50]);

        let image = buffer.to_dynamic_image().to_rgb8();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1).0, [200, 100, 50]);
    }

    #[test]
    fn test_par_rows_mut_visits_every_row() {
        let mut buffer = PixelBuffer::with_stride(2, 5, PixelLayout::Rgb8, 7).unwrap();
        buffer.par_rows_mut().for_each(|(y, row)| {
            assert_eq!(row.len(), 6);
            row.fill(y as u8);
        });
        for y in 0..5 {
            assert!(buffer.row(y).iter().all(|&v| v == y as u8));
        }
    }

    #[test]
    fn test_try_clone_matches_original() {
        let buffer = PixelBuffer::filled(8, 8, PixelLayout::Rgba8, [1, 2, 3, 4]);
        assert_eq!(buffer.try_clone().unwrap(), buffer);
    }

    #[test]
    fn test_processing_mode_parsing() {
        assert_eq!("portrait".parse::<ProcessingMode>().unwrap(), ProcessingMode::Portrait);
        assert_eq!("low-light".parse::<ProcessingMode>().unwrap(), ProcessingMode::LowLight);
        assert_eq!("HighKey".parse::<ProcessingMode>().unwrap(), ProcessingMode::HighKey);
        assert_eq!("high_key".parse::<ProcessingMode>().unwrap(), ProcessingMode::HighKey);
        assert!("sunset".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_processing_mode_serde() {
        let json = serde_json::to_string(&ProcessingMode::LowLight).unwrap();
        assert_eq!(json, "\"low-light\"");
        let mode: ProcessingMode = serde_json::from_str("\"high-key\"").unwrap();
        assert_eq!(mode, ProcessingMode::HighKey);
        assert_eq!(ProcessingMode::default(), ProcessingMode::None);
    }
}
