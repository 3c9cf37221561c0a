//! Image ⇄ tensor bridge and resampling helpers
//!
//! Tensors are NCHW `f32` with channel values in `[0, 1]` and no mean/std
//! normalization, matching what the segmentation model was trained on.

use image::imageops::{self, FilterType};
use ndarray::Array4;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{GlazierError, Result};
use crate::parallel;
use crate::types::{ImageSize, PixelBuffer, PixelLayout};

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Downsample (or stretch) `image` to exactly `size` with a triangle filter
    ///
    /// # Errors
    /// - `size` has a zero dimension
    pub fn resize_to(image: &PixelBuffer, size: ImageSize) -> Result<PixelBuffer> {
        Self::resample(image, size, FilterType::Triangle)
    }

    /// Convert an image of at least `model_size` into a `[1, 3, H, W]` tensor
    ///
    /// The top-left `model_size` region is read. Rows are written in parallel and
    /// the token is polled per row; once it fires the remaining rows stay zero and
    /// the partially filled tensor is returned.
    ///
    /// # Errors
    /// - `model_size` has a zero dimension
    /// - `image` is smaller than `model_size`
    pub fn image_to_tensor(
        image: &PixelBuffer,
        model_size: ImageSize,
        token: Option<&CancellationToken>,
    ) -> Result<Array4<f32>> {
        if model_size.is_empty() {
            return Err(GlazierError::invalid_parameter(format!(
                "Model input size must be positive, got {model_size}"
            )));
        }
        if image.width() < model_size.width || image.height() < model_size.height {
            return Err(GlazierError::invalid_parameter(format!(
                "Image of {} cannot fill a model input of {}",
                image.size(),
                model_size
            )));
        }

        let width = model_size.width as usize;
        let height = model_size.height as usize;
        let plane = width * height;
        let channels = image.channels();

        let mut tensor = Array4::<f32>::zeros((1, 3, height, width));
        let data = tensor.as_slice_mut().ok_or_else(|| {
            GlazierError::internal("Freshly allocated tensor is not contiguous")
        })?;
        let (red, rest) = data.split_at_mut(plane);
        let (green, blue) = rest.split_at_mut(plane);

        let rows = red
            .par_chunks_mut(width)
            .zip(green.par_chunks_mut(width))
            .zip(blue.par_chunks_mut(width))
            .enumerate();

        let completed = parallel::for_each_cancellable(rows, token, |(y, ((r, g), b))| {
            let source = image.row(y as u32);
            for (x, pixel) in source.chunks_exact(channels).take(width).enumerate() {
                r[x] = f32::from(pixel[0]) / 255.0;
                g[x] = f32::from(pixel[1]) / 255.0;
                b[x] = f32::from(pixel[2]) / 255.0;
            }
        });

        if completed {
            trace!(size = %model_size, "Converted image to tensor");
        } else {
            debug!(size = %model_size, "Tensor conversion cancelled");
        }

        Ok(tensor)
    }

    /// Resize to the model input size, then convert to a tensor
    ///
    /// # Errors
    /// - `model_size` has a zero dimension
    pub fn prepare_model_input(
        image: &PixelBuffer,
        model_size: ImageSize,
        token: Option<&CancellationToken>,
    ) -> Result<Array4<f32>> {
        let resized = Self::resize_to(image, model_size)?;
        Self::image_to_tensor(&resized, model_size, token)
    }

    fn resample(image: &PixelBuffer, size: ImageSize, filter: FilterType) -> Result<PixelBuffer> {
        if size.is_empty() {
            return Err(GlazierError::invalid_parameter(format!(
                "Cannot resample to an empty size {size}"
            )));
        }
        if image.size() == size {
            return Ok(image.clone());
        }

        let source = image.to_dynamic_image();
        let resized = match image.layout() {
            PixelLayout::Rgb8 => PixelBuffer::from_rgb_image(imageops::resize(
                &source.into_rgb8(),
                size.width,
                size.height,
                filter,
            )),
            PixelLayout::Rgba8 => PixelBuffer::from_rgba_image(imageops::resize(
                &source.into_rgba8(),
                size.width,
                size.height,
                filter,
            )),
        };
        Ok(resized)
    }
}

/// Resample `image` to exactly `size` with a high-quality Catmull-Rom filter
///
/// # Errors
/// - `size` has a zero dimension
pub fn upscale_image(image: &PixelBuffer, size: ImageSize) -> Result<PixelBuffer> {
    ImagePreprocessor::resample(image, size, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut image = PixelBuffer::new(width, height, PixelLayout::Rgb8);
        for y in 0..height {
            for x in 0..width {
                image
                    .pixel_mut(x, y)
                    .copy_from_slice(&[(x * 10) as u8, (y * 10) as u8, 255]);
            }
        }
        image
    }

    #[test]
    fn test_tensor_shape_and_channel_order() {
        let image = gradient(8, 6);
        let tensor =
            ImagePreprocessor::image_to_tensor(&image, ImageSize::new(8, 6), None).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 6, 8]);
        assert!((tensor[[0, 0, 2, 5]] - 50.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 2, 5]] - 20.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 2, 5]] - 1.0).abs() < 1e-6);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_tensor_reads_rgba_and_padded_rows() {
        let mut image = PixelBuffer::with_stride(4, 4, PixelLayout::Rgba8, 20).unwrap();
        image.pixel_mut(3, 3).copy_from_slice(&[255, 0, 51, 0]);

        let tensor =
            ImagePreprocessor::image_to_tensor(&image, ImageSize::new(4, 4), None).unwrap();

        assert!((tensor[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 3, 3]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_pre_cancelled_conversion_leaves_tensor_empty() {
        let token = CancellationToken::new();
        token.cancel();
        let image = PixelBuffer::filled(16, 16, PixelLayout::Rgb8, [255, 255, 255, 255]);

        let tensor =
            ImagePreprocessor::image_to_tensor(&image, ImageSize::new(16, 16), Some(&token))
                .unwrap();

        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tensor_rejects_undersized_image() {
        let image = gradient(4, 4);
        assert!(ImagePreprocessor::image_to_tensor(&image, ImageSize::new(8, 8), None).is_err());
        assert!(ImagePreprocessor::image_to_tensor(&image, ImageSize::new(0, 4), None).is_err());
    }

    #[test]
    fn test_prepare_model_input_resizes_first() {
        let image = gradient(25, 13);
        let tensor =
            ImagePreprocessor::prepare_model_input(&image, ImageSize::new(10, 10), None).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 10, 10]);
    }

    #[test]
    fn test_upscale_returns_exact_size() {
        let mask = PixelBuffer::filled(320, 320, PixelLayout::Rgb8, [255, 255, 255, 255]);
        for size in [
            ImageSize::new(1000, 750),
            ImageSize::new(321, 3),
            ImageSize::new(1, 1),
            ImageSize::new(320, 320),
        ] {
            let upscaled = upscale_image(&mask, size).unwrap();
            assert_eq!(upscaled.size(), size);
            assert_eq!(upscaled.layout(), PixelLayout::Rgb8);
        }
    }

    #[test]
    fn test_upscale_rejects_zero_size() {
        let mask = PixelBuffer::new(10, 10, PixelLayout::Rgb8);
        assert!(matches!(
            upscale_image(&mask, ImageSize::new(0, 10)),
            Err(GlazierError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_upscale_keeps_uniform_values() {
        let mask = PixelBuffer::filled(10, 10, PixelLayout::Rgba8, [255, 255, 255, 255]);
        let upscaled = upscale_image(&mask, ImageSize::new(37, 23)).unwrap();
        assert_eq!(upscaled.pixel(18, 11), &[255, 255, 255, 255]);
    }
}
