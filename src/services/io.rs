//! Image I/O operations service
//!
//! Decoding and encoding live here so the pipeline only ever sees
//! [`PixelBuffer`]s.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::OutputFormat;
use crate::error::{GlazierError, Result};
use crate::types::PixelBuffer;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is first guessed from the extension; when that fails the
    /// file contents are sniffed instead.
    ///
    /// # Errors
    /// - The file does not exist or cannot be read
    /// - Neither detection method can decode the data
    ///
    /// # Examples
    /// ```rust,no_run
    /// use glazier_bgremove::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(GlazierError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    GlazierError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    let extension = path_ref
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");

                    GlazierError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed to load image with both extension-based ({extension}) and content-based detection. Extension error: {e}. Content error: {content_err}"
                        ),
                        Some(&format!(
                            "path: {}, size: {} bytes",
                            path_ref.display(),
                            data.len()
                        )),
                    )
                })
            },
        }
    }

    /// Decode an image held in memory
    ///
    /// # Errors
    /// - The bytes are not a supported image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| {
            GlazierError::processing(format!("Failed to decode image from bytes: {e}"))
        })
    }

    /// Encode a pixel buffer, keeping its alpha channel
    ///
    /// # Errors
    /// - The encoder rejected the image
    pub fn encode(buffer: &PixelBuffer, format: OutputFormat) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        buffer
            .to_dynamic_image()
            .write_to(&mut Cursor::new(&mut bytes), Self::image_format(format))
            .map_err(|e| {
                GlazierError::processing_stage_error(
                    "image encoding",
                    &format!("Failed to encode as {}: {e}", Self::format_name(format)),
                    Some(&format!("size: {}", buffer.size())),
                )
            })?;
        Ok(bytes)
    }

    /// Encode a pixel buffer and write it to `path`
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    /// - Encoding failed
    /// - The directory or file could not be written
    pub fn save<P: AsRef<Path>>(buffer: &PixelBuffer, path: P, format: OutputFormat) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GlazierError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let bytes = Self::encode(buffer, format)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| GlazierError::file_io_error("write image", path_ref, &e))?;

        log::debug!(
            "Saved {} {} to {}",
            buffer.size(),
            Self::format_name(format),
            path_ref.display()
        );
        Ok(())
    }

    /// Check whether a path has an extension the decoder is built for
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "tiff" | "tif" | "bmp"
                )
            })
    }

    fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }

    fn format_name(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "PNG",
            OutputFormat::Bmp => "BMP",
        }
    }
}
