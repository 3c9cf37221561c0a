//! Single-slot cache for the loaded source image and its inference output
//!
//! The image and the tensor are stored together and cleared together, so the
//! cache is either empty or holds a complete entry.

use ndarray::Array4;
use std::sync::Arc;

use crate::error::{GlazierError, Result};
use crate::types::{ImageSize, PixelBuffer};

/// Source image paired with the model output computed from it
#[derive(Debug, Clone)]
pub struct CacheEntry {
    image: Arc<PixelBuffer>,
    tensor: Arc<Array4<f32>>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(image: PixelBuffer, tensor: Array4<f32>) -> Self {
        Self {
            image: Arc::new(image),
            tensor: Arc::new(tensor),
        }
    }

    /// Shared handle to the cached source image
    #[must_use]
    pub fn image(&self) -> &Arc<PixelBuffer> {
        &self.image
    }

    /// Shared handle to the cached output tensor
    #[must_use]
    pub fn tensor(&self) -> &Arc<Array4<f32>> {
        &self.tensor
    }
}

/// Holds at most one [`CacheEntry`]
#[derive(Debug, Default)]
pub struct SourceCache {
    entry: Option<CacheEntry>,
}

impl SourceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached entry
    pub fn store(&mut self, image: PixelBuffer, tensor: Array4<f32>) {
        self.entry = Some(CacheEntry::new(image, tensor));
    }

    /// Current entry, if anything is loaded
    #[must_use]
    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    /// Current entry or the not-loaded error
    ///
    /// # Errors
    /// - The cache is empty
    pub fn require(&self) -> Result<&CacheEntry> {
        self.entry.as_ref().ok_or(GlazierError::CacheNotLoaded)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.entry.is_some()
    }

    /// Size of the cached source image
    #[must_use]
    pub fn image_size(&self) -> Option<ImageSize> {
        self.entry.as_ref().map(|entry| entry.image.size())
    }

    /// Independent copy of the cached source image
    ///
    /// # Errors
    /// - The cache is empty
    /// - Memory for the copy could not be reserved
    pub fn cloned_image(&self) -> Result<PixelBuffer> {
        let entry = self.require()?;
        entry
            .image
            .try_clone()
            .map_err(|source| GlazierError::CacheClone { source })
    }

    /// Drop the cached entry; calling this on an empty cache is a no-op
    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CACHE_NOT_LOADED_MESSAGE;
    use crate::types::PixelLayout;

    fn entry_parts() -> (PixelBuffer, Array4<f32>) {
        (
            PixelBuffer::filled(4, 3, PixelLayout::Rgb8, [1, 2, 3, 255]),
            Array4::zeros((1, 1, 2, 2)),
        )
    }

    #[test]
    fn test_empty_cache_reports_literal_message() {
        let cache = SourceCache::new();
        assert!(!cache.is_loaded());
        assert_eq!(cache.image_size(), None);

        let err = cache.cloned_image().unwrap_err();
        assert_eq!(err.to_string(), CACHE_NOT_LOADED_MESSAGE);
    }

    #[test]
    fn test_store_and_clone() {
        let mut cache = SourceCache::new();
        let (image, tensor) = entry_parts();
        cache.store(image.clone(), tensor);

        assert!(cache.is_loaded());
        assert_eq!(cache.image_size(), Some(ImageSize::new(4, 3)));

        let mut copy = cache.cloned_image().unwrap();
        assert_eq!(copy, image);

        // Mutating the copy leaves the cached image untouched
        copy.pixel_mut(0, 0).copy_from_slice(&[9, 9, 9]);
        assert_eq!(cache.cloned_image().unwrap().pixel(0, 0), &[1, 2, 3]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut cache = SourceCache::new();
        let (image, tensor) = entry_parts();
        cache.store(image, tensor);

        cache.clear();
        assert!(!cache.is_loaded());
        assert!(cache.require().is_err());

        cache.clear();
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_store_replaces_both_halves() {
        let mut cache = SourceCache::new();
        let (image, tensor) = entry_parts();
        cache.store(image, tensor);
        cache.store(
            PixelBuffer::new(8, 8, PixelLayout::Rgb8),
            Array4::zeros((1, 1, 5, 5)),
        );

        let entry = cache.require().unwrap();
        assert_eq!(entry.image().size(), ImageSize::new(8, 8));
        assert_eq!(entry.tensor().shape(), &[1, 1, 5, 5]);
    }
}
