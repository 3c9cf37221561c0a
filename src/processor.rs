//! Background removal orchestrator
//!
//! [`BackgroundRemover`] owns the inference backend and a single-slot cache of
//! the loaded source image together with the model output computed from it.
//! Loading runs inference once; `remove_background` can then be called any
//! number of times with different tolerances without touching the model.

use image::DynamicImage;
use instant::Instant;
use ndarray::Array4;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, span, Level};

use crate::cache::{CacheEntry, SourceCache};
use crate::compositor::{Compositor, CompositorOptions};
use crate::config::{BackendType, RemoverConfig, EDGE_SMOOTHING_KERNEL_RANGE};
use crate::error::{GlazierError, Result};
use crate::inference::InferenceBackend;
use crate::mask::MaskProcessor;
use crate::parallel::is_cancelled;
use crate::processing::ModeDetector;
use crate::services::{
    ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker,
};
use crate::types::{ImageSize, PixelBuffer, PixelLayout, ProcessingMode};
use crate::utils::{upscale_image, ImagePreprocessor};

/// Inference backend shared with blocking tasks
type SharedBackend = Arc<Mutex<Box<dyn InferenceBackend>>>;

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend of `backend_type` for the model at `model_path`
    ///
    /// # Errors
    /// - The backend was not compiled in
    /// - The model could not be loaded
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_path: &Path,
        config: &RemoverConfig,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// Backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Creates the backends enabled through crate features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_path: &Path,
        config: &RemoverConfig,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new(
                model_path, config,
            )?)),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new(
                model_path, config,
            )?)),
            #[allow(unreachable_patterns)]
            other => {
                let _ = (model_path, config);
                Err(GlazierError::invalid_config(format!(
                    "The {other} backend is not enabled in this build"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        #[allow(unused_mut)]
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Loads a source image once and removes its background on demand
pub struct BackgroundRemover {
    config: RemoverConfig,
    backend: SharedBackend,
    cache: SourceCache,
    mode: ProcessingMode,
    mask: Option<PixelBuffer>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("mode", &self.mode)
            .field("has_mask", &self.mask.is_some())
            .finish_non_exhaustive()
    }
}

impl BackgroundRemover {
    /// Create a remover around an already constructed backend
    ///
    /// # Errors
    /// - The configuration is invalid
    pub fn with_backend(backend: Box<dyn InferenceBackend>, config: RemoverConfig) -> Result<Self> {
        config.validate()?;
        info!(
            backend = backend.backend_name(),
            input = backend.input_name(),
            output = backend.output_name(),
            "Background remover ready"
        );

        Ok(Self {
            config,
            backend: Arc::new(Mutex::new(backend)),
            cache: SourceCache::new(),
            mode: ProcessingMode::None,
            mask: None,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    /// Load the model at `model_path` with the backend named in `config`
    ///
    /// # Errors
    /// - The configuration is invalid
    /// - The backend is not available or the model failed to load
    pub fn from_model_path<P: AsRef<Path>>(model_path: P, config: RemoverConfig) -> Result<Self> {
        Self::with_factory(model_path, config, &DefaultBackendFactory)
    }

    /// Load the model at `model_path` through a custom backend factory
    ///
    /// # Errors
    /// - The configuration is invalid
    /// - The factory failed to create the backend
    pub fn with_factory<P: AsRef<Path>>(
        model_path: P,
        config: RemoverConfig,
        factory: &dyn BackendFactory,
    ) -> Result<Self> {
        config.validate()?;
        let backend = {
            let _span = span!(
                Level::INFO,
                "model_load",
                backend = %config.backend_type,
                model = %model_path.as_ref().display()
            )
            .entered();
            factory.create_backend(config.backend_type, model_path.as_ref(), &config)?
        };
        Self::with_backend(backend, config)
    }

    /// Report stages of later operations to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Decode the image at `path`, run inference on it and cache both
    ///
    /// Any previously cached data is disposed first. On success the detected
    /// processing mode is returned and becomes the current mode. A cancelled
    /// load returns `Ok(None)` and leaves the cache empty.
    ///
    /// # Errors
    /// - The file cannot be decoded
    /// - Inference failed
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_source_image<P: AsRef<Path>>(
        &mut self,
        path: P,
        token: &CancellationToken,
    ) -> Result<Option<ProcessingMode>> {
        self.dispose_cached_data();
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));

        let job = self.load_job();
        let loaded = track_errors(&mut tracker, |tracker| {
            tracker.report_stage(ProcessingStage::ImageLoading);
            let image = ImageIOService::load_image(path.as_ref())?;
            job.run(&image, Some(token), tracker)
        })?;

        Ok(self.finish_load(loaded, &mut tracker))
    }

    /// [`load_source_image`](Self::load_source_image) for an already decoded image
    ///
    /// # Errors
    /// - Inference failed
    #[instrument(skip_all, fields(size = %format!("{}x{}", image.width(), image.height())))]
    pub fn load_image(
        &mut self,
        image: &DynamicImage,
        token: &CancellationToken,
    ) -> Result<Option<ProcessingMode>> {
        self.dispose_cached_data();
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));

        let job = self.load_job();
        let loaded = track_errors(&mut tracker, |tracker| job.run(image, Some(token), tracker))?;

        Ok(self.finish_load(loaded, &mut tracker))
    }

    /// [`load_source_image`](Self::load_source_image) with decoding and
    /// inference on the blocking thread pool
    ///
    /// # Errors
    /// - The file cannot be decoded
    /// - Inference failed
    /// - The blocking task panicked
    pub async fn load_source_image_async(
        &mut self,
        path: PathBuf,
        token: CancellationToken,
    ) -> Result<Option<ProcessingMode>> {
        self.dispose_cached_data();
        let job = self.load_job();
        let reporter = Arc::clone(&self.reporter);

        let (loaded, mut tracker) = tokio::task::spawn_blocking(move || {
            let mut tracker = ProgressTracker::new(reporter);
            let loaded = track_errors(&mut tracker, |tracker| {
                tracker.report_stage(ProcessingStage::ImageLoading);
                let image = ImageIOService::load_image(&path)?;
                job.run(&image, Some(&token), tracker)
            });
            (loaded, tracker)
        })
        .await
        .map_err(|e| GlazierError::internal(format!("Image loading task failed: {e}")))?;

        let loaded = loaded?;
        Ok(self.finish_load(loaded, &mut tracker))
    }

    /// Produce a transparent-background copy of the cached image
    ///
    /// Uses the cached model output, so no inference runs. The upscaled mask
    /// is kept and can be read through [`current_mask`](Self::current_mask).
    /// Returns `Ok(None)` when the token is cancelled at any checkpoint.
    ///
    /// # Errors
    /// - No image is loaded
    /// - The cached tensor does not cover the model size
    #[instrument(skip(self, token), fields(mode = %self.mode))]
    pub fn remove_background(
        &mut self,
        tolerance: i32,
        token: &CancellationToken,
    ) -> Result<Option<PixelBuffer>> {
        if token.is_cancelled() {
            return Ok(None);
        }

        let job = self.removal_job()?;
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));
        let removed = track_errors(&mut tracker, |tracker| job.run(tolerance, Some(token), tracker))?;

        Ok(self.finish_removal(removed))
    }

    /// [`remove_background`](Self::remove_background) on the blocking thread pool
    ///
    /// # Errors
    /// - No image is loaded
    /// - The cached tensor does not cover the model size
    /// - The blocking task panicked
    pub async fn remove_background_async(
        &mut self,
        tolerance: i32,
        token: CancellationToken,
    ) -> Result<Option<PixelBuffer>> {
        if token.is_cancelled() {
            return Ok(None);
        }

        let job = self.removal_job()?;
        let reporter = Arc::clone(&self.reporter);
        let removed = tokio::task::spawn_blocking(move || {
            let mut tracker = ProgressTracker::new(reporter);
            track_errors(&mut tracker, |tracker| job.run(tolerance, Some(&token), tracker))
        })
        .await
        .map_err(|e| GlazierError::internal(format!("Background removal task failed: {e}")))??;

        Ok(self.finish_removal(removed))
    }

    /// Independent copy of the cached source image
    ///
    /// # Errors
    /// - No image is loaded
    /// - Memory for the copy could not be reserved
    pub fn cached_image(&self) -> Result<PixelBuffer> {
        self.cache.cloned_image()
    }

    /// Whether a source image and its model output are cached
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.is_loaded()
    }

    /// Drop the cached image, tensor and mask; safe to call repeatedly
    pub fn dispose_cached_data(&mut self) {
        if self.cache.is_loaded() {
            debug!("Disposing cached source image");
        }
        self.cache.clear();
        self.mask = None;
    }

    /// Mask produced by the last successful `remove_background`
    #[must_use]
    pub fn current_mask(&self) -> Option<&PixelBuffer> {
        self.mask.as_ref()
    }

    #[must_use]
    pub fn processing_mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Override the mode that drives sharpening; the next load replaces it
    pub fn set_processing_mode(&mut self, mode: ProcessingMode) {
        self.mode = mode;
    }

    pub fn set_sharpen_edges(&mut self, enabled: bool) {
        self.config.sharpen_edges = enabled;
    }

    pub fn set_enhance_saturation(&mut self, enabled: bool) {
        self.config.enhance_saturation = enabled;
    }

    /// Kernel size used to pre-smooth masks (0 disables smoothing), clamped to 0-63
    pub fn set_edge_smoothing_kernel_size(&mut self, size: u32) {
        self.config.edge_smoothing_kernel_size = size.min(EDGE_SMOOTHING_KERNEL_RANGE.1);
    }

    #[must_use]
    pub fn config(&self) -> &RemoverConfig {
        &self.config
    }

    fn model_size(&self) -> ImageSize {
        ImageSize::new(self.config.model_width, self.config.model_height)
    }

    fn load_job(&self) -> LoadJob {
        LoadJob {
            backend: Arc::clone(&self.backend),
            model_size: self.model_size(),
            current_mode: self.mode,
        }
    }

    fn removal_job(&self) -> Result<RemovalJob> {
        Ok(RemovalJob {
            entry: self.cache.require()?.clone(),
            model_size: self.model_size(),
            kernel_size: self.config.edge_smoothing_kernel_size,
            options: CompositorOptions::from_config(&self.config, self.mode),
        })
    }

    fn finish_load(
        &mut self,
        loaded: Option<LoadedSource>,
        tracker: &mut ProgressTracker,
    ) -> Option<ProcessingMode> {
        let loaded = loaded?;
        self.cache.store(loaded.image, loaded.tensor);
        self.mode = loaded.mode;
        tracker.report_completion();
        Some(loaded.mode)
    }

    fn finish_removal(&mut self, removed: Option<Removal>) -> Option<PixelBuffer> {
        let removed = removed?;
        self.mask = Some(removed.mask);
        Some(removed.image)
    }
}

/// Run `op`, reporting a returned error against the tracker's current stage
fn track_errors<T>(
    tracker: &mut ProgressTracker,
    op: impl FnOnce(&mut ProgressTracker) -> Result<T>,
) -> Result<T> {
    let result = op(tracker);
    if let Err(e) = &result {
        tracker.report_error(&e.to_string());
    }
    result
}

/// Everything a load needs, detached from the remover so it can move to a blocking task
struct LoadJob {
    backend: SharedBackend,
    model_size: ImageSize,
    current_mode: ProcessingMode,
}

struct LoadedSource {
    image: PixelBuffer,
    tensor: Array4<f32>,
    mode: ProcessingMode,
}

impl LoadJob {
    fn run(
        &self,
        image: &DynamicImage,
        token: Option<&CancellationToken>,
        tracker: &mut ProgressTracker,
    ) -> Result<Option<LoadedSource>> {
        let layout = if image.color().has_alpha() {
            PixelLayout::Rgba8
        } else {
            PixelLayout::Rgb8
        };
        let source = PixelBuffer::from_dynamic_image(image, layout);
        if source.size().is_empty() {
            return Err(GlazierError::invalid_parameter(format!(
                "Source image {} has no pixels",
                source.size()
            )));
        }

        tracker.report_stage(ProcessingStage::Preprocessing);
        let preprocess_start = Instant::now();
        let input = {
            let _span = span!(Level::DEBUG, "preprocessing", source = %source.size(), model = %self.model_size)
                .entered();
            ImagePreprocessor::prepare_model_input(&source, self.model_size, token)?
        };
        debug!(elapsed_ms = preprocess_start.elapsed().as_millis() as u64, "Preprocessed");
        if is_cancelled(token) {
            debug!("Load cancelled after preprocessing");
            return Ok(None);
        }

        tracker.report_stage(ProcessingStage::Inference);
        let inference_start = Instant::now();
        let tensor = {
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| GlazierError::internal("Inference backend lock poisoned"))?;
            let _span = span!(Level::INFO, "inference", backend = backend.backend_name()).entered();
            backend.infer(&input)?
        };
        info!(
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            shape = ?tensor.shape(),
            "Inference complete"
        );
        if is_cancelled(token) {
            debug!("Load cancelled after inference");
            return Ok(None);
        }

        tracker.report_stage(ProcessingStage::ModeDetection);
        let mode = {
            let _span = span!(Level::DEBUG, "mode_detection").entered();
            ModeDetector::detect(&source, self.current_mode)
        };
        info!(%mode, "Detected processing mode");

        Ok(Some(LoadedSource {
            image: source,
            tensor,
            mode,
        }))
    }
}

/// Everything a removal needs, detached from the remover so it can move to a blocking task
struct RemovalJob {
    entry: CacheEntry,
    model_size: ImageSize,
    kernel_size: u32,
    options: CompositorOptions,
}

struct Removal {
    image: PixelBuffer,
    mask: PixelBuffer,
}

impl RemovalJob {
    fn run(
        &self,
        tolerance: i32,
        token: Option<&CancellationToken>,
        tracker: &mut ProgressTracker,
    ) -> Result<Option<Removal>> {
        let source = self.entry.image();
        let total_start = Instant::now();

        tracker.report_stage_with_description(
            ProcessingStage::MaskGeneration,
            format!("Generating mask at tolerance {tolerance}"),
        );
        let mask = MaskProcessor::process_output(
            self.entry.tensor(),
            self.model_size,
            tolerance,
            self.kernel_size,
            token,
        )?;
        if is_cancelled(token) {
            debug!("Removal cancelled after mask generation");
            return Ok(None);
        }

        tracker.report_stage(ProcessingStage::MaskUpscaling);
        let mask = upscale_image(&mask, source.size())?;
        if is_cancelled(token) {
            return Ok(None);
        }

        tracker.report_stage(ProcessingStage::Compositing);
        let image = Compositor::apply_mask(source, &mask, tolerance, &self.options, token)?;
        if is_cancelled(token) {
            debug!("Removal cancelled during compositing");
            return Ok(None);
        }

        tracker.report_completion();
        info!(
            elapsed_ms = total_start.elapsed().as_millis() as u64,
            tolerance,
            "Background removed"
        );
        Ok(Some(Removal { image, mask }))
    }
}
