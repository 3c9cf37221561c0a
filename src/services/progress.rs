//! Progress reporting service
//!
//! Keeps progress reporting out of the pipeline code so that different
//! frontends can render stages their own way.

use instant::Instant;
use std::sync::Arc;

/// Stages of loading a source image and removing its background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Decoding the input image
    ImageLoading,
    /// Resizing and converting the image into a model tensor
    Preprocessing,
    /// Running the segmentation model
    Inference,
    /// Choosing a processing mode from image statistics
    ModeDetection,
    /// Thresholding the cached probabilities into a mask
    MaskGeneration,
    /// Resampling the mask to the source resolution
    MaskUpscaling,
    /// Applying the mask and finishing passes
    Compositing,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Preprocessing => "Preprocessing image",
            ProcessingStage::Inference => "Running segmentation model",
            ProcessingStage::ModeDetection => "Detecting processing mode",
            ProcessingStage::MaskGeneration => "Generating alpha mask",
            ProcessingStage::MaskUpscaling => "Upscaling mask",
            ProcessingStage::Compositing => "Compositing result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Typical progress percentage reached when the stage starts
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::ImageLoading => 5,
            ProcessingStage::Preprocessing => 15,
            ProcessingStage::Inference => 30,
            ProcessingStage::ModeDetection => 60,
            ProcessingStage::MaskGeneration => 70,
            ProcessingStage::MaskUpscaling => 80,
            ProcessingStage::Compositing => 90,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since the tracker started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    /// Create a progress update with a custom description
    #[must_use]
    pub fn with_description(
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Receives stage updates from a [`BackgroundRemover`](crate::BackgroundRemover)
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report that an operation finished after `total_ms` milliseconds
    fn report_completion(&self, total_ms: u64);

    /// Report an error raised during `stage`
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// Progress reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _total_ms: u64) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that writes stages to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// `verbose` adds elapsed times to every line
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, total_ms: u64) {
        log::info!("Completed in {}ms", total_ms);
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }
}

/// Tracks the current stage and elapsed time of one operation
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Report the start of `stage`
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report the start of `stage` with a custom description
    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = Some(stage);
        self.reporter.report_progress(ProgressUpdate::with_description(
            stage,
            description,
            self.start_time,
        ));
    }

    /// Report completion with the elapsed time since the tracker was created
    pub fn report_completion(&mut self) {
        self.report_stage(ProcessingStage::Completed);
        self.reporter.report_completion(self.elapsed_ms());
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::ImageLoading);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        updates: Mutex<Vec<ProgressUpdate>>,
        completions: Mutex<Vec<u64>>,
        errors: Mutex<Vec<(ProcessingStage, String)>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }

        fn report_completion(&self, total_ms: u64) {
            self.completions.lock().unwrap().push(total_ms);
        }

        fn report_error(&self, stage: ProcessingStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_stage_descriptions() {
        assert_eq!(
            ProcessingStage::Inference.description(),
            "Running segmentation model"
        );
        assert_eq!(
            ProcessingStage::Completed.description(),
            "Processing completed"
        );
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            ProcessingStage::ImageLoading,
            ProcessingStage::Preprocessing,
            ProcessingStage::Inference,
            ProcessingStage::ModeDetection,
            ProcessingStage::MaskGeneration,
            ProcessingStage::MaskUpscaling,
            ProcessingStage::Compositing,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_tracker_forwards_stages_and_errors() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut tracker = ProgressTracker::new(reporter.clone());

        tracker.report_stage(ProcessingStage::Preprocessing);
        tracker.report_stage_with_description(ProcessingStage::Inference, "tract".to_string());
        tracker.report_error("boom");
        tracker.report_completion();

        let updates = reporter.updates.lock().unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].stage, ProcessingStage::Preprocessing);
        assert_eq!(updates[1].description, "tract");
        assert_eq!(updates[2].stage, ProcessingStage::Completed);

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors[0], (ProcessingStage::Inference, "boom".to_string()));
        assert_eq!(reporter.completions.lock().unwrap().len(), 1);
        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Completed));
    }

    #[test]
    fn test_error_before_any_stage_uses_first_stage() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = ProgressTracker::new(reporter.clone());
        tracker.report_error("early");

        assert_eq!(
            reporter.errors.lock().unwrap()[0].0,
            ProcessingStage::ImageLoading
        );
    }

    #[test]
    fn test_builtin_reporters_accept_updates() {
        let start = Instant::now();
        for reporter in [
            Arc::new(NoOpProgressReporter) as Arc<dyn ProgressReporter>,
            Arc::new(ConsoleProgressReporter::new(true)),
            Arc::new(ConsoleProgressReporter::new(false)),
        ] {
            reporter.report_progress(ProgressUpdate::new(ProcessingStage::Compositing, start));
            reporter.report_completion(12);
            reporter.report_error(ProcessingStage::Inference, "failure");
        }
    }
}
