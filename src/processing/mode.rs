//! Automatic processing mode selection from image statistics

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::processing::metrics;
use crate::types::{PixelBuffer, ProcessingMode};

/// Raw statistics the detector scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneAnalysis {
    /// Mean of the regional brightness grid
    pub brightness: f32,
    /// Brightness after sensitivity adjustment (informational)
    pub adjusted_brightness: f32,
    /// Fraction of edge pixels under the mode active during analysis
    pub complexity: f32,
    /// Sampled local contrast
    pub contrast: f32,
}

/// Candidate score for each detectable mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeScores {
    pub high_key: f32,
    pub low_light: f32,
    pub portrait: f32,
    pub landscape: f32,
}

impl ModeScores {
    /// Score the four candidate modes
    #[must_use]
    pub fn from_analysis(analysis: &SceneAnalysis) -> Self {
        let b = analysis.brightness;
        let c = analysis.contrast;
        let k = analysis.complexity;

        let mut high_key = b * 0.6 + c * 0.4;
        let mut low_light = (1.0 - b) * 0.7 + k * 0.3;
        let mut portrait = k * 0.8 + (1.0 - c) * 0.2;
        let mut landscape = c * 0.9 + k * 0.1;

        if k < 0.1 {
            portrait += 0.15;
        }
        if c > 0.6 {
            landscape += 0.15;
        }
        if c < 0.25 {
            low_light += 0.1;
        }
        if b > 0.8 && c > 0.3 {
            high_key += 0.1;
        }

        Self {
            high_key,
            low_light,
            portrait,
            landscape,
        }
    }

    /// Highest scoring mode
    ///
    /// Exact ties resolve in the order high-key, low-light, portrait, landscape.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn best(&self) -> ProcessingMode {
        let max = self
            .high_key
            .max(self.low_light)
            .max(self.portrait.max(self.landscape));

        if max == self.high_key {
            ProcessingMode::HighKey
        } else if max == self.low_light {
            ProcessingMode::LowLight
        } else if max == self.portrait {
            ProcessingMode::Portrait
        } else {
            ProcessingMode::Landscape
        }
    }
}

/// Picks a [`ProcessingMode`] from scene statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeDetector;

impl ModeDetector {
    /// Measure the image; complexity and adjusted brightness use `current_mode`
    #[must_use]
    pub fn analyze(image: &PixelBuffer, current_mode: ProcessingMode) -> SceneAnalysis {
        SceneAnalysis {
            brightness: metrics::average_regional_brightness(image),
            adjusted_brightness: metrics::adjust_brightness_sensitivity(image, current_mode),
            complexity: metrics::complexity(image, current_mode),
            contrast: metrics::contrast(image),
        }
    }

    /// Select the best mode for `image`
    #[must_use]
    pub fn detect(image: &PixelBuffer, current_mode: ProcessingMode) -> ProcessingMode {
        let analysis = Self::analyze(image, current_mode);
        let scores = ModeScores::from_analysis(&analysis);
        let mode = scores.best();

        debug!(
            brightness = analysis.brightness,
            adjusted_brightness = analysis.adjusted_brightness,
            complexity = analysis.complexity,
            contrast = analysis.contrast,
            high_key = scores.high_key,
            low_light = scores.low_light,
            portrait = scores.portrait,
            landscape = scores.landscape,
            %mode,
            "Detected processing mode"
        );

        mode
    }
}
