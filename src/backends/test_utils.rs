//! Mock inference backend for unit tests
//!
//! Produces deterministic probability maps shaped after the input tensor so
//! the pipeline can be exercised without a model file.

use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{GlazierError, Result};
use crate::inference::InferenceBackend;

#[derive(Debug, Clone, Copy)]
enum MockOutput {
    /// Same probability everywhere
    Uniform(f32),
    /// `inside` within the centred box covering half of each axis, 0 elsewhere
    CentredBox(f32),
    /// Every call fails
    Failure,
}

/// Deterministic stand-in for a segmentation model
#[derive(Debug, Clone)]
pub struct MockBackend {
    output: MockOutput,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    #[must_use]
    pub fn uniform(probability: f32) -> Self {
        Self::with_output(MockOutput::Uniform(probability))
    }

    /// Foreground probability `inside` in the centre, background elsewhere
    #[must_use]
    pub fn centred_box(inside: f32) -> Self {
        Self::with_output(MockOutput::CentredBox(inside))
    }

    #[must_use]
    pub fn failing() -> Self {
        Self::with_output(MockOutput::Failure)
    }

    fn with_output(output: MockOutput) -> Self {
        Self {
            output,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `infer` calls, usable after the backend is boxed
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InferenceBackend for MockBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (batch, _, height, width) = input.dim();
        match self.output {
            MockOutput::Uniform(value) => Ok(Array4::from_elem((batch, 1, height, width), value)),
            MockOutput::CentredBox(inside) => Ok(Array4::from_shape_fn(
                (batch, 1, height, width),
                |(_, _, y, x)| {
                    let in_rows = y >= height / 4 && y < height - height / 4;
                    let in_cols = x >= width / 4 && x < width - width / 4;
                    if in_rows && in_cols {
                        inside
                    } else {
                        0.0
                    }
                },
            )),
            MockOutput::Failure => Err(GlazierError::inference("Mock inference failure")),
        }
    }

    fn input_name(&self) -> &str {
        "input"
    }

    fn output_name(&self) -> &str {
        "output"
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centred_box_layout() {
        let mut backend = MockBackend::centred_box(0.9);
        let output = backend.infer(&Array4::zeros((1, 3, 8, 8))).unwrap();

        assert!((output[[0, 0, 4, 4]] - 0.9).abs() < f32::EPSILON);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
        assert_eq!(output[[0, 0, 7, 2]], 0.0);
    }

    #[test]
    fn test_counter_survives_boxing() {
        let backend = MockBackend::uniform(1.0);
        let calls = backend.call_counter();
        let mut boxed: Box<dyn InferenceBackend> = Box::new(backend);

        boxed.infer(&Array4::zeros((1, 3, 2, 2))).unwrap();
        boxed.infer(&Array4::zeros((1, 3, 2, 2))).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_backend() {
        let mut backend = MockBackend::failing();
        let err = backend.infer(&Array4::zeros((1, 3, 2, 2))).unwrap_err();
        assert!(matches!(err, GlazierError::Inference(_)));
    }
}
