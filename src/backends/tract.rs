//! Tract backend
//!
//! Pure Rust inference through Tract. The model is optimized for a fixed
//! `[1, 3, H, W]` input so the configured model size must match what the
//! model was exported with.

use instant::Instant;
use ndarray::Array4;
use std::path::Path;
use tract_onnx::prelude::*;

use crate::config::RemoverConfig;
use crate::error::{GlazierError, Result};
use crate::inference::InferenceBackend;

/// Type alias for the optimized runnable Tract model
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running background removal models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
    input_name: String,
    output_name: String,
    input_shape: [usize; 4],
}

impl TractBackend {
    /// Load and optimize the model at `model_path`
    ///
    /// # Errors
    /// - The model file does not exist or is not valid ONNX
    /// - Tract cannot type or optimize the graph for the configured input size
    pub fn new<P: AsRef<Path>>(model_path: P, config: &RemoverConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let load_start = Instant::now();

        if !model_path.exists() {
            return Err(GlazierError::model_error_with_context(
                "load",
                model_path,
                "file does not exist",
                &["check the --model path"],
            ));
        }

        let (width, height) = config.model_size();
        let input_shape = [1, 3, height as usize, width as usize];

        let model = onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                GlazierError::model_error_with_context(
                    "load",
                    model_path,
                    &e.to_string(),
                    &["ensure the file is a valid ONNX model"],
                )
            })?
            .with_input_fact(0, f32::fact(input_shape).into())
            .map_err(|e| GlazierError::model(format!("Failed to set input shape: {e}")))?;

        let input_name = Self::outlet_name(&model, model.input_outlets(), "input")?;
        let output_name = Self::outlet_name(&model, model.output_outlets(), "output")?;

        let model = model
            .into_optimized()
            .map_err(|e| GlazierError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| GlazierError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "Tract backend initialized in {}ms (input '{}' {:?}, output '{}')",
            load_start.elapsed().as_millis(),
            input_name,
            input_shape,
            output_name
        );

        Ok(Self {
            model,
            input_name,
            output_name,
            input_shape,
        })
    }

    /// Tract only runs on the CPU
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    fn outlet_name(
        model: &InferenceModel,
        outlets: TractResult<&[OutletId]>,
        kind: &str,
    ) -> Result<String> {
        let outlets =
            outlets.map_err(|e| GlazierError::model(format!("Failed to read model {kind}s: {e}")))?;
        outlets
            .first()
            .map(|outlet| model.node(outlet.node).name.clone())
            .ok_or_else(|| GlazierError::model(format!("Model declares no {kind}s")))
    }
}

impl InferenceBackend for TractBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if input.shape() != self.input_shape {
            return Err(GlazierError::invalid_tensor(format!(
                "Tract model expects input {:?}, got {:?}",
                self.input_shape,
                input.shape()
            )));
        }

        let inference_start = Instant::now();
        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| GlazierError::internal("Input tensor is not contiguous"))?;
        let input_tensor = Tensor::from_shape(&self.input_shape, data)
            .map_err(|e| GlazierError::inference(format!("Failed to build input tensor: {e}")))?;

        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| GlazierError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| GlazierError::inference("No output tensor found"))?
            .into_arc_tensor();
        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            GlazierError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let shape = output_view.shape().to_vec();
        let &[batch, channels, height, width] = shape.as_slice() else {
            return Err(GlazierError::invalid_tensor(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };
        let values: Vec<f32> = output_view.iter().copied().collect();
        let output = Array4::from_shape_vec((batch, channels, height, width), values).map_err(|e| {
            GlazierError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "Tract inference completed in {}ms, output shape {:?}",
            inference_start.elapsed().as_millis(),
            output.dim()
        );
        Ok(output)
    }

    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn backend_name(&self) -> &'static str {
        "tract"
    }
}
