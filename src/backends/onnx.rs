//! ONNX Runtime backend
//!
//! Runs the segmentation model through ONNX Runtime with a configurable
//! execution provider (CPU, CUDA, `CoreML`) and thread counts.

use instant::Instant;
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::config::{ExecutionProvider, RemoverConfig};
use crate::error::{GlazierError, Result};
use crate::inference::InferenceBackend;

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability and a description
    ///
    /// # Examples
    /// ```rust
    /// use glazier_bgremove::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{name}: {available} - {description}");
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!(
            "Checking execution providers on {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                Self::cuda_available(),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                Self::coreml_available(),
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Load the model at `model_path` into a new session
    ///
    /// The first declared input and output of the model are used for
    /// inference.
    ///
    /// # Errors
    /// - The model file does not exist
    /// - ONNX Runtime failed to build the session
    /// - The model declares no inputs or no outputs
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

        let builder = Session::builder()
            .map_err(|e| GlazierError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                GlazierError::inference(format!("Failed to set optimization level: {e}"))
            })?;
        let builder = Self::configure_providers(builder, config.execution_provider)?;

        let (intra_threads, inter_threads) = Self::thread_counts(config);
        let session = builder
            .with_intra_threads(intra_threads)
            .map_err(|e| GlazierError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| GlazierError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                GlazierError::model_error_with_context(
                    "load",
                    model_path,
                    &e.to_string(),
                    &["ensure the file is a valid ONNX model"],
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| GlazierError::model("Model declares no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| GlazierError::model("Model declares no outputs"))?;

        log::debug!(
            "ONNX session: provider {}, {} intra-op / {} inter-op threads, input '{}', output '{}'",
            config.execution_provider,
            intra_threads,
            inter_threads,
            input_name,
            output_name
        );
        log::info!(
            "Model loaded in {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }

    fn cuda_available() -> bool {
        OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
    }

    fn coreml_available() -> bool {
        OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
    }

    fn configure_providers(
        builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let mut providers: Vec<ExecutionProviderDispatch> = Vec::new();

        match provider {
            ExecutionProvider::Auto => {
                if Self::cuda_available() {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if Self::coreml_available() {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::warn!("No hardware acceleration available, falling back to CPU");
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
            },
            ExecutionProvider::Cuda => {
                if Self::cuda_available() {
                    log::info!("Using CUDA execution provider");
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if Self::coreml_available() {
                    log::info!("Using CoreML execution provider");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }

        if providers.is_empty() {
            return Ok(builder);
        }
        builder.with_execution_providers(providers).map_err(|e| {
            GlazierError::inference(format!("Failed to set {provider} execution provider: {e}"))
        })
    }

    /// Resolve `0 = auto` thread counts
    fn thread_counts(config: &RemoverConfig) -> (usize, usize) {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);

        let intra = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };
        (intra, inter)
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Tensor::from_array(input.clone()).map_err(|e| {
            GlazierError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        let session = &mut self.session;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| GlazierError::inference(format!("ONNX inference failed: {e}")))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| {
                GlazierError::inference(format!("Output tensor '{}' not found", self.output_name))
            })?
            .try_extract_array::<f32>()
            .map_err(|e| GlazierError::inference(format!("Failed to extract output tensor: {e}")))?;

        let dimensions = output.ndim();
        let result = output
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|_| {
                GlazierError::invalid_tensor(format!(
                    "Expected 4D output tensor, got {dimensions}D"
                ))
            })?;

        log::debug!(
            "Inference complete: {:.2}ms, output shape {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            result.dim()
        );
        Ok(result)
    }

    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn backend_name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_provider_is_always_listed_as_available() {
        let providers = OnnxBackend::list_providers();
        assert_eq!(providers.len(), 3);
        assert_eq!(providers[0].0, "CPU");
        assert!(providers[0].1);
    }

    #[test]
    fn test_missing_model_is_reported_before_session_creation() {
        let err = OnnxBackend::new("/no/such/model.onnx", &RemoverConfig::default()).unwrap_err();
        assert!(matches!(err, GlazierError::Model(_)));
        assert!(err.to_string().contains("/no/such/model.onnx"));
    }

    #[test]
    fn test_explicit_thread_counts_win() {
        let config = RemoverConfig::builder()
            .intra_threads(3)
            .inter_threads(2)
            .build()
            .unwrap();
        assert_eq!(OnnxBackend::thread_counts(&config), (3, 2));

        let (intra, inter) = OnnxBackend::thread_counts(&RemoverConfig::default());
        assert!(intra >= 1);
        assert!(inter >= 1);
    }
}
