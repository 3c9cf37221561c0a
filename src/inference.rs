//! Inference backend abstraction

use ndarray::Array4;

use crate::error::Result;

/// A segmentation model runtime
///
/// Backends are built from a model file and discover the model's first
/// declared input and output names at construction. `infer` takes a
/// `[1, 3, H, W]` tensor with values in `[0, 1]` and returns the model's
/// `[1, C, H, W]` probability output.
pub trait InferenceBackend: Send {
    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - The runtime rejected the input
    /// - The output could not be extracted as a 4D `f32` tensor
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Name of the model input the tensor is bound to
    fn input_name(&self) -> &str;

    /// Name of the model output that is read back
    fn output_name(&self) -> &str;

    /// Short runtime identifier used in logs
    fn backend_name(&self) -> &'static str;
}
