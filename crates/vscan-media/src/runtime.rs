//! Model runtime seam.
//!
//! The pipeline hands a CHW `[1, 3, S, S]` tensor to a [`ModelRuntime`] and
//! gets back the flat output buffer. The ONNX Runtime implementation is
//! behind the `onnx` feature.

use crate::error::MediaResult;

/// Executes one forward pass of a detection model.
pub trait ModelRuntime: Send {
    /// Short runtime name, reported in model info.
    fn name(&self) -> &'static str;

    /// Run inference on a CHW tensor of side `input_size`.
    ///
    /// Returns the first output tensor flattened in row-major order.
    fn run(&mut self, chw: Vec<f32>, input_size: u32) -> MediaResult<Vec<f32>>;
}

#[cfg(feature = "onnx")]
pub use onnx::OrtRuntime;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;

    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::{Tensor, Value};
    use tracing::info;

    use super::ModelRuntime;
    use crate::error::{MediaError, MediaResult};

    /// ONNX Runtime session on the CPU execution provider.
    pub struct OrtRuntime {
        session: Session,
        output_name: String,
    }

    impl OrtRuntime {
        /// Load a model file.
        pub fn load(model_path: &Path) -> MediaResult<Self> {
            if !model_path.exists() {
                return Err(MediaError::model_not_found(model_path.display().to_string()));
            }

            let model_bytes = std::fs::read(model_path)?;
            let session = Session::builder()
                .map_err(|e| MediaError::inference_failure(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| MediaError::inference_failure(format!("Failed to set optimization level: {}", e)))?
                .commit_from_memory(&model_bytes)
                .map_err(|e| MediaError::inference_failure(format!("Failed to load ONNX model: {}", e)))?;

            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| MediaError::invalid_output("model declares no outputs"))?;

            info!(model_path = %model_path.display(), output = %output_name, "ONNX session created");
            Ok(Self { session, output_name })
        }
    }

    impl ModelRuntime for OrtRuntime {
        fn name(&self) -> &'static str {
            "onnxruntime"
        }

        fn run(&mut self, chw: Vec<f32>, input_size: u32) -> MediaResult<Vec<f32>> {
            let side = input_size as usize;
            let shape = vec![1usize, 3, side, side];
            let input: Value = Tensor::from_array((shape, chw.into_boxed_slice()))
                .map(Value::from)
                .map_err(|e| MediaError::inference_failure(format!("Failed to create tensor: {}", e)))?;

            let outputs = self
                .session
                .run(ort::inputs![input])
                .map_err(|e| MediaError::inference_failure(format!("ONNX inference failed: {}", e)))?;

            let output = outputs
                .get(self.output_name.as_str())
                .ok_or_else(|| MediaError::invalid_output(format!("Missing {} tensor", self.output_name)))?;

            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| MediaError::invalid_output(format!("Failed to extract tensor: {}", e)))?;

            Ok(data.to_vec())
        }
    }
}
