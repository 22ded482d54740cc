//! ONNX Runtime session wrapper.
//!
//! Runs a four-dimensional float tensor through a model with a single input
//! named `input`. Gated behind the `onnx` feature flag.

#[cfg(feature = "onnx")]
use crate::error::{onnx_error, AiError, AiResult};
#[cfg(feature = "onnx")]
use ndarray::Array4;
#[cfg(feature = "onnx")]
use parking_lot::Mutex;
#[cfg(feature = "onnx")]
use std::path::Path;
#[cfg(feature = "onnx")]
use tracing::info;

/// A loaded ONNX model session.
///
/// `Session::run` needs exclusive access, so the session sits behind a lock;
/// chunk batches are dispatched one at a time anyway.
#[cfg(feature = "onnx")]
pub struct OnnxSession {
    session: Mutex<ort::session::Session>,
    name: String,
}

#[cfg(feature = "onnx")]
impl OnnxSession {
    /// Load an ONNX model from a file path.
    pub fn load(model_path: &Path, name: &str) -> AiResult<Self> {
        info!(model = %name, path = %model_path.display(), "Loading ONNX session");

        let session = ort::session::Session::builder()
            .map_err(onnx_error)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(onnx_error)?
            .commit_from_file(model_path)
            .map_err(onnx_error)?;

        info!(model = %name, "ONNX session loaded successfully");
        Ok(Self {
            session: Mutex::new(session),
            name: name.to_string(),
        })
    }

    /// Run `input` and return the first output, which must be 4-D.
    pub fn run(&self, input: &Array4<f32>) -> AiResult<Array4<f32>> {
        let shape = input.shape();
        let dims = [shape[0], shape[1], shape[2], shape[3]];
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = ort::value::Tensor::from_array((dims, data)).map_err(onnx_error)?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs!["input" => tensor])
            .map_err(|e| AiError::InferenceFailed {
                model: self.name.clone(),
                reason: e.to_string(),
            })?;
        let (out_shape, out_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(onnx_error)?;

        let out_dims: Vec<usize> = out_shape.iter().map(|&d| d.max(0) as usize).collect();
        if out_dims.len() != 4 {
            return Err(AiError::MalformedOutput {
                expected: dims.to_vec(),
                actual: out_dims,
            });
        }
        Array4::from_shape_vec(
            (out_dims[0], out_dims[1], out_dims[2], out_dims[3]),
            out_data.to_vec(),
        )
        .map_err(|e| AiError::PreprocessError(format!("output tensor: {e}")))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
