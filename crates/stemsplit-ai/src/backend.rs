//! Inference seam.
//!
//! The chunk engine only needs "run the network on a batch of fixed-size
//! stereo chunks". Backends implement it; tests plug in mocks.

use crate::catalog::ModelDescriptor;
use crate::error::AiResult;
use ndarray::{Array3, ArrayView3};
use std::sync::Arc;

/// A loaded separation network.
pub trait SeparationModel: Send + Sync {
    /// Run one batch of shape `[batch, 2, chunk_size]` and return the
    /// estimated stem with the same shape.
    fn run(&self, chunks: ArrayView3<'_, f32>) -> AiResult<Array3<f32>>;
}

/// Creates models from catalog rows.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model: &ModelDescriptor) -> AiResult<Arc<dyn SeparationModel>>;
}

/// Model made from a plain function, for mocks.
pub struct FnModel<F>(pub F);

impl<F> SeparationModel for FnModel<F>
where
    F: Fn(ArrayView3<'_, f32>) -> AiResult<Array3<f32>> + Send + Sync,
{
    fn run(&self, chunks: ArrayView3<'_, f32>) -> AiResult<Array3<f32>> {
        (self.0)(chunks)
    }
}

/// Returns its input. Reconstruction tests use it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityModel;

impl SeparationModel for IdentityModel {
    fn run(&self, chunks: ArrayView3<'_, f32>) -> AiResult<Array3<f32>> {
        Ok(chunks.to_owned())
    }
}

/// Loader handing out one shared model for every descriptor.
pub struct StaticLoader {
    model: Arc<dyn SeparationModel>,
}

impl StaticLoader {
    pub fn new(model: Arc<dyn SeparationModel>) -> Self {
        Self { model }
    }
}

impl ModelLoader for StaticLoader {
    fn load(&self, _model: &ModelDescriptor) -> AiResult<Arc<dyn SeparationModel>> {
        Ok(Arc::clone(&self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_identity_returns_input() {
        let chunks = Array3::from_shape_fn((2, 2, 8), |(b, c, i)| (b * 16 + c * 8 + i) as f32);
        let out = IdentityModel.run(chunks.view()).unwrap();
        assert_eq!(out, chunks);
    }

    #[test]
    fn test_function_model() {
        fn halve(chunks: ArrayView3<'_, f32>) -> AiResult<Array3<f32>> {
            Ok(chunks.mapv(|s| s * 0.5))
        }
        let halve = FnModel(halve);
        let chunks = Array3::from_elem((1, 2, 4), 2.0f32);
        let out = halve.run(chunks.view()).unwrap();
        assert!(out.iter().all(|&s| s == 1.0));
    }
}
