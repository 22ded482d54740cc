//! MDX-Net model adapter.
//!
//! MDX networks take spectrograms, not waveforms: each stereo chunk becomes a
//! `[4, dim_f, frames]` block (left real, left imaginary, right real, right
//! imaginary) of a centred, reflect-padded Hann STFT cut to the first `dim_f`
//! bins. The network answers in the same layout and the inverse transform
//! brings it back to samples.
//!
//! Packing is plain DSP and always compiled; the runtime-backed model needs
//! the `onnx` feature.

use crate::catalog::ModelDescriptor;
use crate::error::{AiError, AiResult};
use ndarray::{s, Array2, Array3, Array4, ArrayView3, ArrayView4};
use num_complex::Complex32;
use stemsplit_core::CHANNELS;
use stemsplit_dsp::{PadMode, Stft};

#[cfg(feature = "onnx")]
use crate::backend::{ModelLoader, SeparationModel};
#[cfg(feature = "onnx")]
use crate::model_manager::ModelStore;
#[cfg(feature = "onnx")]
use crate::session::OnnxSession;
#[cfg(feature = "onnx")]
use std::sync::Arc;
#[cfg(feature = "onnx")]
use tracing::debug;

/// Spectrogram layout of one MDX model.
#[derive(Debug)]
pub struct MdxSpectrogram {
    stft: Stft,
    dim_f: usize,
    frames: usize,
    chunk_size: usize,
}

impl MdxSpectrogram {
    pub fn new(descriptor: &ModelDescriptor) -> AiResult<Self> {
        let stft = Stft::new(descriptor.n_fft, descriptor.hop(), PadMode::Reflect)?;
        if descriptor.dim_f > stft.bins() {
            return Err(AiError::PreprocessError(format!(
                "{}: dim_f {} exceeds {} bins",
                descriptor.name,
                descriptor.dim_f,
                stft.bins()
            )));
        }
        Ok(Self {
            stft,
            dim_f: descriptor.dim_f,
            frames: descriptor.frames(),
            chunk_size: descriptor.chunk_size(),
        })
    }

    /// Network input shape for a batch of `batch` chunks.
    pub fn input_shape(&self, batch: usize) -> [usize; 4] {
        [batch, 2 * CHANNELS, self.dim_f, self.frames]
    }

    /// `[batch, 2, chunk_size]` waveforms to `[batch, 4, dim_f, frames]`.
    pub fn pack(&self, chunks: ArrayView3<'_, f32>) -> AiResult<Array4<f32>> {
        let (batch, channels, len) = chunks.dim();
        if channels != CHANNELS || len != self.chunk_size {
            return Err(AiError::PreprocessError(format!(
                "expected chunks of [_, {CHANNELS}, {}], got [{batch}, {channels}, {len}]",
                self.chunk_size
            )));
        }

        let mut packed = Array4::<f32>::zeros(self.input_shape(batch));
        for b in 0..batch {
            for c in 0..CHANNELS {
                let samples = chunks.slice(s![b, c, ..]).to_vec();
                let spec = self.stft.forward(&samples)?;
                let spec = spec.slice(s![..self.dim_f, ..self.frames]);
                packed
                    .slice_mut(s![b, 2 * c, .., ..])
                    .assign(&spec.mapv(|z| z.re));
                packed
                    .slice_mut(s![b, 2 * c + 1, .., ..])
                    .assign(&spec.mapv(|z| z.im));
            }
        }
        Ok(packed)
    }

    /// `[batch, 4, dim_f, frames]` spectrograms back to `[batch, 2, chunk_size]`.
    ///
    /// Bins above `dim_f` come back as zero.
    pub fn unpack(&self, spec: ArrayView4<'_, f32>) -> AiResult<Array3<f32>> {
        let batch = spec.shape()[0];
        let expected = self.input_shape(batch);
        if spec.shape() != expected.as_slice() {
            return Err(AiError::MalformedOutput {
                expected: expected.to_vec(),
                actual: spec.shape().to_vec(),
            });
        }

        let mut chunks = Array3::<f32>::zeros((batch, CHANNELS, self.chunk_size));
        for b in 0..batch {
            for c in 0..CHANNELS {
                let mut full = Array2::<Complex32>::zeros((self.stft.bins(), self.frames));
                let re = spec.slice(s![b, 2 * c, .., ..]);
                let im = spec.slice(s![b, 2 * c + 1, .., ..]);
                ndarray::Zip::from(full.slice_mut(s![..self.dim_f, ..]))
                    .and(&re)
                    .and(&im)
                    .for_each(|z, &r, &i| *z = Complex32::new(r, i));

                let wave = self.stft.inverse(full.view())?;
                let take = wave.len().min(self.chunk_size);
                chunks
                    .slice_mut(s![b, c, ..take])
                    .assign(&ndarray::ArrayView1::from(&wave[..take]));
            }
        }
        Ok(chunks)
    }
}

/// An MDX network running on ONNX Runtime.
#[cfg(feature = "onnx")]
pub struct MdxModel {
    session: OnnxSession,
    spectrogram: MdxSpectrogram,
}

#[cfg(feature = "onnx")]
impl MdxModel {
    pub fn new(session: OnnxSession, descriptor: &ModelDescriptor) -> AiResult<Self> {
        Ok(Self {
            session,
            spectrogram: MdxSpectrogram::new(descriptor)?,
        })
    }
}

#[cfg(feature = "onnx")]
impl SeparationModel for MdxModel {
    fn run(&self, chunks: ArrayView3<'_, f32>) -> AiResult<Array3<f32>> {
        let input = self.spectrogram.pack(chunks)?;
        let output = self.session.run(&input)?;
        debug!(model = %self.session.name(), batch = chunks.shape()[0], "batch inferred");
        self.spectrogram.unpack(output.view())
    }
}

/// Loads MDX models from the model store.
#[cfg(feature = "onnx")]
pub struct OnnxModelLoader {
    store: ModelStore,
}

#[cfg(feature = "onnx")]
impl OnnxModelLoader {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }
}

#[cfg(feature = "onnx")]
impl ModelLoader for OnnxModelLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> AiResult<Arc<dyn SeparationModel>> {
        let path = self.store.ensure_model(descriptor)?;
        let session = OnnxSession::load(&path, &descriptor.name)?;
        Ok(Arc::new(MdxModel::new(session, descriptor)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StemKind;

    fn descriptor(dim_f: usize) -> ModelDescriptor {
        ModelDescriptor {
            name: "Tiny".into(),
            repo_file: "tiny.onnx".into(),
            stem: StemKind::Vocals,
            cutoff: 0,
            n_fft: 2048,
            dim_f,
            dim_t: 4,
            compensation: 1.0,
        }
    }

    fn chunks(chunk_size: usize) -> Array3<f32> {
        Array3::from_shape_fn((2, CHANNELS, chunk_size), |(b, c, i)| {
            let freq = 0.01 + 0.005 * (b * CHANNELS + c) as f32;
            (i as f32 * freq).sin() * 0.5
        })
    }

    #[test]
    fn test_pack_shape() {
        let desc = descriptor(512);
        let spec = MdxSpectrogram::new(&desc).unwrap();
        let packed = spec.pack(chunks(desc.chunk_size()).view()).unwrap();
        assert_eq!(packed.shape(), &[2, 4, 512, 16]);
    }

    #[test]
    fn test_full_band_round_trip() {
        let desc = descriptor(1025);
        let spec = MdxSpectrogram::new(&desc).unwrap();
        let input = chunks(desc.chunk_size());
        let output = spec.unpack(spec.pack(input.view()).unwrap().view()).unwrap();
        assert_eq!(output.shape(), input.shape());
        for (a, b) in input.iter().zip(output.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_channels_stay_separate() {
        let desc = descriptor(512);
        let spec = MdxSpectrogram::new(&desc).unwrap();
        let mut input = Array3::<f32>::zeros((1, CHANNELS, desc.chunk_size()));
        for i in 0..desc.chunk_size() {
            input[[0, 1, i]] = (i as f32 * 0.02).sin();
        }
        let packed = spec.pack(input.view()).unwrap();
        assert!(packed.slice(s![0, 0..2, .., ..]).iter().all(|&v| v.abs() < 1e-6));
        assert!(packed.slice(s![0, 2, .., ..]).iter().any(|&v| v.abs() > 1.0));
    }

    #[test]
    fn test_shape_errors() {
        let desc = descriptor(512);
        let spec = MdxSpectrogram::new(&desc).unwrap();
        assert!(spec.pack(Array3::<f32>::zeros((1, 2, 100)).view()).is_err());
        let wrong = Array4::<f32>::zeros((1, 4, 256, 16));
        assert!(matches!(
            spec.unpack(wrong.view()),
            Err(AiError::MalformedOutput { .. })
        ));
        assert!(MdxSpectrogram::new(&descriptor(4096)).is_err());
    }
}
