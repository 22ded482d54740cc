//! Chunked inference engine.
//!
//! A waveform is run through the network in two levels: memory-bounded
//! segments, each cut into overlapping model chunks that go out as one batch.
//! Each chunk carries `trim` samples of context on both sides that are
//! thrown away afterwards, so chunk seams only see the model's clean middle.
//! The whole thing is repeated on copies rotated by whole seconds and the
//! rotations are averaged, which spreads whatever seams remain.

use crate::backend::SeparationModel;
use crate::catalog::ModelDescriptor;
use crate::error::{AiError, AiResult};
use crate::progress::{ExtractionProgress, ProgressCallback};
use ndarray::{s, Array2, Array3};
use stemsplit_core::{CancelToken, StereoBuffer, CHANNELS, SAMPLE_RATE};
use tracing::{debug, error};

/// Samples per segment unless configured otherwise.
pub const DEFAULT_SEGMENT_SIZE: usize = 500_000;

/// Shift count actually used for `len` samples at `sample_rate`.
///
/// Clamped to `floor(seconds) - 1` so every rotation is distinct, and never
/// below one.
pub fn effective_shifts(requested: usize, len: usize, sample_rate: u32) -> usize {
    let seconds = len / sample_rate.max(1) as usize;
    requested.min(seconds.saturating_sub(1)).max(1)
}

/// Runs a model over whole waveforms.
#[derive(Clone)]
pub struct Demixer {
    segment_size: usize,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
}

impl Default for Demixer {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE)
    }
}

impl Demixer {
    pub fn new(segment_size: usize) -> Self {
        Self {
            segment_size: segment_size.max(1),
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Separate `mix` with `model`, averaging over `shifts` one-second rotations.
    ///
    /// The output has exactly the length of `mix`.
    pub fn demix(
        &self,
        model: &dyn SeparationModel,
        descriptor: &ModelDescriptor,
        mix: &StereoBuffer,
        shifts: usize,
    ) -> AiResult<StereoBuffer> {
        let len = mix.len();
        if len == 0 {
            return Ok(mix.clone());
        }

        let shifts = effective_shifts(shifts, len, SAMPLE_RATE);
        let segments = len.div_ceil(self.segment_size);
        debug!(model = %descriptor.name, shifts, segments, len, "demix");

        let mut total = Array2::<f32>::zeros((CHANNELS, len));
        for shift in 0..shifts {
            self.cancel.check()?;
            let offset = (shift * SAMPLE_RATE as usize) % len;
            let shifted = mix.rotate_right(offset);

            let mut result = Array2::<f32>::zeros((CHANNELS, len));
            let mut divider = Array2::<f32>::zeros((CHANNELS, len));
            for (segment, start) in (0..len).step_by(self.segment_size).enumerate() {
                self.cancel.check()?;
                let end = (start + self.segment_size).min(len);
                let separated = self.demix_segment(model, descriptor, &shifted.slice(start, end))?;

                let mut acc = result.slice_mut(s![.., start..end]);
                acc += &separated;
                divider
                    .slice_mut(s![.., start..end])
                    .mapv_inplace(|d| d + 1.0);

                self.report(ExtractionProgress {
                    model: descriptor.name.clone(),
                    shift,
                    shifts,
                    segment: segment + 1,
                    segments,
                });
            }

            result.zip_mut_with(&divider, |r, &d| {
                if d > 0.0 {
                    *r /= d;
                }
            });
            let aligned = StereoBuffer::new(result, mix.sample_rate())?.rotate_left(offset);
            total += aligned.data();
        }

        let scale = 1.0 / shifts as f32;
        total.mapv_inplace(|s| s * scale);
        Ok(StereoBuffer::new(total, mix.sample_rate())?)
    }

    /// Run one segment: pad, cut into chunks, infer as one batch, trim and
    /// stitch. Returns a `(2, segment.len())` array.
    pub fn demix_segment(
        &self,
        model: &dyn SeparationModel,
        descriptor: &ModelDescriptor,
        segment: &StereoBuffer,
    ) -> AiResult<Array2<f32>> {
        let n = segment.len();
        let trim = descriptor.trim();
        let chunk_size = descriptor.chunk_size();
        let gen_size = descriptor.gen_size();
        if gen_size == 0 {
            return Err(AiError::PreprocessError(format!(
                "{}: chunk of {chunk_size} samples leaves nothing after trimming {trim}",
                descriptor.name
            )));
        }
        if n == 0 {
            return Ok(Array2::zeros((CHANNELS, 0)));
        }

        let pad = (gen_size - n % gen_size) % gen_size;
        let mut padded = Array2::<f32>::zeros((CHANNELS, n + pad + 2 * trim));
        padded
            .slice_mut(s![.., trim..trim + n])
            .assign(segment.data());

        let count = (n + pad) / gen_size;
        let mut batch = Array3::<f32>::zeros((count, CHANNELS, chunk_size));
        for i in 0..count {
            let start = i * gen_size;
            batch
                .slice_mut(s![i, .., ..])
                .assign(&padded.slice(s![.., start..start + chunk_size]));
        }

        let output = model.run(batch.view()).map_err(|e| {
            error!(model = %descriptor.name, error = %e, "inference failed");
            e
        })?;
        let expected = vec![count, CHANNELS, chunk_size];
        if output.shape() != expected.as_slice() {
            return Err(AiError::MalformedOutput {
                expected,
                actual: output.shape().to_vec(),
            });
        }

        let mut separated = Array2::<f32>::zeros((CHANNELS, n));
        for i in 0..count {
            let start = i * gen_size;
            if start >= n {
                break;
            }
            let take = gen_size.min(n - start);
            separated
                .slice_mut(s![.., start..start + take])
                .assign(&output.slice(s![i, .., trim..trim + take]));
        }
        Ok(separated)
    }

    fn report(&self, progress: ExtractionProgress) {
        if let Some(callback) = &self.progress {
            callback(&progress);
        }
    }
}
