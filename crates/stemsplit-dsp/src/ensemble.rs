//! Combining several estimates of the same stem.

use crate::stft::{PadMode, Stft};
use ndarray::{s, Array2, Zip};
use num_complex::Complex32;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stemsplit_core::{Result, StemSplitError, StereoBuffer, CHANNELS};
use tracing::debug;

/// Frame size of the ensembling transform.
pub const ENSEMBLE_N_FFT: usize = 4096;
/// Hop of the ensembling transform.
pub const ENSEMBLE_HOP: usize = 1024;

/// Policy used to merge estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleAlgorithm {
    /// Sample-wise mean of the waveforms.
    Average,
    /// Per bin, keep the value with the largest magnitude.
    MaxSpec,
    /// Per bin, keep the value with the smallest magnitude.
    MinSpec,
    /// Per bin, take the later value only when magnitudes are exactly equal.
    ///
    /// This is a pointwise equality test, not a mean. It is kept as-is.
    EqualSpec,
}

impl EnsembleAlgorithm {
    fn prefers_new(self, new: f32, current: f32) -> bool {
        match self {
            Self::MaxSpec => new >= current,
            Self::MinSpec => new <= current,
            Self::EqualSpec => new == current,
            Self::Average => false,
        }
    }
}

/// Merge `inputs` with `algorithm`.
///
/// A single input is returned unchanged. The result is as long as the
/// longest input.
pub fn make_ensemble(algorithm: EnsembleAlgorithm, inputs: &[StereoBuffer]) -> Result<StereoBuffer> {
    let Some(first) = inputs.first() else {
        return Err(StemSplitError::InvalidParameter("nothing to ensemble".into()));
    };
    if inputs.len() == 1 {
        return Ok(first.clone());
    }
    let longest = inputs.iter().map(StereoBuffer::len).max().unwrap_or(0);
    debug!(?algorithm, inputs = inputs.len(), longest, "ensembling");

    match algorithm {
        EnsembleAlgorithm::Average => Ok(average(inputs, longest)),
        _ => spectral(algorithm, inputs, longest),
    }
}

fn average(inputs: &[StereoBuffer], longest: usize) -> StereoBuffer {
    let mut sum = Array2::<f32>::zeros((CHANNELS, longest));
    for input in inputs {
        sum += input.matched_len(longest).data();
    }
    let count = inputs.len() as f32;
    let sample_rate = inputs[0].sample_rate();
    let mut out = StereoBuffer::silence(longest, sample_rate);
    out.data_mut().assign(&sum.mapv(|s| s / count));
    out
}

fn spectral(
    algorithm: EnsembleAlgorithm,
    inputs: &[StereoBuffer],
    longest: usize,
) -> Result<StereoBuffer> {
    let stft = Stft::new(ENSEMBLE_N_FFT, ENSEMBLE_HOP, PadMode::Zero)?;

    let channels: Vec<Vec<f32>> = (0..CHANNELS)
        .into_par_iter()
        .map(|c| {
            let mut merged: Option<Array2<Complex32>> = None;
            for input in inputs {
                let spec = stft.forward(&input.channel_to_vec(c))?;
                merged = Some(match merged {
                    None => spec,
                    Some(current) => merge(algorithm, current, spec),
                });
            }
            match merged {
                Some(spec) => stft.inverse(spec.view()),
                None => Ok(Vec::new()),
            }
        })
        .collect::<Result<_>>()?;

    let mut out = StereoBuffer::silence(longest, inputs[0].sample_rate());
    for (c, samples) in channels.iter().enumerate() {
        let n = samples.len().min(longest);
        out.data_mut()
            .slice_mut(s![c, ..n])
            .assign(&ndarray::ArrayView1::from(&samples[..n]));
    }
    Ok(out)
}

fn merge(
    algorithm: EnsembleAlgorithm,
    current: Array2<Complex32>,
    next: Array2<Complex32>,
) -> Array2<Complex32> {
    let frames = current.ncols().min(next.ncols());
    let mut current = current.slice_move(s![.., ..frames]);
    Zip::from(&mut current)
        .and(&next.slice(s![.., ..frames]))
        .for_each(|acc, &candidate| {
            if algorithm.prefers_new(candidate.norm(), acc.norm()) {
                *acc = candidate;
            }
        });
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SR: u32 = 44_100;

    fn sine(freq: f32, amplitude: f32, len: usize) -> StereoBuffer {
        let samples: Vec<f32> = (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect();
        StereoBuffer::from_channels(samples.clone(), samples, SR).unwrap()
    }

    fn max_diff(a: &StereoBuffer, b: &StereoBuffer) -> f32 {
        a.data()
            .iter()
            .zip(b.data().iter())
            .fold(0.0f32, |m, (x, y)| m.max((x - y).abs()))
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(make_ensemble(EnsembleAlgorithm::MaxSpec, &[]).is_err());
    }

    #[test]
    fn test_single_input_is_returned() {
        let a = sine(440.0, 0.5, 1000);
        assert_eq!(make_ensemble(EnsembleAlgorithm::MinSpec, &[a.clone()]).unwrap(), a);
    }

    #[test]
    fn test_average_pads_to_longest() {
        let a = StereoBuffer::from_channels(vec![1.0; 4], vec![1.0; 4], SR).unwrap();
        let b = StereoBuffer::from_channels(vec![1.0; 2], vec![3.0; 2], SR).unwrap();
        let out = make_ensemble(EnsembleAlgorithm::Average, &[a, b]).unwrap();
        assert_eq!(out.channel_to_vec(0), vec![1.0, 1.0, 0.5, 0.5]);
        assert_eq!(out.channel_to_vec(1), vec![2.0, 2.0, 0.5, 0.5]);
    }

    #[test]
    fn test_max_spec_picks_louder_sine() {
        let quiet = sine(440.0, 0.2, 16_384);
        let loud = sine(440.0, 0.8, 16_384);
        let out = make_ensemble(EnsembleAlgorithm::MaxSpec, &[quiet, loud.clone()]).unwrap();
        assert_eq!(out.len(), loud.len());
        assert!(max_diff(&out, &loud) < 1e-3);
    }

    #[test]
    fn test_min_spec_picks_quieter_sine() {
        let quiet = sine(440.0, 0.2, 16_384);
        let loud = sine(440.0, 0.8, 16_384);
        let out = make_ensemble(EnsembleAlgorithm::MinSpec, &[loud, quiet.clone()]).unwrap();
        assert!(max_diff(&out, &quiet) < 1e-3);
    }

    #[test]
    fn test_equal_spec_keeps_accumulator() {
        let a = sine(440.0, 0.2, 8192);
        let b = sine(440.0, 0.8, 8192);
        let out = make_ensemble(EnsembleAlgorithm::EqualSpec, &[a.clone(), b]).unwrap();
        assert!(max_diff(&out, &a) < 1e-3);
    }

    #[test]
    fn test_spectral_output_matches_longest_input() {
        let short = sine(440.0, 0.5, 5000);
        let long = sine(440.0, 0.5, 9000);
        let out = make_ensemble(EnsembleAlgorithm::MaxSpec, &[short, long]).unwrap();
        assert_eq!(out.len(), 9000);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_average_of_copies_is_identity(samples in prop::collection::vec(-1.0f32..1.0, 1..256), copies in 2usize..5) {
            let a = StereoBuffer::from_channels(samples.clone(), samples, SR).unwrap();
            let inputs = vec![a.clone(); copies];
            let out = make_ensemble(EnsembleAlgorithm::Average, &inputs).unwrap();
            prop_assert!(max_diff(&out, &a) < 1e-6);
        }
    }
}
