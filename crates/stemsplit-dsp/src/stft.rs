//! Centred short-time Fourier transform.

use crate::window::hann;
use ndarray::{Array2, ArrayView2};
use num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;
use stemsplit_core::{Result, StemSplitError};

/// How the signal is extended by `n_fft / 2` on each side before framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    /// Silence. Used by the ensembler.
    Zero,
    /// Mirror without repeating the edge sample. Used by the MDX models.
    Reflect,
}

/// Hann-windowed STFT with centred frames.
///
/// Spectrograms are `(n_fft / 2 + 1, frames)` with `frames = 1 + len / hop`.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    pad_mode: PadMode,
    window: Vec<f32>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .field("pad_mode", &self.pad_mode)
            .finish()
    }
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize, pad_mode: PadMode) -> Result<Self> {
        if n_fft < 2 || n_fft % 2 != 0 || hop == 0 || hop > n_fft {
            return Err(StemSplitError::InvalidParameter(format!(
                "unsupported STFT geometry n_fft={n_fft} hop={hop}"
            )));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        Ok(Self {
            n_fft,
            hop,
            pad_mode,
            window: hann(n_fft, true).into_iter().map(|w| w as f32).collect(),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn frames_for(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    fn padded_sample(&self, signal: &[f32], index: isize) -> f32 {
        let len = signal.len() as isize;
        if (0..len).contains(&index) {
            return signal[index as usize];
        }
        match self.pad_mode {
            PadMode::Zero => 0.0,
            PadMode::Reflect => {
                if len < 2 {
                    return signal.first().copied().unwrap_or(0.0);
                }
                let period = 2 * (len - 1);
                let folded = index.rem_euclid(period);
                let mirrored = if folded < len { folded } else { period - folded };
                signal[mirrored as usize]
            }
        }
    }

    /// Forward transform of one channel.
    pub fn forward(&self, signal: &[f32]) -> Result<Array2<Complex32>> {
        let frames = self.frames_for(signal.len());
        let half = (self.n_fft / 2) as isize;
        let mut spec = Array2::zeros((self.bins(), frames));
        let mut frame = self.forward.make_input_vec();
        let mut bins = self.forward.make_output_vec();

        for t in 0..frames {
            let start = (t * self.hop) as isize - half;
            for (i, (slot, w)) in frame.iter_mut().zip(self.window.iter()).enumerate() {
                *slot = self.padded_sample(signal, start + i as isize) * w;
            }
            self.forward
                .process(&mut frame, &mut bins)
                .map_err(|e| StemSplitError::Internal(format!("forward FFT: {e}")))?;
            spec.column_mut(t)
                .iter_mut()
                .zip(bins.iter())
                .for_each(|(dst, src)| *dst = *src);
        }
        Ok(spec)
    }

    /// Inverse transform with window-sum-square normalization.
    ///
    /// The result has `hop * (frames - 1)` samples; callers pad or truncate to
    /// the length they need.
    pub fn inverse(&self, spec: ArrayView2<'_, Complex32>) -> Result<Vec<f32>> {
        if spec.nrows() != self.bins() {
            return Err(StemSplitError::InvalidParameter(format!(
                "expected {} bins, got {}",
                self.bins(),
                spec.nrows()
            )));
        }
        let frames = spec.ncols();
        if frames == 0 {
            return Ok(Vec::new());
        }
        let full_len = self.n_fft + self.hop * (frames - 1);
        let mut output = vec![0.0f32; full_len];
        let mut norm = vec![0.0f32; full_len];
        let mut bins = self.inverse.make_input_vec();
        let mut frame = self.inverse.make_output_vec();
        let scale = 1.0 / self.n_fft as f32;
        let last = bins.len() - 1;

        for t in 0..frames {
            bins.iter_mut()
                .zip(spec.column(t).iter())
                .for_each(|(dst, src)| *dst = *src);
            bins[0].im = 0.0;
            bins[last].im = 0.0;
            self.inverse
                .process(&mut bins, &mut frame)
                .map_err(|e| StemSplitError::Internal(format!("inverse FFT: {e}")))?;

            let offset = t * self.hop;
            for (i, (&s, &w)) in frame.iter().zip(self.window.iter()).enumerate() {
                output[offset + i] += s * scale * w;
                norm[offset + i] += w * w;
            }
        }

        let half = self.n_fft / 2;
        let len = self.hop * (frames - 1);
        Ok(output[half..half + len]
            .iter()
            .zip(norm[half..half + len].iter())
            .map(|(&s, &n)| if n > 1e-10 { s / n } else { s })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44_100.0;
                0.6 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                    + 0.3 * (2.0 * std::f32::consts::PI * 3000.0 * t).cos()
            })
            .collect()
    }

    #[test]
    fn test_frame_count() {
        let stft = Stft::new(4096, 1024, PadMode::Zero).unwrap();
        let spec = stft.forward(&vec![0.0; 10_000]).unwrap();
        assert_eq!(spec.dim(), (2049, 10));
    }

    #[test]
    fn test_rejects_odd_fft() {
        assert!(Stft::new(1023, 256, PadMode::Zero).is_err());
        assert!(Stft::new(1024, 0, PadMode::Zero).is_err());
    }

    #[test]
    fn test_round_trip_zero_padding() {
        let stft = Stft::new(4096, 1024, PadMode::Zero).unwrap();
        let x = tone(20_480);
        let y = stft.inverse(stft.forward(&x).unwrap().view()).unwrap();
        assert_eq!(y.len(), 20_480);
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_round_trip_reflect_padding() {
        let stft = Stft::new(1024, 256, PadMode::Reflect).unwrap();
        let x = tone(8192);
        let y = stft.inverse(stft.forward(&x).unwrap().view()).unwrap();
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_reflect_index_mirrors_without_edge_repeat() {
        let stft = Stft::new(8, 2, PadMode::Reflect).unwrap();
        let signal = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(stft.padded_sample(&signal, -1), 2.0);
        assert_eq!(stft.padded_sample(&signal, -3), 4.0);
        assert_eq!(stft.padded_sample(&signal, 4), 3.0);
        assert_eq!(stft.padded_sample(&signal, 6), 1.0);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let stft = Stft::new(4096, 1024, PadMode::Zero).unwrap();
        let x: Vec<f32> = (0..16_384)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 4096.0).sin())
            .collect();
        let spec = stft.forward(&x).unwrap();
        let column = spec.column(8);
        let peak = (0..column.len())
            .max_by(|&a, &b| column[a].norm().total_cmp(&column[b].norm()))
            .unwrap();
        assert_eq!(peak, 100);
    }
}
