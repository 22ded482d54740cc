//! Test doubles and signal helpers.

use ndarray::{s, Array3, ArrayView3};
use realfft::RealFftPlanner;
use stemsplit_ai::catalog::{ModelDescriptor, StemKind};
use stemsplit_ai::{AiError, AiResult, SeparationModel};
use stemsplit_core::{StereoBuffer, SAMPLE_RATE};

/// Keeps only the frequencies in `low_hz..high_hz` of each chunk.
///
/// A brick-wall FFT mask over the whole chunk: crude, but it separates
/// well-spaced tones the way a trained network would.
pub struct BandMask {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl SeparationModel for BandMask {
    fn run(&self, chunks: ArrayView3<'_, f32>) -> AiResult<Array3<f32>> {
        let (batch, channels, len) = chunks.dim();
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let bin_hz = SAMPLE_RATE as f32 / len as f32;
        let fail = |e: realfft::FftError| AiError::InferenceFailed {
            model: "BandMask".into(),
            reason: e.to_string(),
        };

        let mut out = Array3::<f32>::zeros((batch, channels, len));
        let mut spectrum = forward.make_output_vec();
        for b in 0..batch {
            for c in 0..channels {
                let mut samples = chunks.slice(s![b, c, ..]).to_vec();
                forward.process(&mut samples, &mut spectrum).map_err(fail)?;
                for (k, bin) in spectrum.iter_mut().enumerate() {
                    let freq = k as f32 * bin_hz;
                    if freq < self.low_hz || freq >= self.high_hz {
                        *bin = realfft::num_complex::Complex::new(0.0, 0.0);
                    }
                }
                // Imaginary parts at DC and Nyquist must be zero for the inverse.
                spectrum[0].im = 0.0;
                if let Some(last) = spectrum.last_mut() {
                    last.im = 0.0;
                }
                let mut restored = inverse.make_output_vec();
                inverse.process(&mut spectrum, &mut restored).map_err(fail)?;
                let scale = 1.0 / len as f32;
                for (dst, src) in out.slice_mut(s![b, c, ..]).iter_mut().zip(restored) {
                    *dst = src * scale;
                }
            }
        }
        Ok(out)
    }
}

/// Small MDX-shaped descriptor: 1024-point transform, 32-frame chunks.
pub fn small_descriptor(name: &str, stem: StemKind, cutoff: u32) -> ModelDescriptor {
    ModelDescriptor {
        name: name.into(),
        repo_file: format!("{name}.onnx"),
        stem,
        cutoff,
        n_fft: 1024,
        dim_f: 512,
        dim_t: 5,
        compensation: 1.0,
    }
}

/// Stereo sine, identical on both channels.
pub fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin() * amplitude
        })
        .collect()
}

pub fn stereo(samples: Vec<f32>) -> StereoBuffer {
    let len = samples.len();
    StereoBuffer::from_channels(samples.clone(), samples, SAMPLE_RATE)
        .unwrap_or_else(|_| StereoBuffer::silence(len, SAMPLE_RATE))
}

/// Pearson correlation of two equally long signals.
pub fn correlation(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean = |x: &[f32]| x[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let da = a[i] as f64 - ma;
        let db = b[i] as f64 - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    if va == 0.0 || vb == 0.0 {
        return 0.0;
    }
    cov / (va.sqrt() * vb.sqrt())
}

/// Largest absolute difference over `range`.
pub fn max_error(a: &StereoBuffer, b: &StereoBuffer, range: std::ops::Range<usize>) -> f32 {
    let a = a.slice(range.start, range.end);
    let b = b.slice(range.start, range.end);
    a.data()
        .iter()
        .zip(b.data().iter())
        .fold(0.0f32, |m, (x, y)| m.max((x - y).abs()))
}
