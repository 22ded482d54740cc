//! Zero-phase FIR band limiting.
//!
//! Final stems are cleaned with a long linear-phase windowed-sinc filter run
//! forward and backward. Running a symmetric kernel twice equals a single
//! convolution with the kernel convolved with itself, centred, so the whole
//! thing is done as one FFT overlap-add pass.

use crate::crossover::FilterKind;
use crate::window::{firwin_highpass, firwin_lowpass, hamming};
use num_complex::Complex;
use realfft::RealFftPlanner;
use stemsplit_core::{Result, StemSplitError, StereoBuffer};

/// Tap count of the band-limiting kernel.
pub const FIR_TAPS: usize = 1001;

/// Full linear convolution of `signal` with `kernel` (length `n + m - 1`).
pub(crate) fn fft_convolve(signal: &[f64], kernel: &[f64]) -> Result<Vec<f64>> {
    if signal.is_empty() || kernel.is_empty() {
        return Ok(Vec::new());
    }
    let out_len = signal.len() + kernel.len() - 1;
    let fft_len = (4 * kernel.len()).next_power_of_two();
    let block = fft_len - kernel.len() + 1;

    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut time = forward.make_input_vec();
    let mut kernel_spectrum = forward.make_output_vec();
    time[..kernel.len()].copy_from_slice(kernel);
    forward
        .process(&mut time, &mut kernel_spectrum)
        .map_err(|e| StemSplitError::Internal(format!("kernel FFT: {e}")))?;

    let mut spectrum = forward.make_output_vec();
    let mut out = vec![0.0; out_len];
    let scale = 1.0 / fft_len as f64;

    for start in (0..signal.len()).step_by(block) {
        let end = (start + block).min(signal.len());
        time.fill(0.0);
        time[..end - start].copy_from_slice(&signal[start..end]);
        forward
            .process(&mut time, &mut spectrum)
            .map_err(|e| StemSplitError::Internal(format!("forward FFT: {e}")))?;
        for (bin, k) in spectrum.iter_mut().zip(kernel_spectrum.iter()) {
            *bin *= k;
        }
        let nyquist = spectrum.len() - 1;
        spectrum[0].im = 0.0;
        spectrum[nyquist] = Complex::new(spectrum[nyquist].re, 0.0);
        inverse
            .process(&mut spectrum, &mut time)
            .map_err(|e| StemSplitError::Internal(format!("inverse FFT: {e}")))?;
        let span = fft_len.min(out_len - start);
        for (o, t) in out[start..start + span].iter_mut().zip(time.iter()) {
            *o += t * scale;
        }
    }
    Ok(out)
}

/// Kernel for one forward-backward pass: `h * h`, odd length, centred.
fn zero_phase_kernel(kind: FilterKind, cutoff: f64) -> Result<Vec<f64>> {
    let window = hamming(FIR_TAPS);
    let taps = match kind {
        FilterKind::Lowpass => firwin_lowpass(cutoff, &window),
        FilterKind::Highpass => firwin_highpass(cutoff, &window),
    };
    fft_convolve(&taps, &taps)
}

fn filter_channel(signal: &[f32], kernel: &[f64]) -> Result<Vec<f32>> {
    let len = signal.len();
    if len < 2 {
        return Ok(signal.to_vec());
    }
    let pad = (3 * FIR_TAPS).min(len - 1);
    let half = kernel.len() / 2;

    // Odd extension, then hold the edge values for the kernel's reach so the
    // filter sees a settled input at both ends.
    let first = 2.0 * signal[0] as f64 - signal[pad] as f64;
    let last = 2.0 * signal[len - 1] as f64 - signal[len - 1 - pad] as f64;
    let mut ext = Vec::with_capacity(len + 2 * (pad + half));
    ext.extend(std::iter::repeat(first).take(half));
    ext.extend((1..=pad).rev().map(|i| 2.0 * signal[0] as f64 - signal[i] as f64));
    ext.extend(signal.iter().map(|&s| s as f64));
    ext.extend((1..=pad).map(|i| 2.0 * signal[len - 1] as f64 - signal[len - 1 - i] as f64));
    ext.extend(std::iter::repeat(last).take(half));

    let full = fft_convolve(&ext, kernel)?;
    let offset = 2 * half + pad;
    Ok(full[offset..offset + len].iter().map(|&s| s as f32).collect())
}

/// Zero-phase lowpass or highpass of a stereo buffer at `cutoff_hz`.
///
/// A cutoff outside `(0, nyquist)` leaves the audio untouched.
pub fn pass_filter(
    kind: FilterKind,
    cutoff_hz: f64,
    audio: &StereoBuffer,
) -> Result<StereoBuffer> {
    let nyquist = audio.sample_rate() as f64 / 2.0;
    if cutoff_hz <= 0.0 || cutoff_hz >= nyquist {
        return Ok(audio.clone());
    }
    let kernel = zero_phase_kernel(kind, cutoff_hz / nyquist)?;
    audio.try_map_channels(|channel| filter_channel(channel, &kernel))
}
