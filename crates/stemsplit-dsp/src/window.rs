//! Window functions and windowed-sinc FIR design.

use std::f64::consts::PI;

/// Hann window. `periodic` gives the DFT-even form used for STFT analysis.
pub fn hann(size: usize, periodic: bool) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let denom = (if periodic { size } else { size - 1 }) as f64;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Symmetric Hamming window.
pub fn hamming(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Symmetric Kaiser window.
pub fn kaiser(size: usize, beta: f64) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let denom = bessel_i0(beta);
    let m = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let ratio = 2.0 * i as f64 / m - 1.0;
            bessel_i0(beta * (1.0 - ratio * ratio).max(0.0).sqrt()) / denom
        })
        .collect()
}

/// Zeroth-order modified Bessel function of the first kind (power series).
pub fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
        term *= (half / k as f64) * (half / k as f64);
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
    }
    sum
}

/// Normalized sinc: `sin(pi x) / (pi x)`.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Windowed-sinc lowpass with unity DC gain.
///
/// `cutoff` is relative to Nyquist (`0.0..=1.0`); `window.len()` is the tap count.
pub fn firwin_lowpass(cutoff: f64, window: &[f64]) -> Vec<f64> {
    let center = (window.len() as f64 - 1.0) / 2.0;
    let mut taps: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(i, w)| cutoff * sinc(cutoff * (i as f64 - center)) * w)
        .collect();
    let sum: f64 = taps.iter().sum();
    if sum.abs() > f64::EPSILON {
        for t in &mut taps {
            *t /= sum;
        }
    }
    taps
}

/// Windowed-sinc highpass with unity gain at Nyquist. Needs an odd tap count.
pub fn firwin_highpass(cutoff: f64, window: &[f64]) -> Vec<f64> {
    let center = (window.len() as f64 - 1.0) / 2.0;
    let mut taps: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let n = i as f64 - center;
            (sinc(n) - cutoff * sinc(cutoff * n)) * w
        })
        .collect();
    // Response at Nyquist: sum of taps with alternating sign around the center.
    let nyquist_gain: f64 = taps
        .iter()
        .enumerate()
        .map(|(i, t)| t * (PI * (i as f64 - center)).cos())
        .sum();
    if nyquist_gain.abs() > f64::EPSILON {
        for t in &mut taps {
            *t /= nyquist_gain;
        }
    }
    taps
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_periodic_hann_starts_at_zero() {
        let w = hann(8, true);
        assert_abs_diff_eq!(w[0], 0.0);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bessel_i0_known_values() {
        assert_abs_diff_eq!(bessel_i0(0.0), 1.0);
        assert_abs_diff_eq!(bessel_i0(1.0), 1.266_065_877_752_008, epsilon = 1e-12);
        assert_abs_diff_eq!(bessel_i0(5.0), 27.239_871_823_604_44, epsilon = 1e-9);
    }

    #[test]
    fn test_kaiser_is_symmetric_and_peaks_at_center() {
        let w = kaiser(21, 5.0);
        assert_abs_diff_eq!(w[10], 1.0, epsilon = 1e-12);
        for i in 0..10 {
            assert_abs_diff_eq!(w[i], w[20 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lowpass_has_unity_dc_gain() {
        let taps = firwin_lowpass(0.25, &hamming(101));
        assert_abs_diff_eq!(taps.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let taps = firwin_highpass(0.1, &hamming(101));
        assert!(taps.iter().sum::<f64>().abs() < 5e-3);
    }
}
