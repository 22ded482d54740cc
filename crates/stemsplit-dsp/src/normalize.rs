//! Peak normalization.
//!
//! Volume compensations and stem subtractions downstream assume the mixture
//! peaks at -1 dBFS, so this runs before any model sees the audio.

use stemsplit_core::{minus_one_dbfs, StereoBuffer};

/// Remove DC offset, then scale the peak to -1 dBFS.
///
/// The mean is taken over both channels together. A buffer whose peak is
/// zero after DC removal is returned unscaled.
pub fn normalize(audio: &StereoBuffer) -> StereoBuffer {
    let mean = audio.mean();
    let mut out = audio.clone();
    out.data_mut().mapv_inplace(|s| s - mean);

    let peak = out.peak();
    if peak > 0.0 {
        let gain = minus_one_dbfs() / peak;
        out.data_mut().mapv_inplace(|s| s * gain);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn buffer(left: Vec<f32>, right: Vec<f32>) -> StereoBuffer {
        StereoBuffer::from_channels(left, right, 44_100).unwrap()
    }

    #[test]
    fn test_silence_is_noop() {
        let silent = StereoBuffer::silence(1000, 44_100);
        assert_eq!(normalize(&silent), silent);
    }

    #[test]
    fn test_removes_dc_offset() {
        let left: Vec<f32> = (0..1000).map(|i| 0.3 + 0.1 * (i as f32 * 0.05).sin()).collect();
        let out = normalize(&buffer(left.clone(), left));
        assert_abs_diff_eq!(out.mean(), 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(out.peak(), minus_one_dbfs(), epsilon = 1e-5);
    }

    #[test]
    fn test_constant_signal_becomes_silence() {
        let out = normalize(&buffer(vec![0.5; 64], vec![0.5; 64]));
        assert_abs_diff_eq!(out.peak(), 0.0, epsilon = 1e-7);
    }

    proptest! {
        #[test]
        fn prop_peak_is_minus_one_dbfs(
            left in prop::collection::vec(-1.0f32..1.0, 16..512),
            offset in -0.5f32..0.5,
        ) {
            let right: Vec<f32> = left.iter().rev().map(|s| s * 0.5).collect();
            let left: Vec<f32> = left.iter().map(|s| s + offset).collect();
            let input = buffer(left, right);
            let mean = input.mean();
            let centered_peak = input.data().iter().fold(0.0f32, |acc, s| acc.max((s - mean).abs()));
            prop_assume!(centered_peak > 1e-3);

            let once = normalize(&input);
            prop_assert!((once.peak() - minus_one_dbfs()).abs() < 1e-4);
            prop_assert!(once.mean().abs() < 1e-4);

            let twice = normalize(&once);
            for (a, b) in once.data().iter().zip(twice.data().iter()) {
                prop_assert!((a - b).abs() < 1e-4);
            }
        }
    }
}
