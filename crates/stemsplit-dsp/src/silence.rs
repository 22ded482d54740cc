//! Silence gate.
//!
//! Not a noise reducer: it only clears stretches that are already quiet so
//! the models do not hallucinate on them and final stems carry no residue.

use serde::{Deserialize, Serialize};
use stemsplit_core::StereoBuffer;
use tracing::trace;

/// Floor applied to RMS before converting to decibels.
const RMS_FLOOR: f32 = 1e-5;

/// Gate parameters. Durations are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceGateConfig {
    pub threshold_db: f32,
    pub window_ms: u32,
    pub min_silence_ms: u32,
    pub fade_ms: u32,
}

impl Default for SilenceGateConfig {
    fn default() -> Self {
        Self {
            threshold_db: -50.0,
            window_ms: 10,
            min_silence_ms: 1000,
            fade_ms: 250,
        }
    }
}

impl SilenceGateConfig {
    pub fn with_threshold(threshold_db: f32) -> Self {
        Self {
            threshold_db,
            ..Self::default()
        }
    }

    /// Threshold used on vocal extracts.
    pub fn vocals() -> Self {
        Self::with_threshold(-50.0)
    }

    /// Threshold used on bleed filter outputs.
    pub fn filter() -> Self {
        Self::with_threshold(-45.0)
    }

    /// Threshold used on the final instrumental.
    pub fn music() -> Self {
        Self::with_threshold(-61.0)
    }

    fn samples(ms: u32, sample_rate: u32) -> usize {
        (ms as u64 * sample_rate as u64 / 1000) as usize
    }

    /// Gate `audio`, returning a new buffer.
    pub fn apply(&self, audio: &StereoBuffer) -> StereoBuffer {
        let sr = audio.sample_rate();
        let window = Self::samples(self.window_ms, sr).max(1);
        let min_len = Self::samples(self.min_silence_ms, sr);
        let fade = Self::samples(self.fade_ms, sr);
        let len = audio.len();

        let mut out = audio.clone();
        let mut run_start: Option<usize> = None;
        let mut runs = 0usize;

        for start in (0..len).step_by(window) {
            let end = (start + window).min(len);
            if window_level_db(audio, start, end) < self.threshold_db {
                run_start.get_or_insert(start);
                continue;
            }
            if let Some(silent_from) = run_start.take() {
                if start - silent_from >= min_len {
                    mute(&mut out, silent_from, start, fade);
                    runs += 1;
                }
            }
        }
        if let Some(silent_from) = run_start {
            if len - silent_from >= min_len {
                mute(&mut out, silent_from, len, fade);
                runs += 1;
            }
        }

        trace!(threshold_db = self.threshold_db, runs, "silence gate");
        out
    }
}

/// Loudest channel's RMS over `start..end`, in dB.
fn window_level_db(audio: &StereoBuffer, start: usize, end: usize) -> f32 {
    let count = (end - start) as f32;
    let rms = (0..audio.data().nrows())
        .map(|c| {
            let channel = audio.channel(c);
            let energy: f32 = (start..end).map(|i| channel[i] * channel[i]).sum();
            (energy / count).sqrt()
        })
        .fold(0.0f32, f32::max);
    20.0 * rms.max(RMS_FLOOR).log10()
}

/// Zero `start..end`, with a linear fade-out at the start and fade-in at the
/// end. Each fade is skipped when it would run into the signal boundary.
/// When the run is shorter than the fades they overlap and the larger gain
/// wins, so a sample is never amplified.
fn mute(out: &mut StereoBuffer, start: usize, end: usize, fade: usize) {
    let len = out.len();
    let fade_out = fade > 1 && start > fade;
    let fade_in = fade > 1 && end < len.saturating_sub(fade);
    let ramp = |distance: usize| {
        if distance < fade {
            1.0 - distance as f32 / (fade - 1) as f32
        } else {
            0.0
        }
    };

    let data = out.data_mut();
    for i in start..end {
        let mut gain = 0.0f32;
        if fade_out {
            gain = gain.max(ramp(i - start));
        }
        if fade_in {
            gain = gain.max(ramp(end - 1 - i));
        }
        for c in 0..data.nrows() {
            data[[c, i]] *= gain;
        }
    }
}

/// Gate `audio` with the default window, run length and fades.
pub fn silence_gate(audio: &StereoBuffer, threshold_db: f32) -> StereoBuffer {
    SilenceGateConfig::with_threshold(threshold_db).apply(audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::s;

    const SR: u32 = 44_100;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SR as f32).sin())
            .collect()
    }

    fn hiss(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i % 2 == 0 { 2e-4 } else { -2e-4 })
            .collect()
    }

    fn stereo(parts: &[Vec<f32>]) -> StereoBuffer {
        let samples: Vec<f32> = parts.concat();
        StereoBuffer::from_channels(samples.clone(), samples, SR).unwrap()
    }

    #[test]
    fn test_long_gap_is_muted_with_fades() {
        let input = stereo(&[tone(44_100), hiss(88_200), tone(44_100)]);
        let out = silence_gate(&input, -50.0);
        let fade = 11_025;
        let (gap_start, gap_end) = (44_100, 132_300);

        // Signal around the gap is untouched.
        for i in (0..gap_start).chain(gap_end..input.len()) {
            assert_eq!(out.data()[[0, i]], input.data()[[0, i]]);
        }
        // Fades attenuate but never amplify.
        for i in (gap_start..gap_start + fade).chain(gap_end - fade..gap_end) {
            assert!(out.data()[[1, i]].abs() <= input.data()[[1, i]].abs());
        }
        assert_eq!(out.data()[[0, gap_start]], input.data()[[0, gap_start]]);
        // Everything between the fades is zeroed.
        for i in gap_start + fade..gap_end - fade {
            assert_eq!(out.data()[[0, i]], 0.0);
            assert_eq!(out.data()[[1, i]], 0.0);
        }
    }

    #[test]
    fn test_short_gap_is_left_alone() {
        let input = stereo(&[tone(44_100), hiss(8820), tone(44_100)]);
        assert_eq!(silence_gate(&input, -50.0), input);
    }

    #[test]
    fn test_trailing_silence_has_no_fade_in() {
        let input = stereo(&[tone(44_100), hiss(66_150)]);
        let out = silence_gate(&input, -50.0);
        let last = input.len() - 1;
        assert_eq!(out.data()[[0, last]], 0.0);
        assert_eq!(out.data()[[0, last - 10]], 0.0);
    }

    #[test]
    fn test_leading_silence_has_no_fade_out() {
        let input = stereo(&[hiss(55_125), tone(44_100)]);
        let out = silence_gate(&input, -50.0);
        assert_eq!(out.data()[[0, 0]], 0.0);
        assert_eq!(out.data()[[0, 1]], 0.0);
    }

    #[test]
    fn test_loud_signal_is_untouched() {
        let input = stereo(&[tone(100_000)]);
        assert_eq!(silence_gate(&input, -61.0), input);
    }

    fn quiet(len: usize) -> Vec<f32> {
        vec![1e-3; len]
    }

    fn gap_is_muted(gap: usize) -> bool {
        let input = stereo(&[tone(44_100), hiss(gap), tone(44_100)]);
        let out = silence_gate(&input, -50.0);
        out.data()[[0, 44_100 + gap / 2]] == 0.0
    }

    #[test]
    fn test_gap_of_exactly_one_second_is_muted() {
        assert!(gap_is_muted(44_100));
    }

    #[test]
    fn test_gap_just_under_one_second_is_kept() {
        let input = stereo(&[tone(44_100), hiss(43_659), tone(44_100)]);
        assert_eq!(silence_gate(&input, -50.0), input);
        assert!(!gap_is_muted(43_659));
    }

    #[test]
    fn test_fades_are_linear_ramps() {
        let fade = 11_025;
        let (gap_start, gap_end) = (44_100, 132_300);
        let input = stereo(&[tone(44_100), quiet(88_200), tone(44_100)]);
        let out = silence_gate(&input, -50.0);
        let at = |i: usize| out.data()[[0, i]];

        assert_abs_diff_eq!(at(gap_start), 1e-3, epsilon = 1e-9);
        assert_abs_diff_eq!(at(gap_start + fade / 2), 0.5e-3, epsilon = 1e-6);
        assert_abs_diff_eq!(at(gap_start + fade / 4), 0.75e-3, epsilon = 1e-6);
        assert_eq!(at(gap_start + fade), 0.0);

        assert_abs_diff_eq!(at(gap_end - 1), 1e-3, epsilon = 1e-9);
        assert_abs_diff_eq!(at(gap_end - 1 - fade / 2), 0.5e-3, epsilon = 1e-6);
        assert_eq!(at(gap_end - 1 - fade), 0.0);
    }

    #[test]
    fn test_edge_runs_skip_their_fades() {
        let fade = 11_025;
        let input = stereo(&[quiet(66_150), tone(44_100), quiet(66_150)]);
        let out = silence_gate(&input, -50.0);
        let len = input.len();

        // Leading run: zero from the first sample, fade-in before the tone.
        assert_eq!(out.data()[[0, 0]], 0.0);
        assert_eq!(out.data()[[0, fade / 2]], 0.0);
        assert_abs_diff_eq!(out.data()[[0, 66_149]], 1e-3, epsilon = 1e-9);
        // Trailing run: fade-out after the tone, zero up to the last sample.
        assert_abs_diff_eq!(out.data()[[0, 110_250]], 1e-3, epsilon = 1e-9);
        assert_eq!(out.data()[[0, len - 1 - fade / 2]], 0.0);
        assert_eq!(out.data()[[0, len - 1]], 0.0);
    }

    #[test]
    fn test_runs_shorter_than_the_fades() {
        let config = SilenceGateConfig {
            threshold_db: -50.0,
            window_ms: 10,
            min_silence_ms: 100,
            fade_ms: 250,
        };

        // Leading run shorter than the fade-in.
        let input = stereo(&[vec![0.0; 8820], tone(132_300)]);
        let out = config.apply(&input);
        assert_eq!(out.len(), input.len());
        assert_eq!(out.data().slice(s![.., 8820..]), input.data().slice(s![.., 8820..]));

        // Interior run shorter than both fades: attenuated, never amplified.
        let input = stereo(&[tone(44_100), quiet(8820), tone(44_100)]);
        let out = config.apply(&input);
        for i in 44_100..52_920 {
            assert!(out.data()[[0, i]] <= input.data()[[0, i]]);
            assert!(out.data()[[0, i]] >= 0.0);
        }

        // Trailing run shorter than the fade-out.
        let input = stereo(&[tone(44_100), quiet(8820)]);
        let out = config.apply(&input);
        let last = input.len() - 1;
        assert!(out.data()[[0, last]] < input.data()[[0, last]]);
        assert_eq!(out.data()[[0, 44_099]], input.data()[[0, 44_099]]);
    }

    #[test]
    fn test_threshold_presets() {
        assert_eq!(SilenceGateConfig::vocals().threshold_db, -50.0);
        assert_eq!(SilenceGateConfig::filter().threshold_db, -45.0);
        assert_eq!(SilenceGateConfig::music().threshold_db, -61.0);
    }
}
