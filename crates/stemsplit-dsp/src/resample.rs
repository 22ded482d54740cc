//! Rational polyphase sample-rate conversion.
//!
//! Used by the bandwidth extension only: the mixture is pushed up by
//! `pitch / 4`, separated again, and brought back down. The output keeps the
//! buffer's sample-rate tag untouched since the models never look at it.
//!
//! The filter is applied centred on each output sample, so the result has no
//! delay and exactly `ceil(n * up / down)` samples. Streaming resamplers such
//! as `rubato` carry filter latency and chunked output lengths, which would
//! misalign the extended estimate against the direct one at the crossover.

use crate::window::{firwin_lowpass, kaiser};
use stemsplit_core::StereoBuffer;

/// Kaiser beta of the anti-aliasing filter.
const KAISER_BETA: f64 = 5.0;

/// Half the filter length, per unit of the larger rate factor.
const HALF_LEN_PER_RATE: usize = 10;

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Polyphase resampler for a fixed `up / down` ratio.
#[derive(Debug, Clone)]
pub struct Resampler {
    up: usize,
    down: usize,
    half_len: usize,
    taps: Vec<f64>,
}

impl Resampler {
    pub fn new(up: usize, down: usize) -> Self {
        let divisor = gcd(up.max(1), down.max(1));
        let up = up.max(1) / divisor;
        let down = down.max(1) / divisor;
        let max_rate = up.max(down);
        let half_len = HALF_LEN_PER_RATE * max_rate;
        let window = kaiser(2 * half_len + 1, KAISER_BETA);
        let taps = firwin_lowpass(1.0 / max_rate as f64, &window)
            .into_iter()
            .map(|t| t * up as f64)
            .collect();
        Self {
            up,
            down,
            half_len,
            taps,
        }
    }

    /// Output length for an input of `len` samples: `ceil(len * up / down)`.
    pub fn output_len(&self, len: usize) -> usize {
        (len * self.up).div_ceil(self.down)
    }

    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        if self.up == 1 && self.down == 1 {
            return input.to_vec();
        }
        let n = input.len();
        (0..self.output_len(n))
            .map(|m| {
                // Position in the zero-stuffed signal, delayed by the filter's centre.
                let pos = m * self.down + self.half_len;
                let mut acc = 0.0f64;
                let mut j = pos % self.up;
                while j < self.taps.len() && j <= pos {
                    let k = (pos - j) / self.up;
                    if k < n {
                        acc += self.taps[j] * input[k] as f64;
                    }
                    j += self.up;
                }
                acc as f32
            })
            .collect()
    }
}

/// Resample both channels by `up / down`.
pub fn change_sample_rate(audio: &StereoBuffer, up: usize, down: usize) -> StereoBuffer {
    let resampler = Resampler::new(up, down);
    audio.map_channels(|channel| resampler.process(channel))
}
