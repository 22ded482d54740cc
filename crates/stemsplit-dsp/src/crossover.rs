//! Zero-phase Linkwitz-Riley crossover.
//!
//! A Butterworth filter of half the requested order is run forward and then
//! backward over the signal. The magnitude response is squared (giving the
//! Linkwitz-Riley slope) and the phase cancels, so a lowpass/highpass pair
//! at the same cutoff sums back to the input with no group delay. That is
//! what lets two bandwidth-limited estimates be stitched without a seam.
//!
//! The highpass is taken as the input minus the lowpass. Away from the edges
//! that is the same forward-backward Butterworth highpass (the two squared
//! responses are power complementary); near the edges it keeps the pair
//! summing to the input where the padded filters would drift apart.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use stemsplit_core::StereoBuffer;

/// Highest crossover frequency accepted, in Hz.
pub const MAX_CUTOFF_HZ: f64 = 22_000.0;

/// Which side of the crossover to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Lowpass,
    Highpass,
}

/// Transposed direct form II section of order one or two.
#[derive(Debug, Clone, Copy)]
struct Section {
    b: [f64; 3],
    a: [f64; 2],
}

impl Section {
    fn second_order(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        Self {
            b: [k2 * norm, 2.0 * k2 * norm, k2 * norm],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    fn first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b: [k * norm, k * norm, 0.0],
            a: [(k - 1.0) * norm, 0.0],
        }
    }

    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Filter in place, starting from the steady state for a constant input
    /// equal to `data[0]`.
    fn run(&self, data: &mut [f64]) {
        let Some(&x0) = data.first() else {
            return;
        };
        let y0 = self.dc_gain() * x0;
        let mut z1 = y0 - self.b[0] * x0;
        let mut z2 = self.b[2] * x0 - self.a[1] * y0;
        for sample in data.iter_mut() {
            let x = *sample;
            let y = self.b[0] * x + z1;
            z1 = self.b[1] * x - self.a[0] * y + z2;
            z2 = self.b[2] * x - self.a[1] * y;
            *sample = y;
        }
    }
}

/// Butterworth lowpass cascade of the given order, designed by bilinear
/// transform.
fn butterworth(order: usize, cutoff_hz: f64, sample_rate: f64) -> Vec<Section> {
    let k = (PI * cutoff_hz / sample_rate).tan();
    let mut sections: Vec<Section> = (0..order / 2)
        .map(|i| {
            let theta = PI * (2 * i + order + 1) as f64 / (2 * order) as f64;
            let q = -1.0 / (2.0 * theta.cos());
            Section::second_order(k, q)
        })
        .collect();
    if order % 2 == 1 {
        sections.push(Section::first_order(k));
    }
    sections
}

/// Forward-backward filtering with odd-extension edge padding.
fn filtfilt(sections: &[Section], signal: &[f32]) -> Vec<f32> {
    let len = signal.len();
    if len < 2 {
        return signal.to_vec();
    }
    let pad = (3 * (2 * sections.len() + 1)).min(len - 1);

    let first = signal[0] as f64;
    let last = signal[len - 1] as f64;
    let mut ext = Vec::with_capacity(len + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i] as f64));
    ext.extend(signal.iter().map(|&s| s as f64));
    ext.extend((1..=pad).map(|i| 2.0 * last - signal[len - 1 - i] as f64));

    for section in sections {
        section.run(&mut ext);
    }
    ext.reverse();
    for section in sections {
        section.run(&mut ext);
    }
    ext.reverse();

    ext[pad..pad + len].iter().map(|&s| s as f32).collect()
}

/// Zero-phase filter of one channel.
///
/// `order` is the Linkwitz-Riley order (4 gives 24 dB/oct); the underlying
/// Butterworth has half that order. The cutoff is clamped to
/// `0..=MAX_CUTOFF_HZ`; a cutoff at zero or at/above Nyquist degenerates to
/// silence or a pass-through so the pair still sums to the input.
pub fn filter_channel(
    signal: &[f32],
    cutoff_hz: f64,
    kind: FilterKind,
    sample_rate: u32,
    order: usize,
) -> Vec<f32> {
    let cutoff = cutoff_hz.clamp(0.0, MAX_CUTOFF_HZ);
    let nyquist = sample_rate as f64 / 2.0;
    let low = if cutoff <= 0.0 {
        vec![0.0; signal.len()]
    } else if cutoff >= nyquist {
        signal.to_vec()
    } else {
        let sections = butterworth((order / 2).max(1), cutoff, sample_rate as f64);
        filtfilt(&sections, signal)
    };

    match kind {
        FilterKind::Lowpass => low,
        FilterKind::Highpass => signal.iter().zip(low).map(|(&x, l)| x - l).collect(),
    }
}

/// Zero-phase Linkwitz-Riley filter of a stereo buffer.
pub fn linkwitz_riley(
    audio: &StereoBuffer,
    cutoff_hz: f64,
    kind: FilterKind,
    order: usize,
) -> StereoBuffer {
    let sample_rate = audio.sample_rate();
    audio.map_channels(|channel| filter_channel(channel, cutoff_hz, kind, sample_rate, order))
}
