//! Two-channel waveform storage.
//!
//! Every stage of the separator works on planar stereo audio held in a
//! `(2, samples)` array. Mono sources are duplicated on the way in, and any
//! length disagreement between two buffers is resolved by explicit
//! zero-padding or truncation.

use crate::error::{Result, StemSplitError};
use crate::CHANNELS;
use ndarray::{concatenate, s, Array2, ArrayView1, Axis};
use rayon::prelude::*;

/// A planar stereo waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    data: Array2<f32>,
    sample_rate: u32,
}

impl StereoBuffer {
    /// Wrap a `(2, samples)` array.
    pub fn new(data: Array2<f32>, sample_rate: u32) -> Result<Self> {
        if data.nrows() != CHANNELS {
            return Err(StemSplitError::InvalidParameter(format!(
                "expected {CHANNELS} channels, got {}",
                data.nrows()
            )));
        }
        Ok(Self {
            data: data.as_standard_layout().into_owned(),
            sample_rate,
        })
    }

    /// Build from two equally long channels.
    pub fn from_channels(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(StemSplitError::InvalidParameter(format!(
                "channel length mismatch: {} vs {}",
                left.len(),
                right.len()
            )));
        }
        let len = left.len();
        let mut samples = left;
        samples.extend(right);
        let data = Array2::from_shape_vec((CHANNELS, len), samples)
            .map_err(|e| StemSplitError::Internal(e.to_string()))?;
        Ok(Self { data, sample_rate })
    }

    /// Build from interleaved samples.
    ///
    /// Mono is duplicated into both channels; only the first two channels of
    /// a multichannel source are kept.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        let channels = channels as usize;
        if channels == 0 {
            return Err(StemSplitError::InvalidParameter("zero channels".into()));
        }
        let frames = samples.len() / channels;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in samples.chunks_exact(channels) {
            left.push(frame[0]);
            right.push(if channels == 1 { frame[0] } else { frame[1] });
        }
        Self::from_channels(left, right, sample_rate)
    }

    /// A silent buffer of `len` samples per channel.
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self {
            data: Array2::zeros((CHANNELS, len)),
            sample_rate,
        }
    }

    /// Interleave back to `L, R, L, R, ...`.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * CHANNELS);
        for i in 0..self.len() {
            out.push(self.data[[0, i]]);
            out.push(self.data[[1, i]]);
        }
        out
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f32> {
        &mut self.data
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// View of one channel.
    pub fn channel(&self, channel: usize) -> ArrayView1<'_, f32> {
        self.data.row(channel)
    }

    /// Owned copy of one channel.
    pub fn channel_to_vec(&self, channel: usize) -> Vec<f32> {
        self.data.row(channel).to_vec()
    }

    /// Largest absolute sample value across both channels.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    /// Mean over every sample of both channels.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&s| s as f64).sum();
        (sum / self.data.len() as f64) as f32
    }

    /// Copy of the samples in `start..end`, clamped to the buffer.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        Self {
            data: self.data.slice(s![.., start..end]).to_owned(),
            sample_rate: self.sample_rate,
        }
    }

    /// Right-pad with silence or truncate to exactly `len` samples.
    pub fn matched_len(&self, len: usize) -> Self {
        let current = self.len();
        if current == len {
            return self.clone();
        }
        if current > len {
            return self.slice(0, len);
        }
        let mut data = Array2::zeros((CHANNELS, len));
        data.slice_mut(s![.., ..current]).assign(&self.data);
        Self {
            data,
            sample_rate: self.sample_rate,
        }
    }

    /// Phase-inverted copy.
    pub fn negated(&self) -> Self {
        self.scaled(-1.0)
    }

    /// Copy multiplied by a linear gain.
    pub fn scaled(&self, gain: f32) -> Self {
        Self {
            data: self.data.mapv(|s| s * gain),
            sample_rate: self.sample_rate,
        }
    }

    /// `self + other`, with `other` padded or truncated to this length.
    pub fn add(&self, other: &StereoBuffer) -> Self {
        let other = other.matched_len(self.len());
        Self {
            data: &self.data + &other.data,
            sample_rate: self.sample_rate,
        }
    }

    /// `self - other`, with `other` padded or truncated to this length.
    pub fn subtract(&self, other: &StereoBuffer) -> Self {
        let other = other.matched_len(self.len());
        Self {
            data: &self.data - &other.data,
            sample_rate: self.sample_rate,
        }
    }

    /// Circular rotation moving the last `amount` samples to the front.
    pub fn rotate_right(&self, amount: usize) -> Self {
        let len = self.len();
        if len == 0 {
            return self.clone();
        }
        let amount = amount % len;
        self.rotate_left(len - amount)
    }

    /// Circular rotation moving the first `amount` samples to the back.
    pub fn rotate_left(&self, amount: usize) -> Self {
        let len = self.len();
        if len == 0 {
            return self.clone();
        }
        let amount = amount % len;
        if amount == 0 {
            return self.clone();
        }
        let head = self.data.slice(s![.., amount..]);
        let tail = self.data.slice(s![.., ..amount]);
        // Both views have two rows, so the concatenation cannot fail.
        let data = concatenate(Axis(1), &[head, tail]).unwrap_or_else(|_| self.data.clone());
        Self {
            data,
            sample_rate: self.sample_rate,
        }
    }

    /// Apply a per-channel transform, running the channels in parallel.
    ///
    /// Channels coming back with different lengths are padded to the longest.
    pub fn map_channels<F>(&self, f: F) -> Self
    where
        F: Fn(&[f32]) -> Vec<f32> + Sync,
    {
        let channels: Vec<Vec<f32>> = (0..CHANNELS)
            .into_par_iter()
            .map(|c| f(&self.channel_to_vec(c)))
            .collect();
        self.with_channels(channels)
    }

    /// Fallible [`map_channels`](Self::map_channels): the first error wins.
    pub fn try_map_channels<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&[f32]) -> Result<Vec<f32>> + Sync,
    {
        let channels: Vec<Vec<f32>> = (0..CHANNELS)
            .into_par_iter()
            .map(|c| f(&self.channel_to_vec(c)))
            .collect::<Result<_>>()?;
        Ok(self.with_channels(channels))
    }

    fn with_channels(&self, channels: Vec<Vec<f32>>) -> Self {
        let len = channels.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = Array2::zeros((CHANNELS, len));
        for (c, samples) in channels.iter().enumerate() {
            data.slice_mut(s![c, ..samples.len()])
                .assign(&ArrayView1::from(samples.as_slice()));
        }
        Self {
            data,
            sample_rate: self.sample_rate,
        }
    }
}
