//! StemSplit Core - Foundation types for stem separation
//!
//! This crate provides the fundamental types used throughout StemSplit:
//! - `StereoBuffer`, the two-channel waveform every stage consumes and produces
//! - Error type and `Result` alias
//! - Cooperative cancellation token

pub mod buffer;
pub mod cancel;
pub mod error;

pub use buffer::StereoBuffer;
pub use cancel::CancelToken;
pub use error::{Result, StemSplitError};

/// Working sample rate of the whole pipeline. Inputs are decoded to this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Channel count of every waveform entering the core.
pub const CHANNELS: usize = 2;

/// Linear gain of the -1 dBFS normalization target.
pub fn minus_one_dbfs() -> f32 {
    10f32.powf(-1.0 / 20.0)
}
