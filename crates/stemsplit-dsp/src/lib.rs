//! StemSplit DSP - Deterministic signal processing around the models
//!
//! Everything in here is pure and sample-accurate:
//! - `normalize`: DC removal and -1 dBFS peak scaling
//! - `silence`: RMS-windowed silence gate with crossfaded muting
//! - `crossover`: zero-phase Linkwitz-Riley lowpass/highpass pair
//! - `fir`: zero-phase windowed-sinc band limiting for final stems
//! - `resample`: rational polyphase sample-rate conversion
//! - `stft`: short-time Fourier transform used by the ensembler and models
//! - `ensemble`: waveform and per-bin spectral combination of estimates

pub mod crossover;
pub mod ensemble;
pub mod fir;
pub mod normalize;
pub mod resample;
pub mod silence;
pub mod stft;
pub mod window;

pub use crossover::{linkwitz_riley, FilterKind};
pub use ensemble::{make_ensemble, EnsembleAlgorithm};
pub use fir::pass_filter;
pub use normalize::normalize;
pub use resample::change_sample_rate;
pub use silence::{silence_gate, SilenceGateConfig};
pub use stft::{PadMode, Stft};
