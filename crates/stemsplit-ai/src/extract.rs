//! Extraction controller: phase-cancelling double pass and sample-rate-shift
//! bandwidth extension around the chunk engine.

use crate::backend::SeparationModel;
use crate::catalog::ModelDescriptor;
use crate::demix::Demixer;
use crate::error::AiResult;
use serde::{Deserialize, Serialize};
use stemsplit_core::StereoBuffer;
use stemsplit_dsp::{change_sample_rate, linkwitz_riley, FilterKind};
use tracing::{debug, info};

/// Order of the crossover that stitches the bandwidth extension in.
pub const SRS_CROSSOVER_ORDER: usize = 4;

/// Denominator of the bandwidth-extension resample ratio.
const SRS_DOWN: usize = 4;

/// Why a model is being run. Selects the shift count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    Vocals,
    Instrumental,
    Filter,
}

impl Purpose {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vocals => "Extract Vocals",
            Self::Instrumental => "Extract Music",
            Self::Filter => "Filter Vocals",
        }
    }
}

/// Shift counts per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftCounts {
    pub vocals: usize,
    pub instrumental: usize,
    pub filter: usize,
}

impl Default for ShiftCounts {
    fn default() -> Self {
        Self {
            vocals: 12,
            instrumental: 12,
            filter: 3,
        }
    }
}

impl ShiftCounts {
    pub fn for_purpose(&self, purpose: Purpose) -> usize {
        match purpose {
            Purpose::Vocals => self.vocals,
            Purpose::Instrumental => self.instrumental,
            Purpose::Filter => self.filter,
        }
    }
}

/// Drives the chunk engine for one model.
#[derive(Clone)]
pub struct Extractor {
    demixer: Demixer,
    shifts: ShiftCounts,
    single_pass: bool,
}

impl Extractor {
    pub fn new(demixer: Demixer, shifts: ShiftCounts) -> Self {
        Self {
            demixer,
            shifts,
            single_pass: false,
        }
    }

    /// Run a single pass instead of two. Faster, noisier.
    pub fn with_single_pass(mut self, single_pass: bool) -> Self {
        self.single_pass = single_pass;
        self
    }

    pub fn demixer(&self) -> &Demixer {
        &self.demixer
    }

    /// Extract the model's stem from `audio`.
    ///
    /// The result has the length of `audio`. Compensation gain is left to
    /// the caller.
    pub fn extract(
        &self,
        purpose: Purpose,
        model: &dyn SeparationModel,
        descriptor: &ModelDescriptor,
        audio: &StereoBuffer,
    ) -> AiResult<StereoBuffer> {
        let shifts = self.shifts.for_purpose(purpose);
        info!(model = %descriptor.name, purpose = purpose.label(), shifts, "extracting");

        let source = self.passes(model, descriptor, audio, shifts)?;
        if !descriptor.uses_srs(audio.sample_rate()) {
            return Ok(source);
        }

        // Resampling up shifts the content above the cutoff down into the
        // model's band.
        let pitch = descriptor.srs_pitch();
        let srs_shifts = (shifts / 4).max(1);
        debug!(model = %descriptor.name, pitch, shifts = srs_shifts, "bandwidth extension");
        let stretched = change_sample_rate(audio, pitch, SRS_DOWN);
        let extended = self.passes(model, descriptor, &stretched, srs_shifts)?;
        let extended = change_sample_rate(&extended, SRS_DOWN, pitch).matched_len(source.len());

        let crossover = descriptor.srs_crossover_hz();
        let low = linkwitz_riley(&source, crossover, FilterKind::Lowpass, SRS_CROSSOVER_ORDER);
        let high = linkwitz_riley(&extended, crossover, FilterKind::Highpass, SRS_CROSSOVER_ORDER);
        Ok(low.add(&high))
    }

    /// One pass, or the mean of the direct pass and the sign-restored pass
    /// on the inverted input. Noise the model adds is not inverted along with
    /// the signal, so it partly cancels.
    fn passes(
        &self,
        model: &dyn SeparationModel,
        descriptor: &ModelDescriptor,
        audio: &StereoBuffer,
        shifts: usize,
    ) -> AiResult<StereoBuffer> {
        if self.single_pass {
            return self.demixer.demix(model, descriptor, audio, shifts);
        }
        let inverted = self.demixer.demix(model, descriptor, &audio.negated(), shifts)?;
        let direct = self.demixer.demix(model, descriptor, audio, shifts)?;
        Ok(direct.subtract(&inverted).scaled(0.5))
    }
}
