//! Progress reporting for long extractions.

use serde::Serialize;
use std::sync::Arc;

/// Where an extraction currently is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionProgress {
    /// Model being run.
    pub model: String,
    /// Zero-based shift index.
    pub shift: usize,
    pub shifts: usize,
    /// Segments finished within the current shift.
    pub segment: usize,
    pub segments: usize,
}

impl ExtractionProgress {
    /// Fraction of the whole call completed (0.0 to 1.0).
    pub fn fraction(&self) -> f32 {
        let total = (self.shifts * self.segments).max(1);
        let done = self.shift * self.segments + self.segment;
        (done as f32 / total as f32).min(1.0)
    }
}

/// Callback receiving progress updates. Called on the inference thread.
pub type ProgressCallback = Arc<dyn Fn(&ExtractionProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        let mut p = ExtractionProgress {
            model: "Voc FT".into(),
            shift: 0,
            shifts: 4,
            segment: 1,
            segments: 2,
        };
        assert!((p.fraction() - 0.125).abs() < 1e-6);
        p.shift = 3;
        p.segment = 2;
        assert_eq!(p.fraction(), 1.0);
    }
}
