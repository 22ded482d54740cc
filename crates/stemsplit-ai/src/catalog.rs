//! Model descriptor table.
//!
//! One row per MDX model: transform geometry, native bandwidth and the gain
//! its output needs to line up with the mixture.

use crate::error::{AiError, AiResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Hop of every MDX model's STFT.
pub const MODEL_HOP: usize = 1024;

/// Gap between a model's cutoff and the bandwidth-extension crossover, in Hz.
pub const SRS_CROSSOVER_MARGIN_HZ: f64 = 2700.0;

const BUILTIN_CATALOG: &str = include_str!("../catalog/models.json");

/// What a model extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StemKind {
    Vocals,
    Instrumental,
}

/// Catalog row as stored on disk.
#[derive(Debug, Clone, Deserialize)]
struct CatalogRow {
    name: String,
    repo_file: String,
    stem: StemKind,
    #[serde(default)]
    cutoff: u32,
    n_fft: usize,
    dim_f: usize,
    dim_t: u32,
    #[serde(default = "unity")]
    compensation: f32,
    #[serde(default)]
    compensation_db: Option<f32>,
}

fn unity() -> f32 {
    1.0
}

/// Immutable parameters of one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub repo_file: String,
    pub stem: StemKind,
    /// Native bandwidth in Hz. Zero disables bandwidth extension.
    pub cutoff: u32,
    pub n_fft: usize,
    /// Frequency bins fed to the network.
    pub dim_f: usize,
    /// Frames per chunk, as a power of two.
    pub dim_t: u32,
    /// Linear gain applied to the model's output.
    pub compensation: f32,
}

impl ModelDescriptor {
    pub fn hop(&self) -> usize {
        MODEL_HOP
    }

    /// STFT frames per chunk.
    pub fn frames(&self) -> usize {
        1usize << self.dim_t
    }

    /// Samples per dispatched chunk.
    pub fn chunk_size(&self) -> usize {
        self.hop() * (self.frames() - 1)
    }

    /// Edge margin discarded from each side of a chunk's output.
    pub fn trim(&self) -> usize {
        self.n_fft / 2
    }

    /// Samples of usable output per chunk.
    pub fn gen_size(&self) -> usize {
        self.chunk_size().saturating_sub(2 * self.trim())
    }

    /// Whether the bandwidth extension runs for audio at `sample_rate`.
    pub fn uses_srs(&self, sample_rate: u32) -> bool {
        self.cutoff > 0 && (self.cutoff as f64) < sample_rate as f64 / 2.0
    }

    /// Upsampling numerator of the bandwidth extension (the ratio is `pitch / 4`).
    pub fn srs_pitch(&self) -> usize {
        if self.cutoff < 17_000 {
            6
        } else {
            5
        }
    }

    /// Crossover between native and extended estimates.
    pub fn srs_crossover_hz(&self) -> f64 {
        self.cutoff as f64 - SRS_CROSSOVER_MARGIN_HZ
    }

    fn validate(&self) -> AiResult<()> {
        if self.n_fft < 2 || self.n_fft % 2 != 0 {
            return Err(AiError::Catalog(format!("{}: n_fft must be even", self.name)));
        }
        if self.dim_f == 0 || self.dim_f > self.n_fft / 2 + 1 {
            return Err(AiError::Catalog(format!(
                "{}: dim_f {} out of range for n_fft {}",
                self.name, self.dim_f, self.n_fft
            )));
        }
        if !(1..=16).contains(&self.dim_t) || self.gen_size() == 0 {
            return Err(AiError::Catalog(format!(
                "{}: chunk of 2^{} frames is too short for n_fft {}",
                self.name, self.dim_t, self.n_fft
            )));
        }
        Ok(())
    }
}

impl From<CatalogRow> for ModelDescriptor {
    fn from(row: CatalogRow) -> Self {
        let compensation = match row.compensation_db {
            Some(db) => 10f32.powf(db / 20.0),
            None => row.compensation,
        };
        Self {
            name: row.name,
            repo_file: row.repo_file,
            stem: row.stem,
            cutoff: row.cutoff,
            n_fft: row.n_fft,
            dim_f: row.dim_f,
            dim_t: row.dim_t,
            compensation,
        }
    }
}

/// The loaded model table.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Catalog shipped with the crate.
    pub fn builtin() -> AiResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> AiResult<Self> {
        let rows: Vec<CatalogRow> = serde_json::from_str(json)
            .map_err(|e| AiError::Catalog(format!("Failed to parse catalog: {e}")))?;
        let catalog = Self::from_descriptors(rows.into_iter().map(ModelDescriptor::from).collect())?;
        debug!(models = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn load(path: &Path) -> AiResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build a catalog from descriptors, rejecting invalid geometry and
    /// repeated names.
    pub fn from_descriptors(models: Vec<ModelDescriptor>) -> AiResult<Self> {
        for (i, model) in models.iter().enumerate() {
            model.validate()?;
            if models[..i].iter().any(|m| m.name == model.name) {
                return Err(AiError::Catalog(format!("duplicate model name: {}", model.name)));
            }
        }
        Ok(Self { models })
    }

    /// Look a model up by name.
    pub fn get(&self, name: &str) -> AiResult<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AiError::UnknownModel(name.to_string()))
    }

    /// Resolve a list of names, keeping their order.
    pub fn resolve(&self, names: &[String]) -> AiResult<Vec<ModelDescriptor>> {
        names.iter().map(|n| self.get(n).cloned()).collect()
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
