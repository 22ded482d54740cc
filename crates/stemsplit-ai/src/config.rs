//! Run configuration.
//!
//! Stored as JSON. Every key is optional and falls back to the defaults
//! below, so a config file only needs the settings it changes.

use crate::demix::DEFAULT_SEGMENT_SIZE;
use crate::error::{AiError, AiResult};
use crate::extract::ShiftCounts;
use crate::model_manager::default_models_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stemsplit_media::OutputFormat;

/// Full configuration of a separation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub paths: PathsConfig,
    pub process: ProcessConfig,
    pub options: OptionsConfig,
    pub bonus: BonusConfig,
}

/// Where things live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Input files or directories.
    pub input: Vec<PathBuf>,
    /// Root of the per-song output folders.
    pub output: PathBuf,
    pub models_dir: PathBuf,
    /// Model table. The built-in one is used when unset.
    pub catalog: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: vec![PathBuf::from("Music")],
            output: PathBuf::from("Results"),
            models_dir: default_models_dir(),
            catalog: None,
        }
    }
}

/// Which models run, and the output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub output_format: OutputFormat,
    pub instrumental: Vec<String>,
    pub vocals: Vec<String>,
    pub filters: Vec<String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Flac,
            instrumental: vec!["Instrum HQ 3".into()],
            vocals: vec!["Kim Vocal 2".into(), "Voc FT".into()],
            filters: vec![
                "Instrum HQ 3".into(),
                "Instrum Main".into(),
                "Vocal Main".into(),
                "Model 9662".into(),
            ],
        }
    }
}

impl ProcessConfig {
    /// Every configured model name, without repeats.
    pub fn all_models(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .instrumental
            .iter()
            .chain(&self.vocals)
            .chain(&self.filters)
        {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Quality and resource knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Remove DC and scale the mixture to -1 dBFS first.
    pub normalize: bool,
    /// Keep every model loaded for the whole run.
    pub resident_models: bool,
    pub shifts_vocals: usize,
    pub shifts_instrumental: usize,
    pub shifts_filter: usize,
    /// Samples per inference segment.
    pub segment_size: usize,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        let shifts = ShiftCounts::default();
        Self {
            normalize: false,
            resident_models: true,
            shifts_vocals: shifts.vocals,
            shifts_instrumental: shifts.instrumental,
            shifts_filter: shifts.filter,
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

impl OptionsConfig {
    pub fn shift_counts(&self) -> ShiftCounts {
        ShiftCounts {
            vocals: self.shifts_vocals,
            instrumental: self.shifts_instrumental,
            filter: self.shifts_filter,
        }
    }
}

/// Developer switches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusConfig {
    /// One inference pass instead of two.
    pub single_pass: bool,
    /// Write every stage, with index prefixes.
    pub debug: bool,
    /// Reuse artifacts of every stage, not only the mandatory ones.
    pub reuse_checkpoints: bool,
}

impl SeparationConfig {
    pub fn from_json(json: &str) -> AiResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            AiError::SerializationError(format!("Failed to deserialize config: {e}"))
        })
    }

    pub fn load(path: &Path) -> AiResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> AiResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            AiError::SerializationError(format!("Failed to serialize config: {e}"))
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> AiResult<()> {
        if self.process.vocals.is_empty() {
            return Err(AiError::Catalog("at least one vocal model is required".into()));
        }
        if self.options.segment_size == 0 {
            return Err(AiError::PreprocessError("segment_size must be positive".into()));
        }
        Ok(())
    }
}
