//! Pipeline stages and their persisted artifacts.
//!
//! Every stage writes its waveform to a deterministic file inside the song's
//! output folder. A later run finds those files and skips the work.

use crate::error::AiResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stemsplit_core::StereoBuffer;
use stemsplit_media::{read_audio, write_audio, OutputFormat};
use tracing::{debug, info};

/// Stages of the separation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Normalized,
    MusicExtract,
    VocalExtract,
    EnsembleVocal,
    BleedingsInVocal,
    VocalFinal,
    MusicFinal,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Self::Normalized,
        Self::MusicExtract,
        Self::VocalExtract,
        Self::EnsembleVocal,
        Self::BleedingsInVocal,
        Self::VocalFinal,
        Self::MusicFinal,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::Normalized => 0,
            Self::MusicExtract => 1,
            Self::VocalExtract => 2,
            Self::EnsembleVocal => 3,
            Self::BleedingsInVocal => 4,
            Self::VocalFinal => 5,
            Self::MusicFinal => 6,
        }
    }

    /// Canonical name, used in file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normalized => "NORMALIZED",
            Self::MusicExtract => "Music extract",
            Self::VocalExtract => "Vocal extract",
            Self::EnsembleVocal => "Ensemble Vocal",
            Self::BleedingsInVocal => "Bleedings in Vocal",
            Self::VocalFinal => "Vocal FINAL",
            Self::MusicFinal => "Music FINAL",
        }
    }

    /// Mandatory stages are always written and always reused when present.
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            Self::MusicExtract | Self::VocalExtract | Self::VocalFinal | Self::MusicFinal
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reads and writes the stage files of one song.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    format: OutputFormat,
    debug: bool,
    reuse: bool,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            debug: false,
            reuse: false,
        }
    }

    /// Write every stage, with the stage index prefixed to the file name.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Reuse artifacts of non-mandatory stages as well.
    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// `[<idx> - ]<stage>[ - (<model>)].<ext>`
    pub fn file_name(&self, stage: Stage, model: Option<&str>) -> String {
        let mut name = if self.debug {
            format!("{} - {}", stage.index(), stage.name())
        } else {
            stage.name().to_string()
        };
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            name.push_str(&format!(" - ({model})"));
        }
        name.push('.');
        name.push_str(self.format.extension());
        name
    }

    pub fn path(&self, stage: Stage, model: Option<&str>) -> PathBuf {
        self.dir.join(self.file_name(stage, model))
    }

    /// Whether `stage` would be loaded instead of recomputed.
    pub fn exists(&self, stage: Stage, model: Option<&str>) -> bool {
        (self.reuse || stage.is_mandatory()) && self.path(stage, model).is_file()
    }

    /// Load a previously written artifact, if reuse applies to `stage`.
    pub fn load(&self, stage: Stage, model: Option<&str>) -> AiResult<Option<StereoBuffer>> {
        if !self.exists(stage, model) {
            return Ok(None);
        }
        let path = self.path(stage, model);
        info!(path = %path.display(), "reusing checkpoint");
        Ok(Some(read_audio(&path)?))
    }

    /// Persist `audio` for `stage`. Returns whether a file was written.
    ///
    /// Non-mandatory stages are only written in debug mode.
    pub fn save(&self, stage: Stage, model: Option<&str>, audio: &StereoBuffer) -> AiResult<bool> {
        if !self.debug && !stage.is_mandatory() {
            return Ok(false);
        }
        let path = self.path(stage, model);
        debug!(%stage, path = %path.display(), "saving");
        write_audio(&path, audio, self.format)?;
        Ok(true)
    }
}
