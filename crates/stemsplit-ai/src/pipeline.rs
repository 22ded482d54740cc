//! Song separation pipeline.
//!
//! Per song:
//! 1. optional normalization of the mixture
//! 2. instrumental extracts (kept for the final repair)
//! 3. vocal extracts, gated and merged by max-magnitude ensembling
//! 4. filter models pull instrumental bleed out of the vocal ensemble
//! 5. final vocals: highpassed ensemble
//! 6. final music: mixture minus vocals, repaired with the instrumental
//!    extracts and gated
//!
//! Stage outputs go through the song's [`CheckpointStore`], so an interrupted
//! run picks up where it stopped.

use crate::backend::ModelLoader;
use crate::cache::ModelCache;
use crate::catalog::{ModelCatalog, ModelDescriptor, StemKind};
use crate::checkpoint::{CheckpointStore, Stage};
use crate::config::SeparationConfig;
use crate::demix::Demixer;
use crate::error::{AiError, AiResult};
use crate::extract::{Extractor, Purpose};
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use stemsplit_core::{CancelToken, StereoBuffer};
use stemsplit_dsp::{make_ensemble, normalize, pass_filter, silence_gate, EnsembleAlgorithm, FilterKind};
use stemsplit_media::{is_supported_input, read_audio};
use tracing::{error, info, warn};

/// Gate applied to each vocal extract.
pub const VOCAL_GATE_DB: f32 = -50.0;
/// Gate applied to each filter result.
pub const FILTER_GATE_DB: f32 = -45.0;
/// Gate applied to the final music.
pub const MUSIC_GATE_DB: f32 = -61.0;
/// Highpass of the final vocals.
pub const VOCAL_HIGHPASS_HZ: f64 = 85.0;
/// Highpass of the instrumental extracts before the music repair.
pub const MUSIC_HIGHPASS_HZ: f64 = 30.0;

/// The two final stems of a song.
#[derive(Debug, Clone)]
pub struct Stems {
    pub vocals: StereoBuffer,
    pub music: StereoBuffer,
}

/// Totals of a multi-file run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Elapsed time as `MM:SS`.
    pub fn elapsed_mmss(&self) -> String {
        let secs = self.elapsed.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// Expand files and directories into the list of songs to process.
///
/// Directories contribute their supported audio files in name order. Missing
/// paths and unsupported files are skipped with a warning.
pub fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = match std::fs::read_dir(path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot list input directory");
                    continue;
                }
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_input(p))
                .collect();
            found.sort();
            files.extend(found);
        } else if !path.is_file() {
            warn!(path = %path.display(), "input not found, skipping");
        } else if !is_supported_input(path) {
            warn!(path = %path.display(), "unsupported input format, skipping");
        } else {
            files.push(path.clone());
        }
    }
    files
}

/// Runs the whole pipeline with one set of models.
pub struct Separator {
    config: SeparationConfig,
    instrumental: Vec<ModelDescriptor>,
    vocals: Vec<ModelDescriptor>,
    filters: Vec<ModelDescriptor>,
    cache: ModelCache,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
}

impl Separator {
    /// Resolve the configured model names against `catalog`.
    pub fn new(
        config: SeparationConfig,
        catalog: &ModelCatalog,
        loader: Box<dyn ModelLoader>,
    ) -> AiResult<Self> {
        config.validate()?;
        let instrumental = catalog.resolve(&config.process.instrumental)?;
        let vocals = catalog.resolve(&config.process.vocals)?;
        let filters = catalog.resolve(&config.process.filters)?;
        let cache = ModelCache::new(loader, config.options.resident_models);
        Ok(Self {
            config,
            instrumental,
            vocals,
            filters,
            cache,
            cancel: CancelToken::new(),
            progress: None,
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Every model this separator will run, without repeats.
    pub fn models(&self) -> Vec<&ModelDescriptor> {
        let mut models: Vec<&ModelDescriptor> = Vec::new();
        for model in self.instrumental.iter().chain(&self.vocals).chain(&self.filters) {
            if !models.iter().any(|m| m.name == model.name) {
                models.push(model);
            }
        }
        models
    }

    /// Load every model now when running resident.
    pub fn preload(&self) -> AiResult<()> {
        self.cache.preload(self.models())
    }

    /// Checkpoint store of the song called `song`.
    pub fn checkpoint_store(&self, song: &str) -> CheckpointStore {
        CheckpointStore::new(self.config.paths.output.join(song), self.config.process.output_format)
            .with_debug(self.config.bonus.debug)
            .with_reuse(self.config.bonus.reuse_checkpoints)
    }

    /// Separate every input, skipping unreadable ones.
    ///
    /// Any other failure aborts the run.
    pub fn run(&self, inputs: &[PathBuf]) -> AiResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        for file in inputs {
            match self.separate_file(file) {
                Ok(_) => summary.processed += 1,
                Err(e) if e.is_input_error() => {
                    warn!(file = %file.display(), error = %e, "skipping input");
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(file = %file.display(), error = %e, "separation aborted");
                    return Err(e);
                }
            }
        }
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Decode `path` and separate it into `<output>/<file stem>/`.
    pub fn separate_file(&self, path: &Path) -> AiResult<Stems> {
        let song = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "song".to_string());
        info!(song = %song, "separating");

        let mixture = read_audio(path).map_err(|source| AiError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            song = %song,
            samples = mixture.len(),
            secs = mixture.duration_secs(),
            "input decoded"
        );

        let store = self.checkpoint_store(&song);
        std::fs::create_dir_all(store.dir())?;
        self.separate(&mixture, &store)
    }

    /// Separate an already decoded mixture.
    pub fn separate(&self, mixture: &StereoBuffer, store: &CheckpointStore) -> AiResult<Stems> {
        let len = mixture.len();

        let mixture = if self.config.options.normalize {
            match store.load(Stage::Normalized, None)? {
                Some(audio) => audio.matched_len(len),
                None => {
                    info!("normalizing");
                    let audio = normalize(mixture);
                    store.save(Stage::Normalized, None, &audio)?;
                    audio
                }
            }
        } else {
            mixture.clone()
        };

        let mut instrumental_extracts = Vec::with_capacity(self.instrumental.len());
        for model in &self.instrumental {
            let audio = self.stage(store, Stage::MusicExtract, model, len, || {
                Ok(self
                    .extract(Purpose::Instrumental, model, &mixture)?
                    .scaled(model.compensation))
            })?;
            instrumental_extracts.push(audio);
        }

        let mut vocals = {
            let mut extracts = Vec::with_capacity(self.vocals.len());
            for model in &self.vocals {
                let audio = self.stage(store, Stage::VocalExtract, model, len, || {
                    let audio = self
                        .extract(Purpose::Vocals, model, &mixture)?
                        .scaled(model.compensation);
                    Ok(silence_gate(&audio, VOCAL_GATE_DB))
                })?;
                extracts.push(audio);
            }
            info!(models = extracts.len(), "ensembling vocals");
            make_ensemble(EnsembleAlgorithm::MaxSpec, &extracts)?.matched_len(len)
        };
        store.save(Stage::EnsembleVocal, None, &vocals)?;

        if !self.filters.is_empty() {
            let mut filtered = Vec::with_capacity(self.filters.len());
            for model in &self.filters {
                let audio = self.stage(store, Stage::BleedingsInVocal, model, len, || {
                    let mut audio = self
                        .extract(Purpose::Filter, model, &vocals)?
                        .scaled(model.compensation);
                    // A vocal model returns what to keep; the bleed is the rest.
                    if model.stem != StemKind::Instrumental {
                        audio = vocals.subtract(&audio);
                    }
                    Ok(silence_gate(&audio, FILTER_GATE_DB))
                })?;
                filtered.push(audio);
            }
            info!(models = filtered.len(), "removing instrumental bleed");
            let bleed = make_ensemble(EnsembleAlgorithm::MaxSpec, &filtered)?;
            vocals = vocals.subtract(&bleed);
        }

        let vocals = pass_filter(FilterKind::Highpass, VOCAL_HIGHPASS_HZ, &vocals)?;
        store.save(Stage::VocalFinal, None, &vocals)?;

        info!("rebuilding music");
        let mut music = mixture.subtract(&vocals);
        for extract in &instrumental_extracts {
            let extract = pass_filter(FilterKind::Highpass, MUSIC_HIGHPASS_HZ, extract)?;
            music = make_ensemble(EnsembleAlgorithm::MaxSpec, &[music, extract])?.matched_len(len);
        }
        drop(instrumental_extracts);

        let music = silence_gate(&music, MUSIC_GATE_DB);
        store.save(Stage::MusicFinal, None, &music)?;
        info!(dir = %store.dir().display(), "song done");

        Ok(Stems { vocals, music })
    }

    /// Load a per-model stage artifact or compute and persist it.
    fn stage<F>(
        &self,
        store: &CheckpointStore,
        stage: Stage,
        model: &ModelDescriptor,
        len: usize,
        compute: F,
    ) -> AiResult<StereoBuffer>
    where
        F: FnOnce() -> AiResult<StereoBuffer>,
    {
        if let Some(audio) = store.load(stage, Some(&model.name))? {
            return Ok(audio.matched_len(len));
        }
        let audio = compute()?;
        store.save(stage, Some(&model.name), &audio)?;
        Ok(audio)
    }

    /// Run one model through the extractor, checking it out of the cache
    /// for the duration.
    fn extract(
        &self,
        purpose: Purpose,
        model: &ModelDescriptor,
        audio: &StereoBuffer,
    ) -> AiResult<StereoBuffer> {
        self.cancel.check()?;
        let handle = self.cache.acquire(model)?;
        let result = self.extractor().extract(purpose, handle.model(), model, audio);
        self.cache.release(handle)?;
        result
    }

    fn extractor(&self) -> Extractor {
        let mut demixer =
            Demixer::new(self.config.options.segment_size).with_cancel(self.cancel.clone());
        if let Some(progress) = &self.progress {
            demixer = demixer.with_progress(progress.clone());
        }
        Extractor::new(demixer, self.config.options.shift_counts())
            .with_single_pass(self.config.bonus.single_pass)
    }
}
