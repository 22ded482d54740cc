//! StemSplit - vocal / instrumental separation
//!
//! Entry point: reads the configuration, applies command line overrides and
//! separates every input song.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use stemsplit_ai::{
    collect_inputs, ExtractionProgress, ModelCatalog, ModelLoader, ModelStore, SeparationConfig,
    Separator,
};
use stemsplit_media::OutputFormat;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "stemsplit", version, about = "Separate songs into vocal and music stems")]
struct Cli {
    /// Songs or folders of songs. Overrides the configured input.
    inputs: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output root; each song gets its own folder
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: PCM_16, FLOAT, FLAC or MP3
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Folder holding the ONNX model files
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Model table replacing the built-in one
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Normalize the mixture to -1 dBFS first
    #[arg(long)]
    normalize: bool,

    /// Write every intermediate stage
    #[arg(long)]
    debug: bool,

    /// One inference pass per model (faster, noisier)
    #[arg(long)]
    single_pass: bool,

    /// Reuse every stage already on disk, not only the mandatory ones
    #[arg(long)]
    reuse_checkpoints: bool,
}

impl Cli {
    fn apply(&self, config: &mut SeparationConfig) {
        if !self.inputs.is_empty() {
            config.paths.input = self.inputs.clone();
        }
        if let Some(output) = &self.output {
            config.paths.output = output.clone();
        }
        if let Some(format) = self.format {
            config.process.output_format = format;
        }
        if let Some(dir) = &self.models_dir {
            config.paths.models_dir = dir.clone();
        }
        if let Some(catalog) = &self.catalog {
            config.paths.catalog = Some(catalog.clone());
        }
        config.options.normalize |= self.normalize;
        config.bonus.debug |= self.debug;
        config.bonus.single_pass |= self.single_pass;
        config.bonus.reuse_checkpoints |= self.reuse_checkpoints;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => SeparationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SeparationConfig::default(),
    };
    cli.apply(&mut config);

    let catalog = match &config.paths.catalog {
        Some(path) => ModelCatalog::load(path)
            .with_context(|| format!("loading model catalog {}", path.display()))?,
        None => ModelCatalog::builtin()?,
    };

    let inputs = collect_inputs(&config.paths.input);
    if inputs.is_empty() {
        warn!("no input songs found");
        return Ok(());
    }
    info!(songs = inputs.len(), format = %config.process.output_format, "StemSplit starting");

    let store = ModelStore::new(&config.paths.models_dir);
    let loader = model_loader(store.clone())?;
    let separator = Separator::new(config, &catalog, loader)?.with_progress(Arc::new(
        |p: &ExtractionProgress| {
            debug!(
                model = %p.model,
                shift = p.shift + 1,
                shifts = p.shifts,
                percent = (p.fraction() * 100.0).round(),
                "progress"
            );
        },
    ));

    store.ensure_all(separator.models())?;
    separator.preload()?;

    let summary = separator.run(&inputs)?;
    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        elapsed = %summary.elapsed_mmss(),
        "all songs done"
    );
    Ok(())
}

#[cfg(feature = "onnx")]
fn model_loader(store: ModelStore) -> Result<Box<dyn ModelLoader>> {
    Ok(Box::new(stemsplit_ai::OnnxModelLoader::new(store)))
}

#[cfg(not(feature = "onnx"))]
fn model_loader(_store: ModelStore) -> Result<Box<dyn ModelLoader>> {
    anyhow::bail!("built without the `onnx` feature: no inference backend available")
}
