//! Model file store.
//!
//! Maps catalog rows to ONNX files inside the models directory. Fetching the
//! files is left to the operator; a missing file aborts the run.

use crate::catalog::ModelDescriptor;
use crate::error::{AiError, AiResult};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Prefixes the published model files carry but the local copies drop.
const REPO_PREFIXES: &[&str] = &["UVR-MDX-NET-", "UVR_MDXNET_"];

/// Default models directory: `<cache dir>/stemsplit/models`.
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemsplit")
        .join("models")
}

/// Local file name for a published model file.
///
/// Strips any run of the repository prefixes and `<digit>_` counters:
/// `UVR-MDX-NET-Inst_HQ_3.onnx` becomes `Inst_HQ_3.onnx`.
pub fn file_name_for(repo_file: &str) -> &str {
    let mut name = repo_file;
    loop {
        if let Some(prefix) = REPO_PREFIXES.iter().find(|p| name.starts_with(**p)) {
            name = &name[prefix.len()..];
            continue;
        }
        let mut chars = name.chars();
        if matches!((chars.next(), chars.next()), (Some(d), Some('_')) if d.is_ascii_digit()) {
            name = &name[2..];
            continue;
        }
        return name;
    }
}

/// Resolves model files on disk.
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Where `model` is expected (may not exist yet).
    pub fn model_path(&self, model: &ModelDescriptor) -> PathBuf {
        self.models_dir.join(file_name_for(&model.repo_file))
    }

    pub fn is_available(&self, model: &ModelDescriptor) -> bool {
        self.model_path(model).is_file()
    }

    /// Path of `model`, or `ModelNotFound` if the file is missing.
    pub fn ensure_model(&self, model: &ModelDescriptor) -> AiResult<PathBuf> {
        let path = self.model_path(model);
        if path.is_file() {
            debug!(model = %model.name, path = %path.display(), "model found");
            return Ok(path);
        }
        error!(model = %model.name, path = %path.display(), "model file missing");
        Err(AiError::ModelNotFound {
            model_id: model.name.clone(),
            path,
        })
    }

    /// Check a whole model list, reporting the first missing file.
    pub fn ensure_all<'a>(
        &self,
        models: impl IntoIterator<Item = &'a ModelDescriptor>,
    ) -> AiResult<()> {
        for model in models {
            self.ensure_model(model)?;
        }
        Ok(())
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }
}
