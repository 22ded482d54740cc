//! StemSplit AI - Model orchestration
//!
//! Drives pretrained MDX separation networks and combines their outputs:
//! - `catalog`: model descriptor table
//! - `model_manager`: locating model files on disk
//! - `cache`: loaded models, resident or per extraction
//! - `demix`: chunked, shifted inference over whole waveforms
//! - `extract`: double-pass noise cancellation and bandwidth extension
//! - `mdx` / `session`: ONNX Runtime backend (feature `onnx`)
//! - `checkpoint` / `pipeline`: the staged song separation

pub mod backend;
pub mod cache;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod demix;
pub mod error;
pub mod extract;
pub mod mdx;
pub mod model_manager;
pub mod pipeline;
pub mod progress;
pub mod session;

pub use backend::{ModelLoader, SeparationModel};
pub use catalog::{ModelCatalog, ModelDescriptor, StemKind};
pub use checkpoint::{CheckpointStore, Stage};
pub use config::SeparationConfig;
pub use error::{AiError, AiResult};
pub use extract::Purpose;
pub use model_manager::ModelStore;
pub use pipeline::{collect_inputs, RunSummary, Separator, Stems};
pub use progress::{ExtractionProgress, ProgressCallback};

#[cfg(feature = "onnx")]
pub use mdx::OnnxModelLoader;
