//! Loaded-model cache.
//!
//! In resident mode every model stays loaded until the cache is dropped,
//! which pays the load cost once per run instead of once per song.
//! Otherwise a model lives from `acquire` to `release`.

use crate::backend::{ModelLoader, SeparationModel};
use crate::catalog::ModelDescriptor;
use crate::error::{AiError, AiResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A model checked out of the cache.
#[derive(Clone)]
pub struct ModelHandle {
    name: String,
    model: Arc<dyn SeparationModel>,
}

impl ModelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &dyn SeparationModel {
        self.model.as_ref()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle").field("name", &self.name).finish()
    }
}

/// Owns the loaded models, keyed by catalog name.
pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    resident: bool,
    loaded: Mutex<HashMap<String, Arc<dyn SeparationModel>>>,
}

impl ModelCache {
    pub fn new(loader: Box<dyn ModelLoader>, resident: bool) -> Self {
        Self {
            loader,
            resident,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }

    /// Check out `model`, loading it if needed.
    pub fn acquire(&self, model: &ModelDescriptor) -> AiResult<ModelHandle> {
        if let Some(loaded) = self.loaded.lock().get(&model.name) {
            return Ok(ModelHandle {
                name: model.name.clone(),
                model: Arc::clone(loaded),
            });
        }

        info!(model = %model.name, "loading model");
        let loaded = self.loader.load(model)?;
        self.loaded
            .lock()
            .insert(model.name.clone(), Arc::clone(&loaded));
        Ok(ModelHandle {
            name: model.name.clone(),
            model: loaded,
        })
    }

    /// Return a handle. The model is unloaded unless the cache is resident.
    pub fn release(&self, handle: ModelHandle) -> AiResult<()> {
        let mut loaded = self.loaded.lock();
        if !loaded.contains_key(&handle.name) {
            return Err(AiError::ModelNotLoaded(handle.name));
        }
        if !self.resident {
            loaded.remove(&handle.name);
            debug!(model = %handle.name, "model released");
        }
        Ok(())
    }

    /// Load every model up front. Does nothing outside resident mode.
    pub fn preload<'a>(
        &self,
        models: impl IntoIterator<Item = &'a ModelDescriptor>,
    ) -> AiResult<()> {
        if !self.resident {
            return Ok(());
        }
        for model in models {
            self.acquire(model)?;
        }
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().contains_key(name)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::IdentityModel;
    use crate::catalog::StemKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader(Arc<AtomicUsize>);

    impl ModelLoader for CountingLoader {
        fn load(&self, _model: &ModelDescriptor) -> AiResult<Arc<dyn SeparationModel>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(IdentityModel))
        }
    }

    fn descriptor(name: &str) -> ModelDescriptor {
        ModelDescriptor {
            name: name.into(),
            repo_file: format!("{name}.onnx"),
            stem: StemKind::Vocals,
            cutoff: 0,
            n_fft: 1024,
            dim_f: 256,
            dim_t: 5,
            compensation: 1.0,
        }
    }

    fn cache(resident: bool) -> (ModelCache, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(Box::new(CountingLoader(Arc::clone(&loads))), resident);
        (cache, loads)
    }

    #[test]
    fn test_transient_mode_reloads() {
        let (cache, loads) = cache(false);
        let model = descriptor("A");

        let handle = cache.acquire(&model).unwrap();
        assert!(cache.is_loaded("A"));
        cache.release(handle).unwrap();
        assert!(!cache.is_loaded("A"));

        let handle = cache.acquire(&model).unwrap();
        cache.release(handle).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resident_mode_loads_once() {
        let (cache, loads) = cache(true);
        let models = [descriptor("A"), descriptor("B")];
        cache.preload(&models).unwrap();
        assert_eq!(cache.loaded_count(), 2);

        for _ in 0..3 {
            let handle = cache.acquire(&models[0]).unwrap();
            assert_eq!(handle.name(), "A");
            cache.release(handle).unwrap();
        }
        assert!(cache.is_loaded("A"));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preload_skipped_when_transient() {
        let (cache, loads) = cache(false);
        cache.preload(&[descriptor("A")]).unwrap();
        assert_eq!(cache.loaded_count(), 0);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_double_release_is_error() {
        let (cache, _) = cache(false);
        let handle = cache.acquire(&descriptor("A")).unwrap();
        cache.release(handle.clone()).unwrap();
        assert!(matches!(cache.release(handle), Err(AiError::ModelNotLoaded(_))));
    }
}
