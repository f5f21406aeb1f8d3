//! Lazily loaded, shared model instances

use super::{Model, ModelEvaluator};
use crate::error::{RescoreError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

type ModelSlot = Arc<RwLock<Option<Arc<dyn Model>>>>;

/// Owns the models used for rescoring.
///
/// Each model is loaded at most once, on first use. Concurrent first
/// callers for the same identifier wait on the same slot, so only one of
/// them performs the load. A failed load leaves the slot empty and the
/// next call retries it.
pub struct ModelRegistry {
    /// Deployment directory model files are resolved against
    models_dir: PathBuf,
    evaluator: Box<dyn ModelEvaluator>,
    slots: Mutex<HashMap<String, ModelSlot>>,
}

impl ModelRegistry {
    pub fn new<P: Into<PathBuf>>(models_dir: P, evaluator: Box<dyn ModelEvaluator>) -> Self {
        Self {
            models_dir: models_dir.into(),
            evaluator,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn models_dir(&self) -> &std::path::Path {
        &self.models_dir
    }

    /// Return the model named `identifier`, loading it on first use.
    pub fn ensure_loaded(&self, identifier: &str) -> Result<Arc<dyn Model>> {
        let slot = self.slot(identifier);

        if let Some(model) = slot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(model));
        }

        let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished the load while we waited.
        if let Some(model) = guard.as_ref() {
            debug!(model = %identifier, "Model loaded by a concurrent caller");
            return Ok(Arc::clone(model));
        }

        let path = self.models_dir.join(identifier);
        info!(model = %identifier, path = %path.display(), "Loading model");

        match self.evaluator.load(&path) {
            Ok(model) => {
                info!(
                    model = %identifier,
                    input_arity = model.input_arity(),
                    output_arity = model.output_arity(),
                    "Model registered"
                );
                *guard = Some(Arc::clone(&model));
                Ok(model)
            }
            Err(source) => {
                warn!(model = %identifier, error = %source, "Failed to load model, will retry on next request");
                Err(RescoreError::ModelLoad {
                    identifier: identifier.to_string(),
                    source,
                })
            }
        }
    }

    /// Whether `identifier` has been loaded successfully
    pub fn is_loaded(&self, identifier: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(identifier).is_some_and(|slot| {
            slot.read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    /// Names of all successfully loaded models
    pub fn loaded_models(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| {
                slot.read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Slot for `identifier`, created on first request and never removed.
    ///
    /// The map holds one entry per identifier ever asked for, failed ones
    /// included, so it is bounded by the set of configured model names.
    /// `is_loaded` and `loaded_models` skip empty slots.
    fn slot(&self, identifier: &str) -> ModelSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(identifier.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinearEvaluator, LinearModel};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Evaluator that counts load attempts and can be told to fail.
    struct CountingEvaluator {
        loads: Arc<AtomicUsize>,
        fail_first: usize,
        delay: Duration,
    }

    impl ModelEvaluator for CountingEvaluator {
        fn load(&self, _path: &Path) -> anyhow::Result<Arc<dyn Model>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if attempt < self.fail_first {
                anyhow::bail!("transient storage error");
            }
            Ok(Arc::new(LinearModel::new(vec![1.0, 1.0], 0.0)))
        }
    }

    fn counting_registry(fail_first: usize, delay: Duration) -> (ModelRegistry, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let evaluator = CountingEvaluator {
            loads: Arc::clone(&loads),
            fail_first,
            delay,
        };
        (ModelRegistry::new("models", Box::new(evaluator)), loads)
    }

    #[test]
    fn test_loads_once_and_shares_instance() {
        let (registry, loads) = counting_registry(0, Duration::ZERO);

        let first = registry.ensure_loaded("lr.json").unwrap();
        let second = registry.ensure_loaded("lr.json").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded("lr.json"));
        assert_eq!(registry.loaded_models(), vec!["lr.json".to_string()]);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let (registry, loads) = counting_registry(1, Duration::ZERO);

        let err = match registry.ensure_loaded("lr.json") {
            Err(err) => err,
            Ok(_) => panic!("first load should fail"),
        };
        assert!(matches!(err, RescoreError::ModelLoad { ref identifier, .. } if identifier == "lr.json"));
        assert!(!registry.is_loaded("lr.json"));
        assert!(registry.loaded_models().is_empty());

        assert!(registry.ensure_loaded("lr.json").is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(registry.loaded_models(), vec!["lr.json".to_string()]);
    }

    #[test]
    fn test_concurrent_first_callers_load_once() {
        let (registry, loads) = counting_registry(0, Duration::from_millis(50));
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.ensure_loaded("lr.json").map(|_| ()).is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_file_reports_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path(), Box::new(LinearEvaluator));

        let err = match registry.ensure_loaded("absent.json") {
            Err(err) => err,
            Ok(_) => panic!("load should fail"),
        };
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_resolves_relative_to_models_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lr.json"),
            r#"{"inputs": ["a", "b"], "weights": [1.0, 1.0]}"#,
        )
        .unwrap();

        let registry = ModelRegistry::new(dir.path(), Box::new(LinearEvaluator));
        let model = registry.ensure_loaded("lr.json").unwrap();
        assert_eq!(model.infer(&[0.2, 0.3]).unwrap(), 0.5);
    }
}
