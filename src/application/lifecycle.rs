//! Model lifecycle: the single active artifact and its hot replacement.
//!
//! The slot holds an `Arc<ActiveModel>`. Readers clone the `Arc` and work
//! on that snapshot; a reload builds the replacement completely (file read,
//! integrity check, parse, validation) before taking the write lock, and
//! then swaps the pointer. A failed reload never touches the slot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::adapters::artifact::{load_artifact, parse_active, ActiveModel, IntegrityPolicy};
use crate::adapters::ModelLoadError;

/// Owner of the active model.
#[derive(Debug)]
pub struct ModelRegistry {
    active: RwLock<Arc<ActiveModel>>,
    generation: AtomicU64,
    policy: IntegrityPolicy,
}

impl ModelRegistry {
    /// Start with an already validated model.
    #[must_use]
    pub fn new(model: ActiveModel, policy: IntegrityPolicy) -> Self {
        tracing::info!(
            "Model active: fingerprint={} kind={}",
            model.fingerprint,
            model.classifier.kind()
        );
        Self {
            active: RwLock::new(Arc::new(model)),
            generation: AtomicU64::new(1),
            policy,
        }
    }

    /// Load the initial model from a file or model directory.
    ///
    /// # Errors
    /// Returns error if the artifact cannot be read, verified or validated.
    pub fn load(path: &Path, policy: IntegrityPolicy) -> Result<Self, ModelLoadError> {
        let model = load_artifact(path, &policy)?;
        Ok(Self::new(model, policy))
    }

    /// Snapshot of the active model.
    ///
    /// The slot only ever holds a complete `Arc`, so a poisoned lock still
    /// guards a valid model.
    #[must_use]
    pub fn get_active(&self) -> Arc<ActiveModel> {
        let guard = self.active.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Fingerprint of the active model.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.get_active().fingerprint.clone()
    }

    /// Number of successful loads, the initial one included.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Make `model` the active model. Returns the previous one.
    pub fn reload(&self, model: ActiveModel) -> Arc<ActiveModel> {
        let next = Arc::new(model);
        let previous = {
            let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, Arc::clone(&next))
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        tracing::info!(
            "Model reloaded: {} -> {} (generation {generation})",
            previous.fingerprint,
            next.fingerprint
        );
        previous
    }

    /// Parse artifact bytes and make them active.
    ///
    /// # Errors
    /// Returns error if the artifact is malformed; the active model is kept.
    pub fn reload_bytes(
        &self,
        bytes: &[u8],
        source: Option<PathBuf>,
    ) -> Result<Arc<ActiveModel>, ModelLoadError> {
        let model = parse_active(bytes, source).map_err(|e| self.rejected(e))?;
        Ok(self.reload(model))
    }

    /// Read, verify and parse the artifact at `path`, then make it active.
    ///
    /// # Errors
    /// Returns error if loading fails; the active model is kept.
    pub fn reload_from_path(&self, path: &Path) -> Result<Arc<ActiveModel>, ModelLoadError> {
        let model = load_artifact(path, &self.policy).map_err(|e| self.rejected(e))?;
        Ok(self.reload(model))
    }

    fn rejected(&self, err: ModelLoadError) -> ModelLoadError {
        tracing::warn!(
            "Model reload rejected, keeping {}: {err}",
            self.get_active().fingerprint
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../models/triage_model.json");

    fn registry() -> ModelRegistry {
        let model = parse_active(DEMO.as_bytes(), None).expect("Should parse demo model");
        ModelRegistry::new(model, IntegrityPolicy::default())
    }

    /// The demo artifact with a different name, hence different bytes.
    fn renamed_demo() -> Vec<u8> {
        let mut doc: serde_json::Value = serde_json::from_str(DEMO).expect("Should parse json");
        doc["name"] = serde_json::json!("triage-demo-gbt-v2");
        serde_json::to_vec(&doc).expect("Should serialize")
    }

    #[test]
    fn test_initial_generation() {
        let registry = registry();
        assert_eq!(registry.generation(), 1);
        assert_eq!(registry.fingerprint().len(), 16);
    }

    #[test]
    fn test_reload_swaps_model() {
        let registry = registry();
        let before = registry.get_active();

        let previous = registry
            .reload_bytes(&renamed_demo(), None)
            .expect("Should reload");

        assert_eq!(previous.fingerprint, before.fingerprint);
        assert_ne!(registry.fingerprint(), before.fingerprint);
        assert_eq!(registry.generation(), 2);
        // snapshots taken before the swap are unaffected
        assert_eq!(before.name.as_deref(), Some("triage-demo-gbt"));
    }

    #[test]
    fn test_malformed_reload_keeps_active_model() {
        let registry = registry();
        let before = registry.fingerprint();

        let err = registry
            .reload_bytes(b"{\"format_version\": 1", None)
            .expect_err("Should reject truncated json");
        assert!(matches!(err, ModelLoadError::Parse(_)));

        let mut doc: serde_json::Value = serde_json::from_str(DEMO).expect("Should parse json");
        doc["label_encoder"] = serde_json::json!(["High", "Low"]);
        let bytes = serde_json::to_vec(&doc).expect("Should serialize");
        assert!(registry.reload_bytes(&bytes, None).is_err());

        assert_eq!(registry.fingerprint(), before);
        assert_eq!(registry.generation(), 1);
    }

    #[test]
    fn test_reload_from_missing_path() {
        let registry = registry();
        let before = registry.fingerprint();
        let dir = tempfile::tempdir().expect("Should create temp dir");

        let err = registry
            .reload_from_path(&dir.path().join("absent.json"))
            .expect_err("Should fail");
        assert!(matches!(err, ModelLoadError::Io { .. }));
        assert_eq!(registry.fingerprint(), before);
    }

    #[test]
    fn test_reload_from_directory() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        std::fs::write(dir.path().join("triage_model.json"), renamed_demo())
            .expect("Should write artifact");

        let registry = registry();
        registry
            .reload_from_path(dir.path())
            .expect("Should reload from directory");
        assert_eq!(
            registry.get_active().name.as_deref(),
            Some("triage-demo-gbt-v2")
        );
    }
}
