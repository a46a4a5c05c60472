//! Model load/unload backend for the heavy-model slot.
//!
//! [`ModelBackend`] is the seam between the
//! [`ResourceManager`](crate::resource::ResourceManager)'s state machine and
//! whatever actually materialises a model in memory.  [`ArtifactBackend`] is
//! the production implementation: it verifies the model artifact exists on
//! disk before declaring the load successful (the inference server maps the
//! artifact lazily on first request, so a missing file is the load failure
//! that matters at this layer).

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::AppConfig;

use super::manager::{ModelKind, ResourceError};

// ---------------------------------------------------------------------------
// ModelBackend trait
// ---------------------------------------------------------------------------

/// Loads and unloads heavy models on behalf of the resource manager.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn ModelBackend>`.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Materialise the model of the given kind.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::ModelNotFound`] — the model artifact is missing.
    /// - [`ResourceError::ModelLoad`] — the artifact exists but loading failed.
    async fn load(&self, kind: ModelKind) -> Result<(), ResourceError>;

    /// Tear the model down and free its memory.
    async fn unload(&self, kind: ModelKind) -> Result<(), ResourceError>;

    /// Estimated resident size of the model in gigabytes.
    fn memory_estimate_gb(&self, kind: ModelKind) -> f64;
}

// ---------------------------------------------------------------------------
// ArtifactBackend
// ---------------------------------------------------------------------------

/// Production backend keyed on on-disk model artifacts.
///
/// The corrector artifact path is mandatory; the speech engine is an external
/// collaborator, so its path is optional — when absent, loading the speech
/// engine is a no-op handled entirely by the embedding pipeline.
pub struct ArtifactBackend {
    corrector_path: PathBuf,
    speech_path: Option<PathBuf>,
    corrector_gb: f64,
    speech_gb: f64,
}

impl ArtifactBackend {
    pub fn new(
        corrector_path: impl Into<PathBuf>,
        speech_path: Option<PathBuf>,
        corrector_gb: f64,
        speech_gb: f64,
    ) -> Self {
        Self {
            corrector_path: corrector_path.into(),
            speech_path,
            corrector_gb,
            speech_gb,
        }
    }

    /// Build from application config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.corrector.model_path.clone(),
            None,
            config.resources.corrector_model_gb,
            config.resources.speech_model_gb,
        )
    }

    fn artifact_for(&self, kind: ModelKind) -> Option<&PathBuf> {
        match kind {
            ModelKind::Corrector => Some(&self.corrector_path),
            ModelKind::SpeechEngine => self.speech_path.as_ref(),
        }
    }
}

#[async_trait]
impl ModelBackend for ArtifactBackend {
    async fn load(&self, kind: ModelKind) -> Result<(), ResourceError> {
        if let Some(path) = self.artifact_for(kind) {
            if !path.exists() {
                return Err(ResourceError::ModelNotFound(path.display().to_string()));
            }
        }
        log::debug!("backend: {kind:?} loaded");
        Ok(())
    }

    async fn unload(&self, kind: ModelKind) -> Result<(), ResourceError> {
        log::debug!("backend: {kind:?} unloaded");
        Ok(())
    }

    fn memory_estimate_gb(&self, kind: ModelKind) -> f64 {
        match kind {
            ModelKind::Corrector => self.corrector_gb,
            ModelKind::SpeechEngine => self.speech_gb,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
