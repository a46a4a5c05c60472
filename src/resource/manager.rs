//! The shared heavy-model slot.
//!
//! A single machine hosts two mutually exclusive heavy models: the speech
//! engine and the corrector.  [`ResourceManager`] serialises access to the
//! one model slot and enforces a memory floor before any load.
//!
//! # Slot state machine
//!
//! ```text
//! Unloaded ──acquire──▶ Loading ──ok──▶ Loaded
//!                          │
//!                          └──err──▶ Unloaded   (rollback)
//! Loaded ──release──▶ Unloading ──▶ Unloaded    (forced even on unload error)
//! ```
//!
//! Mutual exclusivity is enforced by ownership: a [`ModelHandle`] carries the
//! slot's single fair-semaphore permit, so a second handle cannot exist until
//! the first is released.  Queued `acquire` calls are served in FIFO order by
//! tokio's fair semaphore.  [`ResourceManager::status`] reads a mirror of the
//! slot state and never touches the queue.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::backend::ModelBackend;
use super::memory::MemoryProbe;

// ---------------------------------------------------------------------------
// ResourceError
// ---------------------------------------------------------------------------

/// Errors from acquiring or loading a heavy model.
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// The model artifact was not found on disk.
    #[error("model artifact not found: {0}")]
    ModelNotFound(String),

    /// Available memory is below the configured floor.
    #[error("insufficient memory: {available_gb:.1} GB available, {threshold_gb:.1} GB required")]
    InsufficientMemory {
        available_gb: f64,
        threshold_gb: f64,
    },

    /// The artifact exists but the load itself failed.
    #[error("model load failed: {0}")]
    ModelLoad(String),
}

// ---------------------------------------------------------------------------
// ModelKind / SlotState
// ---------------------------------------------------------------------------

/// The two rival consumers of the heavy-model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// The external speech-recognition engine.
    SpeechEngine,
    /// The LLM text-correction model.
    Corrector,
}

/// Lifecycle phase of the model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

// ---------------------------------------------------------------------------
// ModelHandle
// ---------------------------------------------------------------------------

/// Exclusive capability for the currently loaded model.
///
/// Holding a `ModelHandle` *is* holding the slot: the handle owns the single
/// semaphore permit, so at most one handle exists at any time.  Hand it back
/// via [`ResourceManager::release`] or [`ResourceManager::swap`].
pub struct ModelHandle {
    kind: ModelKind,
    estimated_memory_gb: f64,
    _permit: OwnedSemaphorePermit,
}

impl ModelHandle {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn estimated_memory_gb(&self) -> f64 {
        self.estimated_memory_gb
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.kind)
            .field("estimated_memory_gb", &self.estimated_memory_gb)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ResourceBudget
// ---------------------------------------------------------------------------

/// Read-only snapshot of the slot and the memory budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBudget {
    /// Available memory in GB at the time of the snapshot.
    pub available_memory_gb: f64,
    /// Configured memory floor in GB.
    pub threshold_gb: f64,
    /// Current slot state.
    pub state: SlotState,
    /// Kind occupying the slot, `None` when `Unloaded`.
    pub current: Option<ModelKind>,
    /// Estimated resident size of the occupying model, 0.0 when `Unloaded`.
    pub estimated_memory_gb: f64,
}

// ---------------------------------------------------------------------------
// ResourceManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: SlotState,
    kind: Option<ModelKind>,
    estimated_memory_gb: f64,
}

impl Slot {
    const EMPTY: Slot = Slot {
        state: SlotState::Unloaded,
        kind: None,
        estimated_memory_gb: 0.0,
    };
}

/// Coordinator of the single shared heavy-model slot.
///
/// Explicitly constructed and injected into the orchestrator — never a
/// process-global — so tests can substitute the probe and backend.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use transcript_correct::config::AppConfig;
/// use transcript_correct::resource::{
///     ArtifactBackend, ModelKind, ResourceManager, SystemMemoryProbe,
/// };
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let manager = ResourceManager::new(
///     Arc::new(ArtifactBackend::from_config(&config)),
///     Arc::new(SystemMemoryProbe::new()),
///     config.resources.memory_threshold_gb,
/// );
///
/// let handle = manager.acquire(ModelKind::Corrector).await.unwrap();
/// manager.release(handle).await;
/// # }
/// ```
pub struct ResourceManager {
    semaphore: Arc<Semaphore>,
    slot: Mutex<Slot>,
    backend: Arc<dyn ModelBackend>,
    probe: Arc<dyn MemoryProbe>,
    threshold_gb: f64,
}

impl ResourceManager {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        probe: Arc<dyn MemoryProbe>,
        threshold_gb: f64,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            slot: Mutex::new(Slot::EMPTY),
            backend,
            probe,
            threshold_gb,
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Block (FIFO-ordered) until the slot is free, then load `kind`.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::InsufficientMemory`] — the memory floor check
    ///   failed; no state was mutated.
    /// - [`ResourceError::ModelNotFound`] / [`ResourceError::ModelLoad`] —
    ///   the load failed; the slot was rolled back to `Unloaded`.
    pub async fn acquire(&self, kind: ModelKind) -> Result<ModelHandle, ResourceError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ResourceError::ModelLoad("model slot closed".into()))?;

        // Memory floor check happens before any state mutation; on failure
        // the permit drops here and the slot stays untouched.
        let available_gb = self.probe.available_gb();
        if available_gb < self.threshold_gb {
            return Err(ResourceError::InsufficientMemory {
                available_gb,
                threshold_gb: self.threshold_gb,
            });
        }

        let estimated_memory_gb = self.backend.memory_estimate_gb(kind);
        self.set_slot(Slot {
            state: SlotState::Loading,
            kind: Some(kind),
            estimated_memory_gb,
        });

        match self.backend.load(kind).await {
            Ok(()) => {
                self.set_slot(Slot {
                    state: SlotState::Loaded,
                    kind: Some(kind),
                    estimated_memory_gb,
                });
                log::debug!("resource: {kind:?} loaded ({estimated_memory_gb:.1} GB est.)");
                Ok(ModelHandle {
                    kind,
                    estimated_memory_gb,
                    _permit: permit,
                })
            }
            Err(e) => {
                self.set_slot(Slot::EMPTY);
                log::warn!("resource: loading {kind:?} failed: {e}");
                Err(e)
            }
        }
    }

    /// Unload the model behind `handle` and free the slot.
    ///
    /// Always succeeds: a failing unload is logged and the slot is forced to
    /// `Unloaded` anyway — availability wins over a stuck `Unloading` state.
    pub async fn release(&self, handle: ModelHandle) {
        let kind = handle.kind;
        self.set_slot(Slot {
            state: SlotState::Unloading,
            kind: Some(kind),
            estimated_memory_gb: handle.estimated_memory_gb,
        });

        if let Err(e) = self.backend.unload(kind).await {
            log::warn!("resource: unloading {kind:?} failed ({e}) — forcing slot free");
        }

        self.set_slot(Slot::EMPTY);
        log::debug!("resource: {kind:?} released");
        // The permit inside `handle` drops here, waking the next waiter.
        drop(handle);
    }

    /// Release `current` (if any) and acquire `to`.
    ///
    /// When the acquire fails after a successful release, the slot is left
    /// `Unloaded` — the prior model is *not* restored.  Callers must treat a
    /// failed swap as "capability currently unavailable", not as "the prior
    /// capability is still usable".
    pub async fn swap(
        &self,
        current: Option<ModelHandle>,
        to: ModelKind,
    ) -> Result<ModelHandle, ResourceError> {
        if let Some(handle) = current {
            log::debug!("resource: swapping {:?} -> {to:?}", handle.kind);
            self.release(handle).await;
        }
        self.acquire(to).await
    }

    /// Non-blocking snapshot of the slot and memory budget.
    pub fn status(&self) -> ResourceBudget {
        let slot = *self.slot.lock().unwrap_or_else(|p| p.into_inner());
        ResourceBudget {
            available_memory_gb: self.probe.available_gb(),
            threshold_gb: self.threshold_gb,
            state: slot.state,
            current: slot.kind,
            estimated_memory_gb: slot.estimated_memory_gb,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_slot(&self, slot: Slot) {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = slot;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
