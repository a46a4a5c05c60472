//! Heavy-model resource management.
//!
//! This module provides:
//! * [`ResourceManager`] — serialises access to the single heavy-model slot.
//! * [`ModelHandle`] — exclusive capability for the loaded model.
//! * [`ModelBackend`] / [`ArtifactBackend`] — model load/unload seam.
//! * [`MemoryProbe`] / [`SystemMemoryProbe`] — free-memory polling seam.
//! * [`ResourceError`] — error variants for slot operations.
//!
//! At most one model is `Loaded` system-wide; the speech engine and the
//! corrector compete for the same memory budget and must be swapped, never
//! co-resident.

pub mod backend;
pub mod manager;
pub mod memory;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{ArtifactBackend, ModelBackend};
pub use manager::{
    ModelHandle, ModelKind, ResourceBudget, ResourceError, ResourceManager, SlotState,
};
pub use memory::{MemoryProbe, SystemMemoryProbe};
