//! Correction run orchestration.
//!
//! This module wires the full swap → chunk → correct → reassemble run and
//! exposes the lifecycle events external consumers subscribe to.
//!
//! # Architecture
//!
//! ```text
//! CorrectionRequest
//!        │
//!        ▼
//! CorrectionOrchestrator::run()        ← async tokio task
//!        │
//!        ├─ ResourceManager::swap       speech engine ⇄ corrector
//!        ├─ BatchProcessor::chunk       sentence-aligned, budget-bounded
//!        ├─ ChunkCorrector::correct     per chunk, sequential or pooled
//!        └─ BatchProcessor::reassemble  positional overlap removal
//!        │
//!        ▼
//! CorrectionResult                      ← always usable, worst case original
//!
//! Notifier::emit(CorrectionEvent)       ← injected sink, fired in between
//! ```
//!
//! Every failure is absorbed: resource errors skip the run, chunk failures
//! fall back per chunk, and cancellation degrades the remainder.  Callers
//! never handle an `Err` from [`CorrectionOrchestrator::run`].

pub mod events;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use events::{CorrectionEvent, LogNotifier, Notifier, NullNotifier};
pub use runner::{
    CancelHandle, CorrectionOrchestrator, CorrectionRequest, CorrectionResult,
};
pub use state::RunState;
