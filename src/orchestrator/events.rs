//! Lifecycle events and the notifier seam.
//!
//! The orchestrator emits [`CorrectionEvent`]s through an injected
//! [`Notifier`] instead of talking to any UI or transport directly.  Events
//! serialize with stable snake_case names so external consumers can match on
//! them.

use serde::Serialize;

use crate::llm::CorrectionErrorKind;

// ---------------------------------------------------------------------------
// CorrectionEvent
// ---------------------------------------------------------------------------

/// Lifecycle events of one correction run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CorrectionEvent {
    /// The run passed validation and started.
    CorrectionStarted,

    /// One chunk finished (successfully or not).
    CorrectionProgress {
        chunk_index: usize,
        chunk_total: usize,
    },

    /// The run produced a final result.
    CorrectionCompleted { degraded: bool, duration_ms: u64 },

    /// A run-level error occurred; `fallback_action` names what the
    /// orchestrator did instead of failing.
    CorrectionError {
        kind: CorrectionErrorKind,
        fallback_action: String,
    },
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Event sink injected into the orchestrator.
///
/// Implementations must be cheap and non-blocking; the orchestrator calls
/// `emit` inline between state transitions.
pub trait Notifier: Send + Sync {
    fn emit(&self, event: CorrectionEvent);
}

/// Notifier that logs each event via the `log` facade.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, event: CorrectionEvent) {
        match &event {
            CorrectionEvent::CorrectionError { kind, fallback_action } => {
                log::warn!("correction error: {kind:?} — {fallback_action}");
            }
            other => log::info!("correction event: {other:?}"),
        }
    }
}

/// Notifier that discards every event.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn emit(&self, _event: CorrectionEvent) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
