//! Run state machine of the correction orchestrator.
//!
//! [`RunState`] names the phase a correction run is in.  The orchestrator
//! walks it strictly forward; every run ends in one of the three terminal
//! states.
//!
//! ```text
//! Idle ──▶ Validating ──▶ ModelSwapping ──▶ Chunking ──▶ Correcting{·}
//!              │                │                              │
//!              │                │                              ▼
//!              │                │                         Reassembling ──▶ Completed
//!              │                └──resource error──▶ SkippedFallback
//!              └──disabled / empty / invalid──────▶ SkippedFallback
//! internal invariant violation ───────────────────▶ Failed
//! ```

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Phase of a correction run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// No run in progress.
    Idle,

    /// Checking config and input before touching any model.
    Validating,

    /// Releasing the speech engine and loading the corrector.
    ModelSwapping,

    /// Splitting the transcript into budget-bounded chunks.
    Chunking,

    /// Correcting chunks; `done` of `total` are finished.
    Correcting { done: usize, total: usize },

    /// Stitching per-chunk results back together.
    Reassembling,

    /// The run finished; the result may still be degraded.
    Completed,

    /// An internal invariant was violated.  The result still carries the
    /// original text.
    Failed,

    /// Correction was skipped entirely; the original text passes through.
    SkippedFallback,
}

impl RunState {
    /// A short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Validating => "Validating",
            RunState::ModelSwapping => "Swapping models",
            RunState::Chunking => "Chunking",
            RunState::Correcting { .. } => "Correcting",
            RunState::Reassembling => "Reassembling",
            RunState::Completed => "Done",
            RunState::Failed => "Failed",
            RunState::SkippedFallback => "Skipped",
        }
    }

    /// `true` for the states a run can end in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::SkippedFallback
        )
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
