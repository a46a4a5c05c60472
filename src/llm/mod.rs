//! LLM-backed transcript correction.
//!
//! Layered from the wire up:
//! * [`generator`] — [`TextGenerator`] capability + HTTP implementation
//!   against OpenAI-compatible endpoints.
//! * [`prompt`] — deterministic prompt construction per correction level,
//!   language and dialect flag.
//! * [`corrector`] — [`ModelCorrector`], which corrects one chunk at a time
//!   and normalizes every failure into a [`ChunkResult`].

pub mod corrector;
pub mod generator;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use corrector::{ChunkCorrector, ChunkResult, CorrectionErrorKind, ModelCorrector};
pub use generator::{ApiGenerator, GenerationParams, InferenceError, TextGenerator};
pub use prompt::{PromptBuilder, TEXT_PLACEHOLDER};
