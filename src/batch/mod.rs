//! Chunking and reassembly of transcripts for context-bounded correction.
//!
//! This module provides:
//! * [`split_sentences`] — lossless, locale-aware sentence segmentation.
//! * [`BatchProcessor`] — greedy sentence-aligned chunking with configurable
//!   overlap, and positional overlap removal on reassembly.
//! * [`TextChunk`] — a bounded segment handed to the corrector.
//! * [`BatchError`] — chunking error variants.

pub mod chunker;
pub mod sentence;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use chunker::{estimate_tokens, BatchError, BatchProcessor, TextChunk, PROMPT_RESERVED_TOKENS};
pub use sentence::split_sentences;
