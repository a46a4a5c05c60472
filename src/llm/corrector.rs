//! Per-chunk correction driver.
//!
//! [`ModelCorrector`] turns one [`TextChunk`] into a [`ChunkResult`] using
//! the loaded corrector model behind a [`TextGenerator`].  It never returns
//! an error: timeouts, transport failures and malformed output are all
//! normalized into a failed `ChunkResult` carrying the best-effort text, so
//! a single bad chunk can never abort the surrounding run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::batch::{estimate_tokens, TextChunk};
use crate::config::{CorrectionLevel, CorrectorConfig};

use super::generator::{GenerationParams, InferenceError, TextGenerator};
use super::prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// CorrectionErrorKind
// ---------------------------------------------------------------------------

/// Typed error kinds surfaced in chunk diagnostics and lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionErrorKind {
    /// The corrector model artifact was not found.
    ModelNotFound,
    /// Available memory was below the configured floor.
    InsufficientMemory,
    /// The model artifact exists but could not be loaded.
    ModelLoad,
    /// Sentence segmentation / chunking failed.
    Chunking,
    /// The inference call failed or produced malformed output.
    Inference,
}

// ---------------------------------------------------------------------------
// ChunkResult
// ---------------------------------------------------------------------------

/// Outcome of correcting a single chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    /// `sequence_index` of the chunk this result belongs to.
    pub chunk_index: usize,
    /// Corrected text on success; best-effort partial output or the original
    /// chunk content on failure.
    pub corrected_text: String,
    /// Whether the correction succeeded.
    pub succeeded: bool,
    /// Populated when `succeeded == false` and a cause is known.
    pub error: Option<CorrectionErrorKind>,
    /// `true` when the original chunk text was substituted for model output.
    pub used_fallback: bool,
}

impl ChunkResult {
    /// A failed result that falls back to the original chunk content.
    pub fn fallback(chunk: &TextChunk, error: Option<CorrectionErrorKind>) -> Self {
        Self {
            chunk_index: chunk.sequence_index,
            corrected_text: chunk.content.clone(),
            succeeded: false,
            error,
            used_fallback: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkCorrector trait
// ---------------------------------------------------------------------------

/// Async trait for chunk-level correction.
///
/// The orchestrator holds `Arc<dyn ChunkCorrector>` so tests can substitute
/// scripted correctors.  Implementations never return `Err` — failures are
/// part of the [`ChunkResult`].
#[async_trait]
pub trait ChunkCorrector: Send + Sync {
    async fn correct(
        &self,
        chunk: &TextChunk,
        level: CorrectionLevel,
        dialect_normalization: bool,
    ) -> ChunkResult;
}

// ---------------------------------------------------------------------------
// ModelCorrector
// ---------------------------------------------------------------------------

/// Drives the loaded corrector model for one chunk at a time.
///
/// Stateless across calls; safe to share behind an `Arc` and to call from a
/// bounded worker pool.
pub struct ModelCorrector {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    context_length: u32,
    temperature: f32,
    seed: Option<u64>,
    timeout: Duration,
    min_output_ratio: f32,
}

impl ModelCorrector {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        language: &str,
        config: &CorrectorConfig,
    ) -> Self {
        Self {
            generator,
            prompts: PromptBuilder::new(language),
            context_length: config.context_length,
            temperature: config.temperature,
            seed: config.seed,
            timeout: Duration::from_secs(config.timeout_secs),
            min_output_ratio: config.min_output_ratio,
        }
    }
}

#[async_trait]
impl ChunkCorrector for ModelCorrector {
    /// Correct one chunk; failures are normalized into the result.
    async fn correct(
        &self,
        chunk: &TextChunk,
        level: CorrectionLevel,
        dialect_normalization: bool,
    ) -> ChunkResult {
        // Defensive backstop: the chunker guarantees chunks fit the window,
        // except for single oversized sentences.  Truncate rather than send
        // a prompt the model cannot hold.
        let (system, user) = self
            .prompts
            .build_chat(&chunk.content, level, dialect_normalization);
        let input_tokens = estimate_tokens(&system) + estimate_tokens(&user);
        let output_tokens = estimate_tokens(&chunk.content);

        let (system, user, content_len) = if input_tokens + output_tokens > self.context_length {
            log::warn!(
                "corrector: chunk {} violates the token budget \
                 ({input_tokens} + {output_tokens} > {}) — truncating defensively",
                chunk.sequence_index,
                self.context_length
            );
            let prompt_overhead = input_tokens - output_tokens;
            let keep_tokens = (self.context_length / 2).saturating_sub(prompt_overhead);
            let truncated = truncate_to_tokens(&chunk.content, keep_tokens);
            let len = truncated.len();
            let (system, user) = self.prompts.build_chat(truncated, level, dialect_normalization);
            (system, user, len)
        } else {
            (system, user, chunk.content.len())
        };

        let params = GenerationParams {
            max_tokens: (output_tokens * 2).clamp(64, self.context_length),
            temperature: self.temperature,
            seed: self.seed,
        };

        let outcome = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&system, &user, &params),
        )
        .await;

        let generated = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!(
                    "corrector: chunk {} inference failed: {e}",
                    chunk.sequence_index
                );
                return ChunkResult::fallback(chunk, Some(CorrectionErrorKind::Inference));
            }
            Err(_) => {
                log::warn!("corrector: chunk {} timed out", chunk.sequence_index);
                return ChunkResult::fallback(chunk, Some(CorrectionErrorKind::Inference));
            }
        };

        // Output validation: empty or drastically shorter than the input is
        // treated as a failure, keeping the output as a partial result.
        let trimmed = generated.trim();
        if trimmed.is_empty() {
            return ChunkResult::fallback(chunk, Some(CorrectionErrorKind::Inference));
        }
        let min_len = (content_len as f32 * self.min_output_ratio) as usize;
        if trimmed.len() < min_len {
            log::warn!(
                "corrector: chunk {} output suspiciously short ({} < {min_len} bytes) — \
                 keeping partial result",
                chunk.sequence_index,
                trimmed.len()
            );
            return ChunkResult {
                chunk_index: chunk.sequence_index,
                corrected_text: trimmed.to_string(),
                succeeded: false,
                error: Some(CorrectionErrorKind::Inference),
                used_fallback: false,
            };
        }

        ChunkResult {
            chunk_index: chunk.sequence_index,
            corrected_text: trimmed.to_string(),
            succeeded: true,
            error: None,
            used_fallback: false,
        }
    }
}

/// Truncate `text` to roughly `max_tokens`, respecting char boundaries.
fn truncate_to_tokens(text: &str, max_tokens: u32) -> &str {
    let mut limit = (max_tokens as usize).saturating_mul(4).min(text.len());
    while limit > 0 && !text.is_char_boundary(limit) {
        limit -= 1;
    }
    &text[..limit]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
