//! Chunking and reassembly for context-bounded correction.
//!
//! [`BatchProcessor::chunk`] splits a transcript into sentence-aligned chunks
//! that fit the corrector's token budget, seeding each chunk (after the
//! first) with the trailing sentences of its predecessor for cross-chunk
//! context.  [`BatchProcessor::reassemble`] undoes the overlap positionally —
//! by sentence index, never by string matching, since correction may alter
//! the wording — and stitches the per-chunk results back into one text.
//!
//! A sentence is never split across chunks.  A single sentence larger than
//! the whole budget becomes its own over-budget chunk; the corrector's
//! defensive truncation is the backstop for that case.

use thiserror::Error;

use crate::llm::ChunkResult;

use super::sentence::split_sentences;

// ---------------------------------------------------------------------------
// Token estimation
// ---------------------------------------------------------------------------

/// Token budget reserved for the system prompt, few-shot examples and
/// generation headroom.  Chunks are sized against
/// `context_length - PROMPT_RESERVED_TOKENS`.
pub const PROMPT_RESERVED_TOKENS: u32 = 512;

/// Rough token estimate: ~4 bytes of UTF-8 per token.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() as u32) / 4 + 1
}

// ---------------------------------------------------------------------------
// BatchError
// ---------------------------------------------------------------------------

/// Errors from the chunking step.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// The context window cannot hold even the reserved prompt margin.
    #[error("context_length {0} cannot hold the reserved prompt margin of {PROMPT_RESERVED_TOKENS} tokens")]
    BudgetTooSmall(u32),
}

// ---------------------------------------------------------------------------
// TextChunk
// ---------------------------------------------------------------------------

/// A bounded, sentence-aligned segment of the input text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Position of this chunk in the run, starting at 0.
    pub sequence_index: usize,
    /// The chunk text, overlap sentences included.
    pub content: String,
    /// Total sentences in `content`, overlap included.
    pub sentence_count: usize,
    /// Leading sentences repeated from the previous chunk; 0 for the first
    /// chunk.
    pub overlap_sentence_count: usize,
    /// Estimated token count of `content`.
    pub estimated_tokens: u32,
}

// ---------------------------------------------------------------------------
// BatchProcessor
// ---------------------------------------------------------------------------

/// Splits transcripts into budget-bounded chunks and reassembles results.
///
/// Stateless with respect to cross-call data — every call is independent
/// given its inputs.  The language only selects the sentence-boundary rules.
pub struct BatchProcessor {
    language: String,
}

impl BatchProcessor {
    /// Create a processor for the given ISO-639-1 language code.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Chunking
    // -----------------------------------------------------------------------

    /// Segment `text` into chunks of at most `context_length` minus the
    /// reserved prompt margin, overlapping consecutive chunks by
    /// `overlap_sentences` whole sentences.
    ///
    /// The overlap shrinks (down to zero) whenever seeding it would push the
    /// chunk over the budget; new sentences always take precedence over
    /// repeated context.
    ///
    /// Degenerate cases: empty (or whitespace-only) text yields an empty
    /// sequence; text that fits the budget yields a single chunk with
    /// `overlap_sentence_count == 0`.
    pub fn chunk(
        &self,
        text: &str,
        context_length: u32,
        overlap_sentences: usize,
    ) -> Result<Vec<TextChunk>, BatchError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        if context_length <= PROMPT_RESERVED_TOKENS {
            return Err(BatchError::BudgetTooSmall(context_length));
        }
        let budget = context_length - PROMPT_RESERVED_TOKENS;

        let sentences = split_sentences(text, &self.language);
        let tokens_per_sentence: Vec<u32> =
            sentences.iter().map(|s| estimate_tokens(s)).collect();

        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut next = 0usize; // index of the first not-yet-covered sentence
        let mut prev_chunk_len = 0usize;

        while next < sentences.len() {
            let mut overlap = if chunks.is_empty() {
                0
            } else {
                overlap_sentences.min(prev_chunk_len)
            };
            // Overlap is context, not content: shrink it before letting a
            // seeded chunk exceed the budget.  The first new sentence is
            // never dropped.
            while overlap > 0
                && tokens_per_sentence[next - overlap..=next].iter().sum::<u32>() > budget
            {
                overlap -= 1;
            }
            let begin = next - overlap;

            // Greedy accumulation: the first new sentence always goes in (a
            // sentence is never split), further sentences while they fit.
            let mut total: u32 = tokens_per_sentence[begin..=next].iter().sum();
            let mut end = next + 1;
            while end < sentences.len() && total + tokens_per_sentence[end] <= budget {
                total += tokens_per_sentence[end];
                end += 1;
            }

            let content: String = sentences[begin..end].concat();
            let estimated_tokens = estimate_tokens(&content);
            if estimated_tokens > budget {
                // Only reachable when a lone sentence is larger than the
                // whole budget; overlap has already been shrunk away.
                log::warn!(
                    "batch: chunk {} is a single sentence above the budget \
                     ({estimated_tokens} > {budget} tokens), relying on corrector truncation",
                    chunks.len()
                );
            }

            chunks.push(TextChunk {
                sequence_index: chunks.len(),
                content,
                sentence_count: end - begin,
                overlap_sentence_count: overlap,
                estimated_tokens,
            });

            prev_chunk_len = end - begin;
            next = end;
        }

        log::debug!(
            "batch: {} sentences -> {} chunk(s), budget {budget} tokens",
            sentences.len(),
            chunks.len()
        );
        Ok(chunks)
    }

    // -----------------------------------------------------------------------
    // Reassembly
    // -----------------------------------------------------------------------

    /// Stitch per-chunk results back into one continuous text.
    ///
    /// For every chunk after the first, the leading
    /// `overlap_sentence_count` sentences of its result are dropped — by
    /// sentence position, not by content matching — before concatenation.
    /// A failed chunk contributes its best-effort text (partial output or
    /// the original chunk content, whichever the corrector recorded), so
    /// reassembly always succeeds.
    ///
    /// A partial result with no more sentences than the overlap would strip
    /// to nothing; the chunk then contributes its original content (minus
    /// overlap) instead, so no part of the transcript is ever lost.
    pub fn reassemble(&self, chunks: &[TextChunk], results: &[ChunkResult]) -> String {
        let mut out = String::new();

        for (chunk, result) in chunks.iter().zip(results.iter()) {
            let text: &str = if !result.corrected_text.is_empty() {
                &result.corrected_text
            } else {
                &chunk.content
            };

            let mut contribution = self.strip_leading_sentences(text, chunk.overlap_sentence_count);
            if contribution.is_empty() {
                contribution =
                    self.strip_leading_sentences(&chunk.content, chunk.overlap_sentence_count);
            }
            push_joined(&mut out, contribution);
        }

        out
    }

    /// Drop the first `count` sentences of `text`, returning the remainder.
    fn strip_leading_sentences<'a>(&self, text: &'a str, count: usize) -> &'a str {
        if count == 0 {
            return text;
        }
        let sentences = split_sentences(text, &self.language);
        if sentences.len() <= count {
            log::warn!(
                "batch: result has {} sentence(s), cannot strip {count} overlap sentence(s)",
                sentences.len()
            );
            return "";
        }
        let offset: usize = sentences[..count].iter().map(|s| s.len()).sum();
        &text[offset..]
    }
}

/// Append `piece`, inserting a single space when neither side carries one.
fn push_joined(out: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    let needs_space = !out.is_empty()
        && !out.ends_with(|c: char| c.is_whitespace())
        && !piece.starts_with(|c: char| c.is_whitespace());
    if needs_space {
        out.push(' ');
    }
    out.push_str(piece);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChunkResult;

    fn identity_results(chunks: &[TextChunk]) -> Vec<ChunkResult> {
        chunks
            .iter()
            .map(|c| ChunkResult {
                chunk_index: c.sequence_index,
                corrected_text: c.content.clone(),
                succeeded: true,
                error: None,
                used_fallback: false,
            })
            .collect()
    }

    /// A deterministic many-sentence German text.
    fn long_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Dies ist der Satz nummer {i} mit etwas Inhalt. "))
            .collect()
    }

    // -----------------------------------------------------------------------
    // chunk()
    // -----------------------------------------------------------------------

    #[test]
    fn empty_text_yields_no_chunks() {
        let bp = BatchProcessor::new("de");
        assert!(bp.chunk("", 2048, 1).unwrap().is_empty());
        assert!(bp.chunk("   \n ", 2048, 1).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_single_chunk_without_overlap() {
        let bp = BatchProcessor::new("de");
        let chunks = bp
            .chunk("Das ist ein Test text mit fehler.", 2048, 1)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].overlap_sentence_count, 0);
        assert_eq!(chunks[0].content, "Das ist ein Test text mit fehler.");
    }

    #[test]
    fn tiny_budget_is_rejected() {
        let bp = BatchProcessor::new("de");
        let err = bp.chunk("Ein Satz.", 100, 1).unwrap_err();
        assert!(matches!(err, BatchError::BudgetTooSmall(100)));
    }

    #[test]
    fn long_text_produces_multiple_overlapping_chunks() {
        let bp = BatchProcessor::new("de");
        let text = long_text(120);
        let chunks = bp.chunk(&text, 1024, 1).unwrap();

        assert!(chunks.len() > 1, "expected multiple chunks");
        assert_eq!(chunks[0].overlap_sentence_count, 0);
        for c in &chunks[1..] {
            assert_eq!(c.overlap_sentence_count, 1);
        }
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_index, i);
        }
    }

    /// Every chunk must respect the budget (no oversized sentences here).
    #[test]
    fn chunks_respect_token_budget() {
        let bp = BatchProcessor::new("de");
        let text = long_text(200);
        let context_length = 1024;
        let chunks = bp.chunk(&text, context_length, 2).unwrap();

        let budget = context_length - PROMPT_RESERVED_TOKENS;
        for c in &chunks {
            assert!(
                c.estimated_tokens <= budget,
                "chunk {} over budget: {} > {budget}",
                c.sequence_index,
                c.estimated_tokens
            );
        }
    }

    /// Sentences just over half the usable budget must not yield
    /// `overlap + 1` chunks above the budget; the overlap shrinks instead.
    #[test]
    fn overlap_shrinks_instead_of_exceeding_budget() {
        let bp = BatchProcessor::new("de");
        let context_length = 1024;
        let budget = context_length - PROMPT_RESERVED_TOKENS;

        // Four sentences of ~300 tokens each: any two together exceed the
        // 512-token budget.
        let text: String = (0..4)
            .map(|i| format!("Satz {i} {} endet hier. ", "wort ".repeat(230)))
            .collect();
        let chunks = bp.chunk(&text, context_length, 1).unwrap();

        assert_eq!(chunks.len(), 4);
        for c in &chunks {
            assert!(
                c.estimated_tokens <= budget,
                "chunk {} over budget: {} > {budget}",
                c.sequence_index,
                c.estimated_tokens
            );
            assert_eq!(c.overlap_sentence_count, 0);
            assert_eq!(c.sentence_count, 1);
        }

        // Coverage must survive the dropped overlap.
        let results = identity_results(&chunks);
        assert_eq!(bp.reassemble(&chunks, &results), text);
    }

    /// An oversized single sentence must become its own chunk, unsplit.
    #[test]
    fn oversized_sentence_is_never_split() {
        let bp = BatchProcessor::new("de");
        let giant = format!("{} und so weiter ohne Ende.", "wort ".repeat(2000));
        let text = format!("Kurzer Satz. {giant} Noch ein Satz.");
        let chunks = bp.chunk(&text, 1024, 1).unwrap();

        let giant_chunks: Vec<_> = chunks
            .iter()
            .filter(|c| c.content.contains("und so weiter ohne Ende."))
            .collect();
        assert!(!giant_chunks.is_empty());
        // The giant sentence appears intact in some chunk's content.
        assert!(giant_chunks.iter().any(|c| c.content.contains(&giant)));
    }

    /// Chunk coverage: removing each chunk's declared overlap positionally
    /// must reproduce the original text exactly, for varied shapes.
    #[test]
    fn coverage_after_overlap_removal_is_exact() {
        let bp = BatchProcessor::new("de");
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = |n: usize| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % n as u64) as usize
        };

        for _ in 0..50 {
            let sentence_count = next(80) + 1;
            let overlap = next(3);
            let text = long_text(sentence_count);
            let chunks = bp.chunk(&text, 1024, overlap).unwrap();
            let results = identity_results(&chunks);

            assert_eq!(
                bp.reassemble(&chunks, &results),
                text,
                "coverage broken for {sentence_count} sentences, overlap {overlap}"
            );
        }
    }

    // -----------------------------------------------------------------------
    // reassemble()
    // -----------------------------------------------------------------------

    #[test]
    fn reassemble_identity_round_trip() {
        let bp = BatchProcessor::new("de");
        let text = long_text(60);
        let chunks = bp.chunk(&text, 1024, 1).unwrap();
        let results = identity_results(&chunks);
        assert_eq!(bp.reassemble(&chunks, &results), text);
    }

    #[test]
    fn reassemble_strips_overlap_from_corrected_text() {
        let bp = BatchProcessor::new("de");
        let chunks = vec![
            TextChunk {
                sequence_index: 0,
                content: "Satz eins. Satz zwei.".into(),
                sentence_count: 2,
                overlap_sentence_count: 0,
                estimated_tokens: 8,
            },
            TextChunk {
                sequence_index: 1,
                content: "Satz zwei. Satz drei.".into(),
                sentence_count: 2,
                overlap_sentence_count: 1,
                estimated_tokens: 8,
            },
        ];
        let results = vec![
            ChunkResult {
                chunk_index: 0,
                corrected_text: "Satz eins korrigiert. Satz zwei korrigiert.".into(),
                succeeded: true,
                error: None,
                used_fallback: false,
            },
            ChunkResult {
                chunk_index: 1,
                // Overlap sentence corrected differently — must be dropped by
                // position, not matched by content.
                corrected_text: "Satz zwei anders. Satz drei korrigiert.".into(),
                succeeded: true,
                error: None,
                used_fallback: false,
            },
        ];

        let out = bp.reassemble(&chunks, &results);
        assert_eq!(
            out,
            "Satz eins korrigiert. Satz zwei korrigiert. Satz drei korrigiert."
        );
    }

    #[test]
    fn failed_chunk_contributes_original_content() {
        let bp = BatchProcessor::new("de");
        let chunks = bp
            .chunk("Satz eins. Satz zwei. Satz drei.", 2048, 0)
            .unwrap();
        assert_eq!(chunks.len(), 1);

        let results = vec![ChunkResult {
            chunk_index: 0,
            corrected_text: chunks[0].content.clone(),
            succeeded: false,
            error: None,
            used_fallback: true,
        }];

        assert_eq!(
            bp.reassemble(&chunks, &results),
            "Satz eins. Satz zwei. Satz drei."
        );
    }

    /// A result with no more sentences than the overlap must not erase the
    /// chunk: its original tail (content minus overlap) is used instead.
    #[test]
    fn short_partial_result_falls_back_to_original_tail() {
        let bp = BatchProcessor::new("de");
        let chunks = vec![TextChunk {
            sequence_index: 1,
            content: "Eins. Zwei. Drei.".into(),
            sentence_count: 3,
            overlap_sentence_count: 2,
            estimated_tokens: 5,
        }];
        let results = vec![ChunkResult {
            chunk_index: 1,
            corrected_text: "Nur einer.".into(),
            succeeded: false,
            error: None,
            used_fallback: false,
        }];

        assert_eq!(bp.reassemble(&chunks, &results), "Drei.");
    }

    // -----------------------------------------------------------------------
    // estimate_tokens
    // -----------------------------------------------------------------------

    #[test]
    fn token_estimate_scales_with_length() {
        assert!(estimate_tokens("") < estimate_tokens("ein längerer deutscher Satz"));
        assert_eq!(estimate_tokens(""), 1);
    }
}
