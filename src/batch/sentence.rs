//! Locale-aware sentence boundary detection.
//!
//! [`split_sentences`] cuts a transcript into sentence slices without losing
//! a single byte: the concatenation of the returned slices is always
//! identical to the input.  Trailing whitespace is attached to the preceding
//! sentence, which is what makes lossless chunk reassembly possible further
//! up the stack.
//!
//! Boundaries are terminator runs (`.`, `!`, `?`, `…`, optionally followed by
//! closing quotes/brackets) that are followed by whitespace or end of text.
//! Per-language abbreviation sets and a single-initial guard suppress false
//! boundaries (`"z.B. so"`, `"Dr. Meier"`, `"J. Smith"`).  Decimal numbers
//! need no special casing — `"3.14"` has no whitespace after the dot.

use once_cell::sync::Lazy;
use regex::Regex;

// ---------------------------------------------------------------------------
// Terminator pattern
// ---------------------------------------------------------------------------

/// A run of sentence terminators plus any closing quotes/brackets.
static TERMINATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?…]+["'»«)\]]*"#).expect("terminator regex"));

// ---------------------------------------------------------------------------
// Abbreviation sets
// ---------------------------------------------------------------------------

/// German abbreviations that end in a period but do not end a sentence.
const ABBREVIATIONS_DE: &[&str] = &[
    "z.B", "bzw", "ca", "Dr", "Prof", "Nr", "usw", "vgl", "evtl", "ggf", "inkl", "u.a", "d.h",
    "Abs", "Abb", "Hr", "Fr", "bspw", "sog", "St",
];

/// English abbreviations that end in a period but do not end a sentence.
const ABBREVIATIONS_EN: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "Prof", "St", "vs", "etc", "e.g", "i.e", "Inc", "Jr", "Sr", "No",
    "Fig", "approx",
];

/// Abbreviation set for the given ISO-639-1 code; English is the fallback.
fn abbreviations_for(language: &str) -> &'static [&'static str] {
    match language {
        "de" => ABBREVIATIONS_DE,
        "en" => ABBREVIATIONS_EN,
        _ => ABBREVIATIONS_EN,
    }
}

// ---------------------------------------------------------------------------
// split_sentences
// ---------------------------------------------------------------------------

/// Split `text` into sentence slices covering the input exactly.
///
/// Guarantees `sentences.concat() == text` for every input.  Empty input
/// yields an empty vector; input without any terminator yields a single
/// sentence.
///
/// ```rust
/// use transcript_correct::batch::split_sentences;
///
/// let s = split_sentences("Das ist ein Test. Und noch einer!", "de");
/// assert_eq!(s, vec!["Das ist ein Test. ", "Und noch einer!"]);
/// ```
pub fn split_sentences<'a>(text: &'a str, language: &str) -> Vec<&'a str> {
    if text.is_empty() {
        return Vec::new();
    }

    let abbreviations = abbreviations_for(language);
    let mut sentences = Vec::new();
    let mut start = 0usize;

    for m in TERMINATOR.find_iter(text) {
        if m.start() < start {
            continue;
        }

        // A boundary requires whitespace (or end of text) after the run.
        // This also rejects decimals ("3.14") and inner dots ("z.B.").
        let rest = &text[m.end()..];
        if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace()) {
            continue;
        }

        // Abbreviation and single-initial guards apply to periods only.
        if m.as_str().starts_with('.') {
            let word = last_word(&text[start..m.start()]);
            if is_abbreviation(word, abbreviations) || is_initial(word) {
                continue;
            }
        }

        // Attach the trailing whitespace run to this sentence.
        let ws_len = rest.len() - rest.trim_start().len();
        let cut = m.end() + ws_len;
        sentences.push(&text[start..cut]);
        start = cut;
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// The token immediately before a candidate terminator.
fn last_word(prefix: &str) -> &str {
    prefix
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
}

fn is_abbreviation(word: &str, abbreviations: &[&str]) -> bool {
    abbreviations.iter().any(|a| a.eq_ignore_ascii_case(word))
}

/// Single alphabetic character, e.g. the "J" in "J. Smith".
fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
