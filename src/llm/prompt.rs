//! Prompt builder for transcript correction.
//!
//! [`PromptBuilder`] maps (correction level, dialect-normalization flag,
//! language) to a `(system_prompt, user_prompt_template)` pair.  The mapping
//! is a pure function over const instruction blocks: identical inputs always
//! produce byte-identical output, which correction caching and reproducible
//! tests rely on.
//!
//! German (`"de"`) and English (`"en"`) carry dedicated instruction sets per
//! level; any other language code falls back to the English instructions.

use crate::config::CorrectionLevel;

// ---------------------------------------------------------------------------
// System instructions — German
// ---------------------------------------------------------------------------

/// Light — spelling and punctuation only, wording untouched.
const SYSTEM_LIGHT_DE: &str = "\
Du bist ein Korrektursystem für automatisch erstellte Transkripte.
Aufgabe: Korrigiere ausschließlich Rechtschreibung und Zeichensetzung.

Regeln:
1. Behebe Rechtschreibfehler und falsche Getrennt-/Zusammenschreibung.
2. Ergänze fehlende Satzzeichen und Großschreibung.
3. Verändere Wortwahl und Satzbau nicht.
4. Antworte nur mit dem korrigierten Text, ohne Erklärung.
5. Ist der Text bereits korrekt, gib ihn unverändert zurück.";

/// Standard — grammar, punctuation and light rephrasing.
const SYSTEM_STANDARD_DE: &str = "\
Du bist ein Korrektursystem für automatisch erstellte Transkripte.
Aufgabe: Korrigiere Grammatik, Rechtschreibung und Zeichensetzung; glätte
offensichtliche Erkennungsfehler, ohne den Inhalt zu verändern.

Regeln:
1. Behebe Grammatik-, Rechtschreib- und Zeichensetzungsfehler.
2. Korrigiere falsch erkannte Wörter (Homophone, ähnlich klingende Wörter).
3. Leichte Umformulierungen sind erlaubt, wenn sie den Sinn erhalten.
4. Fachbegriffe, Eigennamen und Zahlen bleiben unverändert.
5. Antworte nur mit dem korrigierten Text, ohne Erklärung.
6. Ist der Text bereits korrekt, gib ihn unverändert zurück.";

/// Strict — full grammatical and stylistic normalization.
const SYSTEM_STRICT_DE: &str = "\
Du bist ein Korrektursystem für automatisch erstellte Transkripte.
Aufgabe: Normalisiere den Text vollständig — Grammatik, Stil und Satzbau —
bei unverändertem Inhalt.

Regeln:
1. Behebe alle Grammatik-, Rechtschreib- und Zeichensetzungsfehler.
2. Forme umgangssprachliche oder abgebrochene Sätze zu vollständigen,
   klaren Sätzen um.
3. Entferne Füllwörter und Wiederholungen.
4. Fachbegriffe, Eigennamen und Zahlen bleiben unverändert.
5. Antworte nur mit dem korrigierten Text, ohne Erklärung.";

/// Appended when dialect normalization is requested for German.
const DIALECT_DE: &str = "\n\nZusätzlich: Übertrage dialektale oder \
regionale Formulierungen ins Standarddeutsche, ohne den Inhalt zu verändern.";

// ---------------------------------------------------------------------------
// System instructions — English / fallback
// ---------------------------------------------------------------------------

const SYSTEM_LIGHT_EN: &str = "\
You are a correction system for automatically generated transcripts.
Task: Fix spelling and punctuation only.

Rules:
1. Fix spelling mistakes.
2. Add missing punctuation and capitalisation.
3. Do not change wording or sentence structure.
4. Reply with ONLY the corrected text — no explanation.
5. If the text is already correct, return it unchanged.";

const SYSTEM_STANDARD_EN: &str = "\
You are a correction system for automatically generated transcripts.
Task: Fix grammar, spelling and punctuation; smooth over obvious
recognition errors without changing the content.

Rules:
1. Fix grammar, spelling and punctuation errors.
2. Fix mis-recognised words (homophones, words that sound similar).
3. Light rephrasing is allowed when it preserves the meaning.
4. Preserve technical terms, proper nouns and numbers exactly.
5. Reply with ONLY the corrected text — no explanation.
6. If the text is already correct, return it unchanged.";

const SYSTEM_STRICT_EN: &str = "\
You are a correction system for automatically generated transcripts.
Task: Fully normalize the text — grammar, style and sentence structure —
while keeping the content unchanged.

Rules:
1. Fix all grammar, spelling and punctuation errors.
2. Rewrite colloquial or broken sentences into complete, clear sentences.
3. Remove filler words and repetitions.
4. Preserve technical terms, proper nouns and numbers exactly.
5. Reply with ONLY the corrected text — no explanation.";

/// Appended when dialect normalization is requested for non-German languages.
/// The language code is interpolated so the instruction names the target
/// register explicitly.
const DIALECT_EN_PREFIX: &str = "\n\nAdditionally: rewrite dialectal or \
regional phrasing toward the standard register of the language \"";
const DIALECT_EN_SUFFIX: &str = "\", without changing the content.";

// ---------------------------------------------------------------------------
// User prompt templates
// ---------------------------------------------------------------------------

/// Placeholder replaced with the chunk text when the template is filled.
pub const TEXT_PLACEHOLDER: &str = "{text}";

const USER_TEMPLATE_DE: &str = "\
Korrigiere den folgenden Transkript-Abschnitt.

Text:
{text}

Korrigiert:";

const USER_TEMPLATE_EN: &str = "\
Correct the following transcript segment.

Text:
{text}

Corrected:";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds correction prompts for a fixed language.
///
/// # Example
/// ```rust
/// use transcript_correct::config::CorrectionLevel;
/// use transcript_correct::llm::PromptBuilder;
///
/// let builder = PromptBuilder::new("de");
/// let (system, template) = builder.build(CorrectionLevel::Standard, false);
/// assert!(system.contains("Transkripte"));
/// assert!(template.contains("{text}"));
/// ```
pub struct PromptBuilder {
    language: String,
}

impl PromptBuilder {
    /// Create a new builder for the given ISO-639-1 language code.
    ///
    /// Supported codes with dedicated instructions: `"de"`, `"en"`.
    /// Any other code falls back to the English instructions.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// Build the `(system_prompt, user_prompt_template)` pair.
    ///
    /// The template contains [`TEXT_PLACEHOLDER`]; fill it via
    /// [`build_chat`](Self::build_chat).  Same inputs always yield
    /// byte-identical output.
    pub fn build(&self, level: CorrectionLevel, dialect_normalization: bool) -> (String, String) {
        let mut system = self.system_instruction(level).to_string();
        if dialect_normalization {
            match self.language.as_str() {
                "de" => system.push_str(DIALECT_DE),
                _ => {
                    system.push_str(DIALECT_EN_PREFIX);
                    system.push_str(&self.language);
                    system.push_str(DIALECT_EN_SUFFIX);
                }
            }
        }
        (system, self.user_template().to_string())
    }

    /// Build a ready-to-send `(system_msg, user_msg)` pair for one chunk.
    pub fn build_chat(
        &self,
        raw: &str,
        level: CorrectionLevel,
        dialect_normalization: bool,
    ) -> (String, String) {
        let (system, template) = self.build(level, dialect_normalization);
        (system, template.replace(TEXT_PLACEHOLDER, raw))
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn system_instruction(&self, level: CorrectionLevel) -> &'static str {
        match (self.language.as_str(), level) {
            ("de", CorrectionLevel::Light) => SYSTEM_LIGHT_DE,
            ("de", CorrectionLevel::Standard) => SYSTEM_STANDARD_DE,
            ("de", CorrectionLevel::Strict) => SYSTEM_STRICT_DE,
            (_, CorrectionLevel::Light) => SYSTEM_LIGHT_EN,
            (_, CorrectionLevel::Standard) => SYSTEM_STANDARD_EN,
            (_, CorrectionLevel::Strict) => SYSTEM_STRICT_EN,
        }
    }

    fn user_template(&self) -> &'static str {
        match self.language.as_str() {
            "de" => USER_TEMPLATE_DE,
            _ => USER_TEMPLATE_EN,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Same inputs must yield byte-identical output (caching contract).
    #[test]
    fn build_is_deterministic() {
        let builder = PromptBuilder::new("de");
        let first = builder.build(CorrectionLevel::Standard, false);
        let second = builder.build(CorrectionLevel::Standard, false);
        assert_eq!(first, second);
    }

    #[test]
    fn levels_have_distinct_system_prompts() {
        let builder = PromptBuilder::new("de");
        let (light, _) = builder.build(CorrectionLevel::Light, false);
        let (standard, _) = builder.build(CorrectionLevel::Standard, false);
        let (strict, _) = builder.build(CorrectionLevel::Strict, false);

        assert_ne!(light, standard);
        assert_ne!(standard, strict);
        assert_ne!(light, strict);
    }

    #[test]
    fn german_standard_prompt_mentions_grammar() {
        let builder = PromptBuilder::new("de");
        let (system, _) = builder.build(CorrectionLevel::Standard, false);
        assert!(system.contains("Grammatik"));
        assert!(system.contains("Transkripte"));
    }

    #[test]
    fn dialect_flag_appends_segment() {
        let builder = PromptBuilder::new("de");
        let (plain, _) = builder.build(CorrectionLevel::Standard, false);
        let (with_dialect, _) = builder.build(CorrectionLevel::Standard, true);

        assert!(with_dialect.starts_with(&plain));
        assert!(with_dialect.contains("Standarddeutsche"));
    }

    #[test]
    fn non_german_dialect_segment_names_the_language() {
        let builder = PromptBuilder::new("nl");
        let (system, _) = builder.build(CorrectionLevel::Standard, true);
        assert!(system.contains("\"nl\""));
        assert!(system.contains("standard register"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let builder = PromptBuilder::new("ja");
        let (system, template) = builder.build(CorrectionLevel::Light, false);
        assert!(system.contains("transcripts"));
        assert!(template.contains("Corrected:"));
    }

    #[test]
    fn template_contains_placeholder() {
        for lang in ["de", "en", "fr"] {
            let builder = PromptBuilder::new(lang);
            let (_, template) = builder.build(CorrectionLevel::Standard, false);
            assert!(template.contains(TEXT_PLACEHOLDER), "missing in {lang}");
        }
    }

    #[test]
    fn build_chat_embeds_raw_text() {
        let builder = PromptBuilder::new("de");
        let raw = "Das ist ein Test text mit fehler.";
        let (_, user) = builder.build_chat(raw, CorrectionLevel::Standard, false);

        assert!(user.contains(raw));
        assert!(!user.contains(TEXT_PLACEHOLDER));
        assert!(user.contains("Korrigiert:"));
    }
}
