//! Configuration structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//!
//! Unlike a free-form settings dictionary, every field is typed and the whole
//! tree is checked by [`AppConfig::validate`] before the core will accept it —
//! out-of-range values are rejected at construction time, not at first use.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::batch::PROMPT_RESERVED_TOKENS;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Validation failures for a loaded or constructed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric field is outside its permitted range.
    #[error("config field `{field}` out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },

    /// The token budget cannot hold the reserved prompt overhead.
    #[error("context_length {0} too small — must exceed the reserved prompt margin of {PROMPT_RESERVED_TOKENS} tokens")]
    ContextTooSmall(u32),
}

// ---------------------------------------------------------------------------
// CorrectionLevel
// ---------------------------------------------------------------------------

/// How aggressively the corrector model rewrites a chunk.
///
/// | Variant  | Behaviour                                    |
/// |----------|----------------------------------------------|
/// | Light    | Spelling and punctuation fixes only          |
/// | Standard | Grammar + punctuation + light rephrasing     |
/// | Strict   | Full grammatical and stylistic normalization |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionLevel {
    /// Minimal spelling/punctuation fixes.
    Light,
    /// Grammar + punctuation + light rephrasing.
    Standard,
    /// Full grammatical and stylistic normalization.
    Strict,
}

impl Default for CorrectionLevel {
    fn default() -> Self {
        Self::Standard
    }
}

// ---------------------------------------------------------------------------
// CorrectorConfig
// ---------------------------------------------------------------------------

/// Settings for the LLM text-correction pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectorConfig {
    /// Whether text correction is active at all.  When `false` the
    /// orchestrator returns the original transcript untouched.
    pub enabled: bool,
    /// Path to the corrector model artifact on disk.
    pub model_path: PathBuf,
    /// Model identifier sent to the inference backend (e.g. `"qwen2.5:3b"`).
    pub model: String,
    /// Base URL of the OpenAI-compatible inference endpoint.
    pub base_url: String,
    /// API key — `None` for local providers that need no authentication.
    pub api_key: Option<String>,
    /// Sampling temperature (0.0 – 2.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Fixed sampling seed for reproducible output; `None` = non-deterministic.
    pub seed: Option<u64>,
    /// Model context window in tokens; bounds chunk size.
    pub context_length: u32,
    /// How aggressively chunks are rewritten.
    pub correction_level: CorrectionLevel,
    /// Append an instruction to normalize dialect toward the language's
    /// standard register.
    pub dialect_normalization: bool,
    /// Trailing sentences of each chunk repeated at the start of the next.
    pub chunk_overlap_sentences: usize,
    /// Keep the original text when a chunk fails instead of aborting the run.
    pub fallback_on_error: bool,
    /// Size of the chunk-correction worker pool.  `1` = strictly sequential
    /// (the safe default — a single model instance rarely serves concurrent
    /// requests).
    pub max_parallel_jobs: usize,
    /// Maximum seconds to wait for a single chunk correction.
    pub timeout_secs: u64,
    /// Minimum `output_len / input_len` ratio below which a correction is
    /// treated as malformed.
    pub min_output_ratio: f32,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: AppPaths::new()
                .models_dir
                .join("qwen2.5-3b-instruct-q4.gguf"),
            model: "qwen2.5:3b".into(),
            base_url: "http://localhost:11434".into(),
            api_key: None,
            temperature: 0.3,
            seed: None,
            context_length: 4096,
            correction_level: CorrectionLevel::default(),
            dialect_normalization: false,
            chunk_overlap_sentences: 1,
            fallback_on_error: true,
            max_parallel_jobs: 1,
            timeout_secs: 120,
            min_output_ratio: 0.3,
        }
    }
}

impl CorrectorConfig {
    /// Check all numeric fields; returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::OutOfRange {
                field: "temperature",
                reason: format!("{} not in 0.0..=2.0", self.temperature),
            });
        }
        if self.context_length <= PROMPT_RESERVED_TOKENS {
            return Err(ConfigError::ContextTooSmall(self.context_length));
        }
        if self.max_parallel_jobs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_parallel_jobs",
                reason: "must be at least 1".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.min_output_ratio > 0.0 && self.min_output_ratio <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "min_output_ratio",
                reason: format!("{} not in (0.0, 1.0]", self.min_output_ratio),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResourceConfig
// ---------------------------------------------------------------------------

/// Settings for the shared heavy-model memory slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Minimum free memory (GB) required before any model load is attempted.
    pub memory_threshold_gb: f64,
    /// Estimated resident size of the speech-recognition engine (GB).
    pub speech_model_gb: f64,
    /// Estimated resident size of the corrector model (GB).
    pub corrector_model_gb: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory_threshold_gb: 6.0,
            speech_model_gb: 3.0,
            corrector_model_gb: 4.0,
        }
    }
}

impl ResourceConfig {
    /// Check all numeric fields; returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("memory_threshold_gb", self.memory_threshold_gb),
            ("speech_model_gb", self.speech_model_gb),
            ("corrector_model_gb", self.corrector_model_gb),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    reason: format!("{value} must be a non-negative finite number"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use transcript_correct::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Primary transcript language as an ISO-639-1 code (e.g. `"de"`).
    pub language: String,
    /// Text-correction settings.
    pub corrector: CorrectorConfig,
    /// Shared memory-slot settings.
    pub resources: ResourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: "de".into(),
            corrector: CorrectorConfig::default(),
            resources: ResourceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).  A file that parses but
    /// fails validation is rejected here rather than at first use.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the whole tree; the first violation found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.corrector.validate()?;
        self.resources.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
