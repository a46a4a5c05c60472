//! Model-lifecycle and batch-correction core for local speech-to-text
//! transcripts.
//!
//! A single machine hosts two heavy models — the speech engine and an LLM
//! corrector — that never fit in memory together.  This crate owns the slot
//! they share and the batch pipeline that corrects a finished transcript:
//!
//! ```text
//! raw transcript
//!       │
//!       ▼
//! CorrectionOrchestrator::run()
//!       ├─ ResourceManager        swap speech engine ⇄ corrector (one slot)
//!       ├─ BatchProcessor         sentence-aligned chunks + overlap
//!       ├─ ModelCorrector         per-chunk LLM correction, typed failures
//!       └─ BatchProcessor         positional overlap removal, reassembly
//!       │
//!       ▼
//! CorrectionResult               always usable, worst case the original text
//! ```
//!
//! # Modules
//!
//! | Module           | Responsibility                                      |
//! |------------------|-----------------------------------------------------|
//! | [`config`]       | Typed settings, validation, TOML persistence        |
//! | [`resource`]     | Single heavy-model slot, memory floor, swap         |
//! | [`batch`]        | Sentence splitting, chunking, reassembly            |
//! | [`llm`]          | Prompts, inference transport, per-chunk correction  |
//! | [`orchestrator`] | Run state machine, events, error policies           |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transcript_correct::config::AppConfig;
//! use transcript_correct::llm::{ApiGenerator, ModelCorrector};
//! use transcript_correct::orchestrator::{
//!     CorrectionOrchestrator, CorrectionRequest, LogNotifier,
//! };
//! use transcript_correct::resource::{ArtifactBackend, ResourceManager, SystemMemoryProbe};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap_or_default();
//!
//!     let resources = Arc::new(ResourceManager::new(
//!         Arc::new(ArtifactBackend::from_config(&config)),
//!         Arc::new(SystemMemoryProbe::new()),
//!         config.resources.memory_threshold_gb,
//!     ));
//!     let corrector = Arc::new(ModelCorrector::new(
//!         Arc::new(ApiGenerator::from_config(&config.corrector)),
//!         &config.language,
//!         &config.corrector,
//!     ));
//!
//!     let orchestrator = CorrectionOrchestrator::new(
//!         resources,
//!         corrector,
//!         Arc::new(LogNotifier),
//!         config.clone(),
//!     );
//!
//!     let request = CorrectionRequest::from_config("Das ist ein Test.", &config);
//!     let result = orchestrator.run(request).await;
//!     println!("{}", result.corrected_text);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod llm;
pub mod orchestrator;
pub mod resource;

// ---------------------------------------------------------------------------
// Top-level re-exports
// ---------------------------------------------------------------------------

pub use config::AppConfig;
pub use orchestrator::{CorrectionOrchestrator, CorrectionRequest, CorrectionResult};
