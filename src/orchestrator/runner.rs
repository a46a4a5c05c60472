//! Correction orchestrator — drives the full swap → chunk → correct →
//! reassemble run.
//!
//! # Run flow
//!
//! ```text
//! run(request)
//!   ├─ Validating      disabled / empty / invalid config → SkippedFallback
//!   ├─ ModelSwapping   swap(speech_handle, Corrector)
//!   │                    └─ ResourceError → correction_error + SkippedFallback
//!   ├─ Chunking        BatchProcessor::chunk
//!   │                    └─ BatchError → one whole-text chunk, run continues
//!   ├─ Correcting      sequential, or bounded pool (max_parallel_jobs > 1)
//!   │                    per-chunk failure → fallback text, run continues
//!   │                    cancellation → remaining chunks fall back
//!   ├─ Reassembling    positional overlap removal, always succeeds
//!   └─ Completed       release corrector, optional swap back to speech engine
//! ```
//!
//! The orchestrator never propagates an error to the caller: every run ends
//! in a usable [`CorrectionResult`], in the worst case carrying the original
//! text unchanged with `degraded = true`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::batch::{BatchProcessor, TextChunk};
use crate::config::{AppConfig, CorrectionLevel, CorrectorConfig};
use crate::llm::{ChunkCorrector, ChunkResult, CorrectionErrorKind};
use crate::resource::{ModelHandle, ModelKind, ResourceError, ResourceManager};

use super::events::{CorrectionEvent, Notifier};
use super::state::RunState;

// ---------------------------------------------------------------------------
// CancelHandle
// ---------------------------------------------------------------------------

/// Cloneable cancellation token checked at chunk boundaries.
///
/// Cancellation is cooperative: a chunk already dispatched runs to its end
/// (or timeout); chunks not yet dispatched fall back to their original text.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// CorrectionRequest / CorrectionResult
// ---------------------------------------------------------------------------

/// Immutable description of one correction run.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    /// The raw transcript to correct.
    pub raw_text: String,
    /// ISO-639-1 language code of the transcript.
    pub language: String,
    /// How aggressively chunks are rewritten.
    pub correction_level: CorrectionLevel,
    /// Normalize dialect toward the language's standard register.
    pub dialect_normalization: bool,
    /// Trailing sentences repeated at the start of each following chunk.
    pub chunk_overlap_sentences: usize,
    /// Model context window in tokens.
    pub context_length: u32,
}

impl CorrectionRequest {
    /// Build a request for `raw_text` with all other fields taken from config.
    pub fn from_config(raw_text: impl Into<String>, config: &AppConfig) -> Self {
        Self {
            raw_text: raw_text.into(),
            language: config.language.clone(),
            correction_level: config.corrector.correction_level,
            dialect_normalization: config.corrector.dialect_normalization,
            chunk_overlap_sentences: config.corrector.chunk_overlap_sentences,
            context_length: config.corrector.context_length,
        }
    }
}

/// Final outcome of a correction run.
///
/// Always well-formed: `corrected_text` is never empty when `original_text`
/// is non-empty, and `degraded` flags any run where the output is not a full
/// model correction of the input.
#[derive(Debug, Clone)]
pub struct CorrectionResult {
    /// The input transcript, unchanged.
    pub original_text: String,
    /// The reassembled output text.
    pub corrected_text: String,
    /// Per-chunk diagnostics, ordered by chunk index.  Empty when correction
    /// was skipped before chunking.
    pub chunk_results: Vec<ChunkResult>,
    /// `true` when any part of the output is not a successful model
    /// correction (skipped run, failed chunk, fallback text, cancellation).
    pub degraded: bool,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// Model identifier the run was configured with.
    pub model_name: String,
}

// ---------------------------------------------------------------------------
// CorrectionOrchestrator
// ---------------------------------------------------------------------------

/// Drives complete correction runs over injected collaborators.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use transcript_correct::config::AppConfig;
/// use transcript_correct::llm::{ApiGenerator, ModelCorrector};
/// use transcript_correct::orchestrator::{
///     CorrectionOrchestrator, CorrectionRequest, LogNotifier,
/// };
/// use transcript_correct::resource::{ArtifactBackend, ResourceManager, SystemMemoryProbe};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let resources = Arc::new(ResourceManager::new(
///     Arc::new(ArtifactBackend::from_config(&config)),
///     Arc::new(SystemMemoryProbe::new()),
///     config.resources.memory_threshold_gb,
/// ));
/// let generator = Arc::new(ApiGenerator::from_config(&config.corrector));
/// let corrector = Arc::new(ModelCorrector::new(
///     generator,
///     &config.language,
///     &config.corrector,
/// ));
///
/// let orchestrator = CorrectionOrchestrator::new(
///     resources,
///     corrector,
///     Arc::new(LogNotifier),
///     config.clone(),
/// );
///
/// let request = CorrectionRequest::from_config("Das ist ein Test.", &config);
/// let result = orchestrator.run(request).await;
/// println!("{}", result.corrected_text);
/// # }
/// ```
pub struct CorrectionOrchestrator {
    resources: Arc<ResourceManager>,
    corrector: Arc<dyn ChunkCorrector>,
    notifier: Arc<dyn Notifier>,
    corrector_config: CorrectorConfig,
    state: std::sync::Mutex<RunState>,
    /// Speech-engine handle parked here between runs; swapped out for the
    /// corrector while a run is active.
    speech_handle: tokio::sync::Mutex<Option<ModelHandle>>,
    restore_speech_engine: bool,
}

impl CorrectionOrchestrator {
    pub fn new(
        resources: Arc<ResourceManager>,
        corrector: Arc<dyn ChunkCorrector>,
        notifier: Arc<dyn Notifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            resources,
            corrector,
            notifier,
            corrector_config: config.corrector,
            state: std::sync::Mutex::new(RunState::Idle),
            speech_handle: tokio::sync::Mutex::new(None),
            restore_speech_engine: false,
        }
    }

    /// Reload the speech engine after each run instead of leaving the slot
    /// free.  Best-effort: a failing reload is logged and the slot stays
    /// `Unloaded`.
    pub fn with_restore_speech_engine(mut self, restore: bool) -> Self {
        self.restore_speech_engine = restore;
        self
    }

    /// Park a currently held speech-engine handle so runs can swap it out.
    pub async fn adopt_speech_handle(&self, handle: ModelHandle) {
        *self.speech_handle.lock().await = Some(handle);
    }

    /// Snapshot of the current run phase.  Never blocks on a running job.
    pub fn state(&self) -> RunState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    /// Run a correction without external cancellation.
    pub async fn run(&self, request: CorrectionRequest) -> CorrectionResult {
        self.run_with_cancel(request, CancelHandle::new()).await
    }

    /// Run a correction, checking `cancel` at every chunk boundary.
    pub async fn run_with_cancel(
        &self,
        request: CorrectionRequest,
        cancel: CancelHandle,
    ) -> CorrectionResult {
        let started = Instant::now();

        // ── 1. Validating ────────────────────────────────────────────────
        self.set_state(RunState::Validating);

        if !self.corrector_config.enabled {
            log::info!("orchestrator: correction disabled, passing text through");
            return self.skip(request.raw_text, started);
        }
        if request.raw_text.trim().is_empty() {
            log::debug!("orchestrator: empty input, nothing to correct");
            return self.skip(request.raw_text, started);
        }
        if let Err(e) = self.corrector_config.validate() {
            log::warn!("orchestrator: invalid corrector config ({e}), passing text through");
            return self.skip(request.raw_text, started);
        }

        // ── 2. ModelSwapping ─────────────────────────────────────────────
        self.set_state(RunState::ModelSwapping);

        let parked = self.speech_handle.lock().await.take();
        let handle = match self.resources.swap(parked, ModelKind::Corrector).await {
            Ok(handle) => handle,
            Err(e) => {
                // SKIP policy: any resource failure means the run proceeds
                // without a model, returning the original text.
                self.notifier.emit(CorrectionEvent::CorrectionError {
                    kind: resource_error_kind(&e),
                    fallback_action: "returning the original transcript".into(),
                });
                log::warn!("orchestrator: corrector unavailable ({e}), passing text through");
                return self.skip(request.raw_text, started);
            }
        };

        self.notifier.emit(CorrectionEvent::CorrectionStarted);

        // ── 3–5. Chunk, correct, reassemble ──────────────────────────────
        let (corrected_text, chunk_results, count_mismatch) =
            self.correct_loaded(&request, &cancel).await;

        // ── 6. Hand the slot back ────────────────────────────────────────
        self.resources.release(handle).await;
        if self.restore_speech_engine {
            match self.resources.acquire(ModelKind::SpeechEngine).await {
                Ok(speech) => *self.speech_handle.lock().await = Some(speech),
                Err(e) => {
                    log::warn!("orchestrator: speech engine reload failed ({e}), slot left free");
                }
            }
        }

        // ── 7. Finalise ──────────────────────────────────────────────────
        let duration_ms = started.elapsed().as_millis() as u64;

        if count_mismatch {
            log::error!(
                "orchestrator: chunk/result count mismatch — returning original text"
            );
            self.set_state(RunState::Failed);
            return CorrectionResult {
                corrected_text: request.raw_text.clone(),
                original_text: request.raw_text,
                chunk_results,
                degraded: true,
                duration_ms,
                model_name: self.corrector_config.model.clone(),
            };
        }

        let degraded = chunk_results
            .iter()
            .any(|r| !r.succeeded || r.used_fallback);

        self.set_state(RunState::Completed);
        self.notifier.emit(CorrectionEvent::CorrectionCompleted {
            degraded,
            duration_ms,
        });
        log::info!(
            "orchestrator: run completed in {duration_ms} ms, {} chunk(s), degraded = {degraded}",
            chunk_results.len()
        );

        CorrectionResult {
            original_text: request.raw_text,
            corrected_text,
            chunk_results,
            degraded,
            duration_ms,
            model_name: self.corrector_config.model.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Chunk / correct / reassemble (corrector loaded)
    // -----------------------------------------------------------------------

    /// Returns `(corrected_text, chunk_results, count_mismatch)`.
    async fn correct_loaded(
        &self,
        request: &CorrectionRequest,
        cancel: &CancelHandle,
    ) -> (String, Vec<ChunkResult>, bool) {
        let batch = BatchProcessor::new(&request.language);

        self.set_state(RunState::Chunking);
        let chunks = match batch.chunk(
            &request.raw_text,
            request.context_length,
            request.chunk_overlap_sentences,
        ) {
            Ok(chunks) => chunks,
            Err(e) => {
                // CONTINUE policy: correct the whole text as one chunk.
                log::warn!("orchestrator: chunking failed ({e}), using whole text as one chunk");
                self.notifier.emit(CorrectionEvent::CorrectionError {
                    kind: CorrectionErrorKind::Chunking,
                    fallback_action: "correcting the transcript as a single chunk".into(),
                });
                vec![TextChunk {
                    sequence_index: 0,
                    content: request.raw_text.clone(),
                    sentence_count: 1,
                    overlap_sentence_count: 0,
                    estimated_tokens: crate::batch::estimate_tokens(&request.raw_text),
                }]
            }
        };

        let total = chunks.len();
        self.set_state(RunState::Correcting { done: 0, total });

        let results = if self.corrector_config.max_parallel_jobs <= 1 {
            self.correct_sequential(&chunks, request, cancel).await
        } else {
            self.correct_pooled(&chunks, request, cancel).await
        };

        let count_mismatch = results.len() != total;

        self.set_state(RunState::Reassembling);
        let corrected_text = batch.reassemble(&chunks, &results);

        (corrected_text, results, count_mismatch)
    }

    /// Correct chunks one at a time, in order.
    async fn correct_sequential(
        &self,
        chunks: &[TextChunk],
        request: &CorrectionRequest,
        cancel: &CancelHandle,
    ) -> Vec<ChunkResult> {
        let total = chunks.len();
        let mut results = Vec::with_capacity(total);
        let mut aborted = false;

        for chunk in chunks {
            if aborted || cancel.is_cancelled() {
                results.push(ChunkResult::fallback(chunk, None));
                continue;
            }

            let result = self
                .corrector
                .correct(chunk, request.correction_level, request.dialect_normalization)
                .await;

            if !result.succeeded && !self.corrector_config.fallback_on_error {
                // Without per-chunk fallback, a failure stops further
                // dispatch; the remaining chunks keep their original text.
                log::warn!(
                    "orchestrator: chunk {} failed and fallback_on_error is off — \
                     stopping dispatch",
                    chunk.sequence_index
                );
                aborted = true;
            }

            self.report_progress(chunk.sequence_index, results.len() + 1, total);
            results.push(result);
        }

        results
    }

    /// Correct chunks on a bounded worker pool of `max_parallel_jobs` tasks.
    ///
    /// Results are reordered back into chunk order; progress events fire in
    /// completion order.
    async fn correct_pooled(
        &self,
        chunks: &[TextChunk],
        request: &CorrectionRequest,
        cancel: &CancelHandle,
    ) -> Vec<ChunkResult> {
        let total = chunks.len();
        let pool = Arc::new(Semaphore::new(self.corrector_config.max_parallel_jobs));
        let abort = Arc::new(AtomicBool::new(false));
        let fallback_on_error = self.corrector_config.fallback_on_error;

        let mut tasks: JoinSet<ChunkResult> = JoinSet::new();
        for chunk in chunks.iter().cloned() {
            let pool = Arc::clone(&pool);
            let abort = Arc::clone(&abort);
            let cancel = cancel.clone();
            let corrector = Arc::clone(&self.corrector);
            let level = request.correction_level;
            let dialect = request.dialect_normalization;

            tasks.spawn(async move {
                let permit = pool.acquire_owned().await;
                if permit.is_err() || cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                    return ChunkResult::fallback(&chunk, None);
                }

                let result = corrector.correct(&chunk, level, dialect).await;
                if !result.succeeded && !fallback_on_error {
                    abort.store(true, Ordering::SeqCst);
                }
                result
            });
        }

        let mut slots: Vec<Option<ChunkResult>> = vec![None; total];
        let mut done = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    done += 1;
                    let idx = result.chunk_index;
                    self.report_progress(idx, done, total);
                    if idx < total {
                        slots[idx] = Some(result);
                    }
                }
                Err(e) => log::warn!("orchestrator: correction task panicked: {e}"),
            }
        }

        // A missing slot only happens when a task panicked; fill it with the
        // original chunk text so reassembly stays aligned.
        chunks
            .iter()
            .zip(slots)
            .map(|(chunk, slot)| slot.unwrap_or_else(|| ChunkResult::fallback(chunk, None)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Terminate early with the original text (SKIP policy).
    fn skip(&self, original_text: String, started: Instant) -> CorrectionResult {
        self.set_state(RunState::SkippedFallback);
        CorrectionResult {
            corrected_text: original_text.clone(),
            original_text,
            chunk_results: Vec::new(),
            degraded: true,
            duration_ms: started.elapsed().as_millis() as u64,
            model_name: self.corrector_config.model.clone(),
        }
    }

    fn report_progress(&self, chunk_index: usize, done: usize, total: usize) {
        self.set_state(RunState::Correcting { done, total });
        self.notifier.emit(CorrectionEvent::CorrectionProgress {
            chunk_index,
            chunk_total: total,
        });
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }
}

/// Map a slot-level error onto the event-facing kind.
fn resource_error_kind(e: &ResourceError) -> CorrectionErrorKind {
    match e {
        ResourceError::ModelNotFound(_) => CorrectionErrorKind::ModelNotFound,
        ResourceError::InsufficientMemory { .. } => CorrectionErrorKind::InsufficientMemory,
        ResourceError::ModelLoad(_) => CorrectionErrorKind::ModelLoad,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::memory::FixedMemoryProbe;
    use crate::resource::{ArtifactBackend, ModelBackend};
    use async_trait::async_trait;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Backend whose loads always succeed.
    struct OkBackend;

    #[async_trait]
    impl ModelBackend for OkBackend {
        async fn load(&self, _kind: ModelKind) -> Result<(), ResourceError> {
            Ok(())
        }

        async fn unload(&self, _kind: ModelKind) -> Result<(), ResourceError> {
            Ok(())
        }

        fn memory_estimate_gb(&self, _kind: ModelKind) -> f64 {
            1.0
        }
    }

    /// Corrector that uppercases every chunk.
    struct UppercaseCorrector;

    #[async_trait]
    impl ChunkCorrector for UppercaseCorrector {
        async fn correct(
            &self,
            chunk: &TextChunk,
            _level: CorrectionLevel,
            _dialect: bool,
        ) -> ChunkResult {
            ChunkResult {
                chunk_index: chunk.sequence_index,
                corrected_text: chunk.content.to_uppercase(),
                succeeded: true,
                error: None,
                used_fallback: false,
            }
        }
    }

    /// Corrector that fails exactly one chunk index and echoes the rest.
    struct FailAtCorrector(usize);

    #[async_trait]
    impl ChunkCorrector for FailAtCorrector {
        async fn correct(
            &self,
            chunk: &TextChunk,
            _level: CorrectionLevel,
            _dialect: bool,
        ) -> ChunkResult {
            if chunk.sequence_index == self.0 {
                ChunkResult::fallback(chunk, Some(CorrectionErrorKind::Inference))
            } else {
                ChunkResult {
                    chunk_index: chunk.sequence_index,
                    corrected_text: chunk.content.to_uppercase(),
                    succeeded: true,
                    error: None,
                    used_fallback: false,
                }
            }
        }
    }

    /// Notifier that records every event.
    struct CollectingNotifier(Mutex<Vec<CorrectionEvent>>);

    impl CollectingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn events(&self) -> Vec<CorrectionEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for CollectingNotifier {
        fn emit(&self, event: CorrectionEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn init_test_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn make_resources(backend: Arc<dyn ModelBackend>) -> Arc<ResourceManager> {
        Arc::new(ResourceManager::new(
            backend,
            Arc::new(FixedMemoryProbe(16.0)),
            6.0,
        ))
    }

    fn make_orchestrator(
        corrector: Arc<dyn ChunkCorrector>,
        notifier: Arc<dyn Notifier>,
        config: AppConfig,
    ) -> CorrectionOrchestrator {
        init_test_logging();
        CorrectionOrchestrator::new(make_resources(Arc::new(OkBackend)), corrector, notifier, config)
    }

    fn long_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Dies ist der Satz nummer {i} mit etwas Inhalt. "))
            .collect()
    }

    // -----------------------------------------------------------------------
    // End-to-end
    // -----------------------------------------------------------------------

    /// A short German sentence with budget 2048 and overlap 1 must become a
    /// single chunk, complete without degradation, and report exactly one
    /// chunk result.
    #[tokio::test]
    async fn single_sentence_completes_in_one_chunk() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 2048;
        config.corrector.chunk_overlap_sentences = 1;

        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let request = CorrectionRequest::from_config("Das ist ein Test text mit fehler.", &config);
        let result = orc.run(request).await;

        assert_eq!(orc.state(), RunState::Completed);
        assert!(!result.degraded);
        assert_eq!(result.chunk_results.len(), 1);
        assert!(result.chunk_results[0].succeeded);
        assert_eq!(result.corrected_text, "DAS IST EIN TEST TEXT MIT FEHLER.");
        assert_eq!(result.original_text, "Das ist ein Test text mit fehler.");
    }

    #[tokio::test]
    async fn multi_chunk_run_corrects_every_chunk() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 1024;

        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let text = long_text(120);
        let result = orc.run(CorrectionRequest::from_config(&*text, &config)).await;

        assert_eq!(orc.state(), RunState::Completed);
        assert!(!result.degraded);
        assert!(result.chunk_results.len() > 1);
        assert_eq!(result.corrected_text, text.to_uppercase());
    }

    // -----------------------------------------------------------------------
    // Skip policy
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn disabled_correction_passes_text_through() {
        let mut config = AppConfig::default();
        config.corrector.enabled = false;

        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let result = orc
            .run(CorrectionRequest::from_config("Bleibt unverändert.", &config))
            .await;

        assert_eq!(orc.state(), RunState::SkippedFallback);
        assert!(result.degraded);
        assert!(result.chunk_results.is_empty());
        assert_eq!(result.corrected_text, "Bleibt unverändert.");
    }

    #[tokio::test]
    async fn empty_input_is_skipped() {
        let config = AppConfig::default();
        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let result = orc.run(CorrectionRequest::from_config("   \n ", &config)).await;

        assert_eq!(orc.state(), RunState::SkippedFallback);
        assert_eq!(result.corrected_text, "   \n ");
        assert!(result.chunk_results.is_empty());
    }

    /// Fallback guarantee: a nonexistent model artifact must yield the
    /// original text with `degraded = true` and zero chunk results — never a
    /// `Failed` run.
    #[tokio::test]
    async fn missing_model_falls_back_to_original_text() {
        let config = AppConfig::default();
        let resources = make_resources(Arc::new(ArtifactBackend::new(
            "/nonexistent/corrector.gguf",
            None,
            4.0,
            3.0,
        )));
        let notifier = CollectingNotifier::new();
        let orc = CorrectionOrchestrator::new(
            resources,
            Arc::new(UppercaseCorrector),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            config.clone(),
        );

        let result = orc
            .run(CorrectionRequest::from_config("Der Text bleibt roh.", &config))
            .await;

        assert_eq!(orc.state(), RunState::SkippedFallback);
        assert!(result.degraded);
        assert!(result.chunk_results.is_empty());
        assert_eq!(result.corrected_text, "Der Text bleibt roh.");

        let events = notifier.events();
        assert!(events.iter().any(|e| matches!(
            e,
            CorrectionEvent::CorrectionError {
                kind: CorrectionErrorKind::ModelNotFound,
                ..
            }
        )));

        // The slot must be free after the failed run.
        assert_eq!(
            orc.resources.status().state,
            crate::resource::SlotState::Unloaded
        );
    }

    // -----------------------------------------------------------------------
    // Partial failure (CONTINUE policy)
    // -----------------------------------------------------------------------

    /// One failing chunk of N must leave the other N−1 corrected and only
    /// mark the run degraded.
    #[tokio::test]
    async fn one_failing_chunk_leaves_the_rest_corrected() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 1024;

        let orc = make_orchestrator(
            Arc::new(FailAtCorrector(1)),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let text = long_text(120);
        let result = orc.run(CorrectionRequest::from_config(&*text, &config)).await;

        assert_eq!(orc.state(), RunState::Completed);
        assert!(result.degraded);
        assert!(result.chunk_results.len() > 2);

        for r in &result.chunk_results {
            if r.chunk_index == 1 {
                assert!(!r.succeeded);
                assert!(r.used_fallback);
            } else {
                assert!(r.succeeded, "chunk {} should have succeeded", r.chunk_index);
            }
        }

        // The failed chunk's original text must appear in the output.
        assert!(result.corrected_text.contains("DIES IST DER SATZ NUMMER 0"));
        assert!(result.corrected_text.contains("Satz"));
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancelled_run_falls_back_for_all_chunks() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 1024;

        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let cancel = CancelHandle::new();
        cancel.cancel();

        let text = long_text(60);
        let result = orc
            .run_with_cancel(CorrectionRequest::from_config(&*text, &config), cancel)
            .await;

        assert_eq!(orc.state(), RunState::Completed);
        assert!(result.degraded);
        for r in &result.chunk_results {
            assert!(!r.succeeded);
            assert!(r.used_fallback);
            assert!(r.error.is_none());
        }
        assert_eq!(result.corrected_text, text);
    }

    // -----------------------------------------------------------------------
    // Bounded worker pool
    // -----------------------------------------------------------------------

    /// A pooled run must produce the same ordered output as a sequential one.
    #[tokio::test]
    async fn pooled_run_matches_sequential_output() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 1024;
        config.corrector.max_parallel_jobs = 4;

        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let text = long_text(120);
        let result = orc.run(CorrectionRequest::from_config(&*text, &config)).await;

        assert!(!result.degraded);
        assert_eq!(result.corrected_text, text.to_uppercase());
        for (i, r) in result.chunk_results.iter().enumerate() {
            assert_eq!(r.chunk_index, i);
        }
    }

    /// Pooled results arrive in completion order; each must land in its own
    /// slot, including the result of a failed chunk.
    #[tokio::test]
    async fn pooled_run_slots_results_by_chunk_index() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 1024;
        config.corrector.max_parallel_jobs = 3;

        let orc = make_orchestrator(
            Arc::new(FailAtCorrector(2)),
            Arc::new(super::super::events::NullNotifier),
            config.clone(),
        );

        let text = long_text(120);
        let result = orc.run(CorrectionRequest::from_config(&*text, &config)).await;

        assert!(result.degraded);
        for (i, r) in result.chunk_results.iter().enumerate() {
            assert_eq!(r.chunk_index, i);
            assert_eq!(r.succeeded, i != 2);
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_run_emits_started_progress_completed() {
        let mut config = AppConfig::default();
        config.corrector.context_length = 1024;

        let notifier = CollectingNotifier::new();
        let orc = make_orchestrator(
            Arc::new(UppercaseCorrector),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            config.clone(),
        );

        let text = long_text(60);
        let result = orc.run(CorrectionRequest::from_config(&*text, &config)).await;

        let events = notifier.events();
        assert_eq!(events.first(), Some(&CorrectionEvent::CorrectionStarted));
        assert!(matches!(
            events.last(),
            Some(CorrectionEvent::CorrectionCompleted { degraded: false, .. })
        ));

        let progress_count = events
            .iter()
            .filter(|e| matches!(e, CorrectionEvent::CorrectionProgress { .. }))
            .count();
        assert_eq!(progress_count, result.chunk_results.len());
    }

    // -----------------------------------------------------------------------
    // Request construction
    // -----------------------------------------------------------------------

    #[test]
    fn request_from_config_copies_run_settings() {
        let mut config = AppConfig::default();
        config.language = "en".into();
        config.corrector.correction_level = CorrectionLevel::Strict;
        config.corrector.dialect_normalization = true;
        config.corrector.chunk_overlap_sentences = 2;
        config.corrector.context_length = 8192;

        let request = CorrectionRequest::from_config("hello there.", &config);

        assert_eq!(request.raw_text, "hello there.");
        assert_eq!(request.language, "en");
        assert_eq!(request.correction_level, CorrectionLevel::Strict);
        assert!(request.dialect_normalization);
        assert_eq!(request.chunk_overlap_sentences, 2);
        assert_eq!(request.context_length, 8192);
    }
}
