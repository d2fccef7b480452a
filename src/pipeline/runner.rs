//! Recognition orchestrator: normalize → local engine → quality gate →
//! (fallback) → attempt.
//!
//! [`RecognitionOrchestrator`] holds the engines behind trait objects and the
//! [`SharedSession`] it reports into.
//!
//! # Flow
//!
//! ```text
//! run(Gated)
//!   └─▶ session.begin_recognition()                     [Recognizing]
//!         └─▶ spawn_blocking(normalize)   ── DecodeError ─▶ fail_recognition [Editing]
//!               └─▶ local.recognize (async)
//!                     └─▶ gate.evaluate
//!                           ├─ Accepted → Local attempt
//!                           └─ Rejected → fallback.detect_text
//!                                 ├─ Ok  → RemoteFallback attempt (text as-is)
//!                                 └─ Err → placeholder attempt
//!         └─▶ session.complete_recognition()            [Editing]
//!
//! run(Structured)
//!   └─▶ structured.extract_table(original bytes)
//!         ├─ Ok  → RemoteStructured attempt
//!         └─ Err → placeholder attempt
//!   └─▶ session.complete_recognition()                  [Finalized, or Editing]
//! ```
//!
//! The session lock is only taken around `begin`/`complete`; it is never held
//! while an engine runs.  Decoding and rotation go to the blocking pool.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{AppConfig, FallbackInput};
use crate::imaging::{normalize, DecodeError, ImageKind, PixelBuffer, SourceImage};
use crate::ocr::{LocalEngine, LocalRecognition, LogProgress, OcrParams, ProgressSink, TesseractEngine};
use crate::remote::{
    FallbackOcr, ImagePayload, ProxyOcrClient, StructuredExtractor, VisionTableExtractor,
};

use super::gate::{GateVerdict, QualityGate};
use super::state::{
    lock_session, EngineKind, RecognitionAttempt, SessionError, SharedSession,
    PROCESSING_ERROR_TEXT,
};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that abort a recognition request before any attempt exists.
///
/// Engine failures are not here: they are absorbed into a placeholder
/// attempt and reported through [`RecognitionOutcome::failure`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload is not a raster image.
    #[error("{} uploads cannot be recognized", .0.label())]
    UnsupportedKind(ImageKind),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The session refused to start (no upload, document, already busy).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unexpected failure, e.g. a blocking task that panicked.
    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// RecognitionRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// Local engine first, remote fallback when the gate rejects the result.
    Gated,
    /// Straight to the table extractor.
    Structured,
}

/// What to run and where the result lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub mode: RecognitionMode,
    /// `true`: the attempt becomes an editable draft.  `false`: it is
    /// accepted as final immediately.
    pub edit_step: bool,
}

impl RecognitionRequest {
    pub fn gated() -> Self {
        Self {
            mode: RecognitionMode::Gated,
            edit_step: true,
        }
    }

    pub fn structured() -> Self {
        Self {
            mode: RecognitionMode::Structured,
            edit_step: false,
        }
    }

    pub fn with_edit_step(mut self, edit_step: bool) -> Self {
        self.edit_step = edit_step;
        self
    }
}

// ---------------------------------------------------------------------------
// RecognitionOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    pub attempt: RecognitionAttempt,
    pub edit_step: bool,
    /// The remote error behind a placeholder attempt.
    pub failure: Option<String>,
    /// Gate verdict on the local result; `None` in structured mode.
    pub verdict: Option<GateVerdict>,
}

// ---------------------------------------------------------------------------
// RecognitionOrchestrator
// ---------------------------------------------------------------------------

/// Resolves recognition requests and records them in the session.
///
/// ```rust,no_run
/// use math_ocr::config::AppConfig;
/// use math_ocr::imaging::SourceImage;
/// use math_ocr::pipeline::{lock_session, new_shared_session, RecognitionOrchestrator, RecognitionRequest};
///
/// # async fn example() -> anyhow::Result<()> {
/// let session = new_shared_session();
/// let orchestrator = RecognitionOrchestrator::from_config(session.clone(), &AppConfig::default());
///
/// lock_session(&session).open(SourceImage::load("worksheet.jpg")?)?;
/// orchestrator.run(RecognitionRequest::gated()).await?;
/// println!("{:?}", lock_session(&session).displayed_text());
/// # Ok(())
/// # }
/// ```
pub struct RecognitionOrchestrator {
    session: SharedSession,
    local: Arc<dyn LocalEngine>,
    fallback: Arc<dyn FallbackOcr>,
    structured: Arc<dyn StructuredExtractor>,
    gate: QualityGate,
    fallback_input: FallbackInput,
    structured_edit_step: bool,
    progress: Arc<dyn ProgressSink>,
}

impl RecognitionOrchestrator {
    /// Create an orchestrator with the default gate, original-bytes fallback
    /// input and debug-log progress.
    pub fn new(
        session: SharedSession,
        local: Arc<dyn LocalEngine>,
        fallback: Arc<dyn FallbackOcr>,
        structured: Arc<dyn StructuredExtractor>,
    ) -> Self {
        Self {
            session,
            local,
            fallback,
            structured,
            gate: QualityGate::default(),
            fallback_input: FallbackInput::default(),
            structured_edit_step: false,
            progress: Arc::new(LogProgress),
        }
    }

    /// Wire the production engines from configuration.
    pub fn from_config(session: SharedSession, config: &AppConfig) -> Self {
        let local = Arc::new(TesseractEngine::new(OcrParams::from_config(&config.local)));
        let fallback = Arc::new(ProxyOcrClient::from_config(&config.proxy));
        let structured = Arc::new(VisionTableExtractor::from_config(&config.vision));

        Self::new(session, local, fallback, structured)
            .with_gate(QualityGate::from(&config.gate))
            .with_fallback_input(config.recognition.fallback_input)
            .with_structured_edit_step(config.recognition.structured_edit_step)
    }

    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_fallback_input(mut self, input: FallbackInput) -> Self {
        self.fallback_input = input;
        self
    }

    pub fn with_structured_edit_step(mut self, edit_step: bool) -> Self {
        self.structured_edit_step = edit_step;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    /// The request for `mode` with the configured edit step.
    pub fn request(&self, mode: RecognitionMode) -> RecognitionRequest {
        match mode {
            RecognitionMode::Gated => RecognitionRequest::gated(),
            RecognitionMode::Structured => {
                RecognitionRequest::structured().with_edit_step(self.structured_edit_step)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Session-driving entry point
    // -----------------------------------------------------------------------

    /// Run one request against the session's current upload.
    ///
    /// A refused start leaves the session untouched.  Once started, the
    /// session always leaves `Recognizing`: either with the outcome's attempt
    /// or, if the request aborted, with the generic placeholder draft.
    pub async fn run(
        &self,
        request: RecognitionRequest,
    ) -> Result<RecognitionOutcome, PipelineError> {
        let snapshot = lock_session(&self.session).begin_recognition()?;
        log::info!(
            "pipeline: {:?} recognition of {} (rotation {}°)",
            request.mode,
            snapshot.file_name(),
            snapshot.rotation().degrees()
        );

        match self.resolve(&snapshot, request).await {
            Ok(outcome) => {
                let mut session = lock_session(&self.session);
                session.complete_recognition(outcome.attempt.clone(), outcome.edit_step)?;
                if let Some(failure) = &outcome.failure {
                    session.record_failure(failure.clone());
                }
                Ok(outcome)
            }
            Err(e) => {
                log::error!("pipeline: recognition aborted: {e}");
                lock_session(&self.session).fail_recognition(e.to_string())?;
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Produce exactly one attempt for `source`, or an error if no engine
    /// could be invoked at all.  Does not touch the session.
    pub async fn resolve(
        &self,
        source: &SourceImage,
        request: RecognitionRequest,
    ) -> Result<RecognitionOutcome, PipelineError> {
        if source.kind() != ImageKind::Raster {
            return Err(PipelineError::UnsupportedKind(source.kind()));
        }

        match request.mode {
            RecognitionMode::Gated => self.resolve_gated(source, request.edit_step).await,
            RecognitionMode::Structured => {
                Ok(self.resolve_structured(source, request.edit_step).await)
            }
        }
    }

    async fn resolve_gated(
        &self,
        source: &SourceImage,
        edit_step: bool,
    ) -> Result<RecognitionOutcome, PipelineError> {
        let buffer = normalize_off_thread(source).await?;

        let local = match self.local.recognize(&buffer, self.progress.as_ref()).await {
            Ok(result) => Some(result),
            Err(e) => {
                log::warn!("pipeline: local engine failed: {e}");
                None
            }
        };

        let verdict = self.gate.evaluate(local.as_ref());
        if verdict.is_accepted() {
            if let Some(LocalRecognition { text, confidence }) = local {
                log::info!("pipeline: local result accepted ({} chars)", text.chars().count());
                return Ok(RecognitionOutcome {
                    attempt: RecognitionAttempt::new(EngineKind::Local, text, confidence),
                    edit_step,
                    failure: None,
                    verdict: Some(verdict),
                });
            }
        }

        if let GateVerdict::Rejected(reason) = &verdict {
            log::warn!("pipeline: local result rejected ({reason}), using fallback");
        }

        let payload = match self.fallback_input {
            FallbackInput::Original => ImagePayload::original(source),
            FallbackInput::Normalized => ImagePayload::normalized(&buffer, source),
        };

        let (attempt, failure) = match self.fallback.detect_text(&payload).await {
            Ok(remote) => (
                RecognitionAttempt::new(
                    EngineKind::RemoteFallback,
                    remote.text,
                    Some(remote.confidence),
                ),
                None,
            ),
            Err(e) => {
                log::error!("pipeline: fallback OCR failed: {e}");
                (
                    RecognitionAttempt::new(EngineKind::RemoteFallback, PROCESSING_ERROR_TEXT, None),
                    Some(e.to_string()),
                )
            }
        };

        Ok(RecognitionOutcome {
            attempt,
            edit_step,
            failure,
            verdict: Some(verdict),
        })
    }

    async fn resolve_structured(&self, source: &SourceImage, edit_step: bool) -> RecognitionOutcome {
        self.progress.report("extracting table", 0.0);
        let payload = ImagePayload::original(source);

        let (attempt, failure) = match self.structured.extract_table(&payload).await {
            Ok(table) => (
                RecognitionAttempt::new(EngineKind::RemoteStructured, table, None),
                None,
            ),
            Err(e) => {
                log::error!("pipeline: table extraction failed: {e}");
                (
                    RecognitionAttempt::new(
                        EngineKind::RemoteStructured,
                        PROCESSING_ERROR_TEXT,
                        None,
                    ),
                    Some(e.to_string()),
                )
            }
        };
        self.progress.report("extracting table", 1.0);

        RecognitionOutcome {
            attempt,
            edit_step,
            failure,
            verdict: None,
        }
    }
}

/// Decode and rotate on the blocking pool.
async fn normalize_off_thread(source: &SourceImage) -> Result<PixelBuffer, PipelineError> {
    let snapshot = source.clone();
    tokio::task::spawn_blocking(move || normalize(&snapshot))
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?
        .map_err(PipelineError::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
