//! Correction state machine and shared session state.
//!
//! [`Session`] owns the current upload, the latest [`RecognitionAttempt`],
//! the editable draft and the accepted final text.  [`SharedSession`] is a
//! type alias for `Arc<Mutex<Session>>`; the orchestrator mutates it and the
//! terminal front-end reads it.
//!
//! ```text
//! Idle ──ocr──▶ Recognizing ──attempt──▶ Editing ──commit──▶ Finalized
//!                    ▲                      ▲                    │
//!                    │                      └──────reopen────────┘
//!                    └────────── ocr (from any settled state) ───┘
//! ```
//!
//! Recognition always lands somewhere displayable: a failed request still
//! reaches `Editing` with a placeholder draft the user can type over.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::imaging::{ImageKind, Rotation, SourceImage};

/// Attempt text when the fallback or table extraction fails.
pub const PROCESSING_ERROR_TEXT: &str = "OCR 처리 중 오류가 발생했습니다. 다시 시도해주세요.";

/// Draft text when a request aborts before any engine produced an attempt.
pub const GENERIC_ERROR_TEXT: &str = "OCR 처리 중 오류가 발생했습니다.";

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Refused transitions.  None of them change the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no file uploaded")]
    NoSource,

    #[error("only JPEG images can be recognized")]
    UnsupportedForOcr,

    #[error("recognition already in progress")]
    Busy,

    #[error("not editing")]
    NotEditing,

    #[error("no final result to reopen")]
    NotFinalized,

    #[error("no recognition in progress")]
    NotRecognizing,
}

impl SessionError {
    /// Message shown to the user.
    pub fn notice(&self) -> &'static str {
        match self {
            SessionError::NoSource => "먼저 파일을 업로드해주세요.",
            SessionError::UnsupportedForOcr => "PDF의 경우, 현재는 JPG만 OCR이 지원됩니다.",
            SessionError::Busy => "인식 중입니다. 잠시만 기다려주세요.",
            SessionError::NotEditing => "수정 중이 아닙니다.",
            SessionError::NotFinalized => "완료된 결과가 없습니다.",
            SessionError::NotRecognizing => "진행 중인 인식이 없습니다.",
        }
    }
}

// ---------------------------------------------------------------------------
// RecognitionAttempt
// ---------------------------------------------------------------------------

/// Which engine produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Local,
    RemoteFallback,
    RemoteStructured,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Local => "local",
            EngineKind::RemoteFallback => "remote-fallback",
            EngineKind::RemoteStructured => "remote-structured",
        }
    }
}

/// One engine's output for one image.  Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAttempt {
    engine: EngineKind,
    text: String,
    confidence: Option<f32>,
    timestamp: DateTime<Utc>,
}

impl RecognitionAttempt {
    pub fn new(engine: EngineKind, text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            engine,
            text: text.into(),
            confidence,
            timestamp: Utc::now(),
        }
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Recognizing,
    Editing,
    Finalized,
}

impl SessionPhase {
    /// A short human-readable label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Recognizing => "Recognizing",
            SessionPhase::Editing => "Editing",
            SessionPhase::Finalized => "Done",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The current upload and everything derived from it.
#[derive(Debug, Default)]
pub struct Session {
    source: Option<SourceImage>,
    phase: SessionPhase,
    attempt: Option<RecognitionAttempt>,
    draft: String,
    final_text: String,
    last_failure: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Replace the current upload wholesale.  Texts from the previous image
    /// are discarded and the session returns to `Idle`.
    pub fn open(&mut self, source: SourceImage) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Recognizing {
            return Err(SessionError::Busy);
        }
        log::info!(
            "session: opened {} ({})",
            source.file_name(),
            source.kind().label()
        );
        *self = Self {
            source: Some(source),
            ..Self::default()
        };
        Ok(())
    }

    /// Turn the current upload a quarter turn clockwise.
    pub fn rotate(&mut self) -> Result<Rotation, SessionError> {
        let source = self.source.as_mut().ok_or(SessionError::NoSource)?;
        Ok(source.rotate_clockwise())
    }

    /// Set the upload's rotation outright.
    pub fn set_rotation(&mut self, rotation: Rotation) -> Result<(), SessionError> {
        let source = self.source.as_mut().ok_or(SessionError::NoSource)?;
        source.set_rotation(rotation);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recognition
    // -----------------------------------------------------------------------

    /// Enter `Recognizing` and hand back a snapshot of the upload.
    ///
    /// Refused, with no state change, when there is no upload, when the
    /// upload is a document, or when a recognition is already running.
    pub fn begin_recognition(&mut self) -> Result<SourceImage, SessionError> {
        let source = self.source.as_ref().ok_or(SessionError::NoSource)?;
        if source.kind() != ImageKind::Raster {
            return Err(SessionError::UnsupportedForOcr);
        }
        if self.phase == SessionPhase::Recognizing {
            return Err(SessionError::Busy);
        }

        let snapshot = source.clone();
        self.phase = SessionPhase::Recognizing;
        self.draft.clear();
        self.final_text.clear();
        self.last_failure = None;
        Ok(snapshot)
    }

    /// Record a finished attempt.  With an edit step the text becomes the
    /// draft; without one it is frozen as final straight away.
    pub fn complete_recognition(
        &mut self,
        attempt: RecognitionAttempt,
        edit_step: bool,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Recognizing {
            return Err(SessionError::NotRecognizing);
        }

        self.draft = attempt.text().to_string();
        self.attempt = Some(attempt);
        if edit_step {
            self.phase = SessionPhase::Editing;
        } else {
            self.final_text = self.draft.clone();
            self.phase = SessionPhase::Finalized;
        }
        Ok(())
    }

    /// The request aborted before any attempt existed.  The draft gets a
    /// placeholder and the session becomes editable.
    pub fn fail_recognition(&mut self, reason: impl Into<String>) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Recognizing {
            return Err(SessionError::NotRecognizing);
        }

        self.attempt = None;
        self.draft = GENERIC_ERROR_TEXT.to_string();
        self.last_failure = Some(reason.into());
        self.phase = SessionPhase::Editing;
        Ok(())
    }

    /// Diagnostics for the most recent failure, if the last request had one.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.last_failure = Some(reason.into());
    }

    // -----------------------------------------------------------------------
    // Correction
    // -----------------------------------------------------------------------

    /// Replace the draft.  Only allowed while editing.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Editing {
            return Err(SessionError::NotEditing);
        }
        self.draft = text.into();
        Ok(())
    }

    /// Freeze the draft as the final result.  Committing again while
    /// finalized changes nothing.
    pub fn commit(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Editing => {
                self.final_text = self.draft.clone();
                self.phase = SessionPhase::Finalized;
                Ok(())
            }
            SessionPhase::Finalized => Ok(()),
            _ => Err(SessionError::NotEditing),
        }
    }

    /// Go back to editing, starting from the last committed text.
    pub fn reopen(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Finalized {
            return Err(SessionError::NotFinalized);
        }
        self.draft = self.final_text.clone();
        self.phase = SessionPhase::Editing;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_editing(&self) -> bool {
        self.phase == SessionPhase::Editing
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn attempt(&self) -> Option<&RecognitionAttempt> {
        self.attempt.as_ref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// The draft while editing, the final text once finalized, nothing
    /// before the first attempt.
    pub fn displayed_text(&self) -> Option<&str> {
        match self.phase {
            SessionPhase::Editing => Some(&self.draft),
            SessionPhase::Finalized => Some(&self.final_text),
            SessionPhase::Idle | SessionPhase::Recognizing => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`Session`].  Never hold the lock across `.await`.
pub type SharedSession = Arc<Mutex<Session>>;

pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(Session::new()))
}

/// Lock the session, recovering the data if a previous holder panicked.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
