//! Recognition pipeline: quality gate, fallback orchestrator and the
//! correction state machine.
//!
//! # Architecture
//!
//! ```text
//! terminal command (ocr / table)
//!        │
//!        ▼
//! RecognitionOrchestrator::run(request)      ← async, on the tokio runtime
//!        │
//!        ├─ Session::begin_recognition        → Recognizing (or refused)
//!        ├─ spawn_blocking(normalize)
//!        ├─ LocalEngine::recognize → QualityGate::evaluate
//!        │        └─ rejected → FallbackOcr::detect_text
//!        ├─ (structured) StructuredExtractor::extract_table
//!        └─ Session::complete_recognition     → Editing / Finalized
//!
//! SharedSession (Arc<Mutex<Session>>) ←── read and edited by the terminal front-end
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use math_ocr::config::AppConfig;
//! use math_ocr::imaging::SourceImage;
//! use math_ocr::pipeline::{lock_session, new_shared_session, RecognitionOrchestrator, RecognitionRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = new_shared_session();
//!     let orchestrator = RecognitionOrchestrator::from_config(Arc::clone(&session), &AppConfig::default());
//!
//!     lock_session(&session).open(SourceImage::load("worksheet.jpg")?)?;
//!     orchestrator.run(RecognitionRequest::gated()).await?;
//!
//!     let mut s = lock_session(&session);
//!     s.edit("2x + 3 = 7")?;
//!     s.commit()?;
//!     println!("{}", s.final_text());
//!     Ok(())
//! }
//! ```

pub mod gate;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use gate::{GateVerdict, QualityGate, RejectReason};
pub use runner::{
    PipelineError, RecognitionMode, RecognitionOrchestrator, RecognitionOutcome,
    RecognitionRequest,
};
pub use state::{
    lock_session, new_shared_session, EngineKind, RecognitionAttempt, Session, SessionError,
    SessionPhase, SharedSession, GENERIC_ERROR_TEXT, PROCESSING_ERROR_TEXT,
};
