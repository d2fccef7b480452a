//! Local OCR engine module.
//!
//! # Architecture
//!
//! ```text
//! PixelBuffer (PNG) ──▶ LocalEngine::recognize ──▶ LocalRecognition { text, confidence }
//!                              │
//!                              └──▶ ProgressSink::report   (advisory only)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use math_ocr::imaging::{normalize, SourceImage};
//! use math_ocr::ocr::{LocalEngine, LogProgress, OcrParams, TesseractEngine};
//!
//! # async fn example() {
//! let engine = TesseractEngine::new(OcrParams::default()); // kor+eng
//! let buffer = normalize(&SourceImage::load("worksheet.jpg").unwrap()).unwrap();
//! let result = engine.recognize(&buffer, &LogProgress).await.unwrap();
//! println!("{} ({:?})", result.text, result.confidence);
//! # }
//! ```

pub mod engine;
pub mod params;
pub mod progress;
pub mod tsv;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{LocalEngine, LocalRecognition, RecognitionError, TesseractEngine};
pub use params::OcrParams;
pub use progress::{LogProgress, NoProgress, ProgressSink, RecordingProgress};
pub use tsv::mean_word_confidence;

// test-only re-export so the pipeline tests can import MockLocalEngine
#[cfg(test)]
pub use engine::MockLocalEngine;
