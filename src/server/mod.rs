//! The local OCR proxy service (`math-ocr serve`).
//!
//! Accepts an image upload, forwards it to a cloud text-detection API and
//! answers in the shape the fallback client expects.
//!
//! ```text
//! ProxyOcrClient ──multipart──▶ POST /api/ocr ──▶ TextDetector::detect ──▶ Cloud Vision
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use math_ocr::config::ServerConfig;
//! use math_ocr::server::serve;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     serve(&config, config.port).await
//! }
//! ```

pub mod detector;
pub mod routes;

pub use detector::{Detection, DetectionError, GoogleVisionDetector, TextDetector};
pub use routes::{resolve_port, router, serve, IMAGE_REQUIRED, PROCESSING_FAILED};
