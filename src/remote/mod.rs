//! Remote recognition engines.
//!
//! This module provides:
//! * [`FallbackOcr`] / [`ProxyOcrClient`] — text detection through the local
//!   proxy service; used when the local result fails the quality gate.
//! * [`StructuredExtractor`] / [`VisionTableExtractor`] — markdown-table
//!   extraction by a vision chat model; a separate, user-triggered path.
//! * [`RemoteError`] — error variants shared by both.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use math_ocr::config::AppConfig;
//! use math_ocr::imaging::SourceImage;
//! use math_ocr::remote::{FallbackOcr, ImagePayload, ProxyOcrClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = ProxyOcrClient::from_config(&config.proxy);
//!
//!     let image = SourceImage::load("worksheet.jpg").unwrap();
//!     let result = client.detect_text(&ImagePayload::original(&image)).await.unwrap();
//!     println!("{}", result.text);
//! }
//! ```

pub mod client;
pub mod prompt;
pub mod proxy;
pub mod vision;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{
    FallbackOcr, ImagePayload, RemoteError, RemoteRecognition, StructuredExtractor,
};
pub use prompt::{data_url, TABLE_INSTRUCTION};
pub use proxy::ProxyOcrClient;
pub use vision::VisionTableExtractor;
