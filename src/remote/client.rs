//! Remote engine traits, the shared error type and the request payload.
//!
//! Two remote variants exist:
//! * [`FallbackOcr`] — plain text detection behind the local proxy service,
//!   used when the local result is rejected.
//! * [`StructuredExtractor`] — table extraction by a vision-capable chat
//!   model, triggered directly by the user.
//!
//! Both make exactly one attempt.  Nothing here retries.

use async_trait::async_trait;
use thiserror::Error;

use crate::imaging::{PixelBuffer, SourceImage};

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Errors from a remote recognition call.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("remote OCR request timed out")]
    Timeout,

    /// Non-2xx response.  `body` is kept verbatim for diagnostics.
    #[error("remote OCR returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The credential was refused (HTTP 401 / 403).
    #[error("authentication failed (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// No credential configured; names where it was looked for.
    #[error("missing API credential: set {0}")]
    MissingCredential(String),

    /// The response body was not the expected JSON.
    #[error("failed to parse remote response: {0}")]
    Parse(String),

    /// A 2xx response that reports failure in its body.
    #[error("remote OCR rejected the image: {0}")]
    Rejected(String),

    /// The response carried no usable text field.
    #[error("remote OCR returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ImagePayload
// ---------------------------------------------------------------------------

/// The bytes sent to a remote engine, with the metadata a multipart upload
/// or a `data:` URL needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

impl ImagePayload {
    /// The uploaded file exactly as received.
    pub fn original(source: &SourceImage) -> Self {
        Self {
            bytes: source.bytes().to_vec(),
            mime: source.mime().to_string(),
            file_name: source.file_name().to_string(),
        }
    }

    /// The rotated PNG produced by the normalizer.
    pub fn normalized(buffer: &PixelBuffer, source: &SourceImage) -> Self {
        let stem = std::path::Path::new(source.file_name())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self {
            bytes: buffer.png().to_vec(),
            mime: PixelBuffer::MIME.to_string(),
            file_name: format!("{stem}.png"),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteRecognition
// ---------------------------------------------------------------------------

/// Output of the fallback text-detection service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecognition {
    pub text: String,
    /// `0.0` when the service did not report one.
    pub confidence: f32,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Secondary text detection used after the local result is rejected.
#[async_trait]
pub trait FallbackOcr: Send + Sync {
    async fn detect_text(&self, image: &ImagePayload) -> Result<RemoteRecognition, RemoteError>;
}

/// Structured (tabular) extraction.  Output is free-form markdown.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract_table(&self, image: &ImagePayload) -> Result<String, RemoteError>;
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Fallback that returns a fixed result and records what it was sent.
    pub struct MockFallback {
        response: Result<RemoteRecognition, RemoteError>,
        calls: AtomicUsize,
        last_payload: Mutex<Option<ImagePayload>>,
    }

    impl MockFallback {
        pub fn ok(text: impl Into<String>) -> Self {
            Self::with(Ok(RemoteRecognition {
                text: text.into(),
                confidence: 0.0,
            }))
        }

        pub fn err(error: RemoteError) -> Self {
            Self::with(Err(error))
        }

        fn with(response: Result<RemoteRecognition, RemoteError>) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
                last_payload: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_payload(&self) -> Option<ImagePayload> {
            self.last_payload.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FallbackOcr for MockFallback {
        async fn detect_text(
            &self,
            image: &ImagePayload,
        ) -> Result<RemoteRecognition, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(image.clone());
            self.response.clone()
        }
    }

    /// Extractor that returns a fixed result and counts its calls.
    pub struct MockExtractor {
        response: Result<String, RemoteError>,
        calls: AtomicUsize,
    }

    impl MockExtractor {
        pub fn ok(text: impl Into<String>) -> Self {
            Self {
                response: Ok(text.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn err(error: RemoteError) -> Self {
            Self {
                response: Err(error),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StructuredExtractor for MockExtractor {
        async fn extract_table(&self, _image: &ImagePayload) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{normalize, Rotation};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn jpeg_source() -> SourceImage {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(3, 1))
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        SourceImage::from_bytes(jpeg, "page-1.jpg").unwrap()
    }

    #[test]
    fn original_payload_keeps_upload_metadata() {
        let src = jpeg_source();
        let payload = ImagePayload::original(&src);
        assert_eq!(payload.mime, "image/jpeg");
        assert_eq!(payload.file_name, "page-1.jpg");
        assert_eq!(payload.bytes, src.bytes());
    }

    #[test]
    fn normalized_payload_is_png() {
        let mut src = jpeg_source();
        src.set_rotation(Rotation::Deg90);
        let buffer = normalize(&src).unwrap();

        let payload = ImagePayload::normalized(&buffer, &src);

        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.file_name, "page-1.png");
        assert_eq!(payload.bytes, buffer.png());
    }

    #[test]
    fn remote_error_display_carries_body() {
        let e = RemoteError::Status {
            status: 500,
            body: "{\"error\":\"boom\"}".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn traits_are_object_safe() {
        let _f: Box<dyn FallbackOcr> = Box::new(mock::MockFallback::ok("x"));
        let _s: Box<dyn StructuredExtractor> = Box::new(mock::MockExtractor::ok("x"));
    }
}
