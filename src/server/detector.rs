//! Cloud text detection behind the proxy service.
//!
//! [`GoogleVisionDetector`] calls the Cloud Vision `images:annotate` endpoint
//! with a single `TEXT_DETECTION` feature and reads the first text
//! annotation, which holds the full detected text.

use std::time::Duration;

use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine as _};
use serde_json::json;
use thiserror::Error;

use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// DetectionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    #[error("detection request failed: {0}")]
    Request(String),

    #[error("detection request timed out")]
    Timeout,

    #[error("detection API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("missing API credential: set {0}")]
    MissingCredential(String),

    #[error("failed to parse detection response: {0}")]
    Parse(String),

    /// The API answered 200 but reported an error for the image.
    #[error("detection API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for DetectionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DetectionError::Timeout
        } else {
            DetectionError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Detection / TextDetector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    /// `0.0` when the API did not report one.
    pub confidence: f32,
}

/// Text detection over raw image bytes.
///
/// `Ok(None)` means the image was processed and no text was found.
#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Option<Detection>, DetectionError>;
}

// ---------------------------------------------------------------------------
// GoogleVisionDetector
// ---------------------------------------------------------------------------

pub struct GoogleVisionDetector {
    client: reqwest::Client,
    config: ServerConfig,
}

impl GoogleVisionDetector {
    pub fn from_config(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn credential(&self) -> Result<String, DetectionError> {
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DetectionError::MissingCredential(format!(
                    "server.api_key or ${}",
                    self.config.api_key_env
                ))
            })
    }
}

#[async_trait]
impl TextDetector for GoogleVisionDetector {
    async fn detect(&self, image: &[u8]) -> Result<Option<Detection>, DetectionError> {
        let key = self.credential()?;

        let body = json!({
            "requests": [{
                "image": { "content": BASE64_STANDARD.encode(image) },
                "features": [{ "type": "TEXT_DETECTION" }]
            }]
        });

        log::debug!(
            "server: POST {} ({} bytes)",
            self.config.detection_url,
            image.len()
        );
        let response = self
            .client
            .post(&self.config.detection_url)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DetectionError::Parse(e.to_string()))?;

        parse_annotation(&json)
    }
}

/// Pull the full-text annotation out of an `images:annotate` response.
fn parse_annotation(json: &serde_json::Value) -> Result<Option<Detection>, DetectionError> {
    let first = &json["responses"][0];

    if let Some(message) = first["error"]["message"].as_str() {
        return Err(DetectionError::Api(message.to_string()));
    }

    let Some(annotation) = first["textAnnotations"]
        .as_array()
        .and_then(|annotations| annotations.first())
    else {
        return Ok(None);
    };

    let text = annotation["description"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let confidence = annotation["confidence"].as_f64().unwrap_or(0.0) as f32;

    Ok(Some(Detection { text, confidence }))
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    pub struct MockDetector {
        response: Result<Option<Detection>, DetectionError>,
        calls: AtomicUsize,
    }

    impl MockDetector {
        pub fn found(text: &str, confidence: f32) -> Self {
            Self::with(Ok(Some(Detection {
                text: text.to_string(),
                confidence,
            })))
        }

        pub fn nothing() -> Self {
            Self::with(Ok(None))
        }

        pub fn err(error: DetectionError) -> Self {
            Self::with(Err(error))
        }

        fn with(response: Result<Option<Detection>, DetectionError>) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextDetector for MockDetector {
        async fn detect(&self, _image: &[u8]) -> Result<Option<Detection>, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
