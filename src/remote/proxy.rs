//! Client for the local proxy service (`POST /api/ocr`, `GET /api/health`).
//!
//! Wire format:
//!
//! ```text
//! POST {base_url}/api/ocr   multipart: image=<file>
//!   2xx → { "text": "...", "confidence": 0.93?, "success": true? }
//!   4xx/5xx → { "error": "...", "details": "..."? }
//! GET  {base_url}/api/health → { "status": "ok" }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::config::ProxyConfig;
use crate::remote::client::{FallbackOcr, ImagePayload, RemoteError, RemoteRecognition};

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Fallback text detection through the proxy service.
pub struct ProxyOcrClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyOcrClient {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/health`; succeeds only on `{"status": "ok"}`.
    pub async fn health(&self) -> Result<(), RemoteError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        if health.status == "ok" {
            Ok(())
        } else {
            Err(RemoteError::Rejected(format!("health status {}", health.status)))
        }
    }
}

#[async_trait]
impl FallbackOcr for ProxyOcrClient {
    async fn detect_text(&self, image: &ImagePayload) -> Result<RemoteRecognition, RemoteError> {
        let url = format!("{}/api/ocr", self.base_url);

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)
            .map_err(|e| RemoteError::Request(e.to_string()))?;
        let form = Form::new().part("image", part);

        log::debug!(
            "remote: POST {url} ({}, {} bytes)",
            image.mime,
            image.bytes.len()
        );
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            let message = match body.details {
                Some(details) => format!("{error} ({details})"),
                None => error,
            };
            return Err(RemoteError::Rejected(message));
        }
        if body.success == Some(false) {
            return Err(RemoteError::Rejected("success=false".into()));
        }

        Ok(RemoteRecognition {
            text: body.text.unwrap_or_default(),
            confidence: body.confidence.unwrap_or(0.0),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> ImagePayload {
        ImagePayload {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime: "image/jpeg".into(),
            file_name: "sheet.jpg".into(),
        }
    }

    fn client_for(server: &MockServer) -> ProxyOcrClient {
        ProxyOcrClient::from_config(&ProxyConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
        })
    }

    #[tokio::test]
    async fn success_returns_text_and_confidence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ocr"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "3 + 4 = 7",
                "confidence": 0.9,
                "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).detect_text(&payload()).await.unwrap();

        assert_eq!(result.text, "3 + 4 = 7");
        assert!((result.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn missing_confidence_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ocr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "" })))
            .mount(&server)
            .await;

        let result = client_for(&server).detect_text(&payload()).await.unwrap();

        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn http_500_is_status_error_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ocr"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "이미지 처리 중 오류가 발생했습니다.",
                "details": "quota exceeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).detect_text(&payload()).await.unwrap_err();

        match err {
            RemoteError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("quota exceeded"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_field_in_2xx_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ocr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "bad image" })))
            .mount(&server)
            .await;

        let err = client_for(&server).detect_text(&payload()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(ref m) if m.contains("bad image")));
    }

    #[tokio::test]
    async fn non_json_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ocr"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).detect_text(&payload()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Parse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_request_error() {
        let client = ProxyOcrClient::from_config(&ProxyConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
        });
        let err = client.detect_text(&payload()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Request(_) | RemoteError::Timeout));
    }

    #[tokio::test]
    async fn health_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;

        assert!(client_for(&server).health().await.is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ProxyOcrClient::from_config(&ProxyConfig {
            base_url: "http://localhost:5001/".into(),
            timeout_secs: 1,
        });
        assert_eq!(client.base_url(), "http://localhost:5001");
    }
}
