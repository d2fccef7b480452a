//! Table extraction through an OpenAI-compatible `/v1/chat/completions`
//! endpoint.
//!
//! The credential is resolved on every call, never at construction, so a
//! missing key surfaces when the user asks for a table and not at startup.
//! An authentication failure is reported as-is and not retried.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::VisionConfig;
use crate::remote::client::{ImagePayload, RemoteError, StructuredExtractor};
use crate::remote::prompt::{data_url, table_request};

/// Structured extractor backed by a vision-capable chat model.
pub struct VisionTableExtractor {
    client: reqwest::Client,
    config: VisionConfig,
}

impl VisionTableExtractor {
    pub fn from_config(config: &VisionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Config key first, then the configured environment variable.
    fn credential(&self) -> Result<String, RemoteError> {
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RemoteError::MissingCredential(format!(
                    "vision.api_key or ${}",
                    self.config.api_key_env
                ))
            })
    }
}

#[async_trait]
impl StructuredExtractor for VisionTableExtractor {
    async fn extract_table(&self, image: &ImagePayload) -> Result<String, RemoteError> {
        let key = self.credential()?;

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = table_request(
            &self.config.model,
            self.config.max_tokens,
            &data_url(&image.mime, &image.bytes),
        );

        log::debug!("remote: POST {url} (model {})", self.config.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let status = status.as_u16();
            return Err(match status {
                401 | 403 => RemoteError::Unauthorized { status, body },
                _ => RemoteError::Status { status, body },
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(RemoteError::EmptyResponse)?
            .trim()
            .to_string();

        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
