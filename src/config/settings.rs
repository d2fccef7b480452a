//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section uses `#[serde(default)]` so a partial `settings.toml` only
//! overrides the keys it names.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

/// Acceptance thresholds for the local OCR result.
///
/// A local result is trusted as-is only when its text has at least
/// `min_acceptable_length` characters and its confidence (when reported) is
/// at least `min_acceptable_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub min_acceptable_length: usize,
    /// Percentage in `[0, 100]`.
    pub min_acceptable_confidence: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_acceptable_length: 10,
            min_acceptable_confidence: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// LocalOcrConfig
// ---------------------------------------------------------------------------

/// Settings for the local Tesseract engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOcrConfig {
    /// Name or path of the `tesseract` executable.
    pub command: String,
    /// Tesseract language set, `+`-separated.
    pub languages: String,
    /// Optional `--tessdata-dir` override.
    pub tessdata_dir: Option<String>,
}

impl Default for LocalOcrConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".into(),
            languages: "kor+eng".into(),
            tessdata_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProxyConfig
// ---------------------------------------------------------------------------

/// Where the fallback text-detection proxy lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL of the proxy service, without a trailing `/api/...`.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// VisionConfig
// ---------------------------------------------------------------------------

/// Settings for the chat-completion table extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// API key.  When `None` or empty the key is read from the environment
    /// variable named by `api_key_env` at call time.
    pub api_key: Option<String>,
    pub api_key_env: String,
    /// Vision-capable model identifier.
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".into(),
            model: "gpt-4-vision-preview".into(),
            max_tokens: 1024,
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// FallbackInput
// ---------------------------------------------------------------------------

/// Which bytes the gated path hands to the fallback proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackInput {
    /// The uploaded file, untouched (rotation ignored).
    Original,
    /// The rotated PNG produced by the image normalizer.
    Normalized,
}

impl Default for FallbackInput {
    fn default() -> Self {
        Self::Original
    }
}

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Behaviour of the two recognition entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub fallback_input: FallbackInput,
    /// Whether a structured (table) extraction lands in the editor instead
    /// of being frozen as final immediately.
    pub structured_edit_step: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            fallback_input: FallbackInput::default(),
            structured_edit_step: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings for the bundled proxy service (`math-ocr serve`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Overridden by the `PORT` environment variable when set.
    pub port: u16,
    /// Google Cloud Vision endpoint for `images:annotate`.
    pub detection_url: String,
    /// API key for the detection endpoint.  When `None` the key is read
    /// from `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5001,
            detection_url: "https://vision.googleapis.com/v1/images:annotate".into(),
            api_key: None,
            api_key_env: "GOOGLE_VISION_API_KEY".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use math_ocr::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert_eq!(config.gate.min_acceptable_length, 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gate: GateConfig,
    pub local: LocalOcrConfig,
    pub proxy: ProxyConfig,
    pub vision: VisionConfig,
    pub recognition: RecognitionConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
