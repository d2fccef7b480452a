//! Parameters for a local recognition run.

use crate::config::LocalOcrConfig;

/// Everything [`TesseractEngine`](crate::ocr::TesseractEngine) needs to run.
///
/// ```
/// use math_ocr::ocr::OcrParams;
///
/// let params = OcrParams::default();
/// assert_eq!(params.languages, "kor+eng");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OcrParams {
    /// Executable name or path.
    pub command: String,
    /// `+`-separated Tesseract language codes.  Korean + English by default.
    pub languages: String,
    pub tessdata_dir: Option<String>,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self::from_config(&LocalOcrConfig::default())
    }
}

impl OcrParams {
    pub fn from_config(config: &LocalOcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            languages: config.languages.clone(),
            tessdata_dir: config.tessdata_dir.clone().filter(|d| !d.is_empty()),
        }
    }
}
