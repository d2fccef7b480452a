//! Local recognition engine trait and the Tesseract implementation.
//!
//! [`LocalEngine`] is the interface used by the orchestrator.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn LocalEngine>`.
//!
//! [`TesseractEngine`] drives the `tesseract` CLI.  Each call writes the
//! normalized PNG into its own temporary directory, asks Tesseract for both
//! `txt` and `tsv` output, and reads text and confidence back.  Only the
//! trailing page separator is stripped from the text; its final newline is
//! kept and counts toward the gate's length check.  The directory
//! is removed when the call returns, whether it succeeded or not.
//!
//! [`MockLocalEngine`] (test-only) returns a pre-configured result and counts
//! its calls.

use std::process::Output;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::imaging::PixelBuffer;
use crate::ocr::params::OcrParams;
use crate::ocr::progress::ProgressSink;
use crate::ocr::tsv::mean_word_confidence;

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Engine-internal failure.  The orchestrator treats it as "no result".
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The engine binary could not be started.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// Scratch files could not be written or read.
    #[error("OCR scratch I/O failed: {0}")]
    Io(String),

    /// The engine ran but reported failure.
    #[error("OCR engine failed: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// LocalRecognition
// ---------------------------------------------------------------------------

/// Text and confidence from one local engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecognition {
    pub text: String,
    /// Percentage in `[0, 100]`; `None` when the engine reported nothing.
    pub confidence: Option<f32>,
}

impl LocalRecognition {
    pub fn new(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// LocalEngine trait
// ---------------------------------------------------------------------------

/// Free, local, multi-language text recognition.
///
/// Implementations must not block the async runtime; long work belongs in
/// a child process or `spawn_blocking`.
#[async_trait]
pub trait LocalEngine: Send + Sync {
    async fn recognize(
        &self,
        buffer: &PixelBuffer,
        progress: &dyn ProgressSink,
    ) -> Result<LocalRecognition, RecognitionError>;
}

// Compile-time assertion: Box<dyn LocalEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn LocalEngine>) {}
};

// ---------------------------------------------------------------------------
// TesseractEngine
// ---------------------------------------------------------------------------

/// Local engine backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    params: OcrParams,
}

impl TesseractEngine {
    pub fn new(params: OcrParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OcrParams {
        &self.params
    }

    fn command(&self, input: &std::path::Path, output_base: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.params.command);
        cmd.arg(input).arg(output_base);
        if let Some(dir) = &self.params.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("-l").arg(&self.params.languages);
        cmd.arg("txt").arg("tsv");
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl LocalEngine for TesseractEngine {
    async fn recognize(
        &self,
        buffer: &PixelBuffer,
        progress: &dyn ProgressSink,
    ) -> Result<LocalRecognition, RecognitionError> {
        progress.report("preparing image", 0.0);

        let scratch = tempfile::TempDir::with_prefix("math-ocr")
            .map_err(|e| RecognitionError::Io(e.to_string()))?;
        let input_path = scratch.path().join("input.png");
        let output_base = scratch.path().join("output");

        tokio::fs::write(&input_path, buffer.png())
            .await
            .map_err(|e| RecognitionError::Io(format!("cannot write input image: {e}")))?;

        progress.report("recognizing text", 0.1);
        log::debug!(
            "ocr: running {} on {}x{} image ({})",
            self.params.command,
            buffer.width(),
            buffer.height(),
            self.params.languages
        );

        let output = self
            .command(&input_path, &output_base)
            .output()
            .await
            .map_err(|e| RecognitionError::Unavailable(format!("{}: {e}", self.params.command)))?;
        check_exit(&output)?;

        progress.report("reading results", 0.9);

        let text = tokio::fs::read_to_string(output_base.with_extension("txt"))
            .await
            .map_err(|e| RecognitionError::Io(format!("cannot read text output: {e}")))?;
        let tsv = tokio::fs::read_to_string(output_base.with_extension("tsv"))
            .await
            .map_err(|e| RecognitionError::Io(format!("cannot read tsv output: {e}")))?;

        let result = LocalRecognition {
            text: strip_page_separator(&text).to_string(),
            confidence: mean_word_confidence(&tsv),
        };

        progress.report("done", 1.0);
        Ok(result)
    }
}

/// Tesseract ends each page of `txt` output with a form feed.
fn strip_page_separator(text: &str) -> &str {
    text.trim_end_matches('\x0c')
}

fn check_exit(output: &Output) -> Result<(), RecognitionError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(RecognitionError::Engine(format!(
        "exited with {}: {}",
        output.status,
        stderr.trim()
    )))
}

// ---------------------------------------------------------------------------
// MockLocalEngine  (test-only)
// ---------------------------------------------------------------------------

/// Test double that returns a fixed result and counts invocations.
#[cfg(test)]
pub struct MockLocalEngine {
    response: Result<LocalRecognition, RecognitionError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockLocalEngine {
    pub fn ok(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            response: Ok(LocalRecognition::new(text, confidence)),
            calls: Default::default(),
        }
    }

    pub fn err(error: RecognitionError) -> Self {
        Self {
            response: Err(error),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl LocalEngine for MockLocalEngine {
    async fn recognize(
        &self,
        _buffer: &PixelBuffer,
        progress: &dyn ProgressSink,
    ) -> Result<LocalRecognition, RecognitionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        progress.report("done", 1.0);
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{normalize_bytes, Rotation};
    use crate::ocr::progress::{NoProgress, RecordingProgress};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn tiny_buffer() -> PixelBuffer {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        normalize_bytes(&jpeg, Rotation::Deg0).unwrap()
    }

    #[tokio::test]
    async fn mock_ok_returns_configured_result() {
        let engine = MockLocalEngine::ok("x = 5", Some(80.0));
        let result = engine.recognize(&tiny_buffer(), &NoProgress).await.unwrap();
        assert_eq!(result, LocalRecognition::new("x = 5", Some(80.0)));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn mock_err_returns_configured_error() {
        let engine = MockLocalEngine::err(RecognitionError::Engine("boom".into()));
        let err = engine.recognize(&tiny_buffer(), &NoProgress).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Engine(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let engine = TesseractEngine::new(OcrParams {
            command: "/nonexistent/bin/tesseract-math-ocr".into(),
            ..OcrParams::default()
        });
        let progress = RecordingProgress::new();

        let err = engine.recognize(&tiny_buffer(), &progress).await.unwrap_err();

        assert!(matches!(err, RecognitionError::Unavailable(_)), "got {err:?}");
        let events = progress.events();
        assert_eq!(events.first().map(|e| e.0.as_str()), Some("preparing image"));
        assert!(events.iter().all(|(status, _)| status != "done"));
    }

    /// Write an executable stand-in for the `tesseract` CLI into `dir`.
    /// It records its arguments in `dir/args`, one per line.
    #[cfg(unix)]
    fn fake_tesseract(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n{body}\n",
            dir.path().join("args").display()
        );
        let path = dir.path().join("tesseract");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    fn recorded_args(dir: &tempfile::TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("args"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tesseract_output_files_are_read_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = fake_tesseract(
            &dir,
            r#"printf '123456789\n\f' > "$2.txt"
printf 'level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n' > "$2.tsv"
printf '1\t1\t0\t0\t0\t0\t0\t0\t100\t40\t-1\t\n' >> "$2.tsv"
printf '5\t1\t1\t1\t1\t1\t10\t10\t80\t20\t91\t123456789\n' >> "$2.tsv""#,
        );
        let engine = TesseractEngine::new(OcrParams {
            command,
            ..OcrParams::default()
        });
        let progress = RecordingProgress::new();

        let result = engine.recognize(&tiny_buffer(), &progress).await.unwrap();

        assert_eq!(result.text, "123456789\n");
        assert_eq!(result.confidence, Some(91.0));
        assert_eq!(
            progress.events().last().map(|e| e.0.as_str()),
            Some("done")
        );

        let args = recorded_args(&dir);
        assert_eq!(args.len(), 6, "got {args:?}");
        assert!(args[0].ends_with("input.png"));
        assert!(args[1].ends_with("output"));
        assert_eq!(args[2..], ["-l", "kor+eng", "txt", "tsv"]);

        let scratch = std::path::Path::new(&args[0]).parent().unwrap();
        assert!(!scratch.exists(), "{} was left behind", scratch.display());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tessdata_dir_is_passed_before_languages() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = fake_tesseract(&dir, r#": > "$2.txt"; : > "$2.tsv""#);
        let engine = TesseractEngine::new(OcrParams {
            command,
            languages: "eng".into(),
            tessdata_dir: Some("/opt/tessdata".into()),
        });

        let result = engine.recognize(&tiny_buffer(), &NoProgress).await.unwrap();

        assert_eq!(result, LocalRecognition::new("", None));
        assert_eq!(
            recorded_args(&dir)[2..],
            ["--tessdata-dir", "/opt/tessdata", "-l", "eng", "txt", "tsv"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tesseract_is_engine_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = fake_tesseract(
            &dir,
            "echo 'Failed loading language kor' >&2\nexit 1",
        );
        let engine = TesseractEngine::new(OcrParams {
            command,
            ..OcrParams::default()
        });
        let progress = RecordingProgress::new();

        let err = engine.recognize(&tiny_buffer(), &progress).await.unwrap_err();

        match &err {
            RecognitionError::Engine(msg) => {
                assert!(msg.contains("Failed loading language kor"), "got {msg}")
            }
            other => panic!("expected Engine error, got {other:?}"),
        }
        assert!(progress.events().iter().all(|(status, _)| status != "done"));

        let args = recorded_args(&dir);
        let scratch = std::path::Path::new(&args[0]).parent().unwrap();
        assert!(!scratch.exists(), "{} was left behind", scratch.display());
    }

    #[test]
    fn only_the_page_separator_is_stripped() {
        assert_eq!(strip_page_separator("x = 5\n\x0c"), "x = 5\n");
        assert_eq!(strip_page_separator("x = 5\n"), "x = 5\n");
        assert_eq!(strip_page_separator("\x0c"), "");
    }

    #[test]
    fn box_dyn_local_engine_compiles() {
        let _engine: Box<dyn LocalEngine> = Box::new(MockLocalEngine::ok("ok", None));
    }

    #[test]
    fn recognition_error_display() {
        let e = RecognitionError::Unavailable("tesseract: not found".into());
        assert!(e.to_string().contains("tesseract: not found"));
    }
}
