//! Terminal session: one command per line, dispatched onto the pipeline.
//!
//! # Commands
//!
//! | Command | Effect |
//! |---------|--------|
//! | `open <path>` | Load a JPEG or PDF, resetting any previous result |
//! | `rotate [degrees]` | Turn the image a quarter turn clockwise, or to an exact angle |
//! | `ocr` | Local recognition with quality-gated fallback |
//! | `table` | Markdown-table extraction by the vision model |
//! | `edit <text>` | Replace the draft (`\n` for a line break) |
//! | `done` | Accept the draft as final |
//! | `reopen` | Edit the final text again |
//! | `show` | Print the current draft or final text |
//! | `status` | File, rotation, phase and last engine |
//! | `help` | This list |
//! | `quit` | Leave the session |

use std::path::PathBuf;

use thiserror::Error;

use crate::imaging::{Rotation, SourceImage, UploadError, UNSUPPORTED_UPLOAD_NOTICE};
use crate::pipeline::{
    lock_session, PipelineError, RecognitionMode, RecognitionOrchestrator, SessionPhase,
    GENERIC_ERROR_TEXT,
};

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Open(PathBuf),
    /// `None` turns a quarter clockwise; `Some` sets the angle outright.
    Rotate(Option<Rotation>),
    Ocr,
    Table,
    Edit(String),
    Done,
    Reopen,
    Show,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid argument for `{command}`: {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

impl SessionCommand {
    /// Parse one input line.  Keywords are case-insensitive; the argument is
    /// everything after the first run of whitespace.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim_start()),
            None => (line, ""),
        };

        match keyword.to_ascii_lowercase().as_str() {
            "open" | "o" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("open"));
                }
                Ok(SessionCommand::Open(PathBuf::from(rest)))
            }
            "rotate" | "r" => parse_rotation(rest).map(SessionCommand::Rotate),
            "ocr" => Ok(SessionCommand::Ocr),
            "table" => Ok(SessionCommand::Table),
            // An empty edit is allowed: it clears the draft.
            "edit" | "e" => Ok(SessionCommand::Edit(unescape(rest))),
            "done" | "commit" => Ok(SessionCommand::Done),
            "reopen" => Ok(SessionCommand::Reopen),
            "show" | "s" => Ok(SessionCommand::Show),
            "status" => Ok(SessionCommand::Status),
            "help" | "h" | "?" => Ok(SessionCommand::Help),
            "quit" | "q" | "exit" => Ok(SessionCommand::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_rotation(arg: &str) -> Result<Option<Rotation>, CommandError> {
    if arg.is_empty() {
        return Ok(None);
    }
    let invalid = |reason: String| CommandError::InvalidArgument {
        command: "rotate",
        reason,
    };
    let degrees: i32 = arg
        .trim_end_matches('°')
        .parse()
        .map_err(|_| invalid(format!("`{arg}` is not a number")))?;
    Rotation::from_degrees(degrees)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}

/// Expand `\n`, `\t` and `\\`; any other escape is kept verbatim.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub const HELP: &str = "\
commands:
  open <path>   load a JPEG or PDF
  rotate [deg]  rotate 90° clockwise, or to 0/90/180/270
  ocr           recognize text (local, then fallback)
  table         extract a markdown table
  edit <text>   replace the draft (\\n = line break)
  done          accept the draft as final
  reopen        edit the final text again
  show          print the current text
  status        show file, rotation and phase
  quit          leave";

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Output of one command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            quit: false,
        }
    }

    fn push(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }
}

/// Dispatches parsed commands onto the orchestrator and its session.
pub struct Console {
    orchestrator: RecognitionOrchestrator,
}

impl Console {
    pub fn new(orchestrator: RecognitionOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Parse and execute one input line.
    pub async fn handle_line(&self, line: &str) -> Reply {
        match SessionCommand::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(CommandError::Empty) => Reply::default(),
            Err(e) => Reply::line(e.to_string()),
        }
    }

    pub async fn execute(&self, command: SessionCommand) -> Reply {
        match command {
            SessionCommand::Open(path) => self.open(path),
            SessionCommand::Rotate(rotation) => self.rotate(rotation),
            SessionCommand::Ocr => self.recognize(RecognitionMode::Gated).await,
            SessionCommand::Table => self.recognize(RecognitionMode::Structured).await,
            SessionCommand::Edit(text) => self.edit(text),
            SessionCommand::Done => self.commit(),
            SessionCommand::Reopen => self.reopen(),
            SessionCommand::Show => self.show(),
            SessionCommand::Status => self.status(),
            SessionCommand::Help => Reply::line(HELP),
            SessionCommand::Quit => Reply {
                lines: Vec::new(),
                quit: true,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn open(&self, path: PathBuf) -> Reply {
        let source = match SourceImage::load(&path) {
            Ok(source) => source,
            Err(UploadError::UnsupportedKind { mime }) => {
                log::warn!("app: rejected {} ({mime})", path.display());
                return Reply::line(UNSUPPORTED_UPLOAD_NOTICE);
            }
            Err(e) => return Reply::line(e.to_string()),
        };

        let summary = format!(
            "opened {} ({}, {} bytes)",
            source.file_name(),
            source.kind().label(),
            source.bytes().len()
        );
        match lock_session(self.orchestrator.session()).open(source) {
            Ok(()) => Reply::line(summary),
            Err(e) => Reply::line(e.notice()),
        }
    }

    fn rotate(&self, rotation: Option<Rotation>) -> Reply {
        let mut session = lock_session(self.orchestrator.session());
        let result = match rotation {
            Some(rotation) => session.set_rotation(rotation).map(|()| rotation),
            None => session.rotate(),
        };
        match result {
            Ok(rotation) => Reply::line(format!("rotation: {}°", rotation.degrees())),
            Err(e) => Reply::line(e.notice()),
        }
    }

    async fn recognize(&self, mode: RecognitionMode) -> Reply {
        let request = self.orchestrator.request(mode);

        match self.orchestrator.run(request).await {
            Ok(outcome) => {
                let attempt = &outcome.attempt;
                let mut reply = Reply::line(match attempt.confidence() {
                    Some(confidence) => format!(
                        "[{}] confidence {:.1}",
                        attempt.engine().label(),
                        confidence
                    ),
                    None => format!("[{}]", attempt.engine().label()),
                });
                if let Some(failure) = &outcome.failure {
                    reply.push(format!("error: {failure}"));
                }
                reply.lines.extend(self.show().lines);
                reply
            }
            Err(PipelineError::Session(e)) => Reply::line(e.notice()),
            Err(e) => {
                let mut reply = Reply::line(format!("error: {e}"));
                reply.push(GENERIC_ERROR_TEXT);
                reply
            }
        }
    }

    fn edit(&self, text: String) -> Reply {
        match lock_session(self.orchestrator.session()).edit(text) {
            Ok(()) => Reply::line("draft updated"),
            Err(e) => Reply::line(e.notice()),
        }
    }

    fn commit(&self) -> Reply {
        let result = lock_session(self.orchestrator.session()).commit();
        match result {
            Ok(()) => {
                let mut reply = Reply::line("final:");
                reply.lines.extend(self.show().lines);
                reply
            }
            Err(e) => Reply::line(e.notice()),
        }
    }

    fn reopen(&self) -> Reply {
        let result = lock_session(self.orchestrator.session()).reopen();
        match result {
            Ok(()) => {
                let mut reply = Reply::line("editing:");
                reply.lines.extend(self.show().lines);
                reply
            }
            Err(e) => Reply::line(e.notice()),
        }
    }

    fn show(&self) -> Reply {
        let session = lock_session(self.orchestrator.session());
        match session.displayed_text() {
            Some("") => Reply::line("(empty)"),
            Some(text) => Reply {
                lines: text.lines().map(str::to_string).collect(),
                quit: false,
            },
            None => Reply::line("(no result yet)"),
        }
    }

    fn status(&self) -> Reply {
        let session = lock_session(self.orchestrator.session());
        let Some(source) = session.source() else {
            return Reply::line(format!("{} (no file)", SessionPhase::Idle.label()));
        };

        let mut reply = Reply::line(format!(
            "{}: {} ({}), rotation {}°",
            session.phase().label(),
            source.file_name(),
            source.kind().label(),
            source.rotation().degrees()
        ));
        if let Some(attempt) = session.attempt() {
            reply.push(format!(
                "last attempt: {} at {}",
                attempt.engine().label(),
                attempt.timestamp().format("%H:%M:%S")
            ));
        }
        if let Some(failure) = session.last_failure() {
            reply.push(format!("last error: {failure}"));
        }
        reply
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use image::{DynamicImage, ImageFormat, RgbImage};
    use tempfile::TempDir;

    use crate::ocr::MockLocalEngine;
    use crate::pipeline::{new_shared_session, PROCESSING_ERROR_TEXT};
    use crate::remote::client::mock::{MockExtractor, MockFallback};
    use crate::remote::RemoteError;

    // ---- parsing ---

    #[test]
    fn parses_keywords_case_insensitively() {
        assert_eq!(SessionCommand::parse("OCR"), Ok(SessionCommand::Ocr));
        assert_eq!(SessionCommand::parse("  table "), Ok(SessionCommand::Table));
        assert_eq!(SessionCommand::parse("q"), Ok(SessionCommand::Quit));
        assert_eq!(SessionCommand::parse("done"), Ok(SessionCommand::Done));
    }

    #[test]
    fn open_keeps_spaces_in_path() {
        assert_eq!(
            SessionCommand::parse("open my sheets/week 1.jpg"),
            Ok(SessionCommand::Open(PathBuf::from("my sheets/week 1.jpg")))
        );
    }

    #[test]
    fn open_without_path_is_an_error() {
        assert_eq!(
            SessionCommand::parse("open"),
            Err(CommandError::MissingArgument("open"))
        );
    }

    #[test]
    fn edit_expands_escapes() {
        assert_eq!(
            SessionCommand::parse(r"edit 2x + 3 = 7\nx = 2"),
            Ok(SessionCommand::Edit("2x + 3 = 7\nx = 2".into()))
        );
        assert_eq!(unescape(r"a\\nb"), r"a\nb");
        assert_eq!(unescape(r"tab\there"), "tab\there");
        assert_eq!(unescape(r"keep \x and trailing \"), r"keep \x and trailing \");
    }

    #[test]
    fn empty_edit_clears_draft() {
        assert_eq!(SessionCommand::parse("edit"), Ok(SessionCommand::Edit(String::new())));
    }

    #[test]
    fn rotate_takes_optional_angle() {
        assert_eq!(SessionCommand::parse("rotate"), Ok(SessionCommand::Rotate(None)));
        assert_eq!(
            SessionCommand::parse("r 270"),
            Ok(SessionCommand::Rotate(Some(Rotation::Deg270)))
        );
        assert_eq!(
            SessionCommand::parse("rotate -90°"),
            Ok(SessionCommand::Rotate(Some(Rotation::Deg270)))
        );
        assert!(matches!(
            SessionCommand::parse("rotate 45"),
            Err(CommandError::InvalidArgument { command: "rotate", .. })
        ));
        assert!(matches!(
            SessionCommand::parse("rotate left"),
            Err(CommandError::InvalidArgument { command: "rotate", .. })
        ));
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!(SessionCommand::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            SessionCommand::parse("grade"),
            Err(CommandError::Unknown("grade".into()))
        );
    }

    // ---- dispatch ---

    fn console(local: MockLocalEngine, fallback: MockFallback, table: MockExtractor) -> Console {
        Console::new(RecognitionOrchestrator::new(
            new_shared_session(),
            Arc::new(local),
            Arc::new(fallback),
            Arc::new(table),
        ))
    }

    fn write_jpeg(dir: &TempDir, name: &str) -> PathBuf {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(6, 4))
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, jpeg).unwrap();
        path
    }

    #[tokio::test]
    async fn ocr_edit_done_reopen_flow() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "sheet.jpg");
        let console = console(
            MockLocalEngine::ok("x=5", Some(90.0)),
            MockFallback::ok("x = 5\ny = 10"),
            MockExtractor::ok("unused"),
        );

        let reply = console.handle_line(&format!("open {}", path.display())).await;
        assert!(reply.lines[0].starts_with("opened sheet.jpg (JPEG"));

        let reply = console.handle_line("ocr").await;
        assert_eq!(reply.lines[0], "[remote-fallback] confidence 0.0");
        assert_eq!(&reply.lines[1..], ["x = 5", "y = 10"]);

        console.handle_line(r"edit x = 5\ny = 11").await;
        let reply = console.handle_line("done").await;
        assert_eq!(reply.lines, ["final:", "x = 5", "y = 11"]);

        let reply = console.handle_line("reopen").await;
        assert_eq!(reply.lines, ["editing:", "x = 5", "y = 11"]);
    }

    #[tokio::test]
    async fn ocr_without_upload_prompts_for_file() {
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::ok("unused"),
        );
        let reply = console.handle_line("ocr").await;
        assert_eq!(reply.lines, ["먼저 파일을 업로드해주세요."]);
    }

    #[tokio::test]
    async fn pdf_upload_is_accepted_but_not_recognized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n").unwrap();
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::ok("unused"),
        );

        let reply = console.handle_line(&format!("open {}", path.display())).await;
        assert!(reply.lines[0].contains("PDF"));

        let reply = console.handle_line("ocr").await;
        assert_eq!(reply.lines, ["PDF의 경우, 현재는 JPG만 OCR이 지원됩니다."]);
    }

    #[tokio::test]
    async fn unsupported_upload_shows_notice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just text").unwrap();
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::ok("unused"),
        );

        let reply = console.handle_line(&format!("open {}", path.display())).await;
        assert_eq!(reply.lines, [UNSUPPORTED_UPLOAD_NOTICE]);
        assert_eq!(console.handle_line("show").await.lines, ["(no result yet)"]);
    }

    #[tokio::test]
    async fn table_failure_shows_placeholder_as_final() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "table.jpg");
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::err(RemoteError::Timeout),
        );

        console.handle_line(&format!("open {}", path.display())).await;
        let reply = console.handle_line("table").await;

        assert_eq!(reply.lines[0], "[remote-structured]");
        assert!(reply.lines[1].starts_with("error:"));
        assert_eq!(reply.lines[2], PROCESSING_ERROR_TEXT);

        let reply = console.handle_line("edit fix").await;
        assert_eq!(reply.lines, ["수정 중이 아닙니다."]);
    }

    #[tokio::test]
    async fn rotate_and_status() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "sheet.jpg");
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::ok("unused"),
        );

        console.handle_line(&format!("open {}", path.display())).await;
        assert_eq!(console.handle_line("rotate").await.lines, ["rotation: 90°"]);
        assert_eq!(console.handle_line("rotate").await.lines, ["rotation: 180°"]);

        let reply = console.handle_line("status").await;
        assert_eq!(reply.lines, ["Idle: sheet.jpg (JPEG), rotation 180°"]);

        assert_eq!(console.handle_line("rotate 0").await.lines, ["rotation: 0°"]);
        assert_eq!(console.handle_line("rotate").await.lines, ["rotation: 90°"]);
    }

    #[tokio::test]
    async fn rotate_to_angle_without_file_is_refused() {
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::ok("unused"),
        );
        assert_eq!(
            console.handle_line("rotate 180").await.lines,
            ["먼저 파일을 업로드해주세요."]
        );
    }

    #[tokio::test]
    async fn empty_fallback_draft_is_shown_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "blank.jpg");
        let console = console(
            MockLocalEngine::ok("x", Some(95.0)),
            MockFallback::ok(""),
            MockExtractor::ok("unused"),
        );

        console.handle_line(&format!("open {}", path.display())).await;
        let reply = console.handle_line("ocr").await;
        assert_eq!(reply.lines[0], "[remote-fallback] confidence 0.0");
        assert_eq!(reply.lines[1..], ["(empty)"]);

        assert_eq!(console.handle_line("show").await.lines, ["(empty)"]);
        assert_eq!(console.handle_line("done").await.lines, ["final:", "(empty)"]);
    }

    #[tokio::test]
    async fn quit_sets_flag() {
        let console = console(
            MockLocalEngine::ok("unused", None),
            MockFallback::ok("unused"),
            MockExtractor::ok("unused"),
        );
        assert!(console.handle_line("quit").await.quit);
        assert!(!console.handle_line("help").await.quit);
        assert!(console.handle_line("bogus").await.lines[0].contains("unknown command"));
    }
}
