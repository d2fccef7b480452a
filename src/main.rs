//! Application entry point — math-ocr.
//!
//! # Startup sequence
//!
//! 1. Load `.env`, then initialise logging so `RUST_LOG` may come from it.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Run the chosen subcommand:
//!    * `session` — build the [`RecognitionOrchestrator`] and read commands
//!      from stdin until `quit` or end of input.
//!    * `serve` — run the OCR proxy service.
//!    * `health` — ask the configured proxy whether it is up.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use math_ocr::{
    app::Console,
    config::AppConfig,
    pipeline::{new_shared_session, RecognitionOrchestrator},
    remote::ProxyOcrClient,
    server,
};

/// Worksheet OCR with quality-gated fallback and manual correction.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
Environment Variables:
  - OPENAI_API_KEY: key for `table` extraction (or vision.api_key).
  - GOOGLE_VISION_API_KEY: key for `serve` (or server.api_key).
  - PORT: port for `serve` when --port is not given.
  - RUST_LOG: log filter, default `info`.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    /// Settings file to use instead of the platform default.
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    subcmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Interactive recognition and correction session.
    Session {
        /// Image to open at startup.
        file: Option<PathBuf>,
    },
    /// Run the OCR proxy service.
    Serve {
        /// Port to listen on (overrides $PORT and the settings file).
        #[clap(long)]
        port: Option<u16>,
    },
    /// Check that the configured proxy service is reachable.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env(None);
    logger_builder("RUST_LOG").init();

    let opts = Opts::parse();
    log::debug!("parsed options: {opts:?}");

    let config = match &opts.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    match opts.subcmd {
        Cmd::Session { file } => run_session(&config, file).await,
        Cmd::Serve { port } => {
            let env_port = std::env::var("PORT").ok();
            let port = server::resolve_port(&config.server, port, env_port.as_deref());
            server::serve(&config.server, port).await
        }
        Cmd::Health => {
            let client = ProxyOcrClient::from_config(&config.proxy);
            client
                .health()
                .await
                .with_context(|| format!("proxy at {} is not healthy", client.base_url()))?;
            println!("{}: ok", client.base_url());
            Ok(())
        }
    }
}

/// Load a `.env` file into the process environment. Variables already set
/// take precedence.
fn load_env(path: Option<&Path>) {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|_| ()),
        None => dotenvy::dotenv().map(|_| ()),
    };
    if let Err(e) = loaded {
        if !e.not_found() {
            eprintln!("warning: failed to read .env: {e}");
        }
    }
}

/// Logger reading its filter from `filter_var`, defaulting to `info`.
fn logger_builder(filter_var: &str) -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(filter_var, "info"))
}

// ---------------------------------------------------------------------------
// Interactive session
// ---------------------------------------------------------------------------

async fn run_session(config: &AppConfig, file: Option<PathBuf>) -> Result<()> {
    log::info!(
        "session: local engine `{}` ({}), fallback {}",
        config.local.command,
        config.local.languages,
        config.proxy.base_url
    );

    let orchestrator = RecognitionOrchestrator::from_config(new_shared_session(), config);
    let console = Console::new(orchestrator);

    if let Some(path) = file {
        print_lines(&console.handle_line(&format!("open {}", path.display())).await.lines);
    }
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };

        let reply = console.handle_line(&line).await;
        print_lines(&reply.lines);
        if reply.quit {
            break;
        }
    }

    log::info!("session: closed");
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
