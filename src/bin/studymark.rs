//! CLI binary for studymark.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` and renders the event stream.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use studymark::{
    analyze_stream, AnalysisConfig, AnalysisEvent, BackendKind, MatchCase, PageFailurePolicy,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse and highlight a document (writes analyzed_notes.pdf)
  studymark notes.pdf

  # Write the annotated copy somewhere else
  studymark notes.pdf --output-dir out/

  # Use a local Ollama model instead of Gemini
  studymark --backend ollama --model llama3.2 notes.pdf

  # Raw machine-readable progress, one JSON event per line
  studymark --ndjson notes.pdf

  # Custom analysis instructions
  studymark --prompt-file exam-focus.txt notes.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY       Google Gemini API key (default backend)
  STUDYMARK_MODEL      Override model ID
  STUDYMARK_OUTPUT_DIR Override output directory

SETUP:
  1. Set API key:  export GEMINI_API_KEY=...
  2. Analyse:      studymark notes.pdf
"#;

/// Highlight the key phrases of a PDF using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "studymark",
    version,
    about = "Highlight the key phrases of a PDF using an LLM",
    long_about = "Analyse a PDF page by page with an LLM, locate the recommended phrases \
verbatim in the page text, and save a highlighted copy next to the original. The input \
document is never modified.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file to analyse.
    input: String,

    /// Directory for the annotated copy (default: next to the input).
    #[arg(short, long, env = "STUDYMARK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Backend: gemini or ollama.
    #[arg(long, value_enum, default_value = "gemini")]
    backend: BackendArg,

    /// Model ID (e.g. gemini-2.0-flash, llama3.2).
    #[arg(long, env = "STUDYMARK_MODEL")]
    model: Option<String>,

    /// Backend endpoint override (proxy URL, or the Ollama server address).
    #[arg(long)]
    endpoint: Option<String>,

    /// Path to a text file with custom analysis instructions.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Retries per page after the first failed model call.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Pause between pages in milliseconds.
    #[arg(long, default_value_t = 1000)]
    inter_page_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Match phrases ignoring ASCII case.
    #[arg(long)]
    ignore_case: bool,

    /// Leave failed pages unhighlighted instead of aborting the run.
    #[arg(long)]
    skip_failed_pages: bool,

    /// Emit raw NDJSON events on stdout instead of a progress bar.
    #[arg(long)]
    ndjson: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    Gemini,
    Ollama,
}

impl From<BackendArg> for BackendKind {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Gemini => BackendKind::Gemini,
            BackendArg::Ollama => BackendKind::Ollama,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library logs go to stderr; stdout is reserved for NDJSON output.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.ndjson;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;
    let mut events = analyze_stream(&cli.input, &config)
        .await
        .context("Analysis failed to start")?;

    // ── NDJSON mode: forward events verbatim ─────────────────────────────
    if cli.ndjson {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let mut failed = false;
        while let Some(event) = events.next().await {
            failed = matches!(event, AnalysisEvent::Error { .. });
            handle
                .write_all(event.to_ndjson().as_bytes())
                .and_then(|()| handle.flush())
                .context("Failed to write to stdout")?;
        }
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }

    // ── Interactive mode: progress bar over the same events ──────────────
    let bar = if show_progress {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Analyzing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    while let Some(event) = events.next().await {
        match event {
            AnalysisEvent::Progress {
                current,
                total,
                message,
            } => {
                if let Some(ref bar) = bar {
                    if bar.length().unwrap_or(0) != total as u64 {
                        bar.set_length(total as u64);
                    }
                    bar.set_position(current as u64);
                    bar.set_message(message);
                }
            }
            AnalysisEvent::Error { message } => {
                if let Some(ref bar) = bar {
                    bar.finish_and_clear();
                }
                anyhow::bail!("{message}");
            }
            AnalysisEvent::Complete { data } => {
                if let Some(ref bar) = bar {
                    bar.finish_and_clear();
                }
                if !cli.quiet {
                    eprintln!(
                        "{} {} highlights  →  {}",
                        green("✔"),
                        bold(&data.matches.to_string()),
                        bold(&data.download_url),
                    );
                    for h in &data.highlights {
                        let mark = if h.match_count > 0 {
                            green("✓")
                        } else {
                            red("✗")
                        };
                        eprintln!(
                            "  {} p{:<3} {}  {}",
                            mark,
                            h.page,
                            h.phrase,
                            dim(&h.details)
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .backend_kind(cli.backend.clone().into())
        .max_retries(cli.max_retries)
        .inter_page_delay_ms(cli.inter_page_delay_ms)
        .request_timeout_secs(cli.timeout);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {}", path.display()))?;
        builder = builder.prompt(prompt);
    }
    if cli.ignore_case {
        builder = builder.match_case(MatchCase::Insensitive);
    }
    if cli.skip_failed_pages {
        builder = builder.on_page_failure(PageFailurePolicy::Skip);
    }

    builder.build().context("Invalid configuration")
}
