//! # studymark
//!
//! Analyse PDF study material with an LLM and highlight what matters.
//!
//! ## Why this crate?
//!
//! Reading a 40-page lecture handout cold is slow. This crate sends each
//! page's text to a model, asks for the phrases worth remembering, finds
//! those phrases verbatim in the page, and writes a highlighted copy of the
//! document — leaving the original untouched. Phrases the model invents
//! simply fail to match and are reported with zero matches, so the output
//! never highlights text that is not on the page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Open       snapshot per-page text + glyph layout (pdfium, spawn_blocking)
//!  ├─ 2. Recommend  one model call per page, retried with backoff
//!  ├─ 3. Locate     exact substring search over the page snapshot
//!  ├─ 4. Annotate   one Highlight mark per located occurrence (lopdf)
//!  └─ 5. Save       analyzed_<name>.pdf, never overwriting the input
//! ```
//!
//! Pages are processed strictly in order with a throttle between model
//! calls; progress is observable as it happens via [`analyze_stream`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use studymark::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend auto-configured from GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let report = analyze("lecture.pdf", &config).await?;
//!     println!("{} highlights written to {}", report.matches, report.output_ref);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studymark` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! studymark = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod config;
pub mod doc;
pub mod error;
pub mod event;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::analyze;
pub use backend::{BackendKind, ModelBackend};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, MatchCase, PageFailurePolicy,
};
pub use doc::{Document, DocumentStore, Region};
pub use error::{AnalyzeError, BackendError};
pub use event::{AnalysisEvent, CompleteData};
pub use output::{AnalysisReport, AnalysisStats, Highlight};
pub use stream::{analyze_stream, EventStream};
