//! Streaming analysis API: emit status events as pages are processed.
//!
//! ## Why stream?
//!
//! A multi-page document with a rate-limited backend takes minutes. The
//! streaming API yields [`AnalysisEvent`]s as they happen so callers can
//! forward them directly to a progress UI or an NDJSON transport instead of
//! waiting for the whole run.
//!
//! Events travel over a bounded channel wrapped in a
//! [`ReceiverStream`]. Dropping the stream closes the channel; the producer
//! task notices at its next send and stops, so an abandoned run never keeps
//! calling the backend or writes an output file.

use crate::backend::{resolve_backend, ModelBackend};
use crate::config::{AnalysisConfig, PageFailurePolicy};
use crate::doc::{Document, DocumentStore, FsStore};
use crate::error::AnalyzeError;
use crate::event::{AnalysisEvent, CompleteData};
use crate::output::Highlight;
use crate::pipeline::{annotate_page, recommend_page};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A boxed stream of analysis events.
pub type EventStream = Pin<Box<dyn Stream<Item = AnalysisEvent> + Send>>;

/// Analyse a document, streaming status events as pages complete.
///
/// Setup failures — document missing or unreadable, missing credentials,
/// invalid configuration — are returned as `Err` before any event exists.
/// Once the stream is returned, every further failure is reported on the
/// stream itself: the sequence is zero or more `progress` events followed
/// by exactly one terminal `complete` or `error` event.
///
/// # Example
/// ```rust,no_run
/// use studymark::{analyze_stream, AnalysisConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AnalysisConfig::default();
/// let mut events = analyze_stream("notes.pdf", &config).await?;
/// while let Some(event) = events.next().await {
///     print!("{}", event.to_ndjson());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn analyze_stream(
    id: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<EventStream, AnalyzeError> {
    let id = id.as_ref().to_string();
    info!("Starting analysis: {id}");

    let backend = resolve_backend(config)?;
    let store: Arc<dyn DocumentStore> = match config.store {
        Some(ref store) => Arc::clone(store),
        None => Arc::new(FsStore::new(config.output_dir.clone())),
    };

    // Opening captures the page-text snapshot, which for real documents
    // means file IO and parsing. Keep it off the async threads.
    let doc = {
        let store = Arc::clone(&store);
        let id = id.clone();
        tokio::task::spawn_blocking(move || store.open(&id))
            .await
            .map_err(|e| AnalyzeError::Internal(format!("open task: {e}")))??
    };
    let output_path = store.output_path(&id);

    let (tx, rx) = mpsc::channel(16);
    let config = config.clone();
    tokio::spawn(run_pipeline(doc, backend, config, output_path, tx));

    Ok(Box::pin(ReceiverStream::new(rx)))
}

/// The per-run state machine. Owns the document from open to persist.
async fn run_pipeline(
    mut doc: Box<dyn Document>,
    backend: Arc<dyn ModelBackend>,
    config: AnalysisConfig,
    output_path: PathBuf,
    tx: mpsc::Sender<AnalysisEvent>,
) {
    let total = doc.page_count();
    if send_progress(&tx, 0, total, "Starting analysis...".to_string())
        .await
        .is_err()
    {
        return;
    }

    let mut highlights: Vec<Highlight> = Vec::new();
    let mut called_model = false;

    for page in 1..=total {
        let message = format!("Analyzing page {page} of {total}...");
        if send_progress(&tx, page, total, message).await.is_err() {
            return;
        }

        let text = match doc.page_text(page) {
            Ok(text) => text,
            Err(e) => match config.on_page_failure {
                PageFailurePolicy::Abort => {
                    send_error(&tx, format!("Analysis failed on page {page}: {e}")).await;
                    return;
                }
                PageFailurePolicy::Skip => {
                    warn!(page, error = %e, "skipping unreadable page");
                    continue;
                }
            },
        };

        if text.trim().is_empty() {
            debug!(page, "blank page");
            continue;
        }

        // Throttle between model calls, never before the first one.
        if std::mem::replace(&mut called_model, true) && config.inter_page_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.inter_page_delay_ms)).await;
        }

        let recommendations =
            match recommend_page(backend.as_ref(), &config, page, &text).await {
                Ok(recs) => recs,
                Err(e) => match config.on_page_failure {
                    PageFailurePolicy::Abort => {
                        send_error(&tx, format!("Analysis failed on page {page}: {e}")).await;
                        return;
                    }
                    PageFailurePolicy::Skip => {
                        warn!(page, error = %e, "skipping failed page");
                        continue;
                    }
                },
            };
        if recommendations.is_empty() {
            continue;
        }

        // Annotation touches the document backend; run it blocking and
        // take the document back afterwards.
        let mode = config.match_case;
        let annotated = tokio::task::spawn_blocking(move || {
            let page_highlights = annotate_page(doc.as_mut(), page, &text, &recommendations, mode);
            (doc, page_highlights)
        })
        .await;
        match annotated {
            Ok((returned, page_highlights)) => {
                doc = returned;
                highlights.extend(page_highlights);
            }
            Err(e) => {
                send_error(&tx, format!("Analysis failed on page {page}: {e}")).await;
                return;
            }
        }
    }

    let persisted = tokio::task::spawn_blocking(move || {
        let mut doc = doc;
        let target = output_path;
        doc.persist(&target).map(|()| target)
    })
    .await;
    let target = match persisted {
        Ok(Ok(target)) => target,
        Ok(Err(e)) => {
            send_error(&tx, format!("Analysis failed: {e}")).await;
            return;
        }
        Err(e) => {
            send_error(&tx, format!("Analysis failed: {e}")).await;
            return;
        }
    };

    let matches = highlights.iter().map(|h| h.match_count).sum();
    info!(matches, pages = total, "analysis complete");
    let _ = tx
        .send(AnalysisEvent::Complete {
            data: CompleteData {
                message: "Analysis complete".to_string(),
                matches,
                download_url: target.display().to_string(),
                highlights,
            },
        })
        .await;
}

async fn send_progress(
    tx: &mpsc::Sender<AnalysisEvent>,
    current: usize,
    total: usize,
    message: String,
) -> Result<(), mpsc::error::SendError<AnalysisEvent>> {
    tx.send(AnalysisEvent::Progress {
        current,
        total,
        message,
    })
    .await
}

async fn send_error(tx: &mpsc::Sender<AnalysisEvent>, message: String) {
    let _ = tx.send(AnalysisEvent::Error { message }).await;
}
