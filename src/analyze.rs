//! Eager analysis API: run to completion and return a report.

use crate::config::AnalysisConfig;
use crate::error::AnalyzeError;
use crate::event::AnalysisEvent;
use crate::output::{AnalysisReport, AnalysisStats};
use crate::stream::analyze_stream;
use futures::StreamExt;
use std::time::Instant;
use tracing::debug;

/// Analyse a document and wait for the result.
///
/// A thin consumer over [`analyze_stream`]: progress events are logged and
/// discarded, the terminal `complete` event becomes an [`AnalysisReport`],
/// and a terminal `error` event becomes [`AnalyzeError::Aborted`].
///
/// # Example
/// ```rust,no_run
/// use studymark::{analyze, AnalysisConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = analyze("notes.pdf", &AnalysisConfig::default()).await?;
/// println!("{} highlights -> {}", report.matches, report.output_ref);
/// # Ok(())
/// # }
/// ```
pub async fn analyze(
    id: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalyzeError> {
    let started = Instant::now();
    let mut events = analyze_stream(id, config).await?;

    let mut total_pages = 0;
    while let Some(event) = events.next().await {
        match event {
            AnalysisEvent::Progress {
                current,
                total,
                message,
            } => {
                total_pages = total;
                debug!(current, total, "{message}");
            }
            AnalysisEvent::Error { message } => {
                return Err(AnalyzeError::Aborted { message });
            }
            AnalysisEvent::Complete { data } => {
                return Ok(AnalysisReport {
                    matches: data.matches,
                    highlights: data.highlights,
                    output_ref: data.download_url,
                    stats: AnalysisStats {
                        total_pages,
                        duration_ms: started.elapsed().as_millis() as u64,
                    },
                });
            }
        }
    }

    // The producer always terminates the stream; hitting this means it
    // panicked before sending the terminal event.
    Err(AnalyzeError::Internal(
        "event stream ended without a terminal event".into(),
    ))
}
