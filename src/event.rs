//! The streamed status protocol: progress, error, and completion events.
//!
//! An analysis run produces a single ordered, forward-only sequence of
//! [`AnalysisEvent`]s. The sequence contains zero or more `progress` events
//! (with a monotonically non-decreasing `current`), followed by exactly one
//! terminal event — `complete` on success, `error` on abort — which is
//! always the last event.
//!
//! The serde layout is the exact newline-delimited JSON wire format spoken
//! to consumers:
//!
//! ```text
//! {"type":"progress","current":0,"total":3,"message":"Starting analysis..."}
//! {"type":"error","message":"..."}
//! {"type":"complete","data":{"message":"Analysis complete","matches":4,...}}
//! ```
//!
//! Transports (the CLI's `--ndjson` mode, an HTTP chunked response, ...)
//! serialise one event per line via [`AnalysisEvent::to_ndjson`] as events
//! are produced, never buffering until the end.

use crate::output::Highlight;
use serde::{Deserialize, Serialize};

/// One event on the analysis stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisEvent {
    /// The run is proceeding; `current` counts pages, `0` means "opened".
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// The run aborted. No `complete` event follows and nothing was saved.
    Error { message: String },
    /// The run finished and the annotated document was saved.
    Complete { data: CompleteData },
}

/// Payload of the terminal `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteData {
    pub message: String,
    /// Total highlight marks written; equals the sum of match counts.
    pub matches: usize,
    /// Reference to the saved output artifact.
    pub download_url: String,
    pub highlights: Vec<Highlight>,
}

impl AnalysisEvent {
    /// Serialise as one newline-terminated JSON line.
    pub fn to_ndjson(&self) -> String {
        // Serialisation of these shapes cannot fail; guard anyway so a
        // transport never loses the stream over one event.
        let mut line = serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"type":"error","message":"serialise: {e}"}}"#));
        line.push('\n');
        line
    }

    /// True for the `error` and `complete` variants.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisEvent::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_wire_shape() {
        let e = AnalysisEvent::Progress {
            current: 2,
            total: 5,
            message: "Analyzing page 2 of 5...".into(),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            serde_json::json!({
                "type": "progress",
                "current": 2,
                "total": 5,
                "message": "Analyzing page 2 of 5..."
            })
        );
    }

    #[test]
    fn error_wire_shape() {
        let e = AnalysisEvent::Error {
            message: "Analysis failed on page 1: boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            serde_json::json!({
                "type": "error",
                "message": "Analysis failed on page 1: boom"
            })
        );
    }

    #[test]
    fn complete_wire_shape() {
        let e = AnalysisEvent::Complete {
            data: CompleteData {
                message: "Analysis complete".into(),
                matches: 1,
                download_url: "analyzed_notes.pdf".into(),
                highlights: vec![Highlight {
                    phrase: "Hello".into(),
                    details: "greeting".into(),
                    page: 1,
                    match_count: 1,
                }],
            },
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "complete");
        assert_eq!(v["data"]["matches"], 1);
        // The wire highlight carries exactly phrase/details/page.
        assert_eq!(
            v["data"]["highlights"][0],
            serde_json::json!({"phrase": "Hello", "details": "greeting", "page": 1})
        );
    }

    #[test]
    fn ndjson_is_one_terminated_line() {
        let line = AnalysisEvent::Error {
            message: "x".into(),
        }
        .to_ndjson();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn terminal_classification() {
        assert!(AnalysisEvent::Error { message: "".into() }.is_terminal());
        assert!(!AnalysisEvent::Progress {
            current: 0,
            total: 1,
            message: "".into()
        }
        .is_terminal());
    }
}
