//! Result types produced by an analysis run.

use serde::{Deserialize, Serialize};

/// The record of one candidate phrase after location and annotation.
///
/// One `Highlight` is appended for every candidate phrase the recommender
/// proposed on a non-empty page — including phrases that were never found
/// in the page text (`match_count == 0`). Keeping zero-match entries lets
/// callers see what the model claimed versus what was actually present.
///
/// The serialised form carries only `phrase`, `details`, and `page` to match
/// the streaming wire format; `match_count` is crate-internal bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// The exact text the model proposed for highlighting.
    pub phrase: String,
    /// The model's rationale for why the phrase matters.
    pub details: String,
    /// 1-based page number the phrase was proposed for.
    pub page: usize,
    /// Number of highlight marks actually written for this phrase.
    #[serde(skip)]
    pub match_count: usize,
}

/// Aggregate outcome of an eager [`crate::analyze`] run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Total highlight marks written across the whole document.
    ///
    /// Always equals the sum of `match_count` over [`Self::highlights`].
    pub matches: usize,
    /// Every processed candidate phrase, in page order.
    pub highlights: Vec<Highlight>,
    /// Where the annotated document was saved.
    pub output_ref: String,
    /// Run statistics.
    pub stats: AnalysisStats,
}

/// Coarse statistics for one analysis run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStats {
    /// Page count of the input document.
    pub total_pages: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_wire_form_omits_match_count() {
        let h = Highlight {
            phrase: "Hello".into(),
            details: "greeting".into(),
            page: 1,
            match_count: 3,
        };
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"phrase": "Hello", "details": "greeting", "page": 1})
        );
    }

    #[test]
    fn highlight_deserialises_without_match_count() {
        let h: Highlight =
            serde_json::from_str(r#"{"phrase":"a","details":"b","page":2}"#).unwrap();
        assert_eq!(h.page, 2);
        assert_eq!(h.match_count, 0);
    }
}
