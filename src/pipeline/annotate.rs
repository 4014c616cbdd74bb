//! Highlight writing for one page's recommendations.

use crate::config::MatchCase;
use crate::doc::Document;
use crate::output::Highlight;
use crate::pipeline::locate::locate_phrase;
use crate::pipeline::recommend::Recommendation;
use tracing::warn;

/// Locate each recommendation in the page snapshot and write a highlight
/// mark per occurrence.
///
/// Every recommendation yields a [`Highlight`] record, including phrases
/// the model hallucinated (`match_count == 0`) and phrases whose marks
/// partially failed to write. A failed mark is logged and dropped from
/// the count; it never fails the page.
///
/// Runs synchronously — the caller is expected to be inside a blocking
/// task when the document backend touches real files.
pub fn annotate_page(
    doc: &mut dyn Document,
    page: usize,
    page_text: &str,
    recommendations: &[Recommendation],
    mode: MatchCase,
) -> Vec<Highlight> {
    let mut highlights = Vec::with_capacity(recommendations.len());
    for rec in recommendations {
        let regions = locate_phrase(page_text, &rec.phrase, mode);
        if regions.is_empty() {
            warn!(page, phrase = %rec.phrase, "phrase not found on page");
        }
        let mut written = 0;
        for region in &regions {
            match doc.add_highlight(page, region) {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(page, phrase = %rec.phrase, error = %e, "highlight write failed");
                }
            }
        }
        highlights.push(Highlight {
            phrase: rec.phrase.clone(),
            details: rec.details.clone(),
            page,
            match_count: written,
        });
    }
    highlights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::MemoryDocument;

    fn rec(phrase: &str) -> Recommendation {
        Recommendation {
            phrase: phrase.into(),
            details: "why it matters".into(),
        }
    }

    #[test]
    fn writes_one_mark_per_occurrence() {
        let doc = MemoryDocument::new(vec!["the cat and the dog"]);
        let state = doc.state();
        let mut doc = doc;
        let text = doc.page_text(1).unwrap();

        let highlights = annotate_page(&mut doc, 1, &text, &[rec("the")], MatchCase::Sensitive);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].match_count, 2);
        assert_eq!(state.lock().unwrap().marks.len(), 2);
    }

    #[test]
    fn unmatched_phrase_still_recorded_with_zero_count() {
        let mut doc = MemoryDocument::new(vec!["plain text"]);
        let text = doc.page_text(1).unwrap();

        let highlights =
            annotate_page(&mut doc, 1, &text, &[rec("not present")], MatchCase::Sensitive);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].match_count, 0);
    }

    #[test]
    fn failed_mark_is_dropped_from_count() {
        let mut doc = MemoryDocument::new(vec!["alpha alpha"]).with_failing_highlights(1);
        let text = doc.page_text(1).unwrap();

        let highlights = annotate_page(&mut doc, 1, &text, &[rec("alpha")], MatchCase::Sensitive);
        assert_eq!(highlights[0].match_count, 0);
    }
}
