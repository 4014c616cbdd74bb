//! Exact-substring phrase location.
//!
//! The locator works purely on the page-text snapshot, never on document
//! geometry. A [`Region`] is a byte span into that snapshot; the document
//! backend is responsible for turning spans into visual marks.

use crate::config::MatchCase;
use crate::doc::Region;

/// Find every non-overlapping occurrence of `phrase` in `text`, left to right.
///
/// Matching is verbatim by default. [`MatchCase::Insensitive`] folds ASCII
/// letters only; non-ASCII characters still compare exactly, so the returned
/// regions always lie on char boundaries.
pub fn locate_phrase(text: &str, phrase: &str, mode: MatchCase) -> Vec<Region> {
    if phrase.is_empty() {
        return Vec::new();
    }
    match mode {
        MatchCase::Sensitive => text
            .match_indices(phrase)
            .map(|(start, m)| Region::new(start, start + m.len()))
            .collect(),
        MatchCase::Insensitive => {
            let hay = text.as_bytes();
            let needle = phrase.as_bytes();
            let mut regions = Vec::new();
            let mut i = 0;
            while i + needle.len() <= hay.len() {
                if text.is_char_boundary(i) && hay[i..i + needle.len()].eq_ignore_ascii_case(needle)
                {
                    regions.push(Region::new(i, i + needle.len()));
                    i += needle.len();
                } else {
                    i += 1;
                }
            }
            regions
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_occurrences_in_order() {
        let regions = locate_phrase("the cat and the dog", "the", MatchCase::Sensitive);
        assert_eq!(regions, vec![Region::new(0, 3), Region::new(12, 15)]);
    }

    #[test]
    fn sensitive_matching_rejects_case_changes() {
        assert!(locate_phrase("The cell wall", "the cell", MatchCase::Sensitive).is_empty());
    }

    #[test]
    fn insensitive_matching_folds_ascii_only() {
        let regions = locate_phrase("The cell wall", "the CELL", MatchCase::Insensitive);
        assert_eq!(regions, vec![Region::new(0, 8)]);
        // Unicode case differences still miss.
        assert!(locate_phrase("Ärger", "ärger", MatchCase::Insensitive).is_empty());
    }

    #[test]
    fn overlapping_candidates_are_not_double_counted() {
        let regions = locate_phrase("aaaa", "aa", MatchCase::Sensitive);
        assert_eq!(regions, vec![Region::new(0, 2), Region::new(2, 4)]);
    }

    #[test]
    fn regions_slice_back_to_the_phrase() {
        let text = "Photosynthesis converts light, and photosynthesis matters.";
        for r in locate_phrase(text, "photosynthesis", MatchCase::Insensitive) {
            assert!(text[r.start..r.end].eq_ignore_ascii_case("photosynthesis"));
        }
    }

    #[test]
    fn empty_phrase_matches_nothing() {
        assert!(locate_phrase("anything", "", MatchCase::Sensitive).is_empty());
    }

    #[test]
    fn multibyte_text_yields_boundary_aligned_regions() {
        let text = "état — l'état moderne";
        let regions = locate_phrase(text, "état", MatchCase::Sensitive);
        assert_eq!(regions.len(), 2);
        for r in &regions {
            assert_eq!(&text[r.start..r.end], "état");
        }
    }
}
