//! Phrase recommendation: one model call per page, with retry.
//!
//! Rate-limit responses get exponential backoff and, when exhausted, abort
//! the page as fatal — the limiter that rejected page N will reject page
//! N+1 too. Transport and API failures get a short fixed-delay retry and
//! then degrade to an empty recommendation list; output that arrives but
//! cannot be parsed degrades immediately. Either way one flaky response
//! never sinks a long document.

use crate::backend::ModelBackend;
use crate::config::AnalysisConfig;
use crate::error::{AnalyzeError, BackendError};
use crate::prompts::{build_prompt, DEFAULT_ANALYSIS_PROMPT};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// One candidate phrase proposed by the model for a page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recommendation {
    /// Verbatim text the model claims appears on the page.
    pub phrase: String,
    /// Why the phrase is worth highlighting.
    #[serde(default)]
    pub details: String,
}

/// Matches a whole response wrapped in a Markdown code fence, with or
/// without a `json` language tag.
static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.+?)\s*```\s*$").expect("fence regex")
});

/// The response layouts models actually produce for "return a JSON array".
#[derive(Deserialize)]
#[serde(untagged)]
enum RawResponse {
    List(Vec<RawItem>),
    Wrapped { highlights: Vec<RawItem> },
    Lone(RawItem),
}

/// One element of the response: the asked-for object, or a bare phrase
/// string with no rationale.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Structured(Recommendation),
    Bare(String),
}

impl From<RawItem> for Recommendation {
    fn from(item: RawItem) -> Self {
        match item {
            RawItem::Structured(rec) => rec,
            RawItem::Bare(phrase) => Recommendation {
                phrase,
                details: "Important point".to_string(),
            },
        }
    }
}

/// Recommend phrases for one page.
///
/// Blank pages short-circuit to an empty list without a model call. The
/// only error this returns is [`AnalyzeError::RateLimitExhausted`]; all
/// other failure modes degrade to `Ok(vec![])` after retries.
pub async fn recommend_page(
    backend: &dyn ModelBackend,
    config: &AnalysisConfig,
    page: usize,
    page_text: &str,
) -> Result<Vec<Recommendation>, AnalyzeError> {
    if page_text.trim().is_empty() {
        debug!(page, "blank page, skipping model call");
        return Ok(Vec::new());
    }

    let instructions = config.prompt.as_deref().unwrap_or(DEFAULT_ANALYSIS_PROMPT);
    let prompt = build_prompt(instructions, truncate_chars(page_text, config.max_page_chars));
    let attempts = 1 + config.max_retries;

    for attempt in 0..attempts {
        match backend.generate(&prompt).await {
            Ok(raw) => {
                // Malformed output degrades straight to an empty list; a
                // model that answered in prose will answer in prose again.
                let recs = match parse_recommendations(&raw) {
                    Ok(recs) => recs,
                    Err(e) => {
                        warn!(page, error = %e, "unparseable model response, no highlights");
                        return Ok(Vec::new());
                    }
                };
                let recs = filter_recommendations(recs, config.min_phrase_len);
                debug!(page, count = recs.len(), "recommendations parsed");
                return Ok(recs);
            }
            Err(BackendError::RateLimited { retry_after_secs }) => {
                if attempt + 1 == attempts {
                    return Err(AnalyzeError::RateLimitExhausted { page, attempts });
                }
                let delay_ms = retry_after_secs
                    .map(|s| s.saturating_mul(1_000))
                    .unwrap_or_else(|| backoff_ms(config.rate_limit_base_delay_ms, attempt));
                warn!(page, attempt, delay_ms, "rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => {
                warn!(page, attempt, error = %e, "model call failed");
                if attempt + 1 == attempts {
                    return Ok(Vec::new());
                }
                tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
            }
        }
    }

    unreachable!("retry loop always returns")
}

/// Exponential backoff with up to a second of jitter.
///
/// The jitter is capped at the base delay so a zero-delay configuration
/// stays at zero.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let backoff = base.saturating_mul(1u64 << attempt.min(16));
    let jitter = rand::rng().random_range(0..=1_000u64).min(base);
    backoff.saturating_add(jitter)
}

/// Parse the model's raw text into recommendations.
///
/// Normalises every layout models actually produce for this prompt: a
/// bare JSON array (possibly wrapped in a Markdown fence, which models
/// emit despite being told not to), an object carrying a `highlights`
/// array, or a lone element, which is wrapped into a one-element list.
/// Array elements may be plain phrase strings; those get a stock
/// rationale.
pub fn parse_recommendations(raw: &str) -> Result<Vec<Recommendation>, serde_json::Error> {
    let body = FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| raw.trim());
    let items = match serde_json::from_str(body)? {
        RawResponse::List(items) => items,
        RawResponse::Wrapped { highlights } => highlights,
        RawResponse::Lone(item) => vec![item],
    };
    Ok(items.into_iter().map(Recommendation::from).collect())
}

/// Drop phrases too short to match meaningfully, and duplicate phrases
/// that would annotate the same occurrences twice.
fn filter_recommendations(recs: Vec<Recommendation>, min_phrase_len: usize) -> Vec<Recommendation> {
    let mut seen: Vec<String> = Vec::new();
    recs.into_iter()
        .filter(|r| {
            let trimmed = r.phrase.trim();
            if trimmed.is_empty() || r.phrase.chars().count() < min_phrase_len {
                return false;
            }
            if seen.iter().any(|s| s == &r.phrase) {
                return false;
            }
            seen.push(r.phrase.clone());
            true
        })
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let recs =
            parse_recommendations(r#"[{"phrase":"cell wall","details":"structure"}]"#).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].phrase, "cell wall");
    }

    #[test]
    fn parses_fenced_array() {
        let raw = "```json\n[{\"phrase\":\"ATP\",\"details\":\"energy\"}]\n```";
        let recs = parse_recommendations(raw).unwrap();
        assert_eq!(recs[0].phrase, "ATP");
    }

    #[test]
    fn fence_without_language_tag() {
        let raw = "```\n[]\n```";
        assert!(parse_recommendations(raw).unwrap().is_empty());
    }

    #[test]
    fn prose_response_is_an_error() {
        assert!(parse_recommendations("I found three key phrases.").is_err());
    }

    #[test]
    fn bare_string_array_yields_one_recommendation_per_phrase() {
        let recs =
            parse_recommendations(r#"["Important phrase one", "Another phrase"]"#).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].phrase, "Important phrase one");
        assert_eq!(recs[1].phrase, "Another phrase");
        assert_eq!(recs[0].details, "Important point");
    }

    #[test]
    fn highlights_object_is_unwrapped() {
        let recs = parse_recommendations(
            r#"{"highlights":[{"phrase":"osmosis","details":"transport"},"cell wall"]}"#,
        )
        .unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].phrase, "osmosis");
        assert_eq!(recs[1].phrase, "cell wall");
    }

    #[test]
    fn lone_object_is_wrapped_into_a_list() {
        let recs =
            parse_recommendations(r#"{"phrase":"entropy","details":"thermodynamics"}"#).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].phrase, "entropy");
    }

    #[test]
    fn missing_details_defaults_to_empty() {
        let recs = parse_recommendations(r#"[{"phrase":"osmosis"}]"#).unwrap();
        assert_eq!(recs[0].details, "");
    }

    #[test]
    fn filter_drops_blank_short_and_duplicate_phrases() {
        let recs = vec![
            Recommendation { phrase: "  ".into(), details: String::new() },
            Recommendation { phrase: "ok".into(), details: String::new() },
            Recommendation { phrase: "ok".into(), details: "again".into() },
            Recommendation { phrase: "a".into(), details: String::new() },
        ];
        let kept = filter_recommendations(recs, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].phrase, "ok");
    }

    #[test]
    fn backoff_doubles_and_zero_base_stays_zero() {
        assert_eq!(backoff_ms(0, 0), 0);
        assert_eq!(backoff_ms(0, 3), 0);
        let first = backoff_ms(20_000, 0);
        assert!((20_000..=21_000).contains(&first));
        let second = backoff_ms(20_000, 1);
        assert!((40_000..=41_000).contains(&second));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
