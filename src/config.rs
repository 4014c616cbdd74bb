//! Configuration types for document analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across threads and to diff two runs to understand
//! why their outputs differ.

use crate::backend::{BackendKind, ModelBackend};
use crate::doc::DocumentStore;
use crate::error::AnalyzeError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// How phrases returned by the model are matched against page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchCase {
    /// Exact, character-for-character matching (default). A phrase the model
    /// re-capitalised simply does not match, which is the honest outcome for
    /// a "copy verbatim" prompt.
    #[default]
    Sensitive,
    /// ASCII case folding before comparison. Recovers phrases the model
    /// recapitalised at the cost of occasionally highlighting a different
    /// casing than the model intended.
    Insensitive,
}

/// What to do when a single page fails after all retries are spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFailurePolicy {
    /// Abort the whole run. A half-annotated document is worse than none,
    /// and rate-limit exhaustion on page N will recur on page N+1. (default)
    #[default]
    Abort,
    /// Log a warning, leave the page without highlights, and continue.
    /// The stream still ends with a single terminal event.
    Skip,
}

/// Configuration for one analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use studymark::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gemini-2.0-flash")
///     .max_retries(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Which backend family to construct when none is injected. Default: Gemini.
    pub backend_kind: BackendKind,

    /// Model identifier, e.g. "gemini-2.0-flash" or "llama3.2".
    /// If None, uses the backend's default.
    pub model: Option<String>,

    /// Backend endpoint override. For Gemini this replaces the public API
    /// base URL (useful for proxies); for Ollama it replaces
    /// `http://localhost:11434`.
    pub endpoint: Option<String>,

    /// API key for hosted backends. If None, read from `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Pre-constructed backend. Takes precedence over `backend_kind`.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Pre-constructed document store. Takes precedence over the filesystem
    /// store built from `output_dir`.
    pub store: Option<Arc<dyn DocumentStore>>,

    /// Per-request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Retries after the first attempt on a failed model call. Default: 2.
    ///
    /// A page is attempted `1 + max_retries` times before the failure policy
    /// applies. Zero disables retrying.
    pub max_retries: u32,

    /// Base backoff for rate-limit (429) retries, in milliseconds. Default: 20 000.
    ///
    /// Doubles after each rate-limited attempt: 20 s → 40 s → 80 s. Hosted
    /// free tiers meter by the minute, so short backoffs just burn attempts.
    pub rate_limit_base_delay_ms: u64,

    /// Fixed delay before retrying a non-rate-limit failure, in milliseconds.
    /// Default: 500.
    pub retry_delay_ms: u64,

    /// Pause between consecutive pages, in milliseconds. Default: 1 000.
    ///
    /// Pages are analysed strictly in order, so this is the only throttle
    /// between model calls. Set to 0 for backends without rate limits.
    pub inter_page_delay_ms: u64,

    /// Phrase matching mode. Default: [`MatchCase::Sensitive`].
    pub match_case: MatchCase,

    /// Per-page failure policy. Default: [`PageFailurePolicy::Abort`].
    pub on_page_failure: PageFailurePolicy,

    /// Minimum phrase length in characters; shorter recommendations are
    /// dropped before matching. Default: 1.
    pub min_phrase_len: usize,

    /// Maximum page-text characters sent to the model; longer pages are
    /// truncated at a char boundary. Default: 20 000.
    pub max_page_chars: usize,

    /// Custom analysis instructions. If None, uses the built-in prompt.
    pub prompt: Option<String>,

    /// Directory where annotated documents are written. If None, the copy
    /// is saved next to the input document.
    pub output_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backend_kind: BackendKind::default(),
            model: None,
            endpoint: None,
            api_key: None,
            backend: None,
            store: None,
            request_timeout_secs: 60,
            max_retries: 2,
            rate_limit_base_delay_ms: 20_000,
            retry_delay_ms: 500,
            inter_page_delay_ms: 1_000,
            match_case: MatchCase::default(),
            on_page_failure: PageFailurePolicy::default(),
            min_phrase_len: 1,
            max_page_chars: 20_000,
            prompt: None,
            output_dir: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("backend_kind", &self.backend_kind)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("store", &self.store.as_ref().map(|_| "<dyn DocumentStore>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_base_delay_ms", &self.rate_limit_base_delay_ms)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("inter_page_delay_ms", &self.inter_page_delay_ms)
            .field("match_case", &self.match_case)
            .field("on_page_failure", &self.on_page_failure)
            .field("min_phrase_len", &self.min_phrase_len)
            .field("max_page_chars", &self.max_page_chars)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn backend_kind(mut self, kind: BackendKind) -> Self {
        self.config.backend_kind = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.config.store = Some(store);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn rate_limit_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_base_delay_ms = ms;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn inter_page_delay_ms(mut self, ms: u64) -> Self {
        self.config.inter_page_delay_ms = ms;
        self
    }

    pub fn match_case(mut self, mode: MatchCase) -> Self {
        self.config.match_case = mode;
        self
    }

    pub fn on_page_failure(mut self, policy: PageFailurePolicy) -> Self {
        self.config.on_page_failure = policy;
        self
    }

    pub fn min_phrase_len(mut self, n: usize) -> Self {
        self.config.min_phrase_len = n.max(1);
        self
    }

    pub fn max_page_chars(mut self, n: usize) -> Self {
        self.config.max_page_chars = n;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalyzeError> {
        let c = &self.config;
        if c.request_timeout_secs == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_page_chars == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "max_page_chars must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AnalysisConfig::default();
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.rate_limit_base_delay_ms, 20_000);
        assert_eq!(c.inter_page_delay_ms, 1_000);
        assert_eq!(c.match_case, MatchCase::Sensitive);
        assert_eq!(c.on_page_failure, PageFailurePolicy::Abort);
    }

    #[test]
    fn builder_clamps_floor_values() {
        let c = AnalysisConfig::builder()
            .request_timeout_secs(0)
            .min_phrase_len(0)
            .build()
            .unwrap();
        assert_eq!(c.request_timeout_secs, 1);
        assert_eq!(c.min_phrase_len, 1);
    }

    #[test]
    fn zero_max_page_chars_rejected() {
        let err = AnalysisConfig::builder().max_page_chars(0).build();
        assert!(matches!(err, Err(AnalyzeError::InvalidConfig(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = AnalysisConfig::builder().api_key("secret-key").build().unwrap();
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
