//! Model backends: one narrow capability, two transports.
//!
//! The recommender needs exactly one operation from a language model —
//! submit a prompt, get raw text back. [`ModelBackend`] captures that and
//! nothing else, so the retry controller and recommender never special-case
//! which backend is behind it. Two variants ship:
//!
//! * [`gemini::GeminiBackend`] — hosted model, authenticated HTTPS call.
//! * [`ollama::OllamaBackend`] — local inference server, unauthenticated
//!   HTTP call on localhost.
//!
//! Both speak the same prompt contract (a JSON array of
//! `{"phrase","details"}` objects, phrases verbatim from the page text).

pub mod gemini;
pub mod ollama;

use crate::config::AnalysisConfig;
use crate::error::{AnalyzeError, BackendError};
use futures::future::BoxFuture;
use std::sync::Arc;

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

/// Which backend variant to construct when none is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Hosted Gemini model over the generative-language REST API.
    #[default]
    Gemini,
    /// Locally hosted Ollama inference server.
    Ollama,
}

/// A language model reachable through one `generate` call.
pub trait ModelBackend: Send + Sync {
    /// Short backend identifier for logs and error messages.
    fn name(&self) -> &str;

    /// Submit `prompt`, return the model's raw text output.
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, BackendError>>;
}

/// Resolve the backend for a run: an injected instance wins, otherwise one
/// is built from the configured kind. Credential problems surface here,
/// before any page is processed.
pub fn resolve_backend(config: &AnalysisConfig) -> Result<Arc<dyn ModelBackend>, AnalyzeError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    match config.backend_kind {
        BackendKind::Gemini => Ok(Arc::new(GeminiBackend::from_config(config)?)),
        BackendKind::Ollama => Ok(Arc::new(OllamaBackend::from_config(config)?)),
    }
}

/// Shared reqwest client construction for both variants.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, AnalyzeError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalyzeError::Internal(format!("http client: {e}")))
}

/// Map a reqwest transport-level error to a [`BackendError`].
pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout { secs: timeout_secs }
    } else {
        BackendError::Transport(e.to_string())
    }
}

/// Classify a non-success HTTP response body/status pair.
///
/// HTTP 429 and Gemini's `RESOURCE_EXHAUSTED` status are rate-limit
/// signals; everything else is a plain API error.
pub(crate) fn classify_status(
    status: u16,
    retry_after_secs: Option<u64>,
    body: &str,
) -> BackendError {
    if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
        BackendError::RateLimited { retry_after_secs }
    } else {
        let trimmed = body.trim();
        let detail = if trimmed.len() > 300 {
            let mut cut = 300;
            while !trimmed.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}…", &trimmed[..cut])
        } else {
            trimmed.to_string()
        };
        BackendError::Api { status, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        assert!(matches!(
            classify_status(429, Some(7), "slow down"),
            BackendError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[test]
    fn resource_exhausted_body_is_rate_limited() {
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_status(503, None, body),
            BackendError::RateLimited { .. }
        ));
    }

    #[test]
    fn other_statuses_are_api_errors() {
        match classify_status(400, None, "bad request") {
            BackendError::Api { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "bad request");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        match classify_status(500, None, &body) {
            BackendError::Api { detail, .. } => assert!(detail.len() < 320),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
