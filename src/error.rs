//! Error types for the studymark library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalyzeError`] — **Fatal**: the analysis run cannot proceed or must
//!   abort (bad input file, missing credentials, rate-limit ceiling reached,
//!   save failure). Returned from the top-level `analyze*` functions, or
//!   converted into a terminal `error` event on the stream.
//!
//! * [`BackendError`] — a single recommendation call against the model
//!   backend failed. The retry controller decides what each variant means:
//!   [`BackendError::RateLimited`] is retried with exponential backoff and
//!   escalates to [`AnalyzeError::RateLimitExhausted`]; every other variant
//!   is retried briefly and then degrades to an empty phrase list, so one
//!   flaky call never costs the whole document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the studymark library.
///
/// Per-call recommender faults use [`BackendError`] and are absorbed by the
/// retry controller rather than propagated here.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    DocumentNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The document could not be parsed or its text layout extracted.
    #[error("Document '{path}' could not be read: {detail}")]
    DocumentUnreadable { path: PathBuf, detail: String },

    // ── Recommender errors ────────────────────────────────────────────────
    /// The configured model backend is unusable (no API key, bad endpoint).
    #[error("Model backend '{backend}' is not configured.\n{hint}")]
    MissingCredentials { backend: String, hint: String },

    /// Sustained rate limiting: every attempt for one page was refused.
    #[error("Rate limit exceeded after {attempts} attempts on page {page}. Please try again later.")]
    RateLimitExhausted { page: usize, attempts: u32 },

    /// A page failed in a way the configured policy treats as fatal.
    #[error("Analysis failed on page {page}: {detail}")]
    PageFailed { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the annotated output document.
    #[error("Failed to save annotated document '{path}': {detail}")]
    PersistFailed { path: PathBuf, detail: String },

    // ── Run-level errors ──────────────────────────────────────────────────
    /// The event stream ended with a terminal `error` event.
    ///
    /// Returned by the eager [`crate::analyze`] wrapper; streaming callers
    /// see the `error` event itself instead.
    #[error("{message}")]
    Aborted { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single failed call against a model backend.
///
/// Produced by [`crate::backend::ModelBackend::generate`] implementations and
/// classified by the retry controller in [`crate::pipeline::recommend`].
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend signalled quota exhaustion or backpressure (HTTP 429,
    /// `RESOURCE_EXHAUSTED`). Retried with exponential backoff.
    #[error("rate limited by backend{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// The backend returned a non-success HTTP status that is not a
    /// rate-limit signal.
    #[error("backend API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// The request timed out.
    #[error("backend call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection-level failure (DNS, refused, TLS, ...).
    #[error("backend transport error: {0}")]
    Transport(String),

    /// The response arrived but carried no usable text.
    #[error("backend returned an empty response: {0}")]
    EmptyResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_exhausted_display() {
        let e = AnalyzeError::RateLimitExhausted {
            page: 4,
            attempts: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
        assert!(msg.contains("page 4"), "got: {msg}");
    }

    #[test]
    fn missing_credentials_display() {
        let e = AnalyzeError::MissingCredentials {
            backend: "gemini".into(),
            hint: "Set GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn backend_rate_limited_display_with_hint() {
        let e = BackendError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn backend_rate_limited_display_without_hint() {
        let e = BackendError::RateLimited {
            retry_after_secs: None,
        };
        assert!(e.to_string().contains("rate limited"));
    }

    #[test]
    fn page_failed_display() {
        let e = AnalyzeError::PageFailed {
            page: 2,
            detail: "boom".into(),
        };
        assert_eq!(e.to_string(), "Analysis failed on page 2: boom");
    }
}
