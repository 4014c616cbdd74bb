//! Per-page analysis stages.
//!
//! The pipeline is three stages run strictly in page order:
//!
//! 1. [`recommend`] — ask the model backend for candidate phrases, with
//!    retry and backoff around the call and fence-tolerant JSON parsing of
//!    the response.
//! 2. [`locate`] — resolve each candidate phrase to byte regions in the
//!    page-text snapshot by exact substring search.
//! 3. [`annotate`] — write a highlight mark for every located region through
//!    the [`crate::doc::Document`] trait.
//!
//! The stages are deliberately free of streaming concerns; the state machine
//! in [`crate::stream`] drives them and reports progress.

pub mod annotate;
pub mod locate;
pub mod recommend;

pub use annotate::annotate_page;
pub use locate::locate_phrase;
pub use recommend::{recommend_page, Recommendation};
