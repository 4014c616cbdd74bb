//! Document collaborators: the paginated target of an analysis run.
//!
//! The pipeline never talks to a PDF library directly. It drives a
//! [`Document`] — page count, per-page text snapshots, highlight writes,
//! and a final persist — obtained from a [`DocumentStore`]. The production
//! implementation is [`pdf::PdfDocument`] / [`pdf::FsStore`];
//! [`MemoryDocument`] / [`MemoryStore`] back the test suite and any caller
//! that wants to analyse plain text without a PDF on disk.
//!
//! All trait methods are synchronous and may block (PDF parsing, file I/O);
//! the orchestrator moves the boxed document through `spawn_blocking` around
//! them.

pub mod pdf;

pub use pdf::{FsStore, PdfDocument};

use crate::error::AnalyzeError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One located occurrence of a phrase: a byte-offset span into the page's
/// text snapshot.
///
/// The span is half-open (`start..end`) and always lies on character
/// boundaries of the snapshot. Concrete backends resolve a span to page
/// geometry (glyph boxes, quad points) when the highlight is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A paginated document exclusively owned by one analysis run.
pub trait Document: Send {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// The text snapshot of a page (1-based index).
    ///
    /// The snapshot is captured once when the document is opened and never
    /// changes during the run, regardless of how many highlights are added.
    fn page_text(&self, page: usize) -> Result<String, AnalyzeError>;

    /// Write one visual highlight mark covering `region` on `page`.
    ///
    /// Not idempotent: writing the same region twice stacks two marks, so
    /// the caller annotates each located occurrence exactly once. A failed
    /// write is non-fatal to the run; the annotation writer logs it and
    /// drops that occurrence from the match count.
    fn add_highlight(&mut self, page: usize, region: &Region) -> Result<(), AnalyzeError>;

    /// Persist the annotated document to `target`.
    ///
    /// `target` is always a fresh artifact derived by the store; the input
    /// document is never overwritten.
    fn persist(&mut self, target: &Path) -> Result<(), AnalyzeError>;
}

/// Resolves document identifiers to openable documents and derives the
/// output artifact location.
pub trait DocumentStore: Send + Sync {
    /// Open the document behind `id` for one analysis run.
    fn open(&self, id: &str) -> Result<Box<dyn Document>, AnalyzeError>;

    /// Where the annotated result for `id` will be saved
    /// (an `analyzed_`-prefixed sibling, never `id` itself).
    fn output_path(&self, id: &str) -> PathBuf;
}

/// Prefix a file name with `analyzed_`, preserving its directory.
pub(crate) fn derive_output_name(id: &str) -> String {
    let name = Path::new(id)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    format!("analyzed_{name}")
}

// ── In-memory backend ────────────────────────────────────────────────────

/// Observable state of a [`MemoryDocument`], shared with the creator.
///
/// The document itself is moved into the pipeline; callers keep the
/// [`Arc`] handle returned by [`MemoryDocument::state`] to inspect which
/// marks were written and whether the document was persisted.
#[derive(Debug, Default)]
pub struct MemoryState {
    /// Every successfully written mark, as `(page, region)` in write order.
    pub marks: Vec<(usize, Region)>,
    /// Where the document was persisted, if it was.
    pub persisted: Option<PathBuf>,
}

/// A plain-text paginated document held in memory.
#[derive(Debug)]
pub struct MemoryDocument {
    pages: Vec<String>,
    state: Arc<Mutex<MemoryState>>,
    fail_highlight_pages: Vec<usize>,
    fail_persist: bool,
}

impl MemoryDocument {
    /// Build a document from one string per page.
    pub fn new<S: Into<String>>(pages: Vec<S>) -> Self {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
            state: Arc::new(Mutex::new(MemoryState::default())),
            fail_highlight_pages: Vec::new(),
            fail_persist: false,
        }
    }

    /// Handle for observing marks and persistence after the run.
    pub fn state(&self) -> Arc<Mutex<MemoryState>> {
        Arc::clone(&self.state)
    }

    /// Make every `add_highlight` on `page` fail (fault injection).
    pub fn with_failing_highlights(mut self, page: usize) -> Self {
        self.fail_highlight_pages.push(page);
        self
    }

    /// Make `persist` fail (fault injection).
    pub fn with_failing_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }
}

impl Document for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, AnalyzeError> {
        self.pages
            .get(page.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| AnalyzeError::Internal(format!("page {page} out of range")))
    }

    fn add_highlight(&mut self, page: usize, region: &Region) -> Result<(), AnalyzeError> {
        if page == 0 || page > self.pages.len() {
            return Err(AnalyzeError::Internal(format!("page {page} out of range")));
        }
        if self.fail_highlight_pages.contains(&page) {
            return Err(AnalyzeError::Internal(format!(
                "injected highlight failure on page {page}"
            )));
        }
        self.state.lock().unwrap().marks.push((page, *region));
        Ok(())
    }

    fn persist(&mut self, target: &Path) -> Result<(), AnalyzeError> {
        if self.fail_persist {
            return Err(AnalyzeError::PersistFailed {
                path: target.to_path_buf(),
                detail: "injected persist failure".into(),
            });
        }
        self.state.lock().unwrap().persisted = Some(target.to_path_buf());
        Ok(())
    }
}

/// A store holding exactly one pre-built [`MemoryDocument`].
///
/// `open` hands the document out once; a second open fails, mirroring the
/// exclusive-ownership contract of a real store.
pub struct MemoryStore {
    doc: Mutex<Option<MemoryDocument>>,
}

impl MemoryStore {
    pub fn new(doc: MemoryDocument) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn open(&self, id: &str) -> Result<Box<dyn Document>, AnalyzeError> {
        self.doc
            .lock()
            .unwrap()
            .take()
            .map(|d| Box::new(d) as Box<dyn Document>)
            .ok_or_else(|| AnalyzeError::DocumentNotFound {
                path: PathBuf::from(id),
            })
    }

    fn output_path(&self, id: &str) -> PathBuf {
        PathBuf::from(derive_output_name(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_document_snapshots_and_marks() {
        let doc = MemoryDocument::new(vec!["Hello World", ""]);
        let state = doc.state();
        let mut doc: Box<dyn Document> = Box::new(doc);

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_text(1).unwrap(), "Hello World");
        assert_eq!(doc.page_text(2).unwrap(), "");
        assert!(doc.page_text(3).is_err());

        doc.add_highlight(1, &Region::new(0, 5)).unwrap();
        doc.add_highlight(1, &Region::new(6, 11)).unwrap();
        assert!(doc.add_highlight(5, &Region::new(0, 1)).is_err());

        doc.persist(Path::new("analyzed_x.pdf")).unwrap();

        let s = state.lock().unwrap();
        assert_eq!(s.marks, vec![(1, Region::new(0, 5)), (1, Region::new(6, 11))]);
        assert_eq!(s.persisted.as_deref(), Some(Path::new("analyzed_x.pdf")));
    }

    #[test]
    fn memory_store_hands_out_once() {
        let store = MemoryStore::new(MemoryDocument::new(vec!["a"]));
        assert!(store.open("notes.pdf").is_ok());
        assert!(matches!(
            store.open("notes.pdf"),
            Err(AnalyzeError::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn output_name_gets_prefix() {
        assert_eq!(derive_output_name("dir/notes.pdf"), "analyzed_notes.pdf");
        assert_eq!(derive_output_name("notes.pdf"), "analyzed_notes.pdf");
    }

    #[test]
    fn injected_failures_fire() {
        let doc = MemoryDocument::new(vec!["abc"]).with_failing_highlights(1);
        let mut doc: Box<dyn Document> = Box::new(doc);
        assert!(doc.add_highlight(1, &Region::new(0, 1)).is_err());

        let doc = MemoryDocument::new(vec!["abc"]).with_failing_persist();
        let mut doc: Box<dyn Document> = Box::new(doc);
        assert!(matches!(
            doc.persist(Path::new("out.pdf")),
            Err(AnalyzeError::PersistFailed { .. })
        ));
    }
}
