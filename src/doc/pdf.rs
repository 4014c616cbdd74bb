//! The on-disk PDF backend.
//!
//! ## Why two PDF libraries?
//!
//! pdfium gives reliable per-glyph text geometry but awkward low-level
//! annotation editing; lopdf gives direct access to the PDF object graph but
//! no text layout at all. So the document is opened twice: pdfium extracts a
//! per-page layout snapshot (text plus glyph boxes) and is dropped
//! immediately; lopdf keeps the object graph that highlight annotations are
//! written into and that is saved at the end. The text sent to the model,
//! the locator's spans, and the glyph geometry all come from the same
//! snapshot, so a located span always maps onto the glyphs it was found in.
//!
//! pdfium is not async-safe and both libraries block; callers reach this
//! module only from inside `spawn_blocking`.

use crate::doc::{derive_output_name, Document, DocumentStore, Region};
use crate::error::AnalyzeError;
use lopdf::{Dictionary, Object, ObjectId};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Highlight colour: classic marker yellow.
const HIGHLIGHT_RGB: [f32; 3] = [1.0, 0.9, 0.2];
/// Highlight opacity.
const HIGHLIGHT_ALPHA: f32 = 0.4;

/// One glyph of a page: its character and its box in PDF points
/// (`[left, bottom, right, top]`, origin at the page's bottom-left).
#[derive(Debug, Clone, Copy)]
struct Glyph {
    ch: char,
    rect: Option<[f32; 4]>,
}

/// Immutable layout snapshot of one page, captured at open.
#[derive(Debug)]
struct PageLayout {
    text: String,
    glyphs: Vec<Glyph>,
}

/// A PDF opened for one analysis run.
pub struct PdfDocument {
    doc: lopdf::Document,
    page_ids: Vec<ObjectId>,
    layouts: Vec<PageLayout>,
}

impl PdfDocument {
    /// Open `path`, capturing every page's text layout snapshot.
    pub fn open(path: &Path) -> Result<Self, AnalyzeError> {
        let doc = lopdf::Document::load(path).map_err(|e| AnalyzeError::DocumentUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        // get_pages is keyed by 1-based page number; BTreeMap iteration
        // yields them in ascending page order.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

        let layouts = extract_layouts(path)?;
        if layouts.len() != page_ids.len() {
            return Err(AnalyzeError::DocumentUnreadable {
                path: path.to_path_buf(),
                detail: format!(
                    "page count mismatch between parsers ({} vs {})",
                    page_ids.len(),
                    layouts.len()
                ),
            });
        }

        info!("Opened PDF: {} pages", page_ids.len());
        Ok(Self {
            doc,
            page_ids,
            layouts,
        })
    }

    /// Append an annotation reference to a page's `Annots` array, which may
    /// be absent, inline, or an indirect reference.
    fn push_page_annot(&mut self, page_id: ObjectId, annot_id: ObjectId) -> Result<(), AnalyzeError> {
        let as_internal = |e: lopdf::Error| AnalyzeError::Internal(format!("page object: {e}"));

        let annots_ref = {
            let page_dict = self
                .doc
                .get_object(page_id)
                .map_err(as_internal)?
                .as_dict()
                .map_err(as_internal)?;
            page_dict
                .get(b"Annots")
                .ok()
                .and_then(|obj| obj.as_reference().ok())
        };

        let mut annots = match annots_ref {
            Some(annots_id) => self
                .doc
                .get_object(annots_id)
                .map_err(as_internal)?
                .as_array()
                .map_err(as_internal)?
                .clone(),
            None => {
                let page_dict = self
                    .doc
                    .get_object(page_id)
                    .map_err(as_internal)?
                    .as_dict()
                    .map_err(as_internal)?;
                match page_dict.get(b"Annots").and_then(|obj| obj.as_array()) {
                    Ok(arr) => arr.clone(),
                    Err(_) => Vec::new(),
                }
            }
        };
        annots.push(Object::Reference(annot_id));

        let page_dict = self
            .doc
            .get_object_mut(page_id)
            .map_err(as_internal)?
            .as_dict_mut()
            .map_err(as_internal)?;
        page_dict.set("Annots", Object::Array(annots));
        Ok(())
    }
}

impl Document for PdfDocument {
    fn page_count(&self) -> usize {
        self.layouts.len()
    }

    fn page_text(&self, page: usize) -> Result<String, AnalyzeError> {
        self.layouts
            .get(page.wrapping_sub(1))
            .map(|l| l.text.clone())
            .ok_or_else(|| AnalyzeError::Internal(format!("page {page} out of range")))
    }

    fn add_highlight(&mut self, page: usize, region: &Region) -> Result<(), AnalyzeError> {
        let layout = self
            .layouts
            .get(page.wrapping_sub(1))
            .ok_or_else(|| AnalyzeError::Internal(format!("page {page} out of range")))?;
        let page_id = self.page_ids[page - 1];

        let rects = glyph_rects_in_span(layout, region);
        if rects.is_empty() {
            return Err(AnalyzeError::Internal(format!(
                "no glyph geometry for span {}..{} on page {page}",
                region.start, region.end
            )));
        }
        let lines = group_into_lines(&rects);
        let bbox = bounding_box(&lines);

        let mut quad_points = Vec::with_capacity(lines.len() * 8);
        for [l, b, r, t] in &lines {
            // Quad order: upper-left, upper-right, lower-left, lower-right.
            quad_points.extend([
                Object::Real(*l),
                Object::Real(*t),
                Object::Real(*r),
                Object::Real(*t),
                Object::Real(*l),
                Object::Real(*b),
                Object::Real(*r),
                Object::Real(*b),
            ]);
        }

        let mut annot = Dictionary::new();
        annot.set("Type", Object::Name(b"Annot".to_vec()));
        annot.set("Subtype", Object::Name(b"Highlight".to_vec()));
        annot.set(
            "Rect",
            Object::Array(vec![
                Object::Real(bbox[0]),
                Object::Real(bbox[1]),
                Object::Real(bbox[2]),
                Object::Real(bbox[3]),
            ]),
        );
        annot.set("QuadPoints", Object::Array(quad_points));
        annot.set(
            "C",
            Object::Array(HIGHLIGHT_RGB.iter().map(|&c| Object::Real(c)).collect()),
        );
        annot.set("CA", Object::Real(HIGHLIGHT_ALPHA));
        annot.set("F", Object::Integer(4)); // Print flag
        annot.set("P", Object::Reference(page_id));

        let annot_id = self.doc.add_object(Object::Dictionary(annot));
        self.push_page_annot(page_id, annot_id)?;

        debug!(
            "page {page}: highlight over span {}..{} ({} line(s))",
            region.start,
            region.end,
            lines.len()
        );
        Ok(())
    }

    fn persist(&mut self, target: &Path) -> Result<(), AnalyzeError> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| AnalyzeError::PersistFailed {
                    path: target.to_path_buf(),
                    detail: e.to_string(),
                })?;
            }
        }
        self.doc
            .save(target)
            .map_err(|e| AnalyzeError::PersistFailed {
                path: target.to_path_buf(),
                detail: e.to_string(),
            })?;
        info!("Saved annotated document: {}", target.display());
        Ok(())
    }
}

/// Extract per-page text and glyph boxes via pdfium, then drop the binding.
///
/// The snapshot text is built by concatenating the glyph characters, so
/// byte offsets into the snapshot index straight into the glyph list.
fn extract_layouts(path: &Path) -> Result<Vec<PageLayout>, AnalyzeError> {
    let unreadable = |detail: String| AnalyzeError::DocumentUnreadable {
        path: path.to_path_buf(),
        detail,
    };

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| unreadable(format!("{e:?}")))?;

    let mut layouts = Vec::new();
    for page in document.pages().iter() {
        let text = page.text().map_err(|e| unreadable(format!("{e:?}")))?;
        let mut glyphs = Vec::new();
        for ch in text.chars().iter() {
            let Some(c) = ch.unicode_char() else {
                continue;
            };
            let rect = ch
                .loose_bounds()
                .ok()
                .map(|r| [r.left.value, r.bottom.value, r.right.value, r.top.value]);
            glyphs.push(Glyph { ch: c, rect });
        }
        let snapshot: String = glyphs.iter().map(|g| g.ch).collect();
        debug!("extracted page layout: {} glyphs", glyphs.len());
        layouts.push(PageLayout {
            text: snapshot,
            glyphs,
        });
    }
    Ok(layouts)
}

/// Boxes of all glyphs whose bytes intersect the span, in reading order.
fn glyph_rects_in_span(layout: &PageLayout, region: &Region) -> Vec<[f32; 4]> {
    let mut rects = Vec::new();
    let mut byte = 0;
    for g in &layout.glyphs {
        let start = byte;
        byte += g.ch.len_utf8();
        if byte <= region.start {
            continue;
        }
        if start >= region.end {
            break;
        }
        if let Some(r) = g.rect {
            // Degenerate boxes (zero-width spaces etc.) carry no geometry.
            if r[2] > r[0] && r[3] > r[1] {
                rects.push(r);
            }
        }
    }
    rects
}

/// Merge glyph boxes into per-line boxes.
///
/// Glyphs arrive in reading order, so a new line starts whenever the next
/// box no longer overlaps the current line band vertically.
fn group_into_lines(rects: &[[f32; 4]]) -> Vec<[f32; 4]> {
    let mut lines: Vec<[f32; 4]> = Vec::new();
    for &[l, b, r, t] in rects {
        match lines.last_mut() {
            Some(line) if vertically_overlaps(line, b, t) => {
                line[0] = line[0].min(l);
                line[1] = line[1].min(b);
                line[2] = line[2].max(r);
                line[3] = line[3].max(t);
            }
            _ => lines.push([l, b, r, t]),
        }
    }
    lines
}

fn vertically_overlaps(line: &[f32; 4], b: f32, t: f32) -> bool {
    let center = (b + t) / 2.0;
    center >= line[1] && center <= line[3]
}

fn bounding_box(lines: &[[f32; 4]]) -> [f32; 4] {
    let mut bbox = lines[0];
    for line in &lines[1..] {
        bbox[0] = bbox[0].min(line[0]);
        bbox[1] = bbox[1].min(line[1]);
        bbox[2] = bbox[2].max(line[2]);
        bbox[3] = bbox[3].max(line[3]);
    }
    bbox
}

// ── Filesystem store ─────────────────────────────────────────────────────

/// Opens PDFs from the local filesystem and derives output locations.
pub struct FsStore {
    /// Where annotated documents are saved; defaults to the input's
    /// directory.
    output_dir: Option<PathBuf>,
}

impl FsStore {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }
}

impl DocumentStore for FsStore {
    fn open(&self, id: &str) -> Result<Box<dyn Document>, AnalyzeError> {
        let path = PathBuf::from(id);
        validate_pdf_file(&path)?;
        Ok(Box::new(PdfDocument::open(&path)?))
    }

    fn output_path(&self, id: &str) -> PathBuf {
        let input = Path::new(id);
        let dir = self
            .output_dir
            .clone()
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        dir.join(derive_output_name(id))
    }
}

/// Validate existence, readability, and the `%PDF` magic bytes before
/// handing the file to a PDF parser.
fn validate_pdf_file(path: &Path) -> Result<(), AnalyzeError> {
    if !path.exists() {
        return Err(AnalyzeError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(AnalyzeError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(AnalyzeError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(AnalyzeError::DocumentNotFound {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(text: &str, boxes: &[Option<[f32; 4]>]) -> PageLayout {
        let glyphs = text
            .chars()
            .zip(boxes.iter().copied())
            .map(|(ch, rect)| Glyph { ch, rect })
            .collect();
        PageLayout {
            text: text.to_string(),
            glyphs,
        }
    }

    #[test]
    fn span_selects_intersecting_glyphs() {
        let boxes: Vec<Option<[f32; 4]>> = (0..5)
            .map(|i| Some([i as f32 * 10.0, 0.0, i as f32 * 10.0 + 8.0, 12.0]))
            .collect();
        let l = layout("hello", &boxes);

        let rects = glyph_rects_in_span(&l, &Region::new(1, 3));
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0][0], 10.0);
        assert_eq!(rects[1][0], 20.0);
    }

    #[test]
    fn degenerate_boxes_are_dropped() {
        let l = layout(
            "ab",
            &[Some([0.0, 0.0, 0.0, 12.0]), Some([5.0, 0.0, 10.0, 12.0])],
        );
        let rects = glyph_rects_in_span(&l, &Region::new(0, 2));
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn multibyte_span_maps_to_glyphs() {
        // "é" is two bytes; the span covers it plus the following glyph.
        let l = layout(
            "éx",
            &[Some([0.0, 0.0, 8.0, 12.0]), Some([8.0, 0.0, 16.0, 12.0])],
        );
        let rects = glyph_rects_in_span(&l, &Region::new(0, 3));
        assert_eq!(rects.len(), 2);
    }

    #[test]
    fn wrapped_phrase_splits_into_two_lines() {
        // Two glyphs on one baseline, two on a lower one.
        let rects = [
            [0.0, 100.0, 10.0, 112.0],
            [10.0, 100.0, 20.0, 112.0],
            [0.0, 80.0, 10.0, 92.0],
            [10.0, 80.0, 20.0, 92.0],
        ];
        let lines = group_into_lines(&rects);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], [0.0, 100.0, 20.0, 112.0]);
        assert_eq!(lines[1], [0.0, 80.0, 20.0, 92.0]);
    }

    #[test]
    fn single_line_merges_to_one_box() {
        let rects = [[0.0, 0.0, 10.0, 12.0], [10.0, 0.5, 20.0, 12.5]];
        let lines = group_into_lines(&rects);
        assert_eq!(lines.len(), 1);
        assert_eq!(bounding_box(&lines), [0.0, 0.0, 20.0, 12.5]);
    }

    #[test]
    fn validate_rejects_missing_and_non_pdf() {
        assert!(matches!(
            validate_pdf_file(Path::new("/definitely/not/here.pdf")),
            Err(AnalyzeError::DocumentNotFound { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.pdf");
        std::fs::write(&bogus, b"hello world").unwrap();
        assert!(matches!(
            validate_pdf_file(&bogus),
            Err(AnalyzeError::NotAPdf { .. })
        ));
    }

    #[test]
    fn fs_store_output_path_is_prefixed_sibling() {
        let store = FsStore::new(None);
        assert_eq!(
            store.output_path("uploads/notes.pdf"),
            PathBuf::from("uploads/analyzed_notes.pdf")
        );

        let store = FsStore::new(Some(PathBuf::from("processed")));
        assert_eq!(
            store.output_path("uploads/notes.pdf"),
            PathBuf::from("processed/analyzed_notes.pdf")
        );
    }
}
