use std::collections::BTreeMap;
use std::path::Path;

use mupdf::{Document, TextPageFlags};

use marginalia_core::{BackendError, DocumentBackend, PageIndex, RawAnnotation, Word};

pub mod annotations;
pub mod words;

pub use words::PageFrame;

/// PDF implementation of [`DocumentBackend`].
///
/// Words and page geometry come from MuPDF, annotation records from lopdf.
/// The mupdf dependency lives only here; the engine crates never see it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfDocumentBackend;

impl PdfDocumentBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<Document, BackendError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
    Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))
}

/// Visit every page with its zero-based index and vertical frame.
fn for_each_page(
    path: &Path,
    mut visit: impl FnMut(PageIndex, &mupdf::Page, PageFrame) -> Result<(), BackendError>,
) -> Result<(), BackendError> {
    let document = open(path)?;
    for (i, page_result) in document
        .pages()
        .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        .enumerate()
    {
        let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        let bounds = page
            .bounds()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        let frame = PageFrame {
            top: bounds.y0 as f64,
            bottom: bounds.y1 as f64,
        };
        visit(PageIndex(i), &page, frame)?;
    }
    Ok(())
}

impl DocumentBackend for PdfDocumentBackend {
    fn extract_words(&self, path: &Path) -> Result<BTreeMap<PageIndex, Vec<Word>>, BackendError> {
        let mut pages = BTreeMap::new();
        for_each_page(path, |index, page, frame| {
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            pages.insert(index, words::page_words(&text_page, frame));
            Ok(())
        })?;
        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted words");
        Ok(pages)
    }

    fn extract_raw_annotations(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<PageIndex, Vec<RawAnnotation>>, BackendError> {
        let document =
            lopdf::Document::load(path).map_err(|e| BackendError::OpenError(e.to_string()))?;
        let annots = annotations::document_annotations(&document);
        tracing::debug!(
            path = %path.display(),
            annotations = annots.values().map(Vec::len).sum::<usize>(),
            "read annotation records"
        );
        Ok(annots)
    }

    fn page_heights(&self, path: &Path) -> Result<BTreeMap<PageIndex, f64>, BackendError> {
        let mut heights = BTreeMap::new();
        for_each_page(path, |index, _page, frame| {
            heights.insert(index, frame.height());
            Ok(())
        })?;
        Ok(heights)
    }

    fn extract_page_text(
        &self,
        path: &Path,
        max_pages: usize,
    ) -> Result<BTreeMap<PageIndex, String>, BackendError> {
        let mut texts = BTreeMap::new();
        for_each_page(path, |index, page, _frame| {
            if index.get() >= max_pages {
                return Ok(());
            }
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            // Block/line iteration keeps line breaks that word joining loses
            let mut page_text = String::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    page_text.push_str(&line_text);
                    page_text.push('\n');
                }
                page_text.push('\n');
            }
            texts.insert(index, page_text);
            Ok(())
        })?;
        Ok(texts)
    }
}
