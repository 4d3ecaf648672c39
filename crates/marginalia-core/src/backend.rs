use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::annotations::RawAnnotation;
use crate::page::PageIndex;
use crate::words::Word;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract content: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document extraction backend.
///
/// Implementors hand the engine zero-based page maps regardless of how the
/// underlying library numbers pages, and report coordinates with the origin
/// at the bottom-left corner of the page.
pub trait DocumentBackend: Send + Sync {
    /// Words with bounding boxes, per page, in reading order.
    fn extract_words(&self, path: &Path) -> Result<BTreeMap<PageIndex, Vec<Word>>, BackendError>;

    /// Raw annotation records, per page. Pages without annotations may be absent.
    fn extract_raw_annotations(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<PageIndex, Vec<RawAnnotation>>, BackendError>;

    /// Height of every page in the same unit as the word boxes.
    fn page_heights(&self, path: &Path) -> Result<BTreeMap<PageIndex, f64>, BackendError>;

    /// Plain text of the first `max_pages` pages, for metadata and summaries.
    fn extract_page_text(
        &self,
        path: &Path,
        max_pages: usize,
    ) -> Result<BTreeMap<PageIndex, String>, BackendError> {
        let words = self.extract_words(path)?;
        Ok(words
            .into_iter()
            .take(max_pages)
            .map(|(page, words)| {
                let text = words
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                (page, text)
            })
            .collect())
    }
}

/// A [`DocumentBackend`] serving prepared data regardless of the path.
///
/// Used to drive the pipelines without a PDF on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pub words: BTreeMap<PageIndex, Vec<Word>>,
    pub annotations: BTreeMap<PageIndex, Vec<RawAnnotation>>,
    pub heights: BTreeMap<PageIndex, f64>,
}

impl DocumentBackend for MemoryBackend {
    fn extract_words(&self, _path: &Path) -> Result<BTreeMap<PageIndex, Vec<Word>>, BackendError> {
        Ok(self.words.clone())
    }

    fn extract_raw_annotations(
        &self,
        _path: &Path,
    ) -> Result<BTreeMap<PageIndex, Vec<RawAnnotation>>, BackendError> {
        Ok(self.annotations.clone())
    }

    fn page_heights(&self, _path: &Path) -> Result<BTreeMap<PageIndex, f64>, BackendError> {
        Ok(self.heights.clone())
    }
}
