use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod annotations;
pub mod backend;
pub mod config;
pub mod config_file;
pub mod context;
pub mod geometry;
pub mod lines;
pub mod page;
pub mod words;

// Re-export for convenience
pub use annotations::{
    Annotation, AnnotationExtractor, Category, ClassificationRule, ClassifiedAnnotations,
    Classifier, ExtractionStats, Matcher, RawAnnotation,
};
pub use backend::{BackendError, DocumentBackend, MemoryBackend};
pub use config::{ConfigError, ListOverride, ResolverConfig, ResolverConfigBuilder};
pub use context::{
    AnnotationContext, ContextMap, ContextResolver, resolve_contexts, resolve_contexts_with_lines,
};
pub use geometry::{BBox, DEFAULT_OVERLAP_TOLERANCE, GeometryError, normalize_annotation_box, overlaps};
pub use page::{DisplayPageNumber, PageIndex};
pub use words::{Word, WordIndex};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("document has no extractable words; annotations cannot be located")]
    EmptyWordIndex,
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Language a document or comment set is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    German,
    English,
}

impl Language {
    /// Interpret a free-form answer such as `"English"` or `"german."`.
    /// Anything that is not recognisably English is treated as German.
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().to_lowercase().starts_with("english") {
            Language::English
        } else {
            Language::German
        }
    }

    /// Word for "page" in this language.
    pub fn page_label(&self) -> &'static str {
        match self {
            Language::German => "Seite",
            Language::English => "page",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::German => f.write_str("German"),
            Language::English => f.write_str("English"),
        }
    }
}

/// A comment after the text-generation stage rewrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewrittenComment {
    pub original: String,
    pub rewritten: String,
    pub highlighted: String,
    pub paragraph: String,
    pub line: Option<u32>,
}

/// Rewritten comments grouped by human page number; pages without any are absent.
pub type RewrittenMap = BTreeMap<DisplayPageNumber, Vec<RewrittenComment>>;

/// Read the words of a document into a [`WordIndex`], failing if there are none.
///
/// This is the barrier before resolution: the whole index, including
/// neighbouring pages, exists before any annotation is looked at.
pub fn build_word_index(
    backend: &dyn DocumentBackend,
    path: &std::path::Path,
) -> Result<WordIndex, CoreError> {
    let index = WordIndex::new(backend.extract_words(path)?);
    if index.is_empty() {
        return Err(CoreError::EmptyWordIndex);
    }
    tracing::info!(
        pages = index.page_count(),
        words = index.word_count(),
        "word index built"
    );
    Ok(index)
}

/// Read and classify every annotation of a document.
pub fn extract_annotations(
    backend: &dyn DocumentBackend,
    path: &std::path::Path,
    config: &ResolverConfig,
) -> Result<ClassifiedAnnotations, CoreError> {
    let raw = backend.extract_raw_annotations(path)?;
    Ok(AnnotationExtractor::new(config).extract(&raw))
}
