//! Context resolution: from a classified annotation to the words it covers,
//! the paragraph around them and, for reviews, a line number.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::annotations::{Annotation, Category, ClassifiedAnnotations};
use crate::config::ResolverConfig;
use crate::geometry::{BBox, overlaps};
use crate::lines::{estimate_line_number, margin_line_number};
use crate::page::{DisplayPageNumber, PageIndex};
use crate::words::{Word, WordIndex, join_words};

/// Paragraph boundaries: a blank line, or a run of two or more spaces
/// standing in for a lost line break.
static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n| {2,}").expect("paragraph split regex is valid"));

/// Everything the rewriting stage needs to know about one comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationContext {
    pub comment: String,
    /// Words under the annotation, space-joined. Empty when nothing matched.
    pub highlighted: String,
    pub paragraph: String,
    pub category: Category,
    /// Only set by the review variant.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<u32>,
}

/// Resolved contexts grouped by human page number. Pages without contexts
/// are absent.
pub type ContextMap = BTreeMap<DisplayPageNumber, Vec<AnnotationContext>>;

/// Words found for an annotation and the page they were found on.
#[derive(Debug, Clone, PartialEq)]
pub struct WordMatch<'a> {
    pub page: PageIndex,
    pub words: Vec<&'a Word>,
}

impl WordMatch<'_> {
    pub fn highlighted(&self) -> String {
        join_words(self.words.iter().copied()).trim().to_string()
    }
}

/// Search order for an annotation on `page`: itself, the next page, the
/// previous page. Viewers occasionally file an annotation one page off.
pub fn candidate_pages(page: PageIndex) -> Vec<PageIndex> {
    let mut pages = vec![page, page.next()];
    if let Some(prev) = page.prev() {
        pages.push(prev);
    }
    pages
}

/// Words overlapping `bbox`, in extraction order.
pub fn words_overlapping<'a>(words: &'a [Word], bbox: &BBox, tol: f64) -> Vec<&'a Word> {
    words
        .iter()
        .filter(|w| overlaps(&w.bbox, bbox, tol))
        .collect()
}

/// Find the words an annotation covers, drifting to neighbouring pages if
/// its own page has none. Falls back to `page` with no words.
pub fn match_words<'a>(index: &'a WordIndex, page: PageIndex, bbox: &BBox, tol: f64) -> WordMatch<'a> {
    for candidate in candidate_pages(page) {
        if !index.has_page(candidate) {
            continue;
        }
        let hits = words_overlapping(index.words_on_page(candidate), bbox, tol);
        if !hits.is_empty() {
            if candidate != page {
                tracing::debug!(annotated = %page, matched = %candidate, "annotation matched on neighbouring page");
            }
            return WordMatch {
                page: candidate,
                words: hits,
            };
        }
    }
    WordMatch {
        page,
        words: Vec::new(),
    }
}

/// Split page text into paragraph candidates.
pub fn split_paragraphs(page_text: &str) -> Vec<&str> {
    PARAGRAPH_SPLIT.split(page_text).collect()
}

/// Pick the first paragraph containing `highlighted`, else the first
/// paragraph, else the empty string.
pub fn find_paragraph(page_text: &str, highlighted: &str) -> String {
    let paragraphs = split_paragraphs(page_text);
    let found = if highlighted.is_empty() {
        None
    } else {
        paragraphs.iter().find(|p| p.contains(highlighted))
    };
    found
        .or_else(|| paragraphs.first())
        .map(|p| p.to_string())
        .unwrap_or_default()
}

/// Resolves classified annotations against a [`WordIndex`].
#[derive(Debug, Clone)]
pub struct ContextResolver<'a> {
    index: &'a WordIndex,
    config: &'a ResolverConfig,
}

impl<'a> ContextResolver<'a> {
    /// Fails if the index holds no words at all: nothing could be resolved.
    pub fn new(index: &'a WordIndex, config: &'a ResolverConfig) -> Result<Self, CoreError> {
        if index.is_empty() {
            return Err(CoreError::EmptyWordIndex);
        }
        Ok(Self { index, config })
    }

    /// Context for one annotation filed on `page`.
    pub fn resolve(&self, page: PageIndex, annotation: &Annotation) -> AnnotationContext {
        let matched = match_words(
            self.index,
            page,
            &annotation.bbox,
            self.config.overlap_tolerance(),
        );
        let highlighted = matched.highlighted();
        let paragraph = find_paragraph(&self.index.page_text(matched.page), &highlighted);

        AnnotationContext {
            comment: annotation.text.clone(),
            highlighted,
            paragraph,
            category: annotation.category,
            line: None,
        }
    }

    /// Line number for an annotation filed on `page`: the printed margin
    /// number if there is one, else the geometric estimate. `None` only when
    /// neither works because the page height is unknown. Whenever a height
    /// is given the result is `Some(n)` with `n >= 1`.
    pub fn line_number(
        &self,
        page: PageIndex,
        annotation: &Annotation,
        page_height: Option<f64>,
    ) -> Option<u32> {
        margin_line_number(
            self.index.words_on_page(page),
            &annotation.bbox,
            self.config.margin_threshold(),
        )
        .or_else(|| {
            page_height.map(|h| {
                estimate_line_number(annotation.bbox.top(), h, self.config.line_height())
            })
        })
    }

    /// Resolve every annotation, grouped by human page number.
    pub fn resolve_all(&self, annotations: &ClassifiedAnnotations) -> ContextMap {
        self.group(annotations, |page, annot| self.resolve(page, annot))
    }

    /// Review variant of [`resolve_all`](Self::resolve_all): every context
    /// also carries a line number.
    pub fn resolve_all_with_lines(
        &self,
        annotations: &ClassifiedAnnotations,
        page_heights: &BTreeMap<PageIndex, f64>,
    ) -> ContextMap {
        self.group(annotations, |page, annot| {
            let mut ctx = self.resolve(page, annot);
            ctx.line = self.line_number(page, annot, page_heights.get(&page).copied());
            if ctx.line.is_none() {
                tracing::warn!(%page, "no page height and no margin number; line unknown");
            }
            ctx
        })
    }

    fn group(
        &self,
        annotations: &ClassifiedAnnotations,
        mut resolve: impl FnMut(PageIndex, &Annotation) -> AnnotationContext,
    ) -> ContextMap {
        let mut out = ContextMap::new();
        for (&page, annots) in &annotations.pages {
            let contexts: Vec<_> = annots.iter().map(|a| resolve(page, a)).collect();
            if !contexts.is_empty() {
                out.insert(page.display(), contexts);
            }
        }
        out
    }
}

/// Resolve all annotations of a document. See [`ContextResolver`].
pub fn resolve_contexts(
    index: &WordIndex,
    annotations: &ClassifiedAnnotations,
    config: &ResolverConfig,
) -> Result<ContextMap, CoreError> {
    Ok(ContextResolver::new(index, config)?.resolve_all(annotations))
}

/// Resolve all annotations and attach line numbers.
pub fn resolve_contexts_with_lines(
    index: &WordIndex,
    annotations: &ClassifiedAnnotations,
    page_heights: &BTreeMap<PageIndex, f64>,
    config: &ResolverConfig,
) -> Result<ContextMap, CoreError> {
    Ok(ContextResolver::new(index, config)?.resolve_all_with_lines(annotations, page_heights))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(text: &str, bbox: BBox) -> Annotation {
        Annotation {
            text: text.to_string(),
            subtype: None,
            rect: Some(bbox),
            quadpoints: None,
            bbox,
            category: Category::Llm,
        }
    }

    #[test]
    fn candidate_order() {
        assert_eq!(
            candidate_pages(PageIndex(3)),
            vec![PageIndex(3), PageIndex(4), PageIndex(2)]
        );
        assert_eq!(candidate_pages(PageIndex(0)), vec![PageIndex(0), PageIndex(1)]);
    }

    #[test]
    fn highlighted_text_from_overlapping_words() {
        let index = WordIndex::from_iter([(
            PageIndex(0),
            vec![
                Word::new("Hello", (0.0, 0.0, 10.0, 10.0)),
                Word::new("World", (12.0, 0.0, 22.0, 10.0)),
            ],
        )]);
        let m = match_words(&index, PageIndex(0), &BBox::new(0.0, 0.0, 22.0, 10.0), 0.5);
        assert_eq!(m.page, PageIndex(0));
        assert_eq!(m.highlighted(), "Hello World");
    }

    #[test]
    fn no_match_anywhere_falls_back_to_own_page() {
        let index = WordIndex::from_iter([(
            PageIndex(0),
            vec![Word::new("far", (500.0, 500.0, 520.0, 510.0))],
        )]);
        let m = match_words(&index, PageIndex(0), &BBox::new(0.0, 0.0, 10.0, 10.0), 0.5);
        assert_eq!(m.page, PageIndex(0));
        assert!(m.words.is_empty());
        assert_eq!(m.highlighted(), "");
    }

    #[test]
    fn drift_prefers_next_page_over_previous() {
        let index = WordIndex::from_iter([
            (PageIndex(1), vec![Word::new("before", (0.0, 0.0, 10.0, 10.0))]),
            (PageIndex(2), vec![Word::new("far", (500.0, 500.0, 520.0, 510.0))]),
            (PageIndex(3), vec![Word::new("after", (0.0, 0.0, 10.0, 10.0))]),
        ]);
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
        let m = match_words(&index, PageIndex(2), &bbox, 0.5);
        assert_eq!(m.page, PageIndex(3));
        assert_eq!(m.highlighted(), "after");
    }

    #[test]
    fn drift_reaches_previous_page() {
        let index = WordIndex::from_iter([
            (PageIndex(1), vec![Word::new("before", (0.0, 0.0, 10.0, 10.0))]),
            (PageIndex(2), vec![Word::new("far", (500.0, 500.0, 520.0, 510.0))]),
        ]);
        let m = match_words(&index, PageIndex(2), &BBox::new(0.0, 0.0, 10.0, 10.0), 0.5);
        assert_eq!(m.page, PageIndex(1));
        assert_eq!(m.highlighted(), "before");
    }

    #[test]
    fn paragraph_split_on_double_space_and_blank_line() {
        assert_eq!(
            split_paragraphs("first part  second part\n\nthird"),
            vec!["first part", "second part", "third"]
        );
        assert_eq!(split_paragraphs(""), vec![""]);
    }

    #[test]
    fn paragraph_containing_highlight() {
        let text = "Intro text here  The method uses graphs  Results follow";
        assert_eq!(find_paragraph(text, "uses graphs"), "The method uses graphs");
    }

    #[test]
    fn paragraph_falls_back_to_first() {
        let text = "Intro text here  The method uses graphs";
        assert_eq!(find_paragraph(text, ""), "Intro text here");
        assert_eq!(find_paragraph(text, "not present"), "Intro text here");
        assert_eq!(find_paragraph("", "x"), "");
    }

    #[test]
    fn empty_index_is_a_hard_failure() {
        let config = ResolverConfig::default();
        let index = WordIndex::default();
        assert!(matches!(
            ContextResolver::new(&index, &config),
            Err(CoreError::EmptyWordIndex)
        ));
    }

    #[test]
    fn line_number_prefers_margin() {
        let config = ResolverConfig::default();
        let index = WordIndex::from_iter([(
            PageIndex(0),
            vec![
                Word::new("17", (4.0, 700.0, 14.0, 710.0)),
                Word::new("claim", (72.0, 700.0, 100.0, 710.0)),
            ],
        )]);
        let resolver = ContextResolver::new(&index, &config).unwrap();
        let annot = annotation("why?", BBox::new(72.0, 701.0, 100.0, 709.0));
        assert_eq!(resolver.line_number(PageIndex(0), &annot, Some(842.0)), Some(17));

        let elsewhere = annotation("why?", BBox::new(72.0, 600.0, 100.0, 610.0));
        // floor((842 - 610) / 12) + 1 = 20
        assert_eq!(
            resolver.line_number(PageIndex(0), &elsewhere, Some(842.0)),
            Some(20)
        );
        assert_eq!(resolver.line_number(PageIndex(0), &elsewhere, None), None);
    }
}
