//! Per-document index of words and their boxes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::BBox;
use crate::page::PageIndex;

/// One extracted word with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
}

impl Word {
    pub fn new(text: impl Into<String>, bbox: impl Into<BBox>) -> Self {
        Self {
            text: text.into(),
            bbox: bbox.into(),
        }
    }
}

/// Words of a whole document, grouped by page, in the order the extraction
/// backend emitted them. The index never re-sorts.
///
/// Built once, before any annotation is resolved, and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct WordIndex {
    pages: BTreeMap<PageIndex, Vec<Word>>,
}

impl WordIndex {
    pub fn new(pages: BTreeMap<PageIndex, Vec<Word>>) -> Self {
        Self { pages }
    }

    /// Words on a page; empty for pages the index does not know.
    pub fn words_on_page(&self, page: PageIndex) -> &[Word] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the extraction produced an entry for this page (even an empty one).
    pub fn has_page(&self, page: PageIndex) -> bool {
        self.pages.contains_key(&page)
    }

    /// Page text used for paragraph search: word texts joined by single spaces.
    pub fn page_text(&self, page: PageIndex) -> String {
        join_words(self.words_on_page(page).iter())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn word_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    /// True when no page holds a single word.
    pub fn is_empty(&self) -> bool {
        self.pages.values().all(Vec::is_empty)
    }

    pub fn pages(&self) -> impl Iterator<Item = (PageIndex, &[Word])> {
        self.pages.iter().map(|(idx, words)| (*idx, words.as_slice()))
    }
}

impl FromIterator<(PageIndex, Vec<Word>)> for WordIndex {
    fn from_iter<I: IntoIterator<Item = (PageIndex, Vec<Word>)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

pub(crate) fn join_words<'a>(words: impl Iterator<Item = &'a Word>) -> String {
    words
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> WordIndex {
        WordIndex::from_iter([
            (
                PageIndex(0),
                vec![
                    Word::new("Hello", (0.0, 0.0, 10.0, 10.0)),
                    Word::new("World", (12.0, 0.0, 22.0, 10.0)),
                ],
            ),
            (PageIndex(2), vec![]),
        ])
    }

    #[test]
    fn missing_page_yields_empty_slice() {
        let idx = index();
        assert!(idx.words_on_page(PageIndex(1)).is_empty());
        assert!(!idx.has_page(PageIndex(1)));
        assert!(idx.has_page(PageIndex(2)));
        assert_eq!(idx.page_text(PageIndex(7)), "");
    }

    #[test]
    fn page_text_joins_in_extraction_order() {
        assert_eq!(index().page_text(PageIndex(0)), "Hello World");
    }

    #[test]
    fn counts() {
        let idx = index();
        assert_eq!(idx.page_count(), 2);
        assert_eq!(idx.word_count(), 2);
        assert!(!idx.is_empty());
        assert!(WordIndex::default().is_empty());
        assert!(WordIndex::from_iter([(PageIndex(0), vec![])]).is_empty());
    }
}
