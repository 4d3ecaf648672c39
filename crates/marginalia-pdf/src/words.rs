//! Word assembly from MuPDF's character stream.
//!
//! MuPDF reports characters line by line with boxes in a top-left origin
//! system. Words are runs of non-whitespace characters within one line; their
//! boxes are flipped into the bottom-left origin used everywhere else.

use marginalia_core::{BBox, Word};
use mupdf::{Quad, TextPage};

/// Vertical extent of a MuPDF page, used to flip y coordinates.
///
/// MuPDF bounds start at the lower-left corner of the crop box, so flipped
/// boxes are page-relative; annotations are shifted into the same frame (see
/// [`page_origin`](crate::annotations::page_origin)). `/Rotate` is not
/// undone: on rotated pages word and annotation boxes do not line up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub top: f64,
    pub bottom: f64,
}

impl PageFrame {
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Map a top-left-origin box onto the bottom-left-origin page.
    pub fn flip(&self, bbox: BBox) -> BBox {
        BBox::new(
            bbox.x0,
            self.bottom - bbox.y1,
            bbox.x1,
            self.bottom - bbox.y0,
        )
    }
}

/// Accumulates characters of one line into words.
#[derive(Debug, Default)]
pub(crate) struct WordBuilder {
    words: Vec<Word>,
    text: String,
    bbox: Option<BBox>,
}

impl WordBuilder {
    pub(crate) fn push(&mut self, c: char, bbox: BBox) {
        if c.is_whitespace() {
            self.finish_word();
            return;
        }
        self.text.push(c);
        self.bbox = Some(match self.bbox {
            Some(b) => b.union(&bbox),
            None => bbox,
        });
    }

    /// Lines never join into one word.
    pub(crate) fn end_line(&mut self) {
        self.finish_word();
    }

    fn finish_word(&mut self) {
        if let Some(bbox) = self.bbox.take()
            && !self.text.is_empty()
        {
            self.words.push(Word::new(std::mem::take(&mut self.text), bbox));
        }
        self.text.clear();
    }

    pub(crate) fn into_words(mut self) -> Vec<Word> {
        self.finish_word();
        self.words
    }
}

fn quad_box(quad: &Quad) -> BBox {
    let xs = [quad.ul.x, quad.ur.x, quad.ll.x, quad.lr.x];
    let ys = [quad.ul.y, quad.ur.y, quad.ll.y, quad.lr.y];
    let min = |v: [f32; 4]| v.iter().copied().fold(f32::INFINITY, f32::min) as f64;
    let max = |v: [f32; 4]| v.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    BBox::new(min(xs), min(ys), max(xs), max(ys))
}

/// Words of one page in MuPDF's reading order.
pub fn page_words(text_page: &TextPage, frame: PageFrame) -> Vec<Word> {
    let mut builder = WordBuilder::default();
    for block in text_page.blocks() {
        for line in block.lines() {
            for c in line.chars() {
                let Some(ch) = c.char() else {
                    continue;
                };
                builder.push(ch, frame.flip(quad_box(&c.quad())));
            }
            builder.end_line();
        }
    }
    builder.into_words()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_to_bottom_left_origin() {
        let frame = PageFrame {
            top: 0.0,
            bottom: 842.0,
        };
        let flipped = frame.flip(BBox::new(72.0, 100.0, 90.0, 112.0));
        assert_eq!(flipped, BBox::new(72.0, 730.0, 90.0, 742.0));
        assert_eq!(frame.height(), 842.0);
    }

    #[test]
    fn builder_splits_on_whitespace_and_lines() {
        let mut b = WordBuilder::default();
        for (i, c) in "ab c".chars().enumerate() {
            let x = i as f64 * 5.0;
            b.push(c, BBox::new(x, 0.0, x + 5.0, 10.0));
        }
        b.end_line();
        b.push('d', BBox::new(0.0, 20.0, 5.0, 30.0));
        let words = b.into_words();

        let texts: Vec<_> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, ["ab", "c", "d"]);
        assert_eq!(words[0].bbox, BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(words[1].bbox, BBox::new(15.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn consecutive_spaces_do_not_emit_empty_words() {
        let mut b = WordBuilder::default();
        b.push(' ', BBox::new(0.0, 0.0, 1.0, 1.0));
        b.push(' ', BBox::new(1.0, 0.0, 2.0, 1.0));
        b.end_line();
        assert!(b.into_words().is_empty());
    }
}
