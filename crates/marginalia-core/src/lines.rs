//! Line-number recovery for review comments.
//!
//! Manuscripts submitted for review usually print line numbers in the left
//! margin. When they do, the printed number next to the annotation is used;
//! otherwise the line is estimated from the annotation's vertical position.

use crate::geometry::BBox;
use crate::words::Word;

/// Look for a printed line number in the left margin beside `annot`.
///
/// A candidate word ends left of `margin_threshold`, overlaps the
/// annotation's vertical span and consists of ASCII digits only. The first
/// candidate in extraction order wins.
pub fn margin_line_number(words: &[Word], annot: &BBox, margin_threshold: f64) -> Option<u32> {
    words
        .iter()
        .filter(|w| w.bbox.x1 < margin_threshold)
        .filter(|w| w.bbox.overlaps_vertically(annot))
        .find_map(|w| parse_line_label(&w.text))
}

fn parse_line_label(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Estimate a one-based line number from the distance between the page top
/// and the annotation's top edge.
///
/// `floor((page_height - top_y) / line_height) + 1`, never below 1.
pub fn estimate_line_number(top_y: f64, page_height: f64, line_height: f64) -> u32 {
    let lines = ((page_height - top_y) / line_height).floor();
    if !lines.is_finite() || lines < 0.0 {
        return 1;
    }
    // Saturating float-to-int cast keeps absurd geometry bounded
    (lines as u32).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometric_estimate() {
        assert_eq!(estimate_line_number(788.0, 800.0, 12.0), 2);
        assert_eq!(estimate_line_number(800.0, 800.0, 12.0), 1);
        assert_eq!(estimate_line_number(799.0, 800.0, 12.0), 1);
        assert_eq!(estimate_line_number(776.0, 800.0, 12.0), 3);
    }

    #[test]
    fn estimate_never_below_one() {
        assert_eq!(estimate_line_number(900.0, 800.0, 12.0), 1);
        assert_eq!(estimate_line_number(f64::NAN, 800.0, 12.0), 1);
    }

    #[test]
    fn margin_number_beside_annotation() {
        let words = vec![
            Word::new("11", (5.0, 700.0, 15.0, 710.0)),
            Word::new("12", (5.0, 688.0, 15.0, 698.0)),
            Word::new("Text", (72.0, 688.0, 120.0, 698.0)),
        ];
        let annot = BBox::new(72.0, 689.0, 200.0, 697.0);
        assert_eq!(margin_line_number(&words, &annot, 20.0), Some(12));
    }

    #[test]
    fn margin_scan_ignores_body_numbers_and_labels() {
        let words = vec![
            Word::new("12a", (5.0, 688.0, 15.0, 698.0)),
            Word::new("2024", (72.0, 688.0, 100.0, 698.0)),
        ];
        let annot = BBox::new(72.0, 689.0, 200.0, 697.0);
        assert_eq!(margin_line_number(&words, &annot, 20.0), None);
    }

    #[test]
    fn margin_word_must_end_left_of_threshold() {
        let words = vec![Word::new("7", (15.0, 688.0, 21.0, 698.0))];
        let annot = BBox::new(72.0, 689.0, 200.0, 697.0);
        assert_eq!(margin_line_number(&words, &annot, 20.0), None);
        assert_eq!(margin_line_number(&words, &annot, 25.0), Some(7));
    }
}
