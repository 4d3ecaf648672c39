//! Annotation records read straight from the PDF object graph.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object};
use marginalia_core::{BBox, PageIndex, RawAnnotation};

/// Follow a reference, or return the object itself.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn numbers(doc: &Document, obj: &Object) -> Option<Vec<f64>> {
    let array = resolve(doc, obj)?.as_array().ok()?;
    array
        .iter()
        .map(|o| resolve(doc, o).and_then(number))
        .collect()
}

/// Decode a PDF text string: UTF-16BE when it starts with a byte order
/// mark, else UTF-8, else Latin-1.
///
/// Strings without a BOM are formally PDFDocEncoding. Trying UTF-8 first is
/// a heuristic: it matches what most viewers write and agrees with
/// PDFDocEncoding on ASCII. The Latin-1 fallback differs from
/// PDFDocEncoding in the 0x80..=0x9F range.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// `/Rect` as a normalized box. Viewers do not always write the lower-left
/// corner first.
pub fn parse_rect(values: &[f64]) -> Option<BBox> {
    match values {
        [ax, ay, bx, by] => Some(BBox::from_corners(*ax, *ay, *bx, *by)),
        _ => None,
    }
}

/// One annotation dictionary as a [`RawAnnotation`]. Nothing is validated
/// here; the extractor decides what is usable.
pub fn raw_annotation(doc: &Document, annot: &Dictionary) -> RawAnnotation {
    let text = annot
        .get(b"Contents")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| match o {
            Object::String(bytes, _) => Some(decode_text(bytes)),
            _ => None,
        });
    let subtype = annot
        .get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).into_owned());
    let rect = annot
        .get(b"Rect")
        .ok()
        .and_then(|o| numbers(doc, o))
        .and_then(|v| parse_rect(&v));
    let quadpoints = annot
        .get(b"QuadPoints")
        .ok()
        .and_then(|o| numbers(doc, o));

    RawAnnotation {
        text,
        subtype,
        rect,
        quadpoints,
    }
}

/// A page attribute, looked up on the page and then up the `/Parent` chain.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    // Page trees are shallow; the bound only guards against cycles
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        current = current
            .get(b"Parent")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())?;
    }
    None
}

/// Lower-left corner of the visible page area (`/CropBox`, else
/// `/MediaBox`) in user space. MuPDF reports words relative to this corner.
pub fn page_origin(doc: &Document, page: &Dictionary) -> (f64, f64) {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .into_iter()
        .find_map(|key| {
            let values = numbers(doc, inherited(doc, page, key)?)?;
            parse_rect(&values)
        })
        .map(|b| (b.x0, b.y0))
        .unwrap_or((0.0, 0.0))
}

/// Move an annotation from user space into the page-relative frame words
/// use.
pub fn shift_annotation(mut annot: RawAnnotation, (dx, dy): (f64, f64)) -> RawAnnotation {
    if dx == 0.0 && dy == 0.0 {
        return annot;
    }
    annot.rect = annot
        .rect
        .map(|b| BBox::new(b.x0 - dx, b.y0 - dy, b.x1 - dx, b.y1 - dy));
    if let Some(points) = annot.quadpoints.as_mut() {
        for (i, v) in points.iter_mut().enumerate() {
            *v -= if i % 2 == 0 { dx } else { dy };
        }
    }
    annot
}

/// Every annotation of every page, keyed by zero-based page index, with
/// coordinates relative to the page's visible area.
///
/// `Popup` annotations are skipped: they only mirror their parent's text.
pub fn document_annotations(doc: &Document) -> BTreeMap<PageIndex, Vec<RawAnnotation>> {
    let mut out = BTreeMap::new();

    // lopdf numbers pages from 1
    for (number, page_id) in doc.get_pages() {
        let Some(index) = (number as usize).checked_sub(1).map(PageIndex) else {
            continue;
        };
        let Ok(page) = doc.get_dictionary(page_id) else {
            tracing::debug!(page = number, "page object is not a dictionary");
            continue;
        };
        let Some(annots) = page
            .get(b"Annots")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        else {
            continue;
        };

        let origin = page_origin(doc, page);
        let records: Vec<RawAnnotation> = annots
            .iter()
            .filter_map(|o| resolve(doc, o))
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| !matches!(d.get(b"Subtype").and_then(|s| s.as_name()), Ok(b"Popup")))
            .map(|d| shift_annotation(raw_annotation(doc, d), origin))
            .collect();

        if !records.is_empty() {
            out.insert(index, records);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{StringFormat, dictionary};

    #[test]
    fn decodes_utf16_with_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x51, 0x00, 0x75, 0x00, 0xE4];
        assert_eq!(decode_text(&bytes), "Quä");
    }

    #[test]
    fn decodes_utf8_then_latin1() {
        assert_eq!(decode_text("Grammatik prüfen".as_bytes()), "Grammatik prüfen");
        assert_eq!(decode_text(&[0x47, 0xFC, 0x74]), "Güt");
    }

    #[test]
    fn rect_corners_are_normalized() {
        assert_eq!(
            parse_rect(&[100.0, 710.0, 72.0, 700.0]),
            Some(BBox::new(72.0, 700.0, 100.0, 710.0))
        );
        assert_eq!(parse_rect(&[1.0, 2.0, 3.0]), None);
    }

    fn document_with_annotations() -> Document {
        let mut doc = Document::with_version("1.7");
        let highlight = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => vec![72.into(), 700.into(), 190.into(), 710.into()],
            "QuadPoints" => vec![
                72.into(), 710.into(), 190.into(), 710.into(),
                72.into(), 700.into(), 190.into(), 700.into(),
            ],
            "Contents" => Object::String(b"Quelle?".to_vec(), StringFormat::Literal),
        });
        let popup = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Popup",
            "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Annots" => vec![Object::Reference(highlight), Object::Reference(popup)],
        });
        let empty_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(empty_page), Object::Reference(page_id)],
            "Count" => 2,
        });
        for id in [page_id, empty_page] {
            if let Ok(Object::Dictionary(page)) = doc.get_object_mut(id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn reads_annotations_with_zero_based_pages() {
        let doc = document_with_annotations();
        let annots = document_annotations(&doc);

        assert_eq!(annots.keys().copied().collect::<Vec<_>>(), vec![PageIndex(1)]);
        let records = &annots[&PageIndex(1)];
        assert_eq!(records.len(), 1);

        let a = &records[0];
        assert_eq!(a.text.as_deref(), Some("Quelle?"));
        assert_eq!(a.subtype.as_deref(), Some("Highlight"));
        assert_eq!(a.rect, Some(BBox::new(72.0, 700.0, 190.0, 710.0)));
        assert_eq!(a.quadpoints.as_ref().map(Vec::len), Some(8));
    }

    fn single_page(page_entries: Dictionary, pages_entries: Dictionary) -> Document {
        let mut doc = Document::with_version("1.7");
        let note = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => vec![108.into(), 736.into(), 226.into(), 746.into()],
            "QuadPoints" => vec![
                108.into(), 746.into(), 226.into(), 746.into(),
                108.into(), 736.into(), 226.into(), 736.into(),
            ],
            "Contents" => Object::String(b"unklar".to_vec(), StringFormat::Literal),
        });
        let mut page = page_entries;
        page.set("Type", "Page");
        page.set("Annots", vec![Object::Reference(note)]);
        let page_id = doc.add_object(page);
        let mut pages = pages_entries;
        pages.set("Type", "Pages");
        pages.set("Kids", vec![Object::Reference(page_id)]);
        pages.set("Count", 1);
        let pages_id = doc.add_object(pages);
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn crop_box_origin_is_subtracted() {
        let doc = single_page(
            dictionary! {
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "CropBox" => vec![36.into(), 36.into(), 576.into(), 756.into()],
            },
            Dictionary::new(),
        );
        let annots = document_annotations(&doc);
        let a = &annots[&PageIndex(0)][0];
        assert_eq!(a.rect, Some(BBox::new(72.0, 700.0, 190.0, 710.0)));
        assert_eq!(
            a.quadpoints.as_deref(),
            Some([72.0, 710.0, 190.0, 710.0, 72.0, 700.0, 190.0, 700.0].as_slice())
        );
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let doc = single_page(
            Dictionary::new(),
            dictionary! {
                "MediaBox" => vec![36.into(), 36.into(), 631.into(), 878.into()],
            },
        );
        let page_id = doc.get_pages()[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        assert_eq!(page_origin(&doc, page), (36.0, 36.0));

        let a = &document_annotations(&doc)[&PageIndex(0)][0];
        assert_eq!(a.rect, Some(BBox::new(72.0, 700.0, 190.0, 710.0)));
    }

    #[test]
    fn zero_origin_leaves_annotation_untouched() {
        let doc = document_with_annotations();
        let page_id = doc.get_pages()[&2];
        let page = doc.get_dictionary(page_id).unwrap();
        assert_eq!(page_origin(&doc, page), (0.0, 0.0));
    }
}
