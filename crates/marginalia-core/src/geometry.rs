//! Bounding boxes, quad-point normalization and the tolerant overlap test.
//!
//! All coordinates use the PDF convention: origin at the bottom-left corner
//! of the page, y growing upwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default inflation applied by [`overlaps`] to absorb extraction noise.
pub const DEFAULT_OVERLAP_TOLERANCE: f64 = 0.5;

/// Axis-aligned rectangle `(x0, y0, x1, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build a box from two arbitrary corners, ordering each axis.
    pub fn from_corners(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        Self {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Top edge. With a bottom-left origin this is `y1`.
    pub fn top(&self) -> f64 {
        self.y1
    }

    /// Whether the vertical spans of the two boxes intersect (edges inclusive).
    pub fn overlaps_vertically(&self, other: &BBox) -> bool {
        self.y0 <= other.y1 && self.y1 >= other.y0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

impl From<(f64, f64, f64, f64)> for BBox {
    fn from((x0, y0, x1, y1): (f64, f64, f64, f64)) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// Why an annotation's geometry could not be turned into a box.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("annotation has neither a rectangle nor quad-points")]
    NoGeometry,
    #[error("quad-point list is empty, odd-length or not finite (len {0})")]
    MalformedQuadpoints(usize),
}

/// Resolve an annotation's geometry to one bounding box.
///
/// `rect` wins when present. Otherwise the quad-points are read as a flat
/// list of `x, y` pairs (8 numbers per quad, any number of quads) and the
/// enclosing box of all points is returned.
pub fn normalize_annotation_box(
    rect: Option<BBox>,
    quadpoints: Option<&[f64]>,
) -> Result<BBox, GeometryError> {
    if let Some(rect) = rect
        && rect.is_finite()
    {
        return Ok(rect);
    }

    let Some(points) = quadpoints else {
        return Err(GeometryError::NoGeometry);
    };

    if points.is_empty() || points.len() % 2 != 0 || points.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::MalformedQuadpoints(points.len()));
    }

    let mut bbox = BBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for pair in points.chunks_exact(2) {
        let (x, y) = (pair[0], pair[1]);
        bbox.x0 = bbox.x0.min(x);
        bbox.y0 = bbox.y0.min(y);
        bbox.x1 = bbox.x1.max(x);
        bbox.y1 = bbox.y1.max(y);
    }
    Ok(bbox)
}

/// Inclusive overlap test with both boxes inflated by `tol` on every side.
pub fn overlaps(a: &BBox, b: &BBox, tol: f64) -> bool {
    a.x1 >= b.x0 - tol && a.x0 <= b.x1 + tol && a.y1 >= b.y0 - tol && a.y0 <= b.y1 + tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_overlaps_itself_without_tolerance() {
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(-5.5, 3.0, -1.0, 3.0),
            BBox::new(100.0, 700.0, 100.0, 700.0),
        ];
        for b in &boxes {
            assert!(overlaps(b, b, 0.0), "{b:?} should overlap itself");
        }
    }

    #[test]
    fn overlap_is_monotonic_in_tolerance() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let candidates = [
            BBox::new(10.3, 0.0, 20.0, 10.0),
            BBox::new(11.0, 11.0, 12.0, 12.0),
            BBox::new(5.0, 5.0, 6.0, 6.0),
            BBox::new(-3.0, 10.4, -0.2, 14.0),
        ];
        let tolerances = [0.0, 0.25, 0.5, 1.0, 2.0];
        for b in &candidates {
            for pair in tolerances.windows(2) {
                if overlaps(&a, b, pair[0]) {
                    assert!(overlaps(&a, b, pair[1]), "{b:?} lost overlap at {}", pair[1]);
                }
            }
        }
    }

    #[test]
    fn tolerance_bridges_small_gaps() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.4, 0.0, 20.0, 10.0);
        assert!(!overlaps(&a, &b, 0.0));
        assert!(overlaps(&a, &b, DEFAULT_OVERLAP_TOLERANCE));
        let far = BBox::new(11.1, 0.0, 20.0, 10.0);
        assert!(!overlaps(&a, &far, DEFAULT_OVERLAP_TOLERANCE));
    }

    #[test]
    fn single_quad_normalizes_to_bounds() {
        let qp = [0.0, 0.0, 10.0, 0.0, 10.0, 5.0, 0.0, 5.0];
        let bbox = normalize_annotation_box(None, Some(&qp)).unwrap();
        assert_eq!(bbox, BBox::new(0.0, 0.0, 10.0, 5.0));
    }

    #[test]
    fn multiple_quads_cover_all_points() {
        // Two highlighted lines, PDF order: upper-left, upper-right, lower-left, lower-right
        let qp = [
            72.0, 700.0, 300.0, 700.0, 72.0, 688.0, 300.0, 688.0, //
            72.0, 686.0, 150.0, 686.0, 72.0, 674.0, 150.0, 674.0,
        ];
        let bbox = normalize_annotation_box(None, Some(&qp)).unwrap();
        assert_eq!(bbox, BBox::new(72.0, 674.0, 300.0, 700.0));
    }

    #[test]
    fn rect_takes_precedence_over_quadpoints() {
        let rect = BBox::new(1.0, 2.0, 3.0, 4.0);
        let qp = [0.0, 0.0, 10.0, 0.0, 10.0, 5.0, 0.0, 5.0];
        assert_eq!(normalize_annotation_box(Some(rect), Some(&qp)).unwrap(), rect);
    }

    #[test]
    fn missing_geometry_is_reported() {
        assert_eq!(
            normalize_annotation_box(None, None),
            Err(GeometryError::NoGeometry)
        );
    }

    #[test]
    fn malformed_quadpoints_are_reported() {
        assert_eq!(
            normalize_annotation_box(None, Some(&[])),
            Err(GeometryError::MalformedQuadpoints(0))
        );
        assert_eq!(
            normalize_annotation_box(None, Some(&[1.0, 2.0, 3.0])),
            Err(GeometryError::MalformedQuadpoints(3))
        );
        assert_eq!(
            normalize_annotation_box(None, Some(&[1.0, f64::NAN])),
            Err(GeometryError::MalformedQuadpoints(2))
        );
    }

    #[test]
    fn non_finite_rect_falls_back_to_quadpoints() {
        let rect = BBox::new(f64::NAN, 0.0, 1.0, 1.0);
        let qp = [0.0, 0.0, 2.0, 2.0];
        assert_eq!(
            normalize_annotation_box(Some(rect), Some(&qp)).unwrap(),
            BBox::new(0.0, 0.0, 2.0, 2.0)
        );
    }

    #[test]
    fn from_corners_orders_axes() {
        let b = BBox::from_corners(10.0, 5.0, 0.0, 20.0);
        assert_eq!(b, BBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }
}
