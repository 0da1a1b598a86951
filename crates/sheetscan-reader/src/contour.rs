//! Border tracing of binarized search windows and selection of the contour
//! that encloses a printed cell.

use imageproc::contours::{find_contours, BorderType};
use sheetscan_core::PixelRect;

/// A traced border with the measurements used for cell selection.
#[derive(Clone, Debug, PartialEq)]
pub struct TracedContour {
    /// Polygon area of the traced border (shoelace).
    pub area: f64,
    /// Inclusive pixel bounding box.
    pub bounds: PixelRect,
    /// True for the border of a hole inside a bright region.
    pub hole: bool,
}

/// Trace every outer and hole border of the bright regions in `mask`.
pub fn trace_contours(mask: &image::GrayImage) -> Vec<TracedContour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            let pts: Vec<(i64, i64)> = c.points.iter().map(|p| (p.x as i64, p.y as i64)).collect();
            TracedContour {
                area: polygon_area(&pts),
                bounds: bounding_rect(&pts),
                hole: c.border_type == BorderType::Hole,
            }
        })
        .collect()
}

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(pts: &[(i64, i64)]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for (i, &(x0, y0)) in pts.iter().enumerate() {
        let (x1, y1) = pts[(i + 1) % pts.len()];
        acc += x0 * y1 - x1 * y0;
    }
    (acc as f64 * 0.5).abs()
}

/// Smallest upright rectangle containing every point; a single point has size 1×1.
pub fn bounding_rect(pts: &[(i64, i64)]) -> PixelRect {
    let (mut x1, mut y1) = (i64::MAX, i64::MAX);
    let (mut x2, mut y2) = (i64::MIN, i64::MIN);
    for &(x, y) in pts {
        x1 = x1.min(x);
        y1 = y1.min(y);
        x2 = x2.max(x);
        y2 = y2.max(y);
    }
    if pts.is_empty() {
        return PixelRect::from_corners(0, 0, 0, 0);
    }
    PixelRect::from_corners(x1, y1, x2 + 1, y2 + 1)
}

/// The contour with the smallest area strictly larger than `nominal_area`.
///
/// Ties keep the first traced contour.
pub fn select_enclosing(contours: &[TracedContour], nominal_area: f64) -> Option<&TracedContour> {
    contours
        .iter()
        .filter(|c| c.area > nominal_area)
        .fold(None, |best: Option<&TracedContour>, c| match best {
            Some(b) if b.area <= c.area => Some(b),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_mask(w: u32, h: u32, outer: (u32, u32, u32, u32), thickness: u32) -> image::GrayImage {
        let (x1, y1, x2, y2) = outer;
        image::GrayImage::from_fn(w, h, |x, y| {
            let inside = x >= x1 && x < x2 && y >= y1 && y < y2;
            let interior =
                x >= x1 + thickness && x < x2 - thickness && y >= y1 + thickness && y < y2 - thickness;
            if inside && !interior {
                image::Luma([0u8])
            } else {
                image::Luma([255u8])
            }
        })
    }

    #[test]
    fn shoelace_of_axis_aligned_square() {
        let sq = [(0, 0), (10, 0), (10, 10), (0, 10)];
        assert_eq!(polygon_area(&sq), 100.0);
        assert_eq!(polygon_area(&sq[..2]), 0.0);
    }

    #[test]
    fn bounding_rect_is_inclusive() {
        let r = bounding_rect(&[(3, 4), (7, 9), (5, 5)]);
        assert_eq!(r, PixelRect::from_corners(3, 4, 8, 10));
        assert_eq!(bounding_rect(&[(2, 2)]).area(), 1);
    }

    #[test]
    fn dark_ring_yields_hole_border_around_the_ring() {
        // dark ring covering [10, 30) with a 2px stroke inside a 40x40 window
        let mask = ring_mask(40, 40, (10, 10, 30, 30), 2);
        let contours = trace_contours(&mask);

        let hole = contours.iter().find(|c| c.hole).expect("hole border");
        assert_eq!(hole.bounds, PixelRect::from_corners(9, 9, 31, 31));
        // 21x21 border, possibly with its four diagonal corners cut
        assert!(hole.area > 400.0 && hole.area <= 441.0, "area = {}", hole.area);

        // nominal 20x20 box: the hole border (21x21) is the tightest enclosing contour
        let chosen = select_enclosing(&contours, 400.0).expect("enclosing");
        assert_eq!(chosen, hole);
    }

    #[test]
    fn nothing_encloses_a_box_larger_than_the_window() {
        let mask = ring_mask(40, 40, (10, 10, 30, 30), 2);
        let contours = trace_contours(&mask);
        assert!(select_enclosing(&contours, 40.0 * 40.0).is_none());
    }
}
