//! Shared geometry utilities for polygons stored as `Vec<Point>`.

use kurbo::{Point, Rect};

/// Signed area via the shoelace formula, treating `points` as closed.
///
/// Positive = counter-clockwise in a Y-up frame, negative = clockwise.
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
        / 2.0
}

/// Perimeter of the closed polygon through `points`.
pub fn closed_length(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance(points[(i + 1) % n])).sum()
}

/// Axis-aligned bounds of `points`, or `None` when empty.
pub fn bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect::from_points(*first, *first);
    for &p in &points[1..] {
        rect = rect.union_pt(p);
    }
    Some(rect)
}

/// Distance from `p` to the segment `a`–`b`.
///
/// The projection parameter is clamped to `[0, 1]`; a zero-length
/// segment divides by 1 instead of 0.
pub fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    let denom = if len_sq == 0.0 { 1.0 } else { len_sq };
    let t = ((p - a).dot(ab) / denom).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Drop the last point if it repeats the first within `tolerance`.
pub fn strip_closing_duplicate(points: &[Point], tolerance: f64) -> &[Point] {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 && first.distance(*last) < tolerance => {
            &points[..points.len() - 1]
        }
        _ => points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn ccw_square_has_positive_area() {
        assert_relative_eq!(signed_area(&square()), 4.0);
        let mut cw = square();
        cw.reverse();
        assert_relative_eq!(signed_area(&cw), -4.0);
    }

    #[test]
    fn perimeter_includes_closing_edge() {
        assert_relative_eq!(closed_length(&square()), 8.0);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        assert_relative_eq!(segment_distance(Point::new(0.5, 2.0), a, b), 2.0);
        assert_relative_eq!(segment_distance(Point::new(4.0, 0.0), a, b), 3.0);
        // Degenerate segment falls back to point distance.
        assert_relative_eq!(segment_distance(Point::new(3.0, 4.0), a, a), 5.0);
    }

    #[test]
    fn closing_duplicate_is_stripped() {
        let mut pts = square();
        pts.push(Point::new(0.0, 0.0));
        assert_eq!(strip_closing_duplicate(&pts, 1e-9).len(), 4);
        assert_eq!(strip_closing_duplicate(&square(), 1e-9).len(), 4);
    }

    #[test]
    fn bounds_cover_all_points() {
        let r = bounds(&square()).unwrap();
        assert_eq!((r.x0, r.y0, r.x1, r.y1), (0.0, 0.0, 2.0, 2.0));
        assert!(bounds(&[]).is_none());
    }
}
