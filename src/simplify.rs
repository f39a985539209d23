//! Freehand stroke simplification (Ramer–Douglas–Peucker).
//!
//! Runs on every pointer release, so it is iterative (explicit stack of
//! index ranges) and never fails.

use kurbo::Point;

use crate::geom::segment_distance;

/// Reduce `points` to the subset that stays within `epsilon` of the original.
///
/// First and last points are always kept. Inputs shorter than three
/// points come back unchanged.
pub fn simplify(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut split = None;
        for k in start + 1..end {
            let d = segment_distance(points[k], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                split = Some(k);
            }
        }
        if let Some(k) = split {
            if max_dist > epsilon {
                keep[k] = true;
                stack.push((start, k));
                stack.push((k, end));
            }
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn short_input_is_returned_unchanged() {
        let two = pts(&[(0.0, 0.0), (5.0, 5.0)]);
        assert_eq!(simplify(&two, 0.6), two);
        assert!(simplify(&[], 0.6).is_empty());
    }

    #[test]
    fn hand_drawn_square_keeps_all_corners() {
        let square = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(simplify(&square, 0.6).len(), 4);
    }

    #[test]
    fn collinear_jitter_collapses_to_endpoints() {
        let line = pts(&[(0.0, 0.0), (1.0, 0.1), (2.0, -0.1), (3.0, 0.05), (4.0, 0.0)]);
        assert_eq!(simplify(&line, 0.6), pts(&[(0.0, 0.0), (4.0, 0.0)]));
    }

    #[test]
    fn endpoints_are_always_preserved() {
        let zigzag: Vec<Point> = (0..50)
            .map(|i| Point::new(i as f64, if i % 2 == 0 { 0.0 } else { 3.0 }))
            .collect();
        for eps in [0.1, 1.0, 5.0, 100.0] {
            let out = simplify(&zigzag, eps);
            assert_eq!(out.first(), zigzag.first());
            assert_eq!(out.last(), zigzag.last());
        }
    }

    #[test]
    fn larger_epsilon_never_keeps_more_points() {
        let wave: Vec<Point> = (0..200)
            .map(|i| {
                let t = i as f64 * 0.1;
                Point::new(t * 10.0, (t * 1.7).sin() * 8.0 + (t * 5.3).cos() * 2.0)
            })
            .collect();
        let mut prev = usize::MAX;
        for eps in [0.05, 0.2, 0.6, 1.5, 4.0, 20.0] {
            let count = simplify(&wave, eps).len();
            assert!(count <= prev, "epsilon {eps} kept {count} > {prev}");
            prev = count;
        }
    }

    #[test]
    fn kept_points_preserve_order() {
        let stroke = pts(&[(0.0, 0.0), (5.0, 8.0), (10.0, 0.0), (15.0, -8.0), (20.0, 0.0)]);
        let out = simplify(&stroke, 0.6);
        let xs: Vec<f64> = out.iter().map(|p| p.x).collect();
        let mut sorted = xs.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(xs, sorted);
    }
}
