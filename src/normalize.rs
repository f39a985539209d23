//! Canonical reference frame for tile polygons.
//!
//! The solver stage and the renderer exchange shapes in a unit frame:
//! anchored at the minimum corner, longer bounding-box side equal to 1.
//! Winding is reconciled against the user's outline because symmetry
//! placement downstream is orientation-sensitive.

use kurbo::{Point, Vec2};

use crate::geom::{bounds, signed_area};

/// Smallest extent used as a scale denominator.
const MIN_EXTENT: f64 = 1e-9;

/// Translate and uniformly scale `points` so that the minimum corner is
/// the origin and the larger of width/height is 1.
pub fn normalize(points: &[Point]) -> Vec<Point> {
    let Some(rect) = bounds(points) else {
        return Vec::new();
    };
    let scale = 1.0 / rect.width().max(rect.height()).max(MIN_EXTENT);
    let origin = Vec2::new(rect.x0, rect.y0);
    points
        .iter()
        .map(|&p| ((p - origin).to_vec2() * scale).to_point())
        .collect()
}

/// Return `candidate` with its winding matched to `reference`.
///
/// If the signs of the two shoelace areas differ, the point order of
/// `candidate` is reversed; otherwise it is returned as is.
pub fn reconcile_orientation(reference: &[Point], candidate: &[Point]) -> Vec<Point> {
    let want = signed_area(reference).signum();
    let have = signed_area(candidate).signum();
    let mut out = candidate.to_vec();
    if want != have {
        out.reverse();
    }
    out
}
