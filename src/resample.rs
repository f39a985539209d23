//! Uniform arc-length resampling of closed polylines.

use kurbo::Point;

/// Place exactly `n` points along the closed curve through `points`,
/// spaced evenly by arc length.
///
/// The closing edge (last point back to first) is part of the curve.
/// The output is not explicitly closed. Returns an empty vector for
/// empty input or `n <= 2`.
pub fn resample_closed(points: &[Point], n: usize) -> Vec<Point> {
    if points.is_empty() || n <= 2 {
        return Vec::new();
    }

    let mut closed = points.to_vec();
    closed.push(points[0]);

    let mut cum = Vec::with_capacity(closed.len());
    cum.push(0.0);
    let mut total = 0.0;
    for pair in closed.windows(2) {
        total += pair[0].distance(pair[1]);
        cum.push(total);
    }

    let step = total / n as f64;
    let last_seg = closed.len() - 2;
    let mut out = Vec::with_capacity(n);
    let mut seg = 0;
    for k in 0..n {
        let t = k as f64 * step;
        while seg < last_seg && cum[seg + 1] < t {
            seg += 1;
        }
        let (t0, t1) = (cum[seg], cum[seg + 1]);
        let a = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        out.push(closed[seg].lerp(closed[seg + 1], a));
    }
    out
}
