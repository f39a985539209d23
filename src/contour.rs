//! Foreground raster → outline polygon.
//!
//! Pixel work (thresholding, border following, DP approximation) is
//! delegated to a [`VisionPrimitives`] collaborator; this module only
//! orchestrates it and owns the raw-outline cache that the resampler
//! derives from.

use geo::{LineString, Simplify};
use image::{GrayImage, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{threshold, ThresholdType};
use kurbo::Point;

use crate::bitmap::alpha_channel;
use crate::config::PipelineConfig;
use crate::geom::{closed_length, signed_area};
use crate::resample::resample_closed;

/// A contour as reported by the vision collaborator, in pixel coordinates.
pub type RawContour = Vec<Point>;

/// Pixel-level primitives the outline extraction is built from.
pub trait VisionPrimitives {
    /// Binary mask: values above `level` become 255, the rest 0.
    fn threshold(&self, channel: &GrayImage, level: u8) -> GrayImage;
    /// Outermost contours only, in discovery order.
    fn find_external_contours(&self, mask: &GrayImage) -> Vec<RawContour>;
    /// Signed enclosed area of a closed contour.
    fn contour_area(&self, contour: &[Point]) -> f64 {
        signed_area(contour)
    }
    /// Perimeter of a closed contour.
    fn arc_length(&self, contour: &[Point]) -> f64 {
        closed_length(contour)
    }
    /// Closed polygon approximation within `epsilon`.
    fn approx_poly_dp(&self, contour: &[Point], epsilon: f64) -> RawContour;
}

/// [`VisionPrimitives`] backed by `imageproc` and `geo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocVision;

impl VisionPrimitives for ImageprocVision {
    fn threshold(&self, channel: &GrayImage, level: u8) -> GrayImage {
        threshold(channel, level, ThresholdType::Binary)
    }

    fn find_external_contours(&self, mask: &GrayImage) -> Vec<RawContour> {
        find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| {
                c.points
                    .iter()
                    .map(|p| Point::new(p.x as f64, p.y as f64))
                    .collect()
            })
            .collect()
    }

    fn approx_poly_dp(&self, contour: &[Point], epsilon: f64) -> RawContour {
        if contour.len() < 3 {
            return contour.to_vec();
        }
        let mut ring: Vec<(f64, f64)> = contour.iter().map(|p| (p.x, p.y)).collect();
        ring.push(ring[0]);
        let mut simplified: Vec<Point> = LineString::from(ring)
            .simplify(&epsilon)
            .into_inner()
            .into_iter()
            .map(|c| Point::new(c.x, c.y))
            .collect();
        // Drop the ring's closing duplicate.
        simplified.pop();
        simplified
    }
}

/// Extract the outline of the largest foreground region.
///
/// Returns an empty vector when nothing with at least three points is
/// found; callers turn that into a "no shape detected" condition.
pub fn extract_outline(
    vision: &dyn VisionPrimitives,
    foreground: &RgbaImage,
    config: &PipelineConfig,
) -> Vec<Point> {
    let mask = vision.threshold(&alpha_channel(foreground), config.alpha_threshold);
    let contours = vision.find_external_contours(&mask);
    log::debug!("{} external contours", contours.len());

    let Some(best) = largest_contour(vision, &contours) else {
        return Vec::new();
    };
    if best.len() < 3 {
        return Vec::new();
    }

    let perimeter = vision.arc_length(best);
    let epsilon = (perimeter * config.approx_fraction).max(config.approx_min_epsilon);
    let outline = vision.approx_poly_dp(best, epsilon);
    log::debug!(
        "largest contour: {} px perimeter, {} -> {} points (epsilon {:.2})",
        perimeter as i64,
        best.len(),
        outline.len(),
        epsilon,
    );
    if outline.len() < 3 {
        return Vec::new();
    }
    outline
}

/// Largest contour by absolute area; the first one found wins ties.
fn largest_contour<'a>(
    vision: &dyn VisionPrimitives,
    contours: &'a [RawContour],
) -> Option<&'a RawContour> {
    let mut best: Option<(&RawContour, f64)> = None;
    for contour in contours {
        let area = vision.contour_area(contour).abs();
        if best.map_or(true, |(_, a)| area > a) {
            best = Some((contour, area));
        }
    }
    best.map(|(c, _)| c)
}

/// The last extracted raw outline plus the resampled view derived from it.
///
/// The resampled polygon is always recomputed from `raw`, never from a
/// previous resample, so repeated count changes do not compound error.
#[derive(Debug, Clone, Default)]
pub struct OutlineCache {
    raw: Vec<Point>,
    resampled: Vec<Point>,
    count: usize,
}

impl OutlineCache {
    pub fn new(raw: Vec<Point>, count: usize) -> Self {
        let resampled = resample_closed(&raw, count);
        Self { raw, resampled, count }
    }

    /// Re-derive the resampled polygon for a new point count.
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
        self.resampled = resample_closed(&self.raw, count);
    }

    pub fn raw(&self) -> &[Point] {
        &self.raw
    }

    pub fn resampled(&self) -> &[Point] {
        &self.resampled
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
