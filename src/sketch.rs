//! Freehand drawing: live strokes, committed strokes, undo/redo and
//! rasterization into an alpha-keyed image for the contour stage.

use image::RgbaImage;
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};
use tiny_skia::{BlendMode, Color, LineCap, LineJoin, Paint, Stroke as SkStroke, Transform};

use crate::error::EscherError;
use crate::render::{kurbo_to_tinyskia, new_surface, pixmap_to_rgba};
use crate::simplify::simplify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeMode {
    #[default]
    Draw,
    Erase,
}

/// Visual style of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Straight RGBA.
    pub color: [u8; 4],
    pub width: f32,
    #[serde(default)]
    pub mode: StrokeMode,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: [0x11, 0x11, 0x11, 0xff],
            width: 10.0,
            mode: StrokeMode::Draw,
        }
    }
}

/// A committed stroke. At least two points, never mutated after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrokeRecord")]
pub struct Stroke {
    points: Vec<Point>,
    pub style: StrokeStyle,
}

/// Unvalidated stroke as read from JSON.
#[derive(Deserialize)]
struct StrokeRecord {
    points: Vec<Point>,
    style: StrokeStyle,
}

impl TryFrom<StrokeRecord> for Stroke {
    type Error = String;

    fn try_from(record: StrokeRecord) -> Result<Self, Self::Error> {
        if record.points.len() < 2 {
            return Err(format!(
                "stroke needs at least 2 points, got {}",
                record.points.len()
            ));
        }
        Ok(Stroke {
            points: record.points,
            style: record.style,
        })
    }
}

impl Stroke {
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

/// The stroke under the pointer, before release.
#[derive(Debug, Clone)]
pub struct LiveStroke {
    points: Vec<Point>,
    style: StrokeStyle,
    min_step: f64,
}

impl LiveStroke {
    pub fn begin(start: Point, style: StrokeStyle, min_step: f64) -> Self {
        Self {
            points: vec![start],
            style,
            min_step,
        }
    }

    /// Append a pointer sample unless it is within `min_step` of the last
    /// accepted one. Returns whether the sample was kept.
    pub fn push(&mut self, p: Point) -> bool {
        match self.points.last() {
            Some(last) if last.distance(p) <= self.min_step => false,
            _ => {
                self.points.push(p);
                true
            }
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

/// A drawing: committed strokes plus an undo/redo history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sketch {
    strokes: Vec<Stroke>,
    #[serde(skip)]
    undone: Vec<Stroke>,
}

impl Sketch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Simplify and commit a released stroke. Single-point strokes are
    /// dropped. Any commit clears the redo history.
    pub fn commit(&mut self, live: LiveStroke, epsilon: f64) -> bool {
        self.undone.clear();
        if live.points.len() <= 1 {
            return false;
        }
        let before = live.points.len();
        let points = simplify(&live.points, epsilon);
        log::debug!("stroke committed: {} -> {} points", before, points.len());
        self.strokes.push(Stroke {
            points,
            style: live.style,
        });
        true
    }

    pub fn undo(&mut self) -> bool {
        match self.strokes.pop() {
            Some(s) => {
                self.undone.push(s);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.undone.pop() {
            Some(s) => {
                self.strokes.push(s);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.undone.clear();
    }

    /// Paint the sketch onto a transparent `width`×`height` canvas.
    ///
    /// Strokes are smoothed with quadratic segments through the midpoints
    /// of consecutive samples; erase strokes punch through to transparent.
    pub fn rasterize(&self, width: u32, height: u32) -> Result<RgbaImage, EscherError> {
        let mut pixmap = new_surface(width, height)?;
        for stroke in &self.strokes {
            let Some(path) = kurbo_to_tinyskia(&smoothed_path(&stroke.points), Transform::identity())
            else {
                continue;
            };
            let mut paint = Paint::default();
            paint.anti_alias = true;
            match stroke.style.mode {
                StrokeMode::Draw => {
                    let [r, g, b, a] = stroke.style.color;
                    paint.set_color(Color::from_rgba8(r, g, b, a));
                }
                StrokeMode::Erase => {
                    paint.set_color(Color::BLACK);
                    paint.blend_mode = BlendMode::DestinationOut;
                }
            }
            let sk_stroke = SkStroke {
                width: stroke.style.width,
                line_cap: LineCap::Round,
                line_join: LineJoin::Round,
                ..SkStroke::default()
            };
            pixmap.stroke_path(&path, &paint, &sk_stroke, Transform::identity(), None);
        }
        Ok(pixmap_to_rgba(&pixmap))
    }

    /// SVG document with one path per draw stroke.
    pub fn to_svg(&self, width: u32, height: u32) -> String {
        let mut svg = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = width,
            h = height,
        );
        for stroke in self.strokes.iter().filter(|s| s.style.mode == StrokeMode::Draw) {
            let [r, g, b, a] = stroke.style.color;
            svg.push_str(&format!(
                "<path d=\"{}\" fill=\"none\" stroke=\"#{:02x}{:02x}{:02x}\" stroke-opacity=\"{:.3}\" \
                 stroke-width=\"{}\" stroke-linecap=\"round\" stroke-linejoin=\"round\"/>\n",
                smoothed_path(&stroke.points).to_svg(),
                r,
                g,
                b,
                a as f64 / 255.0,
                stroke.style.width,
            ));
        }
        svg.push_str("</svg>\n");
        svg
    }
}

/// Quadratic smoothing through sample midpoints, ending on the last sample.
fn smoothed_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let Some(&first) = points.first() else {
        return path;
    };
    path.move_to(first);
    let n = points.len();
    for i in 1..n.saturating_sub(1) {
        path.quad_to(points[i], points[i].midpoint(points[i + 1]));
    }
    if n > 1 {
        path.line_to(points[n - 1]);
    }
    path
}

/// Crop to the bounding box of non-transparent pixels, plus one pixel.
///
/// A fully transparent raster is returned unchanged.
pub fn trim_to_content(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (mut x0, mut y0, mut x1, mut y1) = (w, h, 0u32, 0u32);
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[3] != 0 {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    if x1 < x0 || y1 < y0 {
        return image.clone();
    }
    let crop_w = (x1 - x0 + 2).min(w - x0);
    let crop_h = (y1 - y0 + 2).min(h - y0);
    image::imageops::crop_imm(image, x0, y0, crop_w, crop_h).to_image()
}
