//! Raster rendering of outlines, tiles and tilings.
//!
//! Geometry is built as kurbo paths in world space and mapped to device
//! pixels through a tiny-skia transform, one path per tiling instance.

use image::{Rgba, RgbaImage};
use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use rayon::prelude::*;
use tiny_skia::{Color, FillRule, Paint, Pixmap, Stroke, Transform};

use crate::config::RenderOptions;
use crate::error::EscherError;
use crate::tiling::{instances, SymmetryTiling};

/// World windows for a canvas: what is shown and what gets filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldWindows {
    pub view: Rect,
    /// `view` grown by the bleed on every side.
    pub fill: Rect,
}

/// Size the world window to the canvas aspect ratio so the shorter
/// canvas side spans `units_on_short_edge` world units.
pub fn world_windows(width: u32, height: u32, options: &RenderOptions) -> WorldWindows {
    let w = width.max(1) as f64;
    let h = height.max(1) as f64;
    let units = options.units_on_short_edge;
    let (view_w, view_h) = if w >= h {
        (units * w / h, units)
    } else {
        (units, units * h / w)
    };
    let view = Rect::new(0.0, 0.0, view_w, view_h);
    WorldWindows {
        view,
        fill: view.inflate(options.bleed, options.bleed),
    }
}

/// Uniform world → pixel mapping with the window centred on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMap {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    view: Rect,
    invert_y: bool,
}

impl PixelMap {
    pub fn new(view: Rect, width: u32, height: u32, invert_y: bool) -> Self {
        let (w, h) = (width as f64, height as f64);
        let scale = (w / view.width()).min(h / view.height());
        Self {
            scale,
            offset_x: (w - scale * view.width()) * 0.5,
            offset_y: (h - scale * view.height()) * 0.5,
            view,
            invert_y,
        }
    }

    pub fn to_pixel(&self, p: Point) -> Point {
        let x = self.offset_x + (p.x - self.view.x0) * self.scale;
        let y = if self.invert_y {
            self.offset_y + (self.view.y1 - p.y) * self.scale
        } else {
            self.offset_y + (p.y - self.view.y0) * self.scale
        };
        Point::new(x, y)
    }

    /// The same mapping as a tiny-skia transform.
    pub fn transform(&self) -> Transform {
        let s = self.scale;
        let tx = self.offset_x - self.view.x0 * s;
        let (sy, ty) = if self.invert_y {
            (-s, self.offset_y + self.view.y1 * s)
        } else {
            (s, self.offset_y - self.view.y0 * s)
        };
        Transform::from_row(s as f32, 0.0, 0.0, sy as f32, tx as f32, ty as f32)
    }
}

/// Repaint `surface` with every instance of `tile` the tiling places in
/// the bleed-expanded window.
///
/// `tile` must have at least three points; callers check this.
pub fn render_tiling(
    surface: &mut Pixmap,
    tiling: &dyn SymmetryTiling,
    tile: &[Point],
    options: &RenderOptions,
) {
    surface.fill(Color::TRANSPARENT);

    let windows = world_windows(surface.width(), surface.height(), options);
    let map = PixelMap::new(windows.view, surface.width(), surface.height(), options.invert_y);
    let to_device = map.transform();
    let placed = instances(tiling, windows.fill);
    log::debug!(
        "IH{}: {} instances in fill window {:?}",
        tiling.ih_type(),
        placed.len(),
        windows.fill,
    );

    // Projecting vertices dominates for fine tiles; paint stays sequential.
    let paths: Vec<(usize, Option<tiny_skia::Path>)> = placed
        .par_iter()
        .map(|inst| {
            let world = polygon_path(tile, inst.transform);
            (inst.color_index, kurbo_to_tinyskia(&world, to_device))
        })
        .collect();

    let mut fill = Paint::default();
    fill.anti_alias = true;
    let mut outline = Paint::default();
    outline.set_color(options.outline);
    outline.anti_alias = true;
    let stroke = Stroke {
        width: options.outline_width,
        ..Stroke::default()
    };

    for (color_index, path) in paths {
        let Some(path) = path else { continue };
        if let Some(color) = palette_color(&options.palette, color_index) {
            fill.set_color(color);
            surface.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);
        }
        surface.stroke_path(&path, &outline, &stroke, Transform::identity(), None);
    }
}

/// Stroke the canonical tile in red inside the unit world window.
pub fn render_tile_preview(surface: &mut Pixmap, tile: &[Point]) {
    surface.fill(Color::TRANSPARENT);
    let map = PixelMap::new(
        Rect::new(0.0, 0.0, 1.0, 1.0),
        surface.width(),
        surface.height(),
        false,
    );
    let Some(path) = kurbo_to_tinyskia(&polygon_path(tile, Affine::IDENTITY), map.transform())
    else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(255, 0, 0, 255));
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 2.0,
        ..Stroke::default()
    };
    surface.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

/// Draw `outline` (pixel coordinates) in red with black sample dots over
/// the keyed foreground.
pub fn render_outline_overlay(
    foreground: &RgbaImage,
    outline: &[Point],
) -> Result<Pixmap, EscherError> {
    let (w, h) = foreground.dimensions();
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| EscherError::DegenerateGeometry(format!("{}x{} canvas", w, h)))?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(foreground.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }

    let line_width = (w.min(h) as f32 / 125.0).max(1.0);
    let mut paint = Paint::default();
    paint.anti_alias = true;

    if let Some(path) = kurbo_to_tinyskia(&polygon_path(outline, Affine::IDENTITY), Transform::identity()) {
        paint.set_color(Color::from_rgba8(255, 0, 0, 255));
        let stroke = Stroke {
            width: line_width,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    paint.set_color(Color::BLACK);
    for p in outline {
        if let Some(dot) =
            tiny_skia::PathBuilder::from_circle(p.x as f32, p.y as f32, line_width * 0.71)
        {
            pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }
    Ok(pixmap)
}

fn palette_color(palette: &[Color], index: usize) -> Option<Color> {
    if palette.is_empty() {
        None
    } else {
        Some(palette[index % palette.len()])
    }
}

/// Closed polygon through `points` after applying `transform`.
fn polygon_path(points: &[Point], transform: Affine) -> BezPath {
    let mut path = BezPath::new();
    if let Some((&first, rest)) = points.split_first() {
        path.move_to(transform * first);
        for &p in rest {
            path.line_to(transform * p);
        }
        path.close_path();
    }
    path
}

/// Convert a kurbo `BezPath` to a `tiny_skia::Path`.
pub(crate) fn kurbo_to_tinyskia(
    bezpath: &BezPath,
    transform: Transform,
) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    for el in bezpath.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let (x, y) = transform_point(p.x, p.y, transform);
                pb.move_to(x, y);
            }
            PathEl::LineTo(p) => {
                let (x, y) = transform_point(p.x, p.y, transform);
                pb.line_to(x, y);
            }
            PathEl::QuadTo(c, p) => {
                let (cx, cy) = transform_point(c.x, c.y, transform);
                let (px, py) = transform_point(p.x, p.y, transform);
                pb.quad_to(cx, cy, px, py);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let (c1x, c1y) = transform_point(c1.x, c1.y, transform);
                let (c2x, c2y) = transform_point(c2.x, c2.y, transform);
                let (px, py) = transform_point(p.x, p.y, transform);
                pb.cubic_to(c1x, c1y, c2x, c2y, px, py);
            }
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

/// Apply transform manually to a point (f64 → f32).
fn transform_point(x: f64, y: f64, t: Transform) -> (f32, f32) {
    let x = x as f32;
    let y = y as f32;
    (t.sx * x + t.kx * y + t.tx, t.ky * x + t.sy * y + t.ty)
}

/// Copy a pixmap into a straight-alpha RGBA image.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let width = pixmap.width();
    let pixels = pixmap.pixels();
    RgbaImage::from_fn(width, pixmap.height(), |x, y| {
        let c = pixels[(y * width + x) as usize].demultiply();
        Rgba([c.red(), c.green(), c.blue(), c.alpha()])
    })
}

/// Encode a pixmap to PNG bytes.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, EscherError> {
    let rgba = pixmap_to_rgba(pixmap);
    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba.as_raw())?;
    writer.finish()?;
    Ok(buf)
}

/// Allocate a surface, rejecting zero-sized canvases.
pub fn new_surface(width: u32, height: u32) -> Result<Pixmap, EscherError> {
    Pixmap::new(width, height).ok_or_else(|| {
        EscherError::InputRejected(format!("invalid canvas size {}x{}", width, height))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::LatticeTiling;
    use approx::assert_abs_diff_eq;
    use kurbo::Vec2;

    fn unit_square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]
    }

    #[test]
    fn shorter_side_spans_requested_units() {
        let options = RenderOptions::default();
        let landscape = world_windows(800, 400, &options);
        assert_abs_diff_eq!(landscape.view.height(), 10.0);
        assert_abs_diff_eq!(landscape.view.width(), 20.0);
        let portrait = world_windows(300, 600, &options);
        assert_abs_diff_eq!(portrait.view.width(), 10.0);
        assert_abs_diff_eq!(portrait.view.height(), 20.0);
        assert_abs_diff_eq!(portrait.fill.x0, -3.0);
        assert_abs_diff_eq!(portrait.fill.y1, 23.0);
    }

    #[test]
    fn pixel_map_centres_the_window() {
        let map = PixelMap::new(Rect::new(0.0, 0.0, 1.0, 1.0), 200, 100, false);
        assert_abs_diff_eq!(map.scale, 100.0);
        let p = map.to_pixel(Point::new(0.0, 0.0));
        assert_abs_diff_eq!(p.x, 50.0);
        assert_abs_diff_eq!(p.y, 0.0);
        let q = map.to_pixel(Point::new(1.0, 1.0));
        assert_abs_diff_eq!(q.x, 150.0);
        assert_abs_diff_eq!(q.y, 100.0);
    }

    #[test]
    fn transform_agrees_with_to_pixel() {
        for invert_y in [false, true] {
            let map = PixelMap::new(Rect::new(-2.0, 1.0, 6.0, 5.0), 640, 480, invert_y);
            let t = map.transform();
            for p in [Point::new(-2.0, 1.0), Point::new(3.5, 4.25), Point::new(6.0, 5.0)] {
                let expected = map.to_pixel(p);
                let (x, y) = transform_point(p.x, p.y, t);
                assert_abs_diff_eq!(x as f64, expected.x, epsilon = 1e-3);
                assert_abs_diff_eq!(y as f64, expected.y, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn tiling_repaints_whole_canvas() {
        let tiling = LatticeTiling::new(41, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)).unwrap();
        let mut surface = new_surface(120, 80).unwrap();
        surface.fill(Color::from_rgba8(1, 2, 3, 255));
        render_tiling(&mut surface, &tiling, &unit_square(), &RenderOptions::default());

        // Unit squares on a unit lattice cover the plane: every pixel painted,
        // and none of the stale fill survives.
        let image = pixmap_to_rgba(&surface);
        assert!(image.pixels().all(|p| p.0[3] > 0));
        assert!(image.pixels().all(|p| p.0 != [1, 2, 3, 255]));
    }

    #[test]
    fn tiling_uses_palette_colors() {
        let tiling = LatticeTiling::new(41, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)).unwrap();
        let options = RenderOptions {
            outline_width: 0.1,
            ..RenderOptions::default()
        };
        let mut surface = new_surface(100, 100).unwrap();
        render_tiling(&mut surface, &tiling, &unit_square(), &options);
        let image = pixmap_to_rgba(&surface);
        // Centre of the cell (0, 0): 10 px per unit, so pixel (5, 5).
        let px = image.get_pixel(5, 5).0;
        assert_eq!(px, [0xff, 0x44, 0x00, 0xff]);
    }

    #[test]
    fn preview_draws_only_the_outline() {
        let mut surface = new_surface(64, 64).unwrap();
        render_tile_preview(&mut surface, &unit_square());
        let image = pixmap_to_rgba(&surface);
        assert_eq!(image.get_pixel(32, 32).0[3], 0);
        assert!(image.pixels().any(|p| p.0[0] == 255 && p.0[3] > 0));
    }

    #[test]
    fn overlay_keeps_foreground_size() {
        let fg = RgbaImage::from_pixel(50, 40, Rgba([0, 0, 255, 255]));
        let outline = vec![Point::new(5.0, 5.0), Point::new(45.0, 5.0), Point::new(25.0, 35.0)];
        let pixmap = render_outline_overlay(&fg, &outline).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (50, 40));
    }

    #[test]
    fn png_encoding_produces_signature() {
        let surface = new_surface(4, 4).unwrap();
        let bytes = encode_png(&surface).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert!(new_surface(0, 10).is_err());
    }
}
