//! Symmetry-tiling collaborator interface.
//!
//! The renderer does not know isohedral combinatorics; it asks a
//! [`SymmetryTiling`] for every placement of the prototile that touches a
//! world-space region, plus a color class per placement.

use kurbo::{Affine, Point, Rect, Vec2};

use crate::error::EscherError;

/// One placement of the prototile as reported by the tiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedTile {
    pub transform: Affine,
    pub t1: i32,
    pub t2: i32,
    pub aspect: usize,
}

/// A placement resolved for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilingInstance {
    pub transform: Affine,
    pub color_index: usize,
}

pub trait SymmetryTiling {
    /// Isohedral type this tiling realizes.
    fn ih_type(&self) -> u32;
    /// Every placement whose image intersects `region`.
    fn fill_region(&self, region: Rect) -> Vec<PlacedTile>;
    /// Small color class giving neighbours distinct colors.
    fn color_class(&self, t1: i32, t2: i32, aspect: usize) -> usize;
}

/// Resolve all placements in `region` into drawable instances.
pub fn instances(tiling: &dyn SymmetryTiling, region: Rect) -> Vec<TilingInstance> {
    tiling
        .fill_region(region)
        .into_iter()
        .map(|placed| TilingInstance {
            transform: placed.transform,
            color_index: tiling.color_class(placed.t1, placed.t2, placed.aspect),
        })
        .collect()
}

/// Builds the tiling for an isohedral type reported by the solver.
pub trait TilingFactory {
    fn tiling_for(&self, ih_type: u32) -> Result<Box<dyn SymmetryTiling>, EscherError>;
}

impl<F> TilingFactory for F
where
    F: Fn(u32) -> Result<Box<dyn SymmetryTiling>, EscherError>,
{
    fn tiling_for(&self, ih_type: u32) -> Result<Box<dyn SymmetryTiling>, EscherError> {
        self(ih_type)
    }
}

/// Isohedral types whose symmetry group is translations only (p1).
pub const TRANSLATION_TYPES: [u32; 2] = [1, 41];

/// Translation-only tiling: copies at `t1 * a + t2 * b`.
///
/// Colored with `(t1 - t2) mod 3`, which separates every pair of the
/// six lattice neighbours `±a`, `±b`, `±(a - b)`.
#[derive(Debug, Clone)]
pub struct LatticeTiling {
    ih_type: u32,
    a: Vec2,
    b: Vec2,
    /// Bounds of the prototile before translation.
    tile_bounds: Rect,
}

impl LatticeTiling {
    /// Fails with `InputRejected` for types that need rotations or
    /// reflections, which a lattice cannot place.
    pub fn new(ih_type: u32, a: Vec2, b: Vec2) -> Result<Self, EscherError> {
        if !TRANSLATION_TYPES.contains(&ih_type) {
            return Err(EscherError::InputRejected(format!(
                "IH{} is not translation-only; no lattice tiling for it",
                ih_type
            )));
        }
        if a.cross(b).abs() < 1e-12 {
            return Err(EscherError::DegenerateGeometry(
                "lattice basis vectors are parallel".into(),
            ));
        }
        Ok(Self {
            ih_type,
            a,
            b,
            tile_bounds: Rect::new(0.0, 0.0, 1.0, 1.0),
        })
    }

    /// Bounds the prototile occupies; defaults to the canonical unit box.
    pub fn with_tile_bounds(mut self, bounds: Rect) -> Self {
        self.tile_bounds = bounds;
        self
    }

    /// Lattice coordinates of a world-space point.
    fn to_lattice(&self, p: Point) -> (f64, f64) {
        let det = self.a.cross(self.b);
        let v = p.to_vec2();
        (v.cross(self.b) / det, self.a.cross(v) / det)
    }
}

impl SymmetryTiling for LatticeTiling {
    fn ih_type(&self) -> u32 {
        self.ih_type
    }

    fn fill_region(&self, region: Rect) -> Vec<PlacedTile> {
        // A copy translated by `t` touches `region` iff `t` lies in the
        // region grown by the tile's extent on the opposite sides.
        let reach = Rect::new(
            region.x0 - self.tile_bounds.x1,
            region.y0 - self.tile_bounds.y1,
            region.x1 - self.tile_bounds.x0,
            region.y1 - self.tile_bounds.y0,
        );
        let corners = [
            Point::new(reach.x0, reach.y0),
            Point::new(reach.x1, reach.y0),
            Point::new(reach.x1, reach.y1),
            Point::new(reach.x0, reach.y1),
        ];
        let (mut i0, mut i1, mut j0, mut j1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for c in corners {
            let (i, j) = self.to_lattice(c);
            i0 = i0.min(i);
            i1 = i1.max(i);
            j0 = j0.min(j);
            j1 = j1.max(j);
        }

        let mut placed = Vec::new();
        for t1 in i0.floor() as i32..=i1.ceil() as i32 {
            for t2 in j0.floor() as i32..=j1.ceil() as i32 {
                let offset = self.a * t1 as f64 + self.b * t2 as f64;
                let copy = self.tile_bounds + offset;
                if copy.x1 > region.x0
                    && copy.x0 < region.x1
                    && copy.y1 > region.y0
                    && copy.y0 < region.y1
                {
                    placed.push(PlacedTile {
                        transform: Affine::translate(offset),
                        t1,
                        t2,
                        aspect: 0,
                    });
                }
            }
        }
        placed
    }

    fn color_class(&self, t1: i32, t2: i32, _aspect: usize) -> usize {
        (t1 - t2).rem_euclid(3) as usize
    }
}

/// Factory producing a [`LatticeTiling`] with fixed basis for any type.
pub fn lattice_factory(a: Vec2, b: Vec2) -> impl TilingFactory {
    move |ih_type: u32| -> Result<Box<dyn SymmetryTiling>, EscherError> {
        Ok(Box::new(LatticeTiling::new(ih_type, a, b)?))
    }
}
