use tiny_skia::Color;

/// All pipeline parameters in one struct.
/// Adjustable at runtime (the point-count slider drives `target_points`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // -- Sketch stage --
    /// RDP tolerance applied to a freehand stroke on release (canvas pixels).
    pub stroke_epsilon: f64,
    /// Pointer samples closer than this to the previous sample are ignored.
    pub min_stroke_step: f64,

    // -- Contour stage --
    /// How the foreground is keyed out of the source raster.
    pub keying: KeyingMethod,
    /// Alpha values above this are foreground.
    pub alpha_threshold: u8,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_fraction: f64,
    /// Lower bound for the approximation tolerance, in pixels.
    pub approx_min_epsilon: f64,
    /// Number of points the outline is resampled to.
    pub target_points: usize,

    // -- Solve stage --
    /// What to do when the outline has an odd number of points.
    pub odd_count: OddCountPolicy,
    /// The two numeric flags passed to the solver executable.
    pub solver_flags: (u32, u32),

    // -- Render stage --
    /// Canvas size in pixels for the preview and tiling renders.
    pub render_width: u32,
    pub render_height: u32,
    pub render: RenderOptions,
}

/// How the subject is separated from the background before tracing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyingMethod {
    /// The raster already carries an alpha-keyed foreground.
    Alpha,
    /// Derive alpha from luminance: dark pixels become foreground.
    Luma { threshold: ThresholdMethod, invert: bool },
}

/// Threshold method for converting a grayscale image to binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdMethod {
    /// Fixed brightness threshold (0-255).
    Fixed(u8),
    /// Otsu's method (automatic).
    Otsu,
}

/// Policy for solver requests with an odd vertex count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OddCountPolicy {
    /// Drop the last vertex (lossy, logged).
    #[default]
    DropLast,
    /// Refuse the request.
    Reject,
}

/// Tiling renderer options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// World-space size of the canvas's shorter side.
    pub units_on_short_edge: f64,
    /// Extra world-space margin so edge tiles are not clipped mid-tile.
    pub bleed: f64,
    /// Map world +Y upward on screen.
    pub invert_y: bool,
    /// Fill colors, indexed by the tiling's color class.
    pub palette: Vec<Color>,
    pub outline: Color,
    pub outline_width: f32,
}

/// Valid range for the resample point count.
pub const TARGET_POINTS_RANGE: std::ops::RangeInclusive<usize> = 10..=200;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stroke_epsilon: 0.6,
            min_stroke_step: 0.8,
            keying: KeyingMethod::Alpha,
            alpha_threshold: 0,
            approx_fraction: 0.002,
            approx_min_epsilon: 1.0,
            target_points: 100,
            odd_count: OddCountPolicy::DropLast,
            solver_flags: (1, 1),
            render_width: 800,
            render_height: 600,
            render: RenderOptions::default(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            units_on_short_edge: 10.0,
            bleed: 3.0,
            invert_y: false,
            palette: vec![
                Color::from_rgba8(0xff, 0x44, 0x00, 0xff),
                Color::from_rgba8(0x00, 0x9d, 0xff, 0xff),
                Color::from_rgba8(0x00, 0xfc, 0x00, 0xff),
            ],
            outline: Color::from_rgba8(0x11, 0x11, 0x11, 0xff),
            outline_width: 1.0,
        }
    }
}
