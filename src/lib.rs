//! escherize: silhouette → isohedral tile.
//!
//! Turns a keyed raster or a freehand sketch into an outline polygon,
//! resamples it, hands it to an external escherization solver, and
//! renders the returned tile as a periodic tiling.
//!
//! # Example
//!
//! ```no_run
//! use escherize::{AlphaKey, ImageprocVision, PipelineConfig, PipelineController, ProcessSolver};
//! use escherize::session::Selection;
//! use escherize::tiling::lattice_factory;
//! use escherize::kurbo::Vec2;
//! use std::path::Path;
//!
//! let image = escherize::bitmap::load_upload(Path::new("cat.png"))?;
//! let mut session = PipelineController::new(PipelineConfig::default());
//! session.set_source(Selection::upload("cat.png", "cat.png"), image);
//! session.run_contour(&AlphaKey, &ImageprocVision)?;
//! session.run_solve(&ProcessSolver::new("./escherize-solver"))?;
//! session.run_render(&lattice_factory(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)))?;
//! # Ok::<(), escherize::EscherError>(())
//! ```

#![forbid(unsafe_code)]

mod geom;

pub mod bitmap;
pub mod config;
pub mod contour;
pub mod controller;
pub mod error;
pub mod normalize;
pub mod render;
pub mod resample;
pub mod search;
pub mod session;
pub mod simplify;
pub mod sketch;
pub mod solver;
pub mod tiling;

// Re-export kurbo so callers build points with the same version.
pub use kurbo;

pub use bitmap::{AlphaKey, BackgroundRemover, LumaKey};
pub use config::{KeyingMethod, OddCountPolicy, PipelineConfig, RenderOptions, ThresholdMethod};
pub use contour::{extract_outline, ImageprocVision, OutlineCache, VisionPrimitives};
pub use controller::{PipelineController, Stage, StageState, StageTicket};
pub use error::{ErrorKind, EscherError};
pub use normalize::{normalize, reconcile_orientation};
pub use resample::resample_closed;
pub use simplify::simplify;
pub use solver::{ProcessSolver, Solver};
