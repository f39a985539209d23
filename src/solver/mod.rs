//! External shape-optimization solver: interchange format and invocation.
//!
//! The solver is a black box behind a file-in/file-out process boundary.
//! [`solve`] runs one round trip:
//!
//! 1. Encode the outline as request text (even vertex count)
//! 2. Invoke the solver in a scratch directory
//! 3. Decode the `.tile` result
//! 4. Match the tile's winding to the outline and normalize it

pub mod format;
pub mod process;

use std::path::PathBuf;

use kurbo::Point;

use crate::config::PipelineConfig;
use crate::error::EscherError;
use crate::normalize::{normalize, reconcile_orientation};

pub use format::{decode_result, encode_request, SolverResult};
pub use process::ProcessSolver;

/// File names used inside the scratch directory.
pub const INPUT_FILE: &str = "input.dat";
pub const OUTPUT_FILE: &str = "output.dat";

/// Arguments for one solver run.
#[derive(Debug, Clone)]
pub struct SolverInvocation {
    pub input: PathBuf,
    pub output: PathBuf,
    pub flags: (u32, u32),
    pub work_dir: PathBuf,
}

/// What a successful solver run leaves behind.
#[derive(Debug, Clone)]
pub struct SolverArtifacts {
    /// Contents of `<output>.tile`.
    pub tile_text: String,
    /// The solver's own raster preview, if it wrote one.
    pub preview_png: Option<Vec<u8>>,
}

/// A solver backend. Implementations must not panic on solver failure;
/// abnormal termination and missing artifacts are `ExternalCallFailed`.
pub trait Solver {
    fn invoke(&self, call: &SolverInvocation) -> Result<SolverArtifacts, EscherError>;
}

/// Result of a full solve round trip.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub ih_type: u32,
    /// Tile in the canonical unit frame, wound like the input outline.
    pub canonical_tile: Vec<Point>,
    /// The solver's own preview raster, if any.
    pub preview_png: Option<Vec<u8>>,
    /// The exact request text that was submitted.
    pub request_text: String,
}

/// Submit `outline` to `solver` and return the canonical tile.
pub fn solve(
    solver: &dyn Solver,
    outline: &[Point],
    config: &PipelineConfig,
) -> Result<SolveOutcome, EscherError> {
    if outline.len() < 3 {
        return Err(EscherError::InputRejected("No outline to run.".into()));
    }
    let request_text = encode_request(outline, config.odd_count)?;

    let scratch = tempfile::tempdir()?;
    let call = SolverInvocation {
        input: scratch.path().join(INPUT_FILE),
        output: scratch.path().join(OUTPUT_FILE),
        flags: config.solver_flags,
        work_dir: scratch.path().to_path_buf(),
    };
    std::fs::write(&call.input, &request_text)?;

    let artifacts = solver.invoke(&call)?;
    let result = decode_result(&artifacts.tile_text)?;
    if result.tile.len() < 3 {
        return Err(EscherError::DegenerateGeometry(format!(
            "solver returned a {}-point tile",
            result.tile.len()
        )));
    }
    log::info!(
        "solver: IH{} with {} tile points",
        result.ih_type,
        result.tile.len()
    );

    let oriented = reconcile_orientation(outline, &result.tile);
    Ok(SolveOutcome {
        ih_type: result.ih_type,
        canonical_tile: normalize(&oriented),
        preview_png: artifacts.preview_png,
        request_text,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-process stand-in for the native solver: echoes the request
    /// points back, optionally reversed, under a fixed isohedral type.
    pub struct EchoSolver {
        pub ih_type: u32,
        pub reverse: bool,
    }

    impl Solver for EchoSolver {
        fn invoke(&self, call: &SolverInvocation) -> Result<SolverArtifacts, EscherError> {
            let request = std::fs::read_to_string(&call.input)?;
            let mut points: Vec<&str> = request.lines().skip(1).collect();
            if self.reverse {
                points.reverse();
            }
            let mut text = format!("echo\n{}\n", points.len());
            for p in &points {
                text.push_str(p);
                text.push('\n');
            }
            text.push_str(&format!("{} 0 {}\nparams\n", points.len(), self.ih_type));
            for p in &points {
                text.push_str(p);
                text.push('\n');
            }
            std::fs::write(process::tile_path(&call.output), text)?;
            process::collect_artifacts(&call.output, &call.work_dir)
        }
    }

    /// Always fails the way a crashed solver does.
    pub struct FailingSolver;

    impl Solver for FailingSolver {
        fn invoke(&self, _call: &SolverInvocation) -> Result<SolverArtifacts, EscherError> {
            Err(EscherError::external("solver", "exited with status 3: out of memory"))
        }
    }
}
