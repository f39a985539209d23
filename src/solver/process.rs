//! Solver invocation as a child process.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::EscherError;

use super::{Solver, SolverArtifacts, SolverInvocation};

/// Name of the raster preview the solver may drop in its working directory.
pub const PREVIEW_FILE: &str = "tiling.png";

/// Runs a native solver executable:
/// `<program> <input> <output> <flag0> <flag1>` inside the working directory.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    pub program: PathBuf,
}

impl ProcessSolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Solver for ProcessSolver {
    fn invoke(&self, call: &SolverInvocation) -> Result<SolverArtifacts, EscherError> {
        let program = resolve_program(&self.program)?;
        log::debug!(
            "spawning {} {} {} {} {}",
            program.display(),
            call.input.display(),
            call.output.display(),
            call.flags.0,
            call.flags.1,
        );
        let output = Command::new(&program)
            .arg(&call.input)
            .arg(&call.output)
            .arg(call.flags.0.to_string())
            .arg(call.flags.1.to_string())
            .current_dir(&call.work_dir)
            .output()
            .map_err(|e| {
                EscherError::external(
                    "solver",
                    format!("could not start {}: {}", self.program.display(), e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("").trim();
            let status = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(EscherError::external(
                "solver",
                format!("exited with status {}: {}", status, tail),
            ));
        }

        collect_artifacts(&call.output, &call.work_dir)
    }
}

/// Anchor a relative program path such as `./solver` to the caller's
/// working directory, since the child runs inside the scratch directory.
/// Bare names are left for `PATH` lookup.
fn resolve_program(program: &Path) -> Result<PathBuf, EscherError> {
    if program.is_absolute() || program.components().count() < 2 {
        return Ok(program.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(program))
}

/// Read the `.tile` result next to `output` and the optional preview.
pub fn collect_artifacts(output: &Path, work_dir: &Path) -> Result<SolverArtifacts, EscherError> {
    let tile_path = tile_path(output);
    let tile_text = std::fs::read_to_string(&tile_path).map_err(|e| {
        EscherError::external(
            "solver",
            format!("missing result {}: {}", tile_path.display(), e),
        )
    })?;
    let preview_png = std::fs::read(work_dir.join(PREVIEW_FILE)).ok();
    if preview_png.is_none() {
        log::debug!("solver wrote no {}", PREVIEW_FILE);
    }
    Ok(SolverArtifacts { tile_text, preview_png })
}

/// `<output>.tile`
pub fn tile_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".tile");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn tile_path_appends_suffix() {
        assert_eq!(
            tile_path(Path::new("/tmp/x/output.dat")),
            PathBuf::from("/tmp/x/output.dat.tile")
        );
    }

    #[test]
    fn missing_artifact_is_an_external_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_artifacts(&dir.path().join("output.dat"), dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
    }

    #[test]
    fn artifacts_include_optional_preview() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.dat");
        std::fs::write(tile_path(&output), "tile").unwrap();
        let artifacts = collect_artifacts(&output, dir.path()).unwrap();
        assert_eq!(artifacts.tile_text, "tile");
        assert!(artifacts.preview_png.is_none());

        std::fs::write(dir.path().join(PREVIEW_FILE), [1u8, 2, 3]).unwrap();
        let artifacts = collect_artifacts(&output, dir.path()).unwrap();
        assert_eq!(artifacts.preview_png, Some(vec![1, 2, 3]));
    }

    #[test]
    fn relative_programs_resolve_against_caller_dir() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            resolve_program(Path::new("./bin/solver")).unwrap(),
            cwd.join("./bin/solver")
        );
        assert_eq!(
            resolve_program(Path::new("solver")).unwrap(),
            PathBuf::from("solver")
        );
        assert_eq!(
            resolve_program(Path::new("/opt/solver")).unwrap(),
            PathBuf::from("/opt/solver")
        );
    }

    #[cfg(unix)]
    #[test]
    fn script_runs_through_relative_path() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = tempfile::Builder::new()
            .prefix("solver-bin-")
            .tempdir_in(".")
            .unwrap();
        let script = bin_dir.path().join("solver.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'stub\\n0\\n3 0 1\\nparams\\n0 0\\n1 0\\n0 1\\n' > \"$2.tile\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let relative = Path::new(".")
            .join(bin_dir.path().file_name().unwrap())
            .join("solver.sh");

        let scratch = tempfile::tempdir().unwrap();
        let call = SolverInvocation {
            input: scratch.path().join("input.dat"),
            output: scratch.path().join("output.dat"),
            flags: (1, 1),
            work_dir: scratch.path().to_path_buf(),
        };
        std::fs::write(&call.input, "4\n0.0 0.0\n").unwrap();

        let artifacts = ProcessSolver::new(relative).invoke(&call).unwrap();
        assert!(artifacts.tile_text.starts_with("stub\n0\n3 0 1"));
    }

    #[test]
    fn unknown_program_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let call = SolverInvocation {
            input: dir.path().join("input.dat"),
            output: dir.path().join("output.dat"),
            flags: (1, 1),
            work_dir: dir.path().to_path_buf(),
        };
        let err = ProcessSolver::new("/nonexistent/escher-solver")
            .invoke(&call)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
    }
}
