use clap::{ArgGroup, Parser};
use escherize::kurbo::Vec2;
use escherize::render::encode_png;
use escherize::session::Selection;
use escherize::sketch::{trim_to_content, Sketch};
use escherize::tiling::lattice_factory;
use escherize::{
    bitmap, ImageprocVision, KeyingMethod, PipelineConfig, PipelineController, ProcessSolver,
    RenderOptions, ThresholdMethod,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "escherize", about = "Silhouette to isohedral tile and tiling")]
#[command(group(ArgGroup::new("source").required(true).args(["input", "sketch"])))]
struct Cli {
    /// Input image path (PNG or JPEG)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Sketch JSON path (committed strokes)
    #[arg(short, long)]
    sketch: Option<PathBuf>,

    /// Solver executable, called as `<solver> input output 1 1`
    #[arg(long)]
    solver: PathBuf,

    /// Outline points submitted to the solver (10-200)
    #[arg(short = 'n', long, default_value = "100")]
    points: usize,

    /// Key the foreground by luminance instead of the alpha channel
    #[arg(long)]
    luma: bool,

    /// Fixed luminance threshold (0-255). Overrides Otsu auto-detection.
    #[arg(long)]
    threshold: Option<u8>,

    /// Treat light pixels as foreground when keying by luminance
    #[arg(long)]
    invert: bool,

    /// Sketch canvas size in pixels
    #[arg(long, default_value = "512")]
    canvas: u32,

    /// Tiling render width in pixels
    #[arg(long, default_value = "800")]
    width: u32,

    /// Tiling render height in pixels
    #[arg(long, default_value = "600")]
    height: u32,

    /// World units across the shorter side of the tiling render
    #[arg(long, default_value = "10")]
    units: f64,

    /// Extra world units filled beyond the visible window
    #[arg(long, default_value = "3")]
    bleed: f64,

    /// Lattice basis as "ax,ay,bx,by"
    #[arg(long, default_value = "1,0,0,1", value_parser = parse_basis)]
    basis: (Vec2, Vec2),

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Log stage details (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_basis(s: &str) -> Result<(Vec2, Vec2), String> {
    let v: Vec<f64> = s
        .split(',')
        .map(|t| t.trim().parse::<f64>().map_err(|e| format!("{t:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match v.as_slice() {
        [ax, ay, bx, by] => Ok((Vec2::new(*ax, *ay), Vec2::new(*bx, *by))),
        _ => Err(format!("expected 4 numbers, got {}", v.len())),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let keying = if cli.luma {
        KeyingMethod::Luma {
            threshold: match cli.threshold {
                Some(t) => ThresholdMethod::Fixed(t),
                None => ThresholdMethod::Otsu,
            },
            invert: cli.invert,
        }
    } else {
        KeyingMethod::Alpha
    };
    let config = PipelineConfig {
        target_points: cli.points,
        keying,
        render_width: cli.width,
        render_height: cli.height,
        render: RenderOptions {
            units_on_short_edge: cli.units,
            bleed: cli.bleed,
            ..RenderOptions::default()
        },
        ..PipelineConfig::default()
    };
    std::fs::create_dir_all(&cli.out_dir)?;

    eprintln!();
    eprintln!("  escherize \u{00b7} {}", cli.solver.display());
    eprintln!();

    let t_start = Instant::now();
    let mut session = PipelineController::new(config);

    // ── Source ────────────────────────────────────────────
    let (selection, image) = load_source(&cli)?;
    eprintln!(
        "  Load        {} \u{00b7} {}x{} px",
        selection.caption(),
        image.width(),
        image.height()
    );
    session.set_source(selection, image);

    // ── Contour ───────────────────────────────────────────
    let remover = bitmap::remover_for(session.config().keying);
    session.run_contour(remover.as_ref(), &ImageprocVision)?;
    let raw_len = session.outline().map_or(0, |o| o.raw().len());
    eprintln!(
        "  Contour     {} points \u{2192} {} resampled",
        raw_len,
        session.resampled().len()
    );
    if let Some(foreground) = session.foreground() {
        let overlay = escherize::render::render_outline_overlay(foreground, session.resampled())?;
        write_output(&cli.out_dir, "contour.png", &encode_png(&overlay)?)?;
    }

    // ── Solve ─────────────────────────────────────────────
    session.run_solve(&ProcessSolver::new(&cli.solver))?;
    if let Some(solution) = session.solution() {
        eprintln!(
            "  Solve       IH{} \u{00b7} {} tile points",
            solution.ih_type,
            solution.canonical_tile.len()
        );
        write_output(&cli.out_dir, "input.dat", solution.request_text.as_bytes())?;
        if let Some(preview) = &solution.preview_png {
            write_output(&cli.out_dir, "solver_tiling.png", preview)?;
        }
    }

    // ── Render ────────────────────────────────────────────
    let (a, b) = cli.basis;
    session.run_render(&lattice_factory(a, b))?;
    if let Some(renders) = session.renders() {
        write_output(&cli.out_dir, "escherized.png", &encode_png(&renders.escherized)?)?;
        write_output(&cli.out_dir, "tiling.png", &encode_png(&renders.tiling)?)?;
        eprintln!(
            "  Render      {}x{} tiling \u{00b7} {} units + {} bleed",
            renders.tiling.width(),
            renders.tiling.height(),
            cli.units,
            cli.bleed,
        );
    }

    eprintln!();
    eprintln!(
        "  \u{2713} {}  ({}ms)",
        cli.out_dir.display(),
        t_start.elapsed().as_millis()
    );
    eprintln!();

    Ok(())
}

fn load_source(cli: &Cli) -> Result<(Selection, image::RgbaImage), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.sketch {
        let sketch: Sketch = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if sketch.is_empty() {
            return Err("sketch has no strokes".into());
        }
        let raster = sketch.rasterize(cli.canvas, cli.canvas)?;
        let selection = Selection::drawing(path.display().to_string());
        return Ok((selection, trim_to_content(&raster)));
    }
    let path = cli.input.as_deref().ok_or("no input given")?;
    let image = bitmap::load_upload(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((Selection::upload(path.display().to_string(), name), image))
}

fn write_output(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    eprintln!("  Write       {}", path.display());
    Ok(())
}
