//! Session state machine: source → contour → solve → render.
//!
//! Each stage is started with [`PipelineController::begin`], which hands
//! back a [`StageTicket`]; the work itself may run anywhere, and its
//! outcome is offered back through the matching `complete_*` call. Only
//! the most recently started ticket for a stage is applied, and only
//! while the source it was started against is still current.

use image::RgbaImage;
use kurbo::Point;
use tiny_skia::Pixmap;

use crate::bitmap::BackgroundRemover;
use crate::config::{PipelineConfig, TARGET_POINTS_RANGE};
use crate::contour::{extract_outline, OutlineCache, VisionPrimitives};
use crate::error::{ErrorKind, EscherError};
use crate::render::{new_surface, render_tile_preview, render_tiling};
use crate::session::{Selection, SelectionStore};
use crate::solver::{solve, SolveOutcome, Solver};
use crate::tiling::TilingFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Background keying and outline extraction.
    Contour,
    Solve,
    /// Escherized preview and tiling.
    Render,
}

impl Stage {
    fn index(self) -> usize {
        match self {
            Stage::Contour => 0,
            Stage::Solve => 1,
            Stage::Render => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Contour => "contour",
            Stage::Solve => "solve",
            Stage::Render => "render",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageState {
    #[default]
    Idle,
    Busy,
    Done,
    Failed { kind: ErrorKind, message: String },
}

impl StageState {
    pub fn is_busy(&self) -> bool {
        matches!(self, StageState::Busy)
    }
}

/// Proof that a stage was started; required to apply its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTicket {
    pub stage: Stage,
    generation: u64,
    source_version: u64,
}

/// Output of the contour stage.
#[derive(Debug, Clone)]
pub struct ContourOutcome {
    pub foreground: RgbaImage,
    /// Outline in source pixel coordinates; empty if nothing was found.
    pub outline: Vec<Point>,
}

/// Output of the render stage.
#[derive(Debug, Clone)]
pub struct Renders {
    /// The canonical tile on its own.
    pub escherized: Pixmap,
    pub tiling: Pixmap,
}

#[derive(Debug)]
pub struct PipelineController {
    config: PipelineConfig,
    store: SelectionStore,
    source: Option<RgbaImage>,
    source_version: u64,
    foreground: Option<RgbaImage>,
    outline: Option<OutlineCache>,
    solution: Option<SolveOutcome>,
    renders: Option<Renders>,
    states: [StageState; 3],
    generations: [u64; 3],
    cancelled: bool,
}

impl PipelineController {
    pub fn new(config: PipelineConfig) -> Self {
        let mut config = config;
        config.target_points = clamp_target(config.target_points);
        Self {
            config,
            store: SelectionStore::new(),
            source: None,
            source_version: 0,
            foreground: None,
            outline: None,
            solution: None,
            renders: None,
            states: Default::default(),
            generations: [0; 3],
            cancelled: false,
        }
    }

    // ── Acquisition ───────────────────────────────────────

    /// Replace the source image; every stage and cache is invalidated.
    pub fn set_source(&mut self, selection: Selection, image: RgbaImage) {
        log::info!(
            "source: {} ({}x{})",
            selection.caption(),
            image.width(),
            image.height()
        );
        self.store.save(&selection);
        self.source = Some(image);
        self.source_version += 1;
        self.invalidate_from(Stage::Contour);
    }

    /// Change the resample count, clamped to the valid range.
    ///
    /// The resampled polygon is re-derived from the cached raw outline;
    /// no stage is re-run.
    pub fn set_target_points(&mut self, count: usize) -> usize {
        let count = clamp_target(count);
        if count != self.config.target_points {
            log::debug!("target points {} -> {}", self.config.target_points, count);
        }
        self.config.target_points = count;
        if let Some(outline) = &mut self.outline {
            outline.set_count(count);
        }
        count
    }

    // ── Ticketing ─────────────────────────────────────────

    /// Start `stage`, rejecting it if it is already busy or its input is
    /// missing.
    pub fn begin(&mut self, stage: Stage) -> Result<StageTicket, EscherError> {
        if self.cancelled {
            return Err(EscherError::InputRejected("Session has ended.".into()));
        }
        if self.states[stage.index()].is_busy() {
            return Err(EscherError::InputRejected(format!(
                "{} is already running.",
                stage.name()
            )));
        }
        match stage {
            Stage::Contour if self.source.is_none() => {
                return Err(EscherError::InputRejected("No image selected.".into()));
            }
            Stage::Solve if self.resampled().len() < 3 => {
                return Err(EscherError::InputRejected("No outline to run.".into()));
            }
            Stage::Render if self.solution.is_none() => {
                return Err(EscherError::InputRejected("No solved tile to render.".into()));
            }
            _ => {}
        }

        let i = stage.index();
        self.generations[i] += 1;
        self.states[i] = StageState::Busy;
        log::debug!("{} started (generation {})", stage.name(), self.generations[i]);
        Ok(StageTicket {
            stage,
            generation: self.generations[i],
            source_version: self.source_version,
        })
    }

    /// Apply a contour result. Returns `false` if the ticket is stale.
    pub fn complete_contour(
        &mut self,
        ticket: StageTicket,
        outcome: Result<ContourOutcome, EscherError>,
    ) -> bool {
        if !self.accepts(ticket, Stage::Contour) {
            return false;
        }
        let contour = match outcome {
            Ok(c) if c.outline.len() >= 3 => c,
            Ok(_) => return self.fail(ticket, &no_shape()),
            Err(e) => return self.fail(ticket, &e),
        };
        log::info!("contour: {} outline points", contour.outline.len());
        self.foreground = Some(contour.foreground);
        self.outline = Some(OutlineCache::new(contour.outline, self.config.target_points));
        self.invalidate_from(Stage::Solve);
        self.states[Stage::Contour.index()] = StageState::Done;
        true
    }

    /// Apply a solver result. Returns `false` if the ticket is stale.
    pub fn complete_solve(
        &mut self,
        ticket: StageTicket,
        outcome: Result<SolveOutcome, EscherError>,
    ) -> bool {
        if !self.accepts(ticket, Stage::Solve) {
            return false;
        }
        match outcome {
            Ok(solution) => {
                self.solution = Some(solution);
                self.invalidate_from(Stage::Render);
                self.states[Stage::Solve.index()] = StageState::Done;
                true
            }
            Err(e) => self.fail(ticket, &e),
        }
    }

    /// Apply rendered surfaces. Returns `false` if the ticket is stale.
    pub fn complete_render(
        &mut self,
        ticket: StageTicket,
        outcome: Result<Renders, EscherError>,
    ) -> bool {
        if !self.accepts(ticket, Stage::Render) {
            return false;
        }
        match outcome {
            Ok(renders) => {
                self.renders = Some(renders);
                self.states[Stage::Render.index()] = StageState::Done;
                true
            }
            Err(e) => self.fail(ticket, &e),
        }
    }

    fn accepts(&self, ticket: StageTicket, stage: Stage) -> bool {
        let i = stage.index();
        let current = ticket.stage == stage
            && !self.cancelled
            && ticket.generation == self.generations[i]
            && ticket.source_version == self.source_version
            && self.states[i].is_busy();
        if !current {
            log::debug!("dropping stale {} result", stage.name());
        }
        current
    }

    /// Record a stage failure; later stages keep whatever they had.
    fn fail(&mut self, ticket: StageTicket, error: &EscherError) -> bool {
        log::warn!("{} failed: {}", ticket.stage.name(), error);
        self.states[ticket.stage.index()] = StageState::Failed {
            kind: error.kind(),
            message: error.to_string(),
        };
        true
    }

    fn invalidate_from(&mut self, stage: Stage) {
        if stage == Stage::Contour {
            self.foreground = None;
            self.outline = None;
        }
        if stage != Stage::Render {
            self.solution = None;
        }
        self.renders = None;
        for s in &mut self.states[stage.index()..] {
            *s = StageState::Idle;
        }
    }

    // ── Synchronous drivers ───────────────────────────────

    /// Key the background and extract the outline of the current source.
    pub fn run_contour(
        &mut self,
        remover: &dyn BackgroundRemover,
        vision: &dyn VisionPrimitives,
    ) -> Result<(), EscherError> {
        let ticket = self.begin(Stage::Contour)?;
        let outcome = match &self.source {
            Some(image) => contour_work(remover, vision, image, &self.config),
            None => Err(EscherError::InputRejected("No image selected.".into())),
        };
        self.settle(ticket, outcome, Self::complete_contour)
    }

    /// Submit the current resampled outline to `solver`.
    pub fn run_solve(&mut self, solver: &dyn Solver) -> Result<(), EscherError> {
        let ticket = self.begin(Stage::Solve)?;
        let outcome = solve(solver, self.resampled(), &self.config);
        self.settle(ticket, outcome, Self::complete_solve)
    }

    /// Render the escherized tile and its tiling.
    pub fn run_render(&mut self, factory: &dyn TilingFactory) -> Result<(), EscherError> {
        let ticket = self.begin(Stage::Render)?;
        let outcome = match &self.solution {
            Some(solution) => render_work(factory, solution, &self.config),
            None => Err(EscherError::InputRejected("No solved tile to render.".into())),
        };
        self.settle(ticket, outcome, Self::complete_render)
    }

    fn settle<T>(
        &mut self,
        ticket: StageTicket,
        outcome: Result<T, EscherError>,
        complete: fn(&mut Self, StageTicket, Result<T, EscherError>) -> bool,
    ) -> Result<(), EscherError> {
        match outcome {
            Ok(value) => {
                complete(self, ticket, Ok(value));
                Ok(())
            }
            Err(e) => {
                if self.accepts(ticket, ticket.stage) {
                    self.fail(ticket, &e);
                }
                Err(e)
            }
        }
    }

    // ── Reset ─────────────────────────────────────────────

    /// Discard everything, including the stored selection.
    pub fn clear(&mut self) {
        log::info!("session cleared");
        self.store.clear();
        self.source = None;
        self.source_version += 1;
        self.invalidate_from(Stage::Contour);
    }

    /// Stop applying results. Work already in flight is not aborted.
    pub fn teardown(&mut self) {
        self.cancelled = true;
    }

    // ── Accessors ─────────────────────────────────────────

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self, stage: Stage) -> &StageState {
        &self.states[stage.index()]
    }

    pub fn selection(&self) -> Option<Selection> {
        self.store.load()
    }

    pub fn source(&self) -> Option<&RgbaImage> {
        self.source.as_ref()
    }

    pub fn foreground(&self) -> Option<&RgbaImage> {
        self.foreground.as_ref()
    }

    pub fn outline(&self) -> Option<&OutlineCache> {
        self.outline.as_ref()
    }

    /// The resampled outline, or an empty slice before a contour exists.
    pub fn resampled(&self) -> &[Point] {
        match &self.outline {
            Some(outline) => outline.resampled(),
            None => &[],
        }
    }

    pub fn solution(&self) -> Option<&SolveOutcome> {
        self.solution.as_ref()
    }

    pub fn renders(&self) -> Option<&Renders> {
        self.renders.as_ref()
    }
}

/// The contour stage's work, separated from its bookkeeping.
pub fn contour_work(
    remover: &dyn BackgroundRemover,
    vision: &dyn VisionPrimitives,
    image: &RgbaImage,
    config: &PipelineConfig,
) -> Result<ContourOutcome, EscherError> {
    let foreground = remover.remove_background(image)?;
    let outline = extract_outline(vision, &foreground, config);
    if outline.len() < 3 {
        return Err(no_shape());
    }
    Ok(ContourOutcome { foreground, outline })
}

/// The render stage's work, separated from its bookkeeping.
pub fn render_work(
    factory: &dyn TilingFactory,
    solution: &SolveOutcome,
    config: &PipelineConfig,
) -> Result<Renders, EscherError> {
    let tile = &solution.canonical_tile;
    if tile.len() < 3 {
        return Err(EscherError::DegenerateGeometry(format!(
            "{}-point tile",
            tile.len()
        )));
    }
    let tiling = factory.tiling_for(solution.ih_type)?;

    let side = config.render_width.min(config.render_height);
    let mut escherized = new_surface(side, side)?;
    render_tile_preview(&mut escherized, tile);

    let mut surface = new_surface(config.render_width, config.render_height)?;
    render_tiling(&mut surface, tiling.as_ref(), tile, &config.render);
    Ok(Renders {
        escherized,
        tiling: surface,
    })
}

fn clamp_target(count: usize) -> usize {
    count.clamp(*TARGET_POINTS_RANGE.start(), *TARGET_POINTS_RANGE.end())
}

fn no_shape() -> EscherError {
    EscherError::DegenerateGeometry("no shape detected".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::AlphaKey;
    use crate::contour::ImageprocVision;
    use crate::solver::testing::{EchoSolver, FailingSolver};
    use crate::tiling::lattice_factory;
    use image::Rgba;
    use kurbo::Vec2;

    fn square_raster() -> RgbaImage {
        let mut img = RgbaImage::new(64, 64);
        for y in 16..48 {
            for x in 16..48 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        img
    }

    fn with_source(image: RgbaImage) -> PipelineController {
        let mut ctl = PipelineController::new(PipelineConfig {
            render_width: 120,
            render_height: 80,
            ..PipelineConfig::default()
        });
        ctl.set_source(Selection::drawing("memory://sketch"), image);
        ctl
    }

    fn factory() -> impl TilingFactory {
        lattice_factory(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0))
    }

    #[test]
    fn full_run_reaches_every_stage() {
        let mut ctl = with_source(square_raster());
        ctl.run_contour(&AlphaKey, &ImageprocVision).unwrap();
        assert_eq!(ctl.resampled().len(), 100);

        ctl.run_solve(&EchoSolver { ih_type: 1, reverse: false }).unwrap();
        assert_eq!(ctl.solution().unwrap().ih_type, 1);

        ctl.run_render(&factory()).unwrap();
        let renders = ctl.renders().unwrap();
        assert_eq!((renders.tiling.width(), renders.tiling.height()), (120, 80));
        assert_eq!(renders.escherized.width(), 80);
        for stage in [Stage::Contour, Stage::Solve, Stage::Render] {
            assert_eq!(*ctl.state(stage), StageState::Done);
        }
    }

    #[test]
    fn transparent_raster_reports_degenerate_geometry() {
        let mut ctl = with_source(RgbaImage::new(32, 32));
        let err = ctl.run_contour(&AlphaKey, &ImageprocVision).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
        assert_eq!(err.to_string(), "degenerate geometry: no shape detected");
        assert!(matches!(
            ctl.state(Stage::Contour),
            StageState::Failed { kind: ErrorKind::DegenerateGeometry, .. }
        ));
        assert!(ctl.outline().is_none());
    }

    #[test]
    fn busy_stage_rejects_second_start() {
        let mut ctl = with_source(square_raster());
        let _ticket = ctl.begin(Stage::Contour).unwrap();
        let err = ctl.begin(Stage::Contour).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRejected);
    }

    #[test]
    fn stages_need_their_inputs() {
        let mut ctl = PipelineController::new(PipelineConfig::default());
        for stage in [Stage::Contour, Stage::Solve, Stage::Render] {
            assert_eq!(ctl.begin(stage).unwrap_err().kind(), ErrorKind::InputRejected);
        }
    }

    #[test]
    fn result_for_replaced_source_is_dropped() {
        let mut ctl = with_source(square_raster());
        let ticket = ctl.begin(Stage::Contour).unwrap();
        let outcome = contour_work(&AlphaKey, &ImageprocVision, &square_raster(), ctl.config());

        ctl.set_source(Selection::drawing("memory://other"), RgbaImage::new(8, 8));
        assert!(!ctl.complete_contour(ticket, outcome));
        assert!(ctl.outline().is_none());
        assert_eq!(*ctl.state(Stage::Contour), StageState::Idle);
    }

    #[test]
    fn only_latest_ticket_applies() {
        let mut ctl = with_source(square_raster());
        let first = ctl.begin(Stage::Contour).unwrap();
        ctl.complete_contour(first, Err(EscherError::external("vision", "timeout")));
        let second = ctl.begin(Stage::Contour).unwrap();

        let outcome =
            contour_work(&AlphaKey, &ImageprocVision, &square_raster(), ctl.config()).unwrap();
        assert!(!ctl.complete_contour(first, Ok(outcome.clone())));
        assert!(ctl.complete_contour(second, Ok(outcome)));
        assert_eq!(*ctl.state(Stage::Contour), StageState::Done);
    }

    #[test]
    fn teardown_ignores_in_flight_results() {
        let mut ctl = with_source(square_raster());
        let ticket = ctl.begin(Stage::Contour).unwrap();
        ctl.teardown();
        let outcome = contour_work(&AlphaKey, &ImageprocVision, &square_raster(), ctl.config());
        assert!(!ctl.complete_contour(ticket, outcome));
        assert!(ctl.begin(Stage::Contour).is_err());
    }

    #[test]
    fn solver_failure_keeps_later_caches_and_allows_retry() {
        let mut ctl = with_source(square_raster());
        ctl.run_contour(&AlphaKey, &ImageprocVision).unwrap();
        ctl.run_solve(&EchoSolver { ih_type: 41, reverse: false }).unwrap();
        ctl.run_render(&factory()).unwrap();

        let err = ctl.run_solve(&FailingSolver).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
        assert!(matches!(ctl.state(Stage::Solve), StageState::Failed { .. }));
        assert!(ctl.renders().is_some());
        assert_eq!(*ctl.state(Stage::Render), StageState::Done);

        ctl.run_solve(&EchoSolver { ih_type: 41, reverse: true }).unwrap();
        assert_eq!(*ctl.state(Stage::Solve), StageState::Done);
        assert!(ctl.renders().is_none());
    }

    #[test]
    fn target_points_rederive_without_rerunning() {
        let mut ctl = with_source(square_raster());
        ctl.run_contour(&AlphaKey, &ImageprocVision).unwrap();
        let raw = ctl.outline().unwrap().raw().to_vec();

        assert_eq!(ctl.set_target_points(40), 40);
        assert_eq!(ctl.resampled().len(), 40);
        assert_eq!(ctl.set_target_points(5), 10);
        assert_eq!(ctl.set_target_points(1000), 200);
        assert_eq!(ctl.resampled().len(), 200);
        assert_eq!(ctl.outline().unwrap().raw(), raw.as_slice());
        assert_eq!(*ctl.state(Stage::Contour), StageState::Done);
    }

    #[test]
    fn clear_resets_everything() {
        let mut ctl = with_source(square_raster());
        ctl.run_contour(&AlphaKey, &ImageprocVision).unwrap();
        ctl.run_solve(&EchoSolver { ih_type: 1, reverse: false }).unwrap();
        assert!(ctl.selection().is_some());

        ctl.clear();
        assert!(ctl.selection().is_none());
        assert!(ctl.source().is_none());
        assert!(ctl.outline().is_none());
        assert!(ctl.solution().is_none());
        for stage in [Stage::Contour, Stage::Solve, Stage::Render] {
            assert_eq!(*ctl.state(stage), StageState::Idle);
        }
    }

    #[test]
    fn unsupported_symmetry_fails_render_visibly() {
        let mut ctl = with_source(square_raster());
        ctl.run_contour(&AlphaKey, &ImageprocVision).unwrap();
        ctl.run_solve(&EchoSolver { ih_type: 7, reverse: false }).unwrap();

        let err = ctl.run_render(&factory()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRejected);
        assert!(matches!(
            ctl.state(Stage::Render),
            StageState::Failed { kind: ErrorKind::InputRejected, .. }
        ));
        assert!(ctl.renders().is_none());
    }

    #[test]
    fn externally_produced_empty_outline_fails_contour() {
        let mut ctl = with_source(square_raster());
        let ticket = ctl.begin(Stage::Contour).unwrap();
        let outcome = ContourOutcome {
            foreground: RgbaImage::new(4, 4),
            outline: Vec::new(),
        };
        assert!(ctl.complete_contour(ticket, Ok(outcome)));
        assert_eq!(
            *ctl.state(Stage::Contour),
            StageState::Failed {
                kind: ErrorKind::DegenerateGeometry,
                message: "degenerate geometry: no shape detected".into(),
            }
        );
    }

    #[test]
    fn short_tile_is_degenerate_at_render() {
        let solution = SolveOutcome {
            ih_type: 1,
            canonical_tile: vec![Point::ZERO, Point::new(1.0, 0.0)],
            preview_png: None,
            request_text: String::new(),
        };
        let err = render_work(&factory(), &solution, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
    }
}
