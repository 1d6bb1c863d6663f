//! Wiring between the command line and the engines: engine construction,
//! the demo scene hooks and the three ways of running them.

use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::ValueEnum;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::adaptive::{AdaptiveAnimationEngine, QualityHandle};
use crate::config::{AnimationConfig, AnimationConfigPatch, EngineSettings};
use crate::demo::{CostMode, DemoScene, LoadPhase};
use crate::engine::{AnimationCore, AnimationEngine, FrameCallbacks, PerformanceStats, QualityReport};
use crate::error::CadenceResult;
use crate::host::{drive, FrameHost, ManualHost, TokioHost, DEFAULT_REFRESH_HZ};
use crate::monitor::{
    Dashboard, FpsTrend, InputEvent, InputHandler, MonitorSnapshot, FRAME_RATE_STEP,
};
use crate::optimized::{apply_lod, LodControls, MetricsSnapshot, PerformanceOptimizedEngine, RenderPoint};
use crate::throttle::ThrottledAnimationEngine;
use crate::watch::ConfigWatcher;

/// Demo points are scattered around the origin.
const SCENE_CENTER: (f64, f64) = (0.0, 0.0);

/// Dashboard redraw period.
const UI_REFRESH: Duration = Duration::from_millis(100);

/// Longest the dashboard waits before checking the keyboard again.
const INPUT_POLL: Duration = Duration::from_millis(20);

/// FPS samples kept for the dashboard sparkline.
const TREND_CAPACITY: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Core,
    #[default]
    Adaptive,
    Throttled,
    Optimized,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Core => "core",
            EngineKind::Adaptive => "adaptive",
            EngineKind::Throttled => "throttled",
            EngineKind::Optimized => "optimized",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: EngineSettings,
    pub engine: EngineKind,
    pub refresh_hz: f64,
    pub config_path: Option<PathBuf>,
    /// Hot-reload the animation section of `config_path`.
    pub watch: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: EngineSettings::default(),
            engine: EngineKind::default(),
            refresh_hz: DEFAULT_REFRESH_HZ,
            config_path: None,
            watch: false,
        }
    }
}

// ============================================================================
// ENGINE CONSTRUCTION
// ============================================================================

/// How the scene learns the engine's current quality.
#[derive(Debug, Clone)]
pub enum QualitySource {
    Fixed,
    Adaptive(QualityHandle),
    Optimized(LodControls),
}

impl QualitySource {
    /// The subset of `points` to draw this frame, sized for the current level.
    pub fn visible_points(&self, points: &[RenderPoint]) -> Vec<RenderPoint> {
        match self {
            QualitySource::Fixed => points.to_vec(),
            QualitySource::Adaptive(quality) => {
                let multiplier = quality.current();
                let keep = ((points.len() as f64 * multiplier).round() as usize).min(points.len());
                apply_lod(&points[..keep], multiplier)
            }
            QualitySource::Optimized(controls) => {
                controls.apply_lod(&controls.cull(points, SCENE_CENTER))
            }
        }
    }

    pub fn skips_update(&self, frame: u64) -> bool {
        match self {
            QualitySource::Optimized(controls) => controls.should_skip_update(frame),
            _ => false,
        }
    }

    fn latest_metrics(&self) -> Option<MetricsSnapshot> {
        match self {
            QualitySource::Optimized(controls) => controls.latest_snapshot(),
            _ => None,
        }
    }
}

type DynEngine<H> = Box<dyn AnimationEngine<Host = H>>;

/// A type-erased engine plus the handle its scene reads quality from.
pub struct BuiltEngine<H: FrameHost> {
    pub kind: EngineKind,
    pub engine: DynEngine<H>,
    pub quality: QualitySource,
}

pub fn build_engine<H: FrameHost + 'static>(
    kind: EngineKind,
    settings: &EngineSettings,
    host: H,
) -> BuiltEngine<H> {
    let animation = settings.animation.clone();
    let (engine, quality): (DynEngine<H>, QualitySource) = match kind {
        EngineKind::Core => {
            let engine = AnimationCore::new(animation, host);
            (Box::new(engine) as DynEngine<H>, QualitySource::Fixed)
        }
        EngineKind::Adaptive => {
            let engine = AdaptiveAnimationEngine::new(animation, settings.adaptive.clone(), host);
            let quality = QualitySource::Adaptive(engine.quality_handle());
            (Box::new(engine) as DynEngine<H>, quality)
        }
        EngineKind::Throttled => {
            let engine = ThrottledAnimationEngine::new(animation, settings.throttle, host);
            (Box::new(engine) as DynEngine<H>, QualitySource::Fixed)
        }
        EngineKind::Optimized => {
            let engine =
                PerformanceOptimizedEngine::new(animation, settings.optimized.clone(), host);
            let quality = QualitySource::Optimized(engine.controls());
            (Box::new(engine) as DynEngine<H>, quality)
        }
    };
    BuiltEngine {
        kind,
        engine,
        quality,
    }
}

/// Hooks that advance and draw `scene` at the quality `quality` reports.
pub fn scene_callbacks(scene: &Rc<RefCell<DemoScene>>, quality: &QualitySource) -> FrameCallbacks {
    let update_scene = Rc::clone(scene);
    let update_quality = quality.clone();
    let render_scene = Rc::clone(scene);
    let render_quality = quality.clone();

    FrameCallbacks::new()
        .on_update(move |tick| {
            if !update_quality.skips_update(tick.frame) {
                update_scene.borrow_mut().update(tick.delta_ms);
            }
            Ok(())
        })
        .on_render(move |_| {
            let mut scene = render_scene.borrow_mut();
            let drawn = render_quality.visible_points(scene.points());
            scene.render(&drawn);
            Ok(())
        })
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SceneReport {
    pub updates: u64,
    pub renders: u64,
    pub spikes: u64,
    pub phase: LoadPhase,
    pub last_drawn: usize,
    pub last_cost_ms: f64,
}

/// Summary of a finished run, printed as JSON by `--simulate`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub engine: EngineKind,
    pub host_time_ms: f64,
    pub stats: PerformanceStats,
    pub quality: Option<QualityReport>,
    pub scene: SceneReport,
    pub latest_metrics: Option<MetricsSnapshot>,
}

fn build_report<H: FrameHost>(built: &BuiltEngine<H>, scene: &DemoScene) -> RunReport {
    RunReport {
        engine: built.kind,
        host_time_ms: built.engine.host().now_ms(),
        stats: built.engine.performance_stats(),
        quality: built.engine.quality(),
        scene: SceneReport {
            updates: scene.updates(),
            renders: scene.renders(),
            spikes: scene.spikes(),
            phase: scene.phase(),
            last_drawn: scene.last_drawn(),
            last_cost_ms: scene.last_cost_ms(),
        },
        latest_metrics: built.quality.latest_metrics(),
    }
}

fn log_summary(report: &RunReport) {
    let stats = &report.stats;
    match stats.last_stop_reason {
        Some(reason) => log::info!("{} engine stopped: {}", report.engine.label(), reason),
        None => log::info!("{} engine still running", report.engine.label()),
    }
    log::info!(
        "frames={} avg_fps={:.1} callback_faults={} renders={} spikes={}",
        stats.frame_count,
        stats.average_fps,
        stats.callback_faults,
        report.scene.renders,
        report.scene.spikes
    );
    if let Some(quality) = &report.quality {
        log::info!(
            "final quality: {} (level {}/{})",
            quality.label,
            quality.level + 1,
            quality.level_count
        );
    }
}

fn scene_for(settings: &EngineSettings, cost_mode: CostMode) -> Rc<RefCell<DemoScene>> {
    Rc::new(RefCell::new(DemoScene::new(
        settings.demo.clone(),
        settings.strobe.clone(),
        cost_mode,
    )))
}

fn sanitized_refresh_hz(refresh_hz: f64) -> f64 {
    if refresh_hz.is_finite() && refresh_hz > 0.0 {
        refresh_hz
    } else {
        DEFAULT_REFRESH_HZ
    }
}

/// Start the config watcher if asked to. The returned watcher must be kept
/// alive for as long as patches are wanted.
fn start_watcher(
    config: &AppConfig,
) -> CadenceResult<Option<(ConfigWatcher, mpsc::UnboundedReceiver<AnimationConfigPatch>)>> {
    match (&config.config_path, config.watch) {
        (Some(path), true) => {
            let (tx, rx) = mpsc::unbounded_channel();
            let watcher = ConfigWatcher::new(path, config.settings.animation.clone(), tx)?;
            log::info!("watching {} for changes", path.display());
            Ok(Some((watcher, rx)))
        }
        (None, true) => {
            log::warn!("--watch needs --config; not watching");
            Ok(None)
        }
        _ => Ok(None),
    }
}

async fn next_patch(
    patches: &mut Option<mpsc::UnboundedReceiver<AnimationConfigPatch>>,
) -> Option<AnimationConfigPatch> {
    match patches {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// HEADLESS
// ============================================================================

/// Run the demo on the tokio clock until a safety limit stops it or Ctrl+C.
pub async fn run_headless(config: &AppConfig) -> CadenceResult<RunReport> {
    let scene = scene_for(&config.settings, CostMode::Spin);
    let host = TokioHost::with_refresh_rate(config.refresh_hz);
    let mut built = build_engine(config.engine, &config.settings, host);

    let watcher = start_watcher(config)?;
    let (_watcher, mut patches) = match watcher {
        Some((watcher, rx)) => (Some(watcher), Some(rx)),
        None => (None, None),
    };

    log::info!(
        "running {} engine at {:.0} fps on a {:.0} Hz host",
        config.engine.label(),
        config.settings.animation.effective_frame_rate(),
        sanitized_refresh_hz(config.refresh_hz)
    );
    built.engine.start(scene_callbacks(&scene, &built.quality));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let interrupted = tokio::select! {
            _ = drive(built.engine.as_mut()) => false,
            Some(patch) = next_patch(&mut patches) => {
                built.engine.update_config(patch);
                continue;
            }
            _ = &mut ctrl_c => true,
        };
        if interrupted {
            log::info!("interrupted, stopping");
            built.engine.stop();
        }
        break;
    }

    let report = build_report(&built, &scene.borrow());
    log_summary(&report);
    Ok(report)
}

// ============================================================================
// SIMULATION
// ============================================================================

/// Deterministic run on `ManualHost` for `host_ticks` refresh intervals.
///
/// Render cost is modelled rather than spent: a frame whose cost overruns the
/// refresh interval pushes the next opportunity to the following grid line.
pub fn simulate(config: &AppConfig, host_ticks: u64) -> RunReport {
    let interval_ms = 1000.0 / sanitized_refresh_hz(config.refresh_hz);
    let scene = scene_for(&config.settings, CostMode::Modelled);
    let mut built = build_engine(config.engine, &config.settings, ManualHost::new());
    built.engine.start(scene_callbacks(&scene, &built.quality));

    let mut renders_seen = 0;
    for _ in 0..host_ticks {
        if !built.engine.is_running() {
            break;
        }
        let (renders, cost) = {
            let scene = scene.borrow();
            (scene.renders(), scene.last_cost_ms())
        };
        let busy_ms = if renders != renders_seen {
            renders_seen = renders;
            cost
        } else {
            0.0
        };
        let slots = (busy_ms / interval_ms).floor() + 1.0;
        built.engine.host_mut().advance(slots * interval_ms);
        built.engine.pump();
    }

    let report = build_report(&built, &scene.borrow());
    log_summary(&report);
    report
}

// ============================================================================
// DASHBOARD
// ============================================================================

/// Frame rate after a `+`/`-` key press, kept within `[1, max_fps]`. A cap
/// below 1 fps becomes the only allowed rate.
fn nudged_frame_rate(animation: &AnimationConfig, step: f64) -> f64 {
    let ceiling = animation.max_fps;
    let floor = 1.0_f64.min(ceiling);
    (animation.frame_rate + step).clamp(floor, ceiling)
}

struct DashboardState {
    built: BuiltEngine<TokioHost>,
    scene: Rc<RefCell<DemoScene>>,
    animation: AnimationConfig,
    input: InputHandler,
    trend: FpsTrend,
    show_help: bool,
    running: bool,
}

impl DashboardState {
    fn new(config: &AppConfig) -> Self {
        let host = TokioHost::with_refresh_rate(config.refresh_hz);
        Self {
            built: build_engine(config.engine, &config.settings, host),
            scene: scene_for(&config.settings, CostMode::Spin),
            animation: config.settings.animation.clone(),
            input: InputHandler::new(),
            trend: FpsTrend::new(TREND_CAPACITY),
            show_help: false,
            running: true,
        }
    }

    fn start_engine(&mut self) {
        let callbacks = scene_callbacks(&self.scene, &self.built.quality);
        self.built.engine.start(callbacks);
    }

    fn apply_patch(&mut self, patch: AnimationConfigPatch) {
        self.animation = patch.apply_to(&self.animation);
        self.built.engine.update_config(patch);
    }

    fn nudge_frame_rate(&mut self, step: f64) {
        let rate = nudged_frame_rate(&self.animation, step);
        self.apply_patch(AnimationConfigPatch::frame_rate(rate));
    }

    fn handle_input(&mut self) {
        let Some(event) = self.input.poll(Duration::ZERO) else {
            return;
        };
        match event {
            InputEvent::Quit => self.running = false,
            InputEvent::ToggleRun => {
                if self.built.engine.is_running() {
                    self.built.engine.stop();
                } else {
                    self.start_engine();
                }
            }
            InputEvent::Reset => {
                self.built.engine.reset();
                self.trend.clear();
            }
            InputEvent::FrameRateUp => self.nudge_frame_rate(FRAME_RATE_STEP),
            InputEvent::FrameRateDown => self.nudge_frame_rate(-FRAME_RATE_STEP),
            InputEvent::ToggleHelp => {
                self.show_help = !self.show_help;
                self.input.set_help_visible(self.show_help);
            }
            InputEvent::CloseHelp => {
                self.show_help = false;
                self.input.set_help_visible(false);
            }
            InputEvent::Resize { .. } | InputEvent::None => {}
        }
    }

    fn snapshot(&self) -> MonitorSnapshot {
        let scene = self.scene.borrow();
        MonitorSnapshot {
            engine: self.built.kind.label(),
            target_fps: self.animation.effective_frame_rate(),
            stats: self.built.engine.performance_stats(),
            quality: self.built.engine.quality(),
            strobe: scene.strobe_state(),
            load_phase: Some(scene.phase()),
            render_cost_ms: scene.last_cost_ms(),
            drawn_points: scene.last_drawn(),
        }
    }
}

/// Interactive dashboard. Returns when the user quits.
pub async fn run_dashboard(config: &AppConfig) -> CadenceResult<RunReport> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = dashboard_loop(config, &mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn dashboard_loop(
    config: &AppConfig,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> CadenceResult<RunReport> {
    let mut state = DashboardState::new(config);

    let (_watcher, mut patches) = match start_watcher(config)? {
        Some((watcher, rx)) => (Some(watcher), Some(rx)),
        None => (None, None),
    };

    state.start_engine();
    let mut next_draw = Instant::now();

    while state.running {
        state.handle_input();

        if let Some(rx) = patches.as_mut() {
            while let Ok(patch) = rx.try_recv() {
                state.apply_patch(patch);
            }
        }

        state.built.engine.pump();

        let now = Instant::now();
        if now >= next_draw {
            let snapshot = state.snapshot();
            if snapshot.stats.is_running {
                state.trend.push(snapshot.stats.fps);
            }
            let show_help = state.show_help;
            let trend = &state.trend;
            terminal.draw(|frame| {
                let area = frame.area();
                frame.render_widget(Dashboard::new(&snapshot, trend).show_help(show_help), area);
            })?;
            next_draw = now + UI_REFRESH;
        }

        let until_draw = next_draw.saturating_duration_since(Instant::now());
        let wait = state
            .built
            .engine
            .host()
            .time_until_next_event()
            .unwrap_or(INPUT_POLL)
            .min(until_draw)
            .min(INPUT_POLL);
        tokio::time::sleep(wait).await;
    }

    state.built.engine.stop();
    let report = build_report(&state.built, &state.scene.borrow());
    Ok(report)
}
