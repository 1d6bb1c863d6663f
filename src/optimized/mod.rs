//! Ratio-driven quality ladder with culling and level-of-detail helpers.
//!
//! Unlike the hysteresis controller in [`crate::adaptive`], this variant
//! reacts on the very frame the average FPS leaves the
//! `[downgrade_ratio, upgrade_ratio] * target_fps` band, one level per frame.

pub mod culling;
pub mod metrics;
pub mod presets;

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use tokio::sync::watch;

pub use culling::{apply_lod, cull_points, RenderPoint};
pub use metrics::{MetricsHistory, MetricsSnapshot};
pub use presets::QualityPreset;

use crate::adaptive::Adaptation;
use crate::config::{AnimationConfig, AnimationConfigPatch, OptimizedConfig};
use crate::engine::{
    AnimationCore, AnimationEngine, AnimationState, FrameCallbacks, FrameEnd, PerformanceStats,
    QualityReport,
};
use crate::error::CadenceResult;
use crate::host::FrameHost;

/// Ladder position plus the diagnostics history.
#[derive(Debug)]
pub struct QualityOptimizer {
    presets: Vec<QualityPreset>,
    level: usize,
    target_fps: f64,
    downgrade_ratio: f64,
    upgrade_ratio: f64,
    history: MetricsHistory,
}

impl QualityOptimizer {
    pub fn new(config: OptimizedConfig) -> Self {
        let presets = if config.presets.is_empty() {
            log::warn!("no quality presets configured, using the default ladder");
            QualityPreset::default_ladder()
        } else {
            config.presets
        };
        Self {
            presets,
            level: 0,
            target_fps: config.target_fps,
            downgrade_ratio: config.downgrade_ratio,
            upgrade_ratio: config.upgrade_ratio,
            history: MetricsHistory::new(config.history_capacity),
        }
    }

    /// Apply the ratio policy to one average FPS reading.
    pub fn adjust(&mut self, average_fps: f64) -> Option<Adaptation> {
        if average_fps <= 0.0 || self.target_fps <= 0.0 {
            return None;
        }
        let ratio = average_fps / self.target_fps;
        let from = self.level;
        if ratio < self.downgrade_ratio && self.level + 1 < self.presets.len() {
            self.level += 1;
        } else if ratio > self.upgrade_ratio && self.level > 0 {
            self.level -= 1;
        } else {
            return None;
        }
        Some(Adaptation {
            from,
            to: self.level,
        })
    }

    /// Record the finished frame, then adjust the level for the next one.
    fn on_frame_end(&mut self, end: &FrameEnd) -> Option<Adaptation> {
        self.history.record(MetricsSnapshot {
            recorded_at: Utc::now(),
            frame: end.frame_count,
            fps: end.fps,
            average_fps: end.average_fps,
            frame_time_ms: end.metrics.frame_time_ms,
            update_time_ms: end.metrics.update_time_ms,
            render_time_ms: end.metrics.render_time_ms,
            quality_level: self.level,
        });
        self.adjust(end.average_fps)
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn current(&self) -> &QualityPreset {
        &self.presets[self.level]
    }

    pub fn presets(&self) -> &[QualityPreset] {
        &self.presets
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.level = 0;
        self.history.clear();
    }
}

/// Shared handle renderers use from inside frame callbacks.
#[derive(Debug, Clone)]
pub struct LodControls(Rc<RefCell<QualityOptimizer>>);

impl LodControls {
    pub fn current(&self) -> QualityPreset {
        self.0.borrow().current().clone()
    }

    pub fn level(&self) -> usize {
        self.0.borrow().level()
    }

    pub fn should_skip_update(&self, frame: u64) -> bool {
        self.0.borrow().current().skips_update(frame)
    }

    /// Reduce `points` to the current level's point budget around `center`.
    pub fn cull(&self, points: &[RenderPoint], center: (f64, f64)) -> Vec<RenderPoint> {
        let max_points = self.0.borrow().current().point_count;
        cull_points(points, center, max_points)
    }

    pub fn apply_lod(&self, points: &[RenderPoint]) -> Vec<RenderPoint> {
        let render_quality = self.0.borrow().current().render_quality;
        apply_lod(points, render_quality)
    }

    pub fn latest_snapshot(&self) -> Option<MetricsSnapshot> {
        self.0.borrow().history().latest().cloned()
    }
}

/// Core loop with the ratio policy, per-frame metric snapshots and LOD controls.
pub struct PerformanceOptimizedEngine<H: FrameHost> {
    core: AnimationCore<H>,
    optimizer: Rc<RefCell<QualityOptimizer>>,
}

impl<H: FrameHost> PerformanceOptimizedEngine<H> {
    pub fn new(config: AnimationConfig, optimized: OptimizedConfig, host: H) -> Self {
        Self {
            core: AnimationCore::new(config, host),
            optimizer: Rc::new(RefCell::new(QualityOptimizer::new(optimized))),
        }
    }

    pub fn controls(&self) -> LodControls {
        LodControls(Rc::clone(&self.optimizer))
    }

    pub fn quality_level(&self) -> usize {
        self.optimizer.borrow().level()
    }

    pub fn current_preset(&self) -> QualityPreset {
        self.optimizer.borrow().current().clone()
    }

    /// Snapshots oldest to newest.
    pub fn metrics_history(&self) -> Vec<MetricsSnapshot> {
        self.optimizer.borrow().history().to_vec()
    }

    pub fn export_metrics_json(&self) -> CadenceResult<String> {
        Ok(self.optimizer.borrow().history().to_json()?)
    }

    pub fn core(&self) -> &AnimationCore<H> {
        &self.core
    }
}

impl<H: FrameHost> AnimationEngine for PerformanceOptimizedEngine<H> {
    type Host = H;

    fn start(&mut self, callbacks: FrameCallbacks) {
        if self.core.is_running() {
            log::warn!("optimized engine already started; ignoring start()");
            return;
        }

        let optimizer = Rc::clone(&self.optimizer);
        let callbacks = callbacks.observe_frame_end(move |end| {
            let mut optimizer = optimizer.borrow_mut();
            if let Some(change) = optimizer.on_frame_end(end) {
                log::info!(
                    "preset {} -> {} ({}) at {:.1} fps",
                    change.from,
                    change.to,
                    optimizer.current().label,
                    end.average_fps
                );
            }
        });
        self.core.start(callbacks);
    }

    fn stop(&mut self) {
        self.core.stop();
    }

    fn reset(&mut self) {
        self.core.reset();
        self.optimizer.borrow_mut().reset();
    }

    fn update_config(&mut self, patch: AnimationConfigPatch) {
        self.core.update_config(patch);
    }

    fn performance_stats(&self) -> PerformanceStats {
        self.core.performance_stats()
    }

    fn state(&self) -> &AnimationState {
        self.core.state()
    }

    fn subscribe(&self) -> watch::Receiver<AnimationState> {
        self.core.subscribe()
    }

    fn pump(&mut self) -> usize {
        self.core.pump()
    }

    fn host(&self) -> &H {
        self.core.host()
    }

    fn host_mut(&mut self) -> &mut H {
        self.core.host_mut()
    }

    fn quality(&self) -> Option<QualityReport> {
        let optimizer = self.optimizer.borrow();
        let preset = optimizer.current();
        Some(QualityReport {
            level: optimizer.level(),
            level_count: optimizer.presets().len(),
            multiplier: preset.render_quality,
            label: preset.label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;

    fn engine() -> PerformanceOptimizedEngine<ManualHost> {
        PerformanceOptimizedEngine::new(
            AnimationConfig::with_frame_rate(120.0),
            OptimizedConfig::default(),
            ManualHost::new(),
        )
    }

    fn step(engine: &mut PerformanceOptimizedEngine<ManualHost>, delta_ms: f64) {
        engine.host_mut().advance(delta_ms);
        engine.pump();
    }

    #[test]
    fn test_ratio_policy_steps_down_immediately() {
        let mut engine = engine();
        engine.start(FrameCallbacks::new());

        // 20 fps against a 60 fps target: ratio 0.33, one level per frame.
        step(&mut engine, 50.0);
        assert_eq!(engine.quality_level(), 1);
        step(&mut engine, 50.0);
        assert_eq!(engine.quality_level(), 2);
        step(&mut engine, 50.0);
        assert_eq!(engine.quality_level(), 3);
        step(&mut engine, 50.0);
        assert_eq!(engine.quality_level(), 3);
        assert_eq!(engine.current_preset().label, "Low");
    }

    #[test]
    fn test_within_band_holds_level() {
        let mut engine = engine();
        engine.start(FrameCallbacks::new());
        for _ in 0..100 {
            // ~58.8 fps, ratio ~0.98
            step(&mut engine, 17.0);
        }
        assert_eq!(engine.quality_level(), 0);
    }

    #[test]
    fn test_recovers_one_level_at_a_time() {
        let levels = Rc::new(RefCell::new(Vec::new()));
        let levels_in = Rc::clone(&levels);

        let mut engine = engine();
        let controls = engine.controls();
        engine.start(FrameCallbacks::new().on_frame_end(move |_| {
            levels_in.borrow_mut().push(controls.level());
            Ok(())
        }));

        for _ in 0..3 {
            step(&mut engine, 50.0);
        }
        assert_eq!(engine.quality_level(), 3);

        // 100 fps, ratio 1.67 once the average catches up.
        for _ in 0..60 {
            step(&mut engine, 10.0);
        }
        assert_eq!(engine.quality_level(), 0);

        let levels = levels.borrow();
        for pair in levels.windows(2) {
            assert!((pair[0] as i64 - pair[1] as i64).abs() <= 1);
        }
    }

    #[test]
    fn test_snapshot_history_is_capped() {
        let mut engine = engine();
        engine.start(FrameCallbacks::new());
        for _ in 0..150 {
            step(&mut engine, 17.0);
        }
        let history = engine.metrics_history();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].frame, 51);
        assert_eq!(history[99].frame, 150);
    }

    #[test]
    fn test_snapshot_records_level_that_rendered_the_frame() {
        let mut engine = engine();
        engine.start(FrameCallbacks::new());
        step(&mut engine, 50.0);
        step(&mut engine, 50.0);

        let history = engine.metrics_history();
        assert_eq!(history[0].quality_level, 0);
        assert_eq!(history[1].quality_level, 1);
    }

    #[test]
    fn test_export_metrics_json() {
        let mut engine = engine();
        engine.start(FrameCallbacks::new());
        step(&mut engine, 17.0);

        let json = engine.export_metrics_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(|a| a.len()), Some(1));
        assert_eq!(parsed[0]["frame"], 1);
    }

    #[test]
    fn test_controls_follow_current_preset() {
        let presets = vec![
            QualityPreset::new(0, 3, 1, 1.0, "full"),
            QualityPreset::new(1, 1, 2, 0.5, "lean"),
        ];
        let mut engine = PerformanceOptimizedEngine::new(
            AnimationConfig::with_frame_rate(60.0),
            OptimizedConfig {
                presets,
                ..OptimizedConfig::default()
            },
            ManualHost::new(),
        );
        let controls = engine.controls();
        let points = vec![
            RenderPoint::new(5.0, 0.0, 2.0),
            RenderPoint::new(1.0, 0.0, 2.0),
            RenderPoint::new(3.0, 0.0, 2.0),
        ];

        assert_eq!(controls.cull(&points, (0.0, 0.0)), points);
        assert!(!controls.should_skip_update(1));

        engine.start(FrameCallbacks::new());
        step(&mut engine, 50.0);
        assert_eq!(controls.level(), 1);

        assert_eq!(
            controls.cull(&points, (0.0, 0.0)),
            vec![RenderPoint::new(1.0, 0.0, 2.0)]
        );
        assert!(controls.should_skip_update(1));
        assert!(!controls.should_skip_update(2));
        assert_eq!(controls.apply_lod(&points)[0].size, 1.0);
    }

    #[test]
    fn test_reset_returns_to_best_preset() {
        let mut engine = engine();
        engine.start(FrameCallbacks::new());
        step(&mut engine, 50.0);
        step(&mut engine, 50.0);
        assert_eq!(engine.quality_level(), 2);

        engine.reset();
        assert_eq!(engine.quality_level(), 0);
        assert!(engine.metrics_history().is_empty());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_quality_report_uses_preset_label() {
        let engine = engine();
        let report = engine.quality().unwrap();
        assert_eq!(report.label, "Ultra");
        assert_eq!(report.level_count, 4);
        assert_eq!(report.multiplier, 1.0);
    }

    #[test]
    fn test_adjust_ignores_missing_samples() {
        let mut optimizer = QualityOptimizer::new(OptimizedConfig::default());
        assert_eq!(optimizer.adjust(0.0), None);
        assert_eq!(
            optimizer.adjust(10.0),
            Some(Adaptation { from: 0, to: 1 })
        );
    }
}
