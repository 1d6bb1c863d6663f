//! Hysteresis-driven quality adaptation on top of the core loop.
//!
//! The controller watches the average FPS reported at each frame end and
//! moves a discrete quality index one step at a time once the FPS has stayed
//! below the target (or comfortably above it) for `adaptation_threshold`
//! consecutive frames.

pub mod controller;

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::watch;

pub use controller::{Adaptation, HysteresisController, QualityLadder};

use crate::config::{AdaptiveConfig, AnimationConfig, AnimationConfigPatch};
use crate::engine::{
    AnimationCore, AnimationEngine, AnimationState, FrameCallbacks, PerformanceStats,
    QualityReport,
};
use crate::host::FrameHost;

/// Cheap shared view of the controller for use inside frame callbacks.
#[derive(Debug, Clone)]
pub struct QualityHandle(Rc<RefCell<HysteresisController>>);

impl QualityHandle {
    /// Multiplier of the active level.
    pub fn current(&self) -> f64 {
        self.0.borrow().current_quality()
    }

    pub fn level(&self) -> usize {
        self.0.borrow().index()
    }
}

/// Core loop wrapped with a hysteresis quality controller.
pub struct AdaptiveAnimationEngine<H: FrameHost> {
    core: AnimationCore<H>,
    controller: Rc<RefCell<HysteresisController>>,
    initialized: bool,
}

impl<H: FrameHost> AdaptiveAnimationEngine<H> {
    pub fn new(config: AnimationConfig, adaptive: AdaptiveConfig, host: H) -> Self {
        Self {
            core: AnimationCore::new(config, host),
            controller: Rc::new(RefCell::new(HysteresisController::new(adaptive))),
            initialized: false,
        }
    }

    /// Multiplier of the active quality level.
    pub fn current_quality(&self) -> f64 {
        self.controller.borrow().current_quality()
    }

    /// Index of the active quality level, 0 is the best.
    pub fn quality_level(&self) -> usize {
        self.controller.borrow().index()
    }

    pub fn quality_handle(&self) -> QualityHandle {
        QualityHandle(Rc::clone(&self.controller))
    }

    pub fn core(&self) -> &AnimationCore<H> {
        &self.core
    }
}

impl<H: FrameHost> AnimationEngine for AdaptiveAnimationEngine<H> {
    type Host = H;

    fn start(&mut self, callbacks: FrameCallbacks) {
        if self.initialized && self.core.is_running() {
            log::warn!("adaptive engine already started; ignoring start()");
            return;
        }

        let controller = Rc::clone(&self.controller);
        let callbacks = callbacks.observe_frame_end(move |end| {
            let mut controller = controller.borrow_mut();
            if let Some(change) = controller.observe(end.average_fps) {
                log::info!(
                    "quality {} -> {} ({:.2}x) at {:.1} fps",
                    change.from,
                    change.to,
                    controller.current_quality(),
                    end.average_fps
                );
            }
        });

        self.initialized = true;
        self.core.start(callbacks);
    }

    fn stop(&mut self) {
        self.core.stop();
        self.initialized = false;
    }

    fn reset(&mut self) {
        self.core.reset();
        self.controller.borrow_mut().reset();
        self.initialized = false;
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
        let controller = self.controller.borrow();
        Some(QualityReport {
            level: controller.index(),
            level_count: controller.ladder().len(),
            multiplier: controller.current_quality(),
            label: format!("{:.0}%", controller.current_quality() * 100.0),
        })
    }
}
