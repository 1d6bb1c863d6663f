//! Rate limiting of the update hook, independent of the render cadence.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::watch;

use crate::config::{AnimationConfig, AnimationConfigPatch, ThrottleConfig};
use crate::engine::{
    AnimationCore, AnimationEngine, AnimationState, FrameCallbacks, PerformanceStats,
};
use crate::host::FrameHost;

/// "Elapsed >= interval" gate.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: f64,
    last_throttled_time: Option<f64>,
    forwarded: u64,
    dropped: u64,
}

impl Throttle {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_throttled_time: None,
            forwarded: 0,
            dropped: 0,
        }
    }

    /// Whether a call at `now_ms` may go through. The first call always does.
    pub fn allow(&mut self, now_ms: f64) -> bool {
        let due = match self.last_throttled_time {
            None => true,
            Some(last) => now_ms - last >= self.interval_ms,
        };
        if due {
            self.last_throttled_time = Some(now_ms);
            self.forwarded += 1;
        } else {
            self.dropped += 1;
        }
        due
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.last_throttled_time = None;
        self.forwarded = 0;
        self.dropped = 0;
    }
}

/// Core loop whose `on_update` fires at most once per throttle interval.
/// Rendering keeps the core's cadence.
pub struct ThrottledAnimationEngine<H: FrameHost> {
    core: AnimationCore<H>,
    throttle: Rc<RefCell<Throttle>>,
}

impl<H: FrameHost> ThrottledAnimationEngine<H> {
    pub fn new(config: AnimationConfig, throttle: ThrottleConfig, host: H) -> Self {
        Self {
            core: AnimationCore::new(config, host),
            throttle: Rc::new(RefCell::new(Throttle::new(throttle.interval_ms))),
        }
    }

    /// Updates forwarded and dropped so far.
    pub fn throttle_counts(&self) -> (u64, u64) {
        let throttle = self.throttle.borrow();
        (throttle.forwarded(), throttle.dropped())
    }

    pub fn core(&self) -> &AnimationCore<H> {
        &self.core
    }
}

impl<H: FrameHost> AnimationEngine for ThrottledAnimationEngine<H> {
    type Host = H;

    fn start(&mut self, callbacks: FrameCallbacks) {
        if self.core.is_running() {
            log::warn!("throttled engine already started; ignoring start()");
            return;
        }
        self.throttle.borrow_mut().reset();
        let throttle = Rc::clone(&self.throttle);
        let callbacks = callbacks.filter_update(move |tick| throttle.borrow_mut().allow(tick.time_ms));
        self.core.start(callbacks);
    }

    fn stop(&mut self) {
        self.core.stop();
    }

    fn reset(&mut self) {
        self.core.reset();
        self.throttle.borrow_mut().reset();
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
}
