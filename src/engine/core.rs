use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use super::callbacks::{invoke, FrameCallbacks, FrameEnd, FrameTick};
use super::governor::{FrameVerdict, SafetyGovernor, StopReason};
use super::state::{AnimationState, PerformanceMetrics, PerformanceStats};
use super::AnimationEngine;
use crate::clock::FrameClock;
use crate::config::{AnimationConfig, AnimationConfigPatch};
use crate::host::{FrameHandle, FrameHost, HostEvent};

/// Processed frames between two performance log lines.
const PERFORMANCE_LOG_INTERVAL: u64 = 60;

/// Slack on the frame gate so a frame landing exactly on the target interval
/// is not lost to float rounding.
const GATE_TOLERANCE_MS: f64 = 1e-3;

/// Self-rescheduling frame loop.
///
/// Every frame opportunity from the host goes through the frame-rate gate;
/// frames that pass run the hooks in order, publish a new `AnimationState`
/// and request the next opportunity. Hook failures are contained. The loop
/// only stops on `stop()`, `reset()` or a safety limit.
pub struct AnimationCore<H: FrameHost> {
    host: H,
    config: Arc<AnimationConfig>,
    state: AnimationState,
    clock: FrameClock,
    governor: SafetyGovernor,
    callbacks: FrameCallbacks,
    pending_frame: Option<FrameHandle>,
    last_stop_reason: Option<StopReason>,
    callback_faults: u64,
    state_tx: watch::Sender<AnimationState>,
}

impl<H: FrameHost> AnimationCore<H> {
    pub fn new(config: AnimationConfig, host: H) -> Self {
        let (state_tx, _) = watch::channel(AnimationState::default());
        Self {
            host,
            config: Arc::new(config.sanitized()),
            state: AnimationState::default(),
            clock: FrameClock::new(),
            governor: SafetyGovernor::new(),
            callbacks: FrameCallbacks::new(),
            pending_frame: None,
            last_stop_reason: None,
            callback_faults: 0,
            state_tx,
        }
    }

    /// Snapshot of the live config.
    pub fn config(&self) -> Arc<AnimationConfig> {
        Arc::clone(&self.config)
    }

    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.last_stop_reason
    }

    pub fn callback_faults(&self) -> u64 {
        self.callback_faults
    }

    pub fn frame_clock(&self) -> &FrameClock {
        &self.clock
    }

    fn schedule_next(&mut self) {
        self.pending_frame = Some(self.host.request_frame());
    }

    fn publish(&mut self) {
        self.state_tx.send_replace(self.state);
    }

    /// Stop for `reason`. Only the first stop of a run is recorded.
    fn halt(&mut self, reason: StopReason) {
        if let Some(handle) = self.pending_frame.take() {
            self.host.cancel_frame(handle);
        }
        self.governor.disarm(&mut self.host);

        if !self.state.is_running {
            return;
        }
        self.state.is_running = false;
        self.last_stop_reason = Some(reason);

        if reason.is_safety() {
            log::warn!(
                "safety stop: {} (frame {})",
                reason,
                self.state.frame_count
            );
        } else {
            log::debug!("animation loop stopped at frame {}", self.state.frame_count);
        }
        self.publish();
    }

    fn on_frame(&mut self, handle: FrameHandle) {
        if !self.state.is_running || self.pending_frame != Some(handle) {
            log::debug!("dropping stale frame callback {:?}", handle);
            return;
        }
        self.pending_frame = None;
        let now = self.host.frame_time_ms();
        self.tick(now);
    }

    fn tick(&mut self, now: f64) {
        let config = Arc::clone(&self.config);
        let tick_started = Instant::now();

        if self.clock.delta_since(now) + GATE_TOLERANCE_MS < config.target_frame_time_ms() {
            self.schedule_next();
            return;
        }

        if let FrameVerdict::Halt(reason) = self.governor.admit_frame() {
            self.halt(reason);
            return;
        }

        let sample = self.clock.on_tick(now);
        let frame = self.state.frame_count;

        if let Some(callback) = self.callbacks.on_frame_start.as_mut() {
            if !invoke("on_frame_start", frame, || callback(now)) {
                self.callback_faults += 1;
            }
        }

        let tick = FrameTick {
            time_ms: now,
            delta_ms: sample.delta_ms,
            frame,
        };

        let update_started = Instant::now();
        if let Some(callback) = self.callbacks.on_update.as_mut() {
            if !invoke("on_update", frame, || callback(&tick)) {
                self.callback_faults += 1;
            }
        }
        let update_time_ms = elapsed_ms(update_started);

        let render_started = Instant::now();
        if let Some(callback) = self.callbacks.on_render.as_mut() {
            if !invoke("on_render", frame, || callback(&tick)) {
                self.callback_faults += 1;
            }
        }
        let render_time_ms = elapsed_ms(render_started);

        self.state.frame_count = frame + 1;
        self.state.last_frame_time = now;
        self.state.delta_time = sample.delta_ms;
        if let Some(fps) = sample.instantaneous_fps {
            self.state.fps = fps;
        }
        self.state.average_fps = sample.average_fps;
        self.state.performance_metrics = PerformanceMetrics {
            frame_time_ms: elapsed_ms(tick_started),
            render_time_ms,
            update_time_ms,
        };
        self.publish();

        let end = FrameEnd {
            time_ms: now,
            frame_count: self.state.frame_count,
            fps: self.state.fps,
            average_fps: self.state.average_fps,
            metrics: self.state.performance_metrics,
        };
        if let Some(callback) = self.callbacks.on_frame_end.as_mut() {
            if !invoke("on_frame_end", frame, || callback(&end)) {
                self.callback_faults += 1;
            }
        }

        if config.enable_performance_monitoring
            && self.state.frame_count % PERFORMANCE_LOG_INTERVAL == 0
        {
            let metrics = self.state.performance_metrics;
            log::debug!(
                "frame={} fps={:.1} avg_fps={:.1} frame_ms={:.2} update_ms={:.2} render_ms={:.2}",
                self.state.frame_count,
                self.state.fps,
                self.state.average_fps,
                metrics.frame_time_ms,
                metrics.update_time_ms,
                metrics.render_time_ms
            );
        }

        if self.state.is_running {
            self.schedule_next();
        }
    }
}

impl<H: FrameHost> AnimationEngine for AnimationCore<H> {
    type Host = H;

    fn start(&mut self, callbacks: FrameCallbacks) {
        if self.state.is_running {
            log::warn!("start() called while the animation loop is already running; ignoring");
            return;
        }

        let now = self.host.now_ms();
        self.callbacks = callbacks;
        self.last_stop_reason = None;
        self.state.is_running = true;
        self.state.frame_count = 0;
        self.state.last_frame_time = now;
        self.clock.seed(now);

        let safety = self.config.safety;
        self.governor.arm(&mut self.host, safety);
        self.schedule_next();
        self.publish();

        log::debug!(
            "animation loop started: target {:.1} fps, frame cap {:?}, timeout {:?} ms",
            self.config.effective_frame_rate(),
            safety.max_frames,
            safety.timeout_ms
        );
    }

    fn stop(&mut self) {
        self.halt(StopReason::Requested);
    }

    fn reset(&mut self) {
        self.stop();
        self.state = AnimationState::default();
        self.clock.reset();
        self.callback_faults = 0;
        self.last_stop_reason = None;
        self.publish();
    }

    fn update_config(&mut self, patch: AnimationConfigPatch) {
        let next = patch.apply_to(&self.config);
        log::debug!(
            "config updated: target {:.1} fps -> {:.1} fps",
            self.config.effective_frame_rate(),
            next.effective_frame_rate()
        );
        self.config = Arc::new(next);
    }

    fn performance_stats(&self) -> PerformanceStats {
        PerformanceStats {
            fps: self.state.fps,
            average_fps: self.state.average_fps,
            frame_count: self.state.frame_count,
            metrics: self.state.performance_metrics,
            is_running: self.state.is_running,
            callback_faults: self.callback_faults,
            last_stop_reason: self.last_stop_reason,
        }
    }

    fn state(&self) -> &AnimationState {
        &self.state
    }

    fn subscribe(&self) -> watch::Receiver<AnimationState> {
        self.state_tx.subscribe()
    }

    fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.host.poll() {
            handled += 1;
            match event {
                HostEvent::Frame(handle) => self.on_frame(handle),
                HostEvent::Timeout(handle) => {
                    if let Some(reason) = self.governor.on_timeout(handle) {
                        self.halt(reason);
                    }
                }
            }
        }
        handled
    }

    fn host(&self) -> &H {
        &self.host
    }

    fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyLimits;
    use crate::error::CallbackError;
    use crate::host::ManualHost;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn core_at(frame_rate: f64) -> AnimationCore<ManualHost> {
        AnimationCore::new(AnimationConfig::with_frame_rate(frame_rate), ManualHost::new())
    }

    fn step(core: &mut AnimationCore<ManualHost>, delta_ms: f64) {
        core.host_mut().advance(delta_ms);
        core.pump();
    }

    /// Callbacks that append hook names to a shared log.
    fn recording(log: &Rc<RefCell<Vec<String>>>) -> FrameCallbacks {
        let start = Rc::clone(log);
        let update = Rc::clone(log);
        let render = Rc::clone(log);
        let end = Rc::clone(log);
        FrameCallbacks::new()
            .on_frame_start(move |_| {
                start.borrow_mut().push("start".into());
                Ok(())
            })
            .on_update(move |t| {
                update.borrow_mut().push(format!("update:{}", t.frame));
                Ok(())
            })
            .on_render(move |t| {
                render.borrow_mut().push(format!("render:{}", t.frame));
                Ok(())
            })
            .on_frame_end(move |e| {
                end.borrow_mut().push(format!("end:{}", e.frame_count));
                Ok(())
            })
    }

    #[test]
    fn test_hooks_run_in_fixed_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut core = core_at(60.0);
        core.start(recording(&log));

        step(&mut core, 17.0);
        step(&mut core, 17.0);

        assert_eq!(
            *log.borrow(),
            vec![
                "start", "update:0", "render:0", "end:1", "start", "update:1", "render:1", "end:2"
            ]
        );
    }

    #[test]
    fn test_gate_skips_work_but_keeps_scheduling() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut core = core_at(30.0);
        core.start(recording(&log));

        // 30 fps needs 33.3 ms between frames; 10 ms opportunities are gated.
        for _ in 0..3 {
            let requested = core.host().frames_requested();
            step(&mut core, 10.0);
            assert!(log.borrow().is_empty());
            assert_eq!(core.host().frames_requested(), requested + 1);
            assert!(core.host().has_pending_frame());
        }

        step(&mut core, 10.0);
        assert_eq!(core.state().frame_count, 1);
        assert!((core.state().delta_time - 40.0).abs() < 1e-9);
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn test_steady_sixty_fps_scenario() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());

        for _ in 0..120 {
            step(&mut core, 16.7);
        }

        let stats = core.performance_stats();
        assert!(stats.frame_count >= 119 && stats.frame_count <= 121);
        assert!((stats.average_fps - 60.0).abs() <= 1.0);
        assert!(stats.is_running);
    }

    #[test]
    fn test_frames_exactly_on_interval_are_not_gated() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());
        for _ in 0..90 {
            step(&mut core, 1000.0 / 60.0);
        }
        assert_eq!(core.state().frame_count, 90);
    }

    #[test]
    fn test_start_while_running_is_ignored() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut core = core_at(60.0);
        core.start(recording(&log));
        step(&mut core, 17.0);

        let second = Rc::new(RefCell::new(Vec::new()));
        core.start(recording(&second));
        step(&mut core, 17.0);

        assert_eq!(core.state().frame_count, 2);
        assert!(second.borrow().is_empty());
        assert_eq!(core.host().armed_timers(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());
        step(&mut core, 17.0);

        core.stop();
        assert!(!core.is_running());
        core.stop();
        assert!(!core.is_running());

        assert!(!core.host().has_pending_frame());
        assert_eq!(core.host().armed_timers(), 0);
        assert_eq!(core.last_stop_reason(), Some(StopReason::Requested));

        step(&mut core, 17.0);
        assert_eq!(core.state().frame_count, 1);
    }

    #[test]
    fn test_stop_before_start_is_safe() {
        let mut core = core_at(60.0);
        core.stop();
        assert!(!core.is_running());
        assert_eq!(core.last_stop_reason(), None);
    }

    #[test]
    fn test_frame_cap_stops_exactly_once() {
        let mut core = core_at(60.0);
        let mut stops = 0u32;
        let mut rx = core.subscribe();
        core.start(FrameCallbacks::new());
        rx.borrow_and_update();

        for _ in 0..1100 {
            step(&mut core, 17.0);
            if rx.has_changed().unwrap_or(false) && !rx.borrow_and_update().is_running {
                stops += 1;
            }
        }

        assert_eq!(stops, 1);
        assert!(!core.is_running());
        assert_eq!(core.state().frame_count, 1000);
        assert_eq!(
            core.last_stop_reason(),
            Some(StopReason::FrameCap { limit: 1000 })
        );
        assert!(!core.host().has_pending_frame());
    }

    #[test]
    fn test_frame_cap_leaves_clock_matching_published_state() {
        let config = AnimationConfig {
            safety: SafetyLimits {
                max_frames: Some(3),
                timeout_ms: None,
            },
            ..AnimationConfig::default()
        };
        let mut core = AnimationCore::new(config, ManualHost::new());
        core.start(FrameCallbacks::new());

        for delta in [20.0, 20.0, 25.0, 50.0] {
            step(&mut core, delta);
        }

        assert!(!core.is_running());
        assert_eq!(core.state().frame_count, 3);
        assert_eq!(core.frame_clock().history().len(), 3);
        assert_eq!(core.frame_clock().average_fps(), core.state().average_fps);
        assert_eq!(
            core.frame_clock().last_frame_time(),
            Some(core.state().last_frame_time)
        );
    }

    #[test]
    fn test_wall_clock_timeout_stops_loop() {
        let config = AnimationConfig {
            safety: SafetyLimits {
                max_frames: None,
                timeout_ms: Some(30_000),
            },
            ..AnimationConfig::default()
        };
        let mut core = AnimationCore::new(config, ManualHost::new());
        core.start(FrameCallbacks::new());

        step(&mut core, 17.0);
        step(&mut core, 29_000.0);
        assert!(core.is_running());

        step(&mut core, 1_000.0);
        assert!(!core.is_running());
        assert_eq!(
            core.last_stop_reason(),
            Some(StopReason::Timeout { after_ms: 30_000 })
        );
        assert_eq!(core.state().frame_count, 2);
    }

    #[test]
    fn test_callback_fault_isolation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let update_log = Rc::clone(&log);
        let render_log = Rc::clone(&log);
        let end_log = Rc::clone(&log);

        let callbacks = FrameCallbacks::new()
            .on_update(move |t| {
                if t.frame == 5 {
                    return Err(CallbackError::new("update failed"));
                }
                update_log.borrow_mut().push(format!("update:{}", t.frame));
                Ok(())
            })
            .on_render(move |t| {
                if t.frame == 7 {
                    panic!("render panicked");
                }
                render_log.borrow_mut().push(format!("render:{}", t.frame));
                Ok(())
            })
            .on_frame_end(move |e| {
                end_log.borrow_mut().push(format!("end:{}", e.frame_count));
                Ok(())
            });

        let mut core = core_at(60.0);
        core.start(callbacks);
        for _ in 0..10 {
            step(&mut core, 17.0);
        }

        let log = log.borrow();
        assert!(!log.contains(&"update:5".to_string()));
        assert!(log.contains(&"render:5".to_string()));
        assert!(log.contains(&"end:6".to_string()));
        assert!(log.contains(&"update:6".to_string()));
        assert!(!log.contains(&"render:7".to_string()));
        assert!(log.contains(&"end:8".to_string()));
        assert!(log.contains(&"end:10".to_string()));

        assert_eq!(core.state().frame_count, 10);
        assert_eq!(core.callback_faults(), 2);
        assert!(core.is_running());
    }

    #[test]
    fn test_frame_start_and_end_faults_are_contained() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let render_log = Rc::clone(&log);
        let end_log = Rc::clone(&log);

        let callbacks = FrameCallbacks::new()
            .on_frame_start(|time_ms| {
                if time_ms < 40.0 {
                    return Err(CallbackError::new("frame start failed"));
                }
                Ok(())
            })
            .on_render(move |t| {
                render_log.borrow_mut().push(format!("render:{}", t.frame));
                Ok(())
            })
            .on_frame_end(move |e| {
                if e.frame_count == 2 {
                    panic!("frame end panicked");
                }
                end_log.borrow_mut().push(format!("end:{}", e.frame_count));
                Ok(())
            });

        let mut core = core_at(60.0);
        core.start(callbacks);
        for _ in 0..4 {
            step(&mut core, 17.0);
        }

        // Frames 0 and 1 (t = 17, 34) fail in on_frame_start, frame 2 ends in a panic.
        assert_eq!(
            *log.borrow(),
            vec!["render:0", "end:1", "render:1", "render:2", "end:3", "render:3", "end:4"]
        );
        assert_eq!(core.state().frame_count, 4);
        assert_eq!(core.callback_faults(), 3);
        assert!(core.is_running());
        assert!(core.host().has_pending_frame());
    }

    #[test]
    fn test_update_config_applies_next_tick() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());
        step(&mut core, 17.0);

        core.update_config(AnimationConfigPatch::frame_rate(20.0));
        assert!(core.is_running());

        // 17 ms is enough for 60 fps but not for 20 fps (50 ms).
        step(&mut core, 17.0);
        step(&mut core, 17.0);
        assert_eq!(core.state().frame_count, 1);

        step(&mut core, 17.0);
        assert_eq!(core.state().frame_count, 2);
        assert_eq!(core.config().frame_rate, 20.0);
    }

    #[test]
    fn test_reset_zeroes_state() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());
        for _ in 0..5 {
            step(&mut core, 17.0);
        }

        core.reset();
        assert_eq!(*core.state(), AnimationState::default());
        assert!(core.frame_clock().history().is_empty());
        assert_eq!(core.last_stop_reason(), None);
        assert!(!core.host().has_pending_frame());
    }

    #[test]
    fn test_restart_counts_from_zero() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());
        for _ in 0..5 {
            step(&mut core, 17.0);
        }
        core.stop();

        core.start(FrameCallbacks::new());
        step(&mut core, 17.0);
        assert_eq!(core.state().frame_count, 1);
        assert!((core.state().delta_time - 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_stale_frame_handle_is_ignored() {
        let mut core = core_at(60.0);
        core.start(FrameCallbacks::new());
        core.host_mut().advance(17.0);

        core.on_frame(FrameHandle(424242));
        assert_eq!(core.state().frame_count, 0);

        core.pump();
        assert_eq!(core.state().frame_count, 1);
    }

    #[test]
    fn test_phase_timings_are_recorded() {
        let callbacks = FrameCallbacks::new().on_render(|_| {
            std::thread::sleep(std::time::Duration::from_millis(2));
            Ok(())
        });
        let mut core = core_at(60.0);
        core.start(callbacks);
        step(&mut core, 17.0);

        let metrics = core.performance_stats().metrics;
        assert!(metrics.render_time_ms >= 2.0);
        assert!(metrics.frame_time_ms >= metrics.render_time_ms);
    }

    #[test]
    fn test_subscribers_see_published_state() {
        let mut core = core_at(60.0);
        let rx = core.subscribe();
        core.start(FrameCallbacks::new());
        step(&mut core, 20.0);

        let seen = *rx.borrow();
        assert!(seen.is_running);
        assert_eq!(seen.frame_count, 1);
        assert!((seen.fps - 50.0).abs() < 1e-9);
    }
}
