use std::time::Duration;

use super::{FrameHandle, FrameHost, HostEvent, TimerHandle};

/// Deterministic host driven by hand.
///
/// Time only moves when `advance` / `advance_to` is called, and each call
/// opens exactly one frame opportunity. A pending frame request is delivered
/// on the next `poll` after an opportunity; opportunities with nothing
/// pending are lost, like a display refresh nobody asked for.
#[derive(Debug, Default)]
pub struct ManualHost {
    now_ms: f64,
    next_id: u64,
    pending_frame: Option<FrameHandle>,
    frame_ready: bool,
    timers: Vec<(TimerHandle, f64)>,
    frames_requested: u64,
    frames_cancelled: u64,
    frames_delivered: u64,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose clock starts at `now_ms`.
    pub fn starting_at(now_ms: f64) -> Self {
        Self {
            now_ms,
            ..Self::default()
        }
    }

    /// Move time forward and open one frame opportunity.
    pub fn advance(&mut self, delta_ms: f64) {
        self.now_ms += delta_ms;
        self.frame_ready = true;
    }

    /// Jump to an absolute time and open one frame opportunity.
    pub fn advance_to(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
        self.frame_ready = true;
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame.is_some()
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    pub fn frames_cancelled(&self) -> u64 {
        self.frames_cancelled
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl FrameHost for ManualHost {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id());
        self.pending_frame = Some(handle);
        self.frames_requested += 1;
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending_frame == Some(handle) {
            self.pending_frame = None;
            self.frames_cancelled += 1;
        }
    }

    fn arm_timeout(&mut self, delay_ms: u64) -> TimerHandle {
        let handle = TimerHandle(self.next_id());
        self.timers.push((handle, self.now_ms + delay_ms as f64));
        handle
    }

    fn disarm_timeout(&mut self, handle: TimerHandle) {
        self.timers.retain(|(h, _)| *h != handle);
    }

    fn poll(&mut self) -> Option<HostEvent> {
        let now = self.now_ms;
        let due = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
            .map(|(i, _)| i);
        if let Some(index) = due {
            let (handle, _) = self.timers.remove(index);
            return Some(HostEvent::Timeout(handle));
        }

        if !self.frame_ready {
            return None;
        }
        self.frame_ready = false;

        let handle = self.pending_frame.take()?;
        self.frames_delivered += 1;
        Some(HostEvent::Frame(handle))
    }

    fn time_until_next_event(&self) -> Option<Duration> {
        if self.frame_ready && self.pending_frame.is_some() {
            return Some(Duration::ZERO);
        }
        self.timers
            .iter()
            .map(|(_, deadline)| (deadline - self.now_ms).max(0.0))
            .min_by(f64::total_cmp)
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
    }
}
