//! Frame timing: delta time between processed frames and a smoothed FPS
//! estimate.

pub mod history;

pub use history::{FpsHistory, FPS_HISTORY_CAPACITY};

/// Timing of one processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSample {
    /// Milliseconds since the previous processed frame.
    pub delta_ms: f64,
    /// `1000 / delta_ms`, or `None` when the delta was degenerate.
    pub instantaneous_fps: Option<f64>,
    /// Rolling mean over the FPS history.
    pub average_fps: f64,
}

/// Measures elapsed time between ticks and feeds an FPS window.
///
/// The first tick after construction (or `reset`) seeds the clock so its
/// delta is 0 instead of the whole host uptime. Zero, negative or non-finite
/// deltas never reach the history.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_frame_time: Option<f64>,
    history: FpsHistory,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor the clock at `now` without recording a sample.
    pub fn seed(&mut self, now_ms: f64) {
        self.last_frame_time = Some(now_ms);
    }

    /// Milliseconds since the last processed frame, 0 if unseeded.
    pub fn delta_since(&self, now_ms: f64) -> f64 {
        match self.last_frame_time {
            Some(last) => now_ms - last,
            None => 0.0,
        }
    }

    /// Record a processed frame at `now_ms`.
    pub fn on_tick(&mut self, now_ms: f64) -> FrameSample {
        let last = *self.last_frame_time.get_or_insert(now_ms);
        let delta_ms = now_ms - last;
        self.last_frame_time = Some(now_ms);

        let instantaneous_fps = if delta_ms > 0.0 && delta_ms.is_finite() {
            let fps = 1000.0 / delta_ms;
            self.history.push(fps);
            Some(fps)
        } else {
            None
        };

        FrameSample {
            delta_ms,
            instantaneous_fps,
            average_fps: self.history.average(),
        }
    }

    pub fn last_frame_time(&self) -> Option<f64> {
        self.last_frame_time
    }

    pub fn average_fps(&self) -> f64 {
        self.history.average()
    }

    pub fn history(&self) -> &FpsHistory {
        &self.history
    }

    /// Forget the anchor and all samples.
    pub fn reset(&mut self) {
        self.last_frame_time = None;
        self.history.clear();
    }
}
