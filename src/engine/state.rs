use serde::Serialize;

use super::StopReason;

/// Wall-clock cost of the phases of the last processed frame, in ms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerformanceMetrics {
    pub frame_time_ms: f64,
    pub render_time_ms: f64,
    pub update_time_ms: f64,
}

/// Loop state, owned by the core and republished once per processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AnimationState {
    pub is_running: bool,
    /// Frames processed since the last start or reset.
    pub frame_count: u64,
    /// Host time of the most recent processed frame.
    pub last_frame_time: f64,
    pub delta_time: f64,
    pub fps: f64,
    pub average_fps: f64,
    pub performance_metrics: PerformanceMetrics,
}

/// Read-only snapshot returned by `performance_stats()`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerformanceStats {
    pub fps: f64,
    pub average_fps: f64,
    pub frame_count: u64,
    pub metrics: PerformanceMetrics,
    pub is_running: bool,
    /// Callback invocations that returned an error or panicked.
    pub callback_faults: u64,
    pub last_stop_reason: Option<StopReason>,
}

/// Current rendering quality of an adaptive variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// Index into the ladder, 0 is the best quality.
    pub level: usize,
    pub level_count: usize,
    /// Render quality multiplier of the active level.
    pub multiplier: f64,
    pub label: String,
}
