//! Terminal dashboard for a running engine.

pub mod dashboard;
pub mod input;

use std::collections::VecDeque;

use serde::Serialize;

pub use dashboard::{Dashboard, HelpOverlay, StatusBar};
pub use input::{InputEvent, InputHandler, FRAME_RATE_STEP};

use crate::demo::LoadPhase;
use crate::engine::{PerformanceStats, QualityReport};
use crate::strobe::StroboscopicState;

/// Everything the dashboard shows for one redraw.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub engine: &'static str,
    pub target_fps: f64,
    pub stats: PerformanceStats,
    pub quality: Option<QualityReport>,
    pub strobe: Option<StroboscopicState>,
    pub load_phase: Option<LoadPhase>,
    pub render_cost_ms: f64,
    pub drawn_points: usize,
}

/// Recent FPS readings for the sparkline, oldest first.
#[derive(Debug, Clone)]
pub struct FpsTrend {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl FpsTrend {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, fps: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        let fps = if fps.is_finite() { fps.max(0.0).round() as u64 } else { 0 };
        self.samples.push_back(fps);
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }

    pub fn max(&self) -> u64 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
