use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Full metrics of one completed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub frame: u64,
    pub fps: f64,
    pub average_fps: f64,
    pub frame_time_ms: f64,
    pub update_time_ms: f64,
    pub render_time_ms: f64,
    pub quality_level: usize,
}

/// Bounded history of snapshots, oldest evicted first.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    snapshots: VecDeque<MetricsSnapshot>,
    capacity: usize,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, snapshot: MetricsSnapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.snapshots.back()
    }

    /// Oldest to newest.
    pub fn to_vec(&self) -> Vec<MetricsSnapshot> {
        self.snapshots.iter().cloned().collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshots)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
