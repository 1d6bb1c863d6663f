use std::collections::VecDeque;

/// Number of FPS samples kept for the rolling average.
pub const FPS_HISTORY_CAPACITY: usize = 60;

/// Bounded window of instantaneous FPS samples with an incrementally
/// maintained sum, so the average is O(1).
#[derive(Debug, Clone)]
pub struct FpsHistory {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl FpsHistory {
    pub fn new() -> Self {
        Self::with_capacity(FPS_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Push a sample, evicting (and subtracting) the oldest one when full.
    pub fn push(&mut self, fps: f64) {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
            }
        }
        self.samples.push_back(fps);
        self.sum += fps;
    }

    /// Mean of the current window, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

impl Default for FpsHistory {
    fn default() -> Self {
        Self::new()
    }
}
