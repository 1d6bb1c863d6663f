use crate::config::AdaptiveConfig;

/// Ordered quality multipliers, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityLadder {
    levels: Vec<f64>,
}

impl QualityLadder {
    /// Ladder from the given multipliers. An empty list becomes `[1.0]`.
    pub fn new(levels: Vec<f64>) -> Self {
        if levels.is_empty() {
            log::warn!("empty quality ladder, using a single full-quality level");
            return Self { levels: vec![1.0] };
        }
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.levels.get(index).copied()
    }

    /// Index of the lowest quality level.
    pub fn lowest(&self) -> usize {
        self.levels.len() - 1
    }
}

/// A committed level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adaptation {
    pub from: usize,
    pub to: usize,
}

/// Steps a quality index with two mutually exclusive hysteresis counters.
///
/// - below `target`: count a low frame; after `threshold` of them, one step
///   towards lower quality
/// - above `target + margin`: count a high frame; after `threshold` of them,
///   one step towards higher quality
/// - anywhere in `[target, target + margin]`: nothing moves
#[derive(Debug, Clone)]
pub struct HysteresisController {
    ladder: QualityLadder,
    index: usize,
    low_fps_frames: u32,
    high_fps_frames: u32,
    target_fps: f64,
    threshold: u32,
    margin: f64,
}

impl HysteresisController {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            ladder: QualityLadder::new(config.quality_levels),
            index: 0,
            low_fps_frames: 0,
            high_fps_frames: 0,
            target_fps: config.target_fps,
            threshold: config.adaptation_threshold.max(1),
            margin: config.high_fps_margin,
        }
    }

    /// Feed one FPS observation. Returns the change if one was committed.
    pub fn observe(&mut self, fps: f64) -> Option<Adaptation> {
        if fps < self.target_fps {
            self.low_fps_frames += 1;
            self.high_fps_frames = 0;
            if self.low_fps_frames >= self.threshold && self.index < self.ladder.lowest() {
                self.low_fps_frames = 0;
                return Some(self.step_to(self.index + 1));
            }
        } else if fps > self.target_fps + self.margin {
            self.high_fps_frames += 1;
            self.low_fps_frames = 0;
            if self.high_fps_frames >= self.threshold && self.index > 0 {
                self.high_fps_frames = 0;
                return Some(self.step_to(self.index - 1));
            }
        }
        None
    }

    fn step_to(&mut self, to: usize) -> Adaptation {
        let change = Adaptation {
            from: self.index,
            to,
        };
        self.index = to;
        change
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_quality(&self) -> f64 {
        self.ladder.get(self.index).unwrap_or(1.0)
    }

    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    pub fn low_fps_frames(&self) -> u32 {
        self.low_fps_frames
    }

    pub fn high_fps_frames(&self) -> u32 {
        self.high_fps_frames
    }

    /// Back to the best level with both counters cleared.
    pub fn reset(&mut self) {
        self.index = 0;
        self.low_fps_frames = 0;
        self.high_fps_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(threshold: u32) -> HysteresisController {
        HysteresisController::new(AdaptiveConfig {
            target_fps: 60.0,
            adaptation_threshold: threshold,
            high_fps_margin: 10.0,
            quality_levels: vec![1.0, 0.75, 0.5, 0.25],
        })
    }

    #[test]
    fn test_fps_at_target_never_adapts() {
        let mut c = controller(3);
        for _ in 0..10_000 {
            assert_eq!(c.observe(60.0), None);
        }
        assert_eq!(c.index(), 0);
        assert_eq!(c.low_fps_frames(), 0);
        assert_eq!(c.high_fps_frames(), 0);
    }

    #[test]
    fn test_stable_band_is_inclusive() {
        let mut c = controller(1);
        c.observe(30.0);
        assert_eq!(c.index(), 1);
        for fps in [60.0, 65.0, 70.0] {
            assert_eq!(c.observe(fps), None);
        }
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn test_drop_for_exactly_threshold_steps_once() {
        let mut c = controller(5);
        for _ in 0..4 {
            assert_eq!(c.observe(30.0), None);
        }
        assert_eq!(c.observe(30.0), Some(Adaptation { from: 0, to: 1 }));
        assert_eq!(c.index(), 1);
        assert_eq!(c.low_fps_frames(), 0);
    }

    #[test]
    fn test_high_fps_raises_quality() {
        let mut c = controller(2);
        c.observe(10.0);
        c.observe(10.0);
        assert_eq!(c.index(), 1);

        assert_eq!(c.observe(90.0), None);
        assert_eq!(c.observe(90.0), Some(Adaptation { from: 1, to: 0 }));
        assert_eq!(c.current_quality(), 1.0);
    }

    #[test]
    fn test_counters_are_mutually_exclusive() {
        let mut c = controller(3);
        c.observe(30.0);
        c.observe(30.0);
        assert_eq!(c.low_fps_frames(), 2);

        c.observe(100.0);
        assert_eq!(c.low_fps_frames(), 0);
        assert_eq!(c.high_fps_frames(), 1);

        c.observe(30.0);
        assert_eq!(c.high_fps_frames(), 0);
        assert_eq!(c.low_fps_frames(), 1);
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn test_stable_band_does_not_clear_counters() {
        let mut c = controller(3);
        c.observe(30.0);
        c.observe(30.0);
        c.observe(65.0);
        assert_eq!(c.low_fps_frames(), 2);
        assert_eq!(c.observe(30.0), Some(Adaptation { from: 0, to: 1 }));
    }

    #[test]
    fn test_clamped_at_ladder_ends() {
        let mut c = controller(1);
        for _ in 0..20 {
            c.observe(5.0);
        }
        assert_eq!(c.index(), 3);
        assert_eq!(c.current_quality(), 0.25);

        for _ in 0..20 {
            c.observe(500.0);
        }
        assert_eq!(c.index(), 0);
        assert_eq!(c.observe(500.0), None);
    }

    #[test]
    fn test_never_moves_more_than_one_level() {
        let mut c = controller(1);
        let mut last = c.index();
        for fps in [5.0, 5.0, 500.0, 5.0, 500.0, 500.0, 500.0, 5.0] {
            c.observe(fps);
            assert!((c.index() as i64 - last as i64).abs() <= 1);
            last = c.index();
        }
    }

    #[test]
    fn test_empty_ladder_falls_back() {
        let ladder = QualityLadder::new(Vec::new());
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder.get(0), Some(1.0));
        assert_eq!(ladder.lowest(), 0);
    }
}
