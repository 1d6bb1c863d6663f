use serde::{Deserialize, Serialize};

/// One rung of the performance-optimized quality ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub level: usize,
    /// Upper bound on points handed to the renderer.
    pub point_count: usize,
    /// Run update work on every Nth frame.
    pub update_frequency: u32,
    /// Multiplier applied to point sizes.
    pub render_quality: f64,
    pub label: String,
}

impl QualityPreset {
    pub fn new(
        level: usize,
        point_count: usize,
        update_frequency: u32,
        render_quality: f64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            level,
            point_count,
            update_frequency,
            render_quality,
            label: label.into(),
        }
    }

    /// Ultra, High, Medium, Low.
    pub fn default_ladder() -> Vec<QualityPreset> {
        vec![
            QualityPreset::new(0, 10_000, 1, 1.0, "Ultra"),
            QualityPreset::new(1, 5_000, 1, 0.75, "High"),
            QualityPreset::new(2, 2_500, 1, 0.5, "Medium"),
            QualityPreset::new(3, 1_000, 2, 0.25, "Low"),
        ]
    }

    /// Whether update work should be skipped on `frame`.
    pub fn skips_update(&self, frame: u64) -> bool {
        let every = u64::from(self.update_frequency.max(1));
        frame % every != 0
    }
}
