//! Stroboscopic phase effect: how far a rotation has drifted from the
//! golden angle over one frame, and the motion that suggests.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, CadenceResult};

pub const GOLDEN_ANGLE_DEG: f64 = 137.507_764;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StroboscopicConfig {
    pub rotation_speed_deg_per_sec: f64,
    pub golden_angle_deg: f64,
    /// Distance from a whole golden-angle multiple that still reads as frozen.
    pub threshold: f64,
    pub enable_temporal_aliasing: bool,
    pub enable_morphing: bool,
}

impl Default for StroboscopicConfig {
    fn default() -> Self {
        Self {
            rotation_speed_deg_per_sec: 137.5,
            golden_angle_deg: GOLDEN_ANGLE_DEG,
            threshold: 0.05,
            enable_temporal_aliasing: true,
            enable_morphing: true,
        }
    }
}

impl StroboscopicConfig {
    pub fn validate(&self) -> CadenceResult<()> {
        if !(self.golden_angle_deg.is_finite() && self.golden_angle_deg > 0.0) {
            return Err(CadenceError::InvalidConfig(format!(
                "strobe.golden_angle_deg must be positive, got {}",
                self.golden_angle_deg
            )));
        }
        if !(0.0..=0.5).contains(&self.threshold) {
            return Err(CadenceError::InvalidConfig(format!(
                "strobe.threshold must be within [0, 0.5], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionKind {
    Frozen,
    Growing,
    Shrinking,
}

impl std::fmt::Display for MotionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MotionKind::Frozen => "frozen",
            MotionKind::Growing => "growing",
            MotionKind::Shrinking => "shrinking",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StroboscopicState {
    /// Position within the golden angle, in `[0, 1)`.
    pub phase: f64,
    pub is_stroboscopic: bool,
    pub motion: MotionKind,
    pub aliasing_strength: f64,
    pub morph_factor: f64,
}

/// Stateless: every call recomputes from the config and the frame delta.
#[derive(Debug, Clone, Default)]
pub struct StroboscopicEngine {
    config: StroboscopicConfig,
}

impl StroboscopicEngine {
    pub fn new(config: StroboscopicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StroboscopicConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: StroboscopicConfig) {
        self.config = config;
    }

    pub fn calculate(&self, delta_ms: f64) -> StroboscopicState {
        let cfg = &self.config;
        let angle = cfg.rotation_speed_deg_per_sec * delta_ms / 1000.0;
        let phase = if cfg.golden_angle_deg > 0.0 && angle.is_finite() {
            angle.rem_euclid(cfg.golden_angle_deg) / cfg.golden_angle_deg
        } else {
            0.0
        };

        let is_stroboscopic = phase < cfg.threshold || 1.0 - phase < cfg.threshold;
        let motion = if is_stroboscopic {
            MotionKind::Frozen
        } else if phase < 0.5 {
            MotionKind::Growing
        } else {
            MotionKind::Shrinking
        };

        let aliasing_strength = if cfg.enable_temporal_aliasing {
            1.0 - phase.min(1.0 - phase) * 2.0
        } else {
            0.0
        };
        let morph_factor = if cfg.enable_morphing {
            (phase * PI).sin()
        } else {
            0.0
        };

        StroboscopicState {
            phase,
            is_stroboscopic,
            motion,
            aliasing_strength,
            morph_factor,
        }
    }
}
