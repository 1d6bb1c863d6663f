//! Engine configuration.
//!
//! `AnimationConfig` is what the core loop reads every tick. It is held as an
//! immutable snapshot behind an `Arc` and replaced wholesale when a patch is
//! applied, so a tick never sees half of an update.
//!
//! `EngineSettings` is the on-disk format: one JSON document holding the
//! animation section plus the settings of every engine variant.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::demo::DemoConfig;
use crate::error::{CadenceError, CadenceResult};
use crate::optimized::QualityPreset;
use crate::strobe::StroboscopicConfig;

/// Hard frame cap applied when no override is configured.
pub const DEFAULT_MAX_FRAMES: u64 = 1000;

/// Wall-clock safety timeout applied when no override is configured.
pub const DEFAULT_SAFETY_TIMEOUT_MS: u64 = 30_000;

/// Frame-count and wall-clock limits that halt a runaway loop.
///
/// `None` disables a limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    pub max_frames: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl SafetyLimits {
    /// No limits at all. The loop only stops when asked to.
    pub fn unlimited() -> Self {
        Self {
            max_frames: None,
            timeout_ms: None,
        }
    }
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_frames: Some(DEFAULT_MAX_FRAMES),
            timeout_ms: Some(DEFAULT_SAFETY_TIMEOUT_MS),
        }
    }
}

/// Live configuration of the core loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Target ticks per second.
    pub frame_rate: f64,
    /// Upper bound on the effective frame rate.
    pub max_fps: f64,
    /// Informational only; pacing comes from the host's frame delivery.
    pub enable_vsync: bool,
    /// Gates the periodic performance log lines.
    pub enable_performance_monitoring: bool,
    pub safety: SafetyLimits,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            max_fps: 120.0,
            enable_vsync: true,
            enable_performance_monitoring: false,
            safety: SafetyLimits::default(),
        }
    }
}

impl AnimationConfig {
    /// Config with the given target frame rate and defaults elsewhere.
    pub fn with_frame_rate(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            ..Self::default()
        }
    }

    /// Frame rate the gate actually enforces: `min(frame_rate, max_fps)`.
    pub fn effective_frame_rate(&self) -> f64 {
        self.frame_rate.min(self.max_fps)
    }

    /// Minimum milliseconds between two processed frames.
    pub fn target_frame_time_ms(&self) -> f64 {
        1000.0 / self.effective_frame_rate()
    }

    pub fn validate(&self) -> CadenceResult<()> {
        if !is_positive_rate(self.frame_rate) {
            return Err(CadenceError::InvalidConfig(format!(
                "frame_rate must be a positive number, got {}",
                self.frame_rate
            )));
        }
        if !is_positive_rate(self.max_fps) {
            return Err(CadenceError::InvalidConfig(format!(
                "max_fps must be a positive number, got {}",
                self.max_fps
            )));
        }
        if self.safety.max_frames == Some(0) {
            return Err(CadenceError::InvalidConfig(
                "safety.max_frames must be at least 1 (use null to disable)".into(),
            ));
        }
        Ok(())
    }

    /// Copy of this config with invalid rates replaced by the defaults.
    pub(crate) fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !is_positive_rate(self.frame_rate) {
            log::warn!(
                "frame_rate {} is not usable, falling back to {}",
                self.frame_rate,
                defaults.frame_rate
            );
            self.frame_rate = defaults.frame_rate;
        }
        if !is_positive_rate(self.max_fps) {
            log::warn!(
                "max_fps {} is not usable, falling back to {}",
                self.max_fps,
                defaults.max_fps
            );
            self.max_fps = defaults.max_fps;
        }
        if self.safety.max_frames == Some(0) {
            self.safety.max_frames = defaults.safety.max_frames;
        }
        self
    }
}

fn is_positive_rate(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Partial update for a live `AnimationConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfigPatch {
    pub frame_rate: Option<f64>,
    pub max_fps: Option<f64>,
    pub enable_vsync: Option<bool>,
    pub enable_performance_monitoring: Option<bool>,
    pub safety: Option<SafetyLimits>,
}

impl AnimationConfigPatch {
    pub fn frame_rate(frame_rate: f64) -> Self {
        Self {
            frame_rate: Some(frame_rate),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base`. Fields that would make the config invalid are
    /// dropped with a warning; the rest still apply.
    pub fn apply_to(&self, base: &AnimationConfig) -> AnimationConfig {
        let mut next = base.clone();

        if let Some(rate) = self.frame_rate {
            if is_positive_rate(rate) {
                next.frame_rate = rate;
            } else {
                log::warn!("ignoring frame_rate update to {}", rate);
            }
        }
        if let Some(max_fps) = self.max_fps {
            if is_positive_rate(max_fps) {
                next.max_fps = max_fps;
            } else {
                log::warn!("ignoring max_fps update to {}", max_fps);
            }
        }
        if let Some(vsync) = self.enable_vsync {
            next.enable_vsync = vsync;
        }
        if let Some(monitoring) = self.enable_performance_monitoring {
            next.enable_performance_monitoring = monitoring;
        }
        if let Some(safety) = self.safety {
            if safety.max_frames == Some(0) {
                log::warn!("ignoring safety update with max_frames = 0");
            } else {
                next.safety = safety;
            }
        }

        next
    }
}

impl From<AnimationConfig> for AnimationConfigPatch {
    fn from(config: AnimationConfig) -> Self {
        Self {
            frame_rate: Some(config.frame_rate),
            max_fps: Some(config.max_fps),
            enable_vsync: Some(config.enable_vsync),
            enable_performance_monitoring: Some(config.enable_performance_monitoring),
            safety: Some(config.safety),
        }
    }
}

/// Hysteresis-driven quality adaptation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub target_fps: f64,
    /// Consecutive qualifying frames needed before the level moves.
    pub adaptation_threshold: u32,
    /// Width of the stable band above `target_fps`.
    pub high_fps_margin: f64,
    /// Quality multipliers, best first.
    pub quality_levels: Vec<f64>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            adaptation_threshold: 10,
            high_fps_margin: 10.0,
            quality_levels: vec![1.0, 0.75, 0.5, 0.25],
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> CadenceResult<()> {
        if !is_positive_rate(self.target_fps) {
            return Err(CadenceError::InvalidConfig(format!(
                "adaptive.target_fps must be a positive number, got {}",
                self.target_fps
            )));
        }
        if self.adaptation_threshold == 0 {
            return Err(CadenceError::InvalidConfig(
                "adaptive.adaptation_threshold must be at least 1".into(),
            ));
        }
        if self.quality_levels.is_empty() {
            return Err(CadenceError::InvalidConfig(
                "adaptive.quality_levels must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Update throttling settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum milliseconds between two forwarded updates.
    pub interval_ms: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000.0 / 30.0,
        }
    }
}

/// Ratio-driven quality ladder with culling and LOD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizedConfig {
    pub target_fps: f64,
    /// Step down one level when `average_fps / target_fps` falls below this.
    pub downgrade_ratio: f64,
    /// Step up one level when `average_fps / target_fps` rises above this.
    pub upgrade_ratio: f64,
    /// Number of metric snapshots kept for diagnostics.
    pub history_capacity: usize,
    pub presets: Vec<QualityPreset>,
}

impl Default for OptimizedConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            downgrade_ratio: 0.8,
            upgrade_ratio: 1.2,
            history_capacity: 100,
            presets: QualityPreset::default_ladder(),
        }
    }
}

impl OptimizedConfig {
    pub fn validate(&self) -> CadenceResult<()> {
        if !is_positive_rate(self.target_fps) {
            return Err(CadenceError::InvalidConfig(format!(
                "optimized.target_fps must be a positive number, got {}",
                self.target_fps
            )));
        }
        if self.downgrade_ratio >= self.upgrade_ratio {
            return Err(CadenceError::InvalidConfig(format!(
                "optimized.downgrade_ratio ({}) must be below upgrade_ratio ({})",
                self.downgrade_ratio, self.upgrade_ratio
            )));
        }
        if self.presets.is_empty() {
            return Err(CadenceError::InvalidConfig(
                "optimized.presets must not be empty".into(),
            ));
        }
        if let Some(preset) = self.presets.iter().find(|p| p.update_frequency == 0) {
            return Err(CadenceError::InvalidConfig(format!(
                "optimized preset '{}' has update_frequency 0",
                preset.label
            )));
        }
        Ok(())
    }
}

/// Everything the binary reads from its settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub animation: AnimationConfig,
    pub adaptive: AdaptiveConfig,
    pub throttle: ThrottleConfig,
    pub optimized: OptimizedConfig,
    pub strobe: StroboscopicConfig,
    pub demo: DemoConfig,
}

impl EngineSettings {
    /// Load and validate a settings file.
    pub fn load(path: impl AsRef<Path>) -> CadenceResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CadenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: EngineSettings =
            serde_json::from_str(&text).map_err(|source| CadenceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load the file if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> CadenceResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("{} not found, using default settings", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CadenceResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|source| CadenceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> CadenceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> CadenceResult<()> {
        self.animation.validate()?;
        self.adaptive.validate()?;
        self.optimized.validate()?;
        self.strobe.validate()?;
        self.demo.validate()?;
        if !is_positive_rate(self.throttle.interval_ms) {
            return Err(CadenceError::InvalidConfig(format!(
                "throttle.interval_ms must be a positive number, got {}",
                self.throttle.interval_ms
            )));
        }
        Ok(())
    }
}
