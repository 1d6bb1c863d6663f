use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, CadenceResult};
use crate::optimized::RenderPoint;
use crate::strobe::{StroboscopicConfig, StroboscopicEngine, StroboscopicState};

// ============================================================================
// CONFIG
// ============================================================================

/// Synthetic workload driven by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Points in the scene before any culling.
    pub points: usize,
    /// Render cost per thousand drawn points at full size.
    pub cost_per_thousand_ms: f64,
    /// Global multiplier on render cost.
    pub load_factor: f64,
    /// Chance per frame of a one-off render spike.
    pub spike_chance: f64,
    pub spike_multiplier: f64,
    /// Fixed seed for reproducible runs. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            points: 4_000,
            cost_per_thousand_ms: 4.0,
            load_factor: 1.0,
            spike_chance: 0.02,
            spike_multiplier: 3.0,
            seed: None,
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> CadenceResult<()> {
        if !(0.0..=1.0).contains(&self.spike_chance) {
            return Err(CadenceError::InvalidConfig(format!(
                "demo.spike_chance must be within [0, 1], got {}",
                self.spike_chance
            )));
        }
        if !(self.load_factor.is_finite() && self.load_factor >= 0.0) {
            return Err(CadenceError::InvalidConfig(format!(
                "demo.load_factor must be non-negative, got {}",
                self.load_factor
            )));
        }
        if !(self.cost_per_thousand_ms.is_finite() && self.cost_per_thousand_ms >= 0.0) {
            return Err(CadenceError::InvalidConfig(format!(
                "demo.cost_per_thousand_ms must be non-negative, got {}",
                self.cost_per_thousand_ms
            )));
        }
        Ok(())
    }
}

// ============================================================================
// LOAD PHASES
// ============================================================================

/// Coarse load level the scene cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Calm,
    Busy,
    Surge,
}

impl LoadPhase {
    /// Frames spent in this phase, min and max.
    fn duration_range(&self) -> (u32, u32) {
        match self {
            LoadPhase::Calm => (120, 240),
            LoadPhase::Busy => (90, 180),
            LoadPhase::Surge => (30, 90),
        }
    }

    pub fn cost_modifier(&self) -> f64 {
        match self {
            LoadPhase::Calm => 0.6,
            LoadPhase::Busy => 1.0,
            LoadPhase::Surge => 1.6,
        }
    }

    fn next(&self) -> Self {
        match self {
            LoadPhase::Calm => LoadPhase::Busy,
            LoadPhase::Busy => LoadPhase::Surge,
            LoadPhase::Surge => LoadPhase::Calm,
        }
    }
}

impl std::fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadPhase::Calm => "calm",
            LoadPhase::Busy => "busy",
            LoadPhase::Surge => "surge",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SCENE
// ============================================================================

/// How render cost is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostMode {
    /// Spin for the computed cost so a real-time host feels it.
    Spin,
    /// Only report the cost; a simulated host advances its clock by it.
    Modelled,
}

/// A rotating point cloud with a seeded, phase-varying render cost.
#[derive(Debug)]
pub struct DemoScene {
    config: DemoConfig,
    rng: StdRng,
    points: Vec<RenderPoint>,
    strobe: StroboscopicEngine,
    strobe_state: Option<StroboscopicState>,
    phase: LoadPhase,
    frames_left_in_phase: u32,
    cost_mode: CostMode,
    last_cost_ms: f64,
    last_drawn: usize,
    spikes: u64,
    updates: u64,
    renders: u64,
}

impl DemoScene {
    pub fn new(config: DemoConfig, strobe: StroboscopicConfig, cost_mode: CostMode) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let points = scatter_points(config.points, &mut rng);
        let phase = LoadPhase::Calm;
        let frames_left_in_phase = phase_length(phase, &mut rng);

        Self {
            config,
            rng,
            points,
            strobe: StroboscopicEngine::new(strobe),
            strobe_state: None,
            phase,
            frames_left_in_phase,
            cost_mode,
            last_cost_ms: 0.0,
            last_drawn: 0,
            spikes: 0,
            updates: 0,
            renders: 0,
        }
    }

    pub fn points(&self) -> &[RenderPoint] {
        &self.points
    }

    /// Rotate the cloud by the strobe speed over `delta_ms`.
    pub fn update(&mut self, delta_ms: f64) {
        let strobe = self.strobe.calculate(delta_ms);
        let radians = (self.strobe.config().rotation_speed_deg_per_sec * delta_ms / 1000.0).to_radians();
        let (sin, cos) = radians.sin_cos();
        for p in &mut self.points {
            let (x, y) = (p.x, p.y);
            p.x = x * cos - y * sin;
            p.y = x * sin + y * cos;
        }
        self.strobe_state = Some(strobe);
        self.updates += 1;
    }

    /// Draw `drawn` and return the cost in milliseconds.
    pub fn render(&mut self, drawn: &[RenderPoint]) -> f64 {
        let size_weight = if drawn.is_empty() {
            0.0
        } else {
            drawn.iter().map(|p| p.size).sum::<f64>() / drawn.len() as f64 / AVERAGE_POINT_SIZE
        };

        let mut cost = drawn.len() as f64 / 1000.0
            * self.config.cost_per_thousand_ms
            * self.config.load_factor
            * self.phase.cost_modifier()
            * size_weight.clamp(0.25, 1.5);

        if self.config.spike_chance > 0.0 && self.rng.gen_bool(self.config.spike_chance) {
            cost *= self.config.spike_multiplier;
            self.spikes += 1;
            log::debug!("render spike: {:.2} ms", cost);
        }

        if self.cost_mode == CostMode::Spin {
            spin_for(cost);
        }

        self.advance_phase();
        self.last_cost_ms = cost;
        self.last_drawn = drawn.len();
        self.renders += 1;
        cost
    }

    fn advance_phase(&mut self) {
        self.frames_left_in_phase = self.frames_left_in_phase.saturating_sub(1);
        if self.frames_left_in_phase == 0 {
            self.phase = self.phase.next();
            self.frames_left_in_phase = phase_length(self.phase, &mut self.rng);
            log::debug!("demo load phase -> {}", self.phase);
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn strobe_state(&self) -> Option<StroboscopicState> {
        self.strobe_state
    }

    pub fn last_cost_ms(&self) -> f64 {
        self.last_cost_ms
    }

    pub fn last_drawn(&self) -> usize {
        self.last_drawn
    }

    pub fn spikes(&self) -> u64 {
        self.spikes
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

// ============================================================================
// HELPERS
// ============================================================================

const AVERAGE_POINT_SIZE: f64 = 2.0;

/// Uniform points in the unit disc with sizes in `[1, 3)`.
fn scatter_points(count: usize, rng: &mut StdRng) -> Vec<RenderPoint> {
    (0..count)
        .map(|_| {
            let r = rng.gen_range(0.0f64..1.0).sqrt();
            let theta = rng.gen_range(0.0..TAU);
            RenderPoint::new(r * theta.cos(), r * theta.sin(), rng.gen_range(1.0..3.0))
        })
        .collect()
}

fn phase_length(phase: LoadPhase, rng: &mut StdRng) -> u32 {
    let (min, max) = phase.duration_range();
    rng.gen_range(min..max)
}

fn spin_for(cost_ms: f64) {
    if !(cost_ms.is_finite() && cost_ms > 0.0) {
        return;
    }
    let until = Instant::now() + Duration::from_secs_f64(cost_ms / 1000.0);
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}
