//! The animation loop and the contract every engine variant shares.

pub mod callbacks;
pub mod core;
pub mod governor;
pub mod state;

use tokio::sync::watch;

pub use callbacks::{FrameCallbacks, FrameEnd, FrameTick};
pub use self::core::AnimationCore;
pub use governor::{FrameVerdict, SafetyGovernor, StopReason};
pub use state::{AnimationState, PerformanceMetrics, PerformanceStats, QualityReport};

use crate::config::AnimationConfigPatch;
use crate::host::FrameHost;

/// Public surface of every engine: the core loop and its adaptive wrappers.
///
/// None of these operations fail. Misuse (starting twice, stopping a stopped
/// loop) is logged and otherwise ignored.
pub trait AnimationEngine {
    type Host: FrameHost;

    /// Begin the loop with the given hooks. Ignored with a warning if the
    /// loop is already running.
    fn start(&mut self, callbacks: FrameCallbacks);

    /// Cancel the pending frame and the safety timeout. Idempotent.
    fn stop(&mut self);

    /// `stop()` plus zeroing all state and timing history.
    fn reset(&mut self);

    /// Merge new settings into the live config, effective next tick.
    fn update_config(&mut self, patch: AnimationConfigPatch);

    fn performance_stats(&self) -> PerformanceStats;

    fn state(&self) -> &AnimationState;

    /// Receiver that sees every published `AnimationState`.
    fn subscribe(&self) -> watch::Receiver<AnimationState>;

    /// Dispatch every host event that is due. Returns how many were handled.
    fn pump(&mut self) -> usize;

    fn host(&self) -> &Self::Host;

    fn host_mut(&mut self) -> &mut Self::Host;

    fn is_running(&self) -> bool {
        self.state().is_running
    }

    /// Active quality level, for variants that adapt it.
    fn quality(&self) -> Option<QualityReport> {
        None
    }
}
