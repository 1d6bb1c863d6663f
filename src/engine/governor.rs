use std::fmt;

use serde::Serialize;

use crate::config::SafetyLimits;
use crate::host::{FrameHost, TimerHandle};

/// Why the loop last stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` or `reset()` was called.
    Requested,
    /// The frame cap was exceeded.
    FrameCap { limit: u64 },
    /// The wall-clock safety timeout fired.
    Timeout { after_ms: u64 },
}

impl StopReason {
    /// Whether the stop was forced by a safety limit rather than the caller.
    pub fn is_safety(&self) -> bool {
        !matches!(self, StopReason::Requested)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stopped by caller"),
            StopReason::FrameCap { limit } => write!(f, "frame cap of {} exceeded", limit),
            StopReason::Timeout { after_ms } => {
                write!(f, "safety timeout after {} ms", after_ms)
            }
        }
    }
}

/// Outcome of counting one frame against the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    Proceed,
    Halt(StopReason),
}

/// Frame-count and wall-clock limits for one run of the loop.
#[derive(Debug, Default)]
pub struct SafetyGovernor {
    limits: SafetyLimits,
    frames: u64,
    timer: Option<TimerHandle>,
}

impl SafetyGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the frame counter and arm the timeout for a new run.
    pub fn arm(&mut self, host: &mut impl FrameHost, limits: SafetyLimits) {
        self.disarm(host);
        self.limits = limits;
        self.frames = 0;
        self.timer = limits.timeout_ms.map(|ms| host.arm_timeout(ms));
    }

    pub fn disarm(&mut self, host: &mut impl FrameHost) {
        if let Some(timer) = self.timer.take() {
            host.disarm_timeout(timer);
        }
    }

    /// Count a frame. Halts once the count goes past `max_frames`.
    pub fn admit_frame(&mut self) -> FrameVerdict {
        self.frames += 1;
        match self.limits.max_frames {
            Some(limit) if self.frames > limit => FrameVerdict::Halt(StopReason::FrameCap { limit }),
            _ => FrameVerdict::Proceed,
        }
    }

    /// Match an expired timer against ours.
    pub fn on_timeout(&mut self, handle: TimerHandle) -> Option<StopReason> {
        if self.timer != Some(handle) {
            return None;
        }
        self.timer = None;
        Some(StopReason::Timeout {
            after_ms: self.limits.timeout_ms.unwrap_or_default(),
        })
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEvent, ManualHost};

    #[test]
    fn test_frame_cap_halts_after_limit() {
        let mut host = ManualHost::new();
        let mut governor = SafetyGovernor::new();
        governor.arm(
            &mut host,
            SafetyLimits {
                max_frames: Some(3),
                timeout_ms: None,
            },
        );

        for _ in 0..3 {
            assert_eq!(governor.admit_frame(), FrameVerdict::Proceed);
        }
        assert_eq!(
            governor.admit_frame(),
            FrameVerdict::Halt(StopReason::FrameCap { limit: 3 })
        );
    }

    #[test]
    fn test_unlimited_never_halts() {
        let mut host = ManualHost::new();
        let mut governor = SafetyGovernor::new();
        governor.arm(&mut host, SafetyLimits::unlimited());
        for _ in 0..10_000 {
            assert_eq!(governor.admit_frame(), FrameVerdict::Proceed);
        }
        assert!(!governor.is_armed());
        assert_eq!(host.armed_timers(), 0);
    }

    #[test]
    fn test_timeout_matches_only_own_timer() {
        let mut host = ManualHost::new();
        let mut governor = SafetyGovernor::new();
        governor.arm(&mut host, SafetyLimits::default());

        assert_eq!(governor.on_timeout(TimerHandle(9999)), None);

        host.advance(30_000.0);
        let Some(HostEvent::Timeout(handle)) = host.poll() else {
            panic!("expected the safety timeout to fire");
        };
        assert_eq!(
            governor.on_timeout(handle),
            Some(StopReason::Timeout { after_ms: 30_000 })
        );
        assert_eq!(governor.on_timeout(handle), None);
    }

    #[test]
    fn test_rearm_replaces_timer_and_counter() {
        let mut host = ManualHost::new();
        let mut governor = SafetyGovernor::new();
        governor.arm(&mut host, SafetyLimits::default());
        governor.admit_frame();
        governor.arm(&mut host, SafetyLimits::default());

        assert_eq!(governor.frames(), 0);
        assert_eq!(host.armed_timers(), 1);
    }

    #[test]
    fn test_stop_reason_classification() {
        assert!(!StopReason::Requested.is_safety());
        assert!(StopReason::FrameCap { limit: 1000 }.is_safety());
        assert!(StopReason::Timeout { after_ms: 30_000 }.is_safety());
        assert_eq!(
            StopReason::FrameCap { limit: 1000 }.to_string(),
            "frame cap of 1000 exceeded"
        );
    }
}
