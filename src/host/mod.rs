//! The environment an engine runs in: a monotonic clock, a "call me before
//! the next frame" primitive and one-shot timers.
//!
//! Engines own their host and never block. The outer driver calls
//! `AnimationEngine::pump`, which drains `FrameHost::poll` and dispatches
//! whatever is due.

pub mod manual;
pub mod tokio_host;

use std::time::Duration;

pub use manual::ManualHost;
pub use tokio_host::{drive, TokioHost, DEFAULT_REFRESH_HZ};

/// Ticket for a requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Ticket for an armed timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Something the host wants the engine to handle now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A requested frame opportunity has arrived.
    Frame(FrameHandle),
    /// An armed timeout has expired.
    Timeout(TimerHandle),
}

pub trait FrameHost {
    /// Monotonic time in milliseconds.
    fn now_ms(&self) -> f64;

    /// Timestamp of the frame just delivered by `poll`. Hosts with a refresh
    /// grid report the grid line, the way a vsync timestamp would.
    fn frame_time_ms(&self) -> f64 {
        self.now_ms()
    }

    /// Ask for one callback at the next frame opportunity.
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraw a pending frame request. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Arm a one-shot timeout `delay_ms` from now.
    fn arm_timeout(&mut self, delay_ms: u64) -> TimerHandle;

    /// Disarm a timeout. Unknown or expired handles are ignored.
    fn disarm_timeout(&mut self, handle: TimerHandle);

    /// Next due event, if any. Expired timeouts come before frames.
    fn poll(&mut self) -> Option<HostEvent>;

    /// How long until `poll` could return something, `None` when nothing
    /// is pending.
    fn time_until_next_event(&self) -> Option<Duration>;
}
