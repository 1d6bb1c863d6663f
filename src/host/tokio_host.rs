use std::time::Duration;

use tokio::time::Instant;

use super::{FrameHandle, FrameHost, HostEvent, TimerHandle};
use crate::engine::AnimationEngine;

/// Default simulated display refresh rate.
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

/// How long `drive` sleeps when the host reports nothing pending.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Host backed by the tokio clock.
///
/// Frame opportunities arrive on a fixed refresh grid anchored at
/// construction, like vblank on a display: a request made anywhere inside a
/// refresh interval is answered at the next grid line.
#[derive(Debug)]
pub struct TokioHost {
    origin: Instant,
    refresh_interval: Duration,
    next_id: u64,
    pending_frame: Option<(FrameHandle, Instant)>,
    last_frame_at: Option<Instant>,
    timers: Vec<(TimerHandle, Instant)>,
}

impl TokioHost {
    pub fn new() -> Self {
        Self::with_refresh_rate(DEFAULT_REFRESH_HZ)
    }

    /// Host delivering frames at `refresh_hz` opportunities per second.
    pub fn with_refresh_rate(refresh_hz: f64) -> Self {
        let refresh_hz = if refresh_hz.is_finite() && refresh_hz > 0.0 {
            refresh_hz
        } else {
            log::warn!(
                "refresh rate {} is not usable, falling back to {}",
                refresh_hz,
                DEFAULT_REFRESH_HZ
            );
            DEFAULT_REFRESH_HZ
        };
        Self {
            origin: Instant::now(),
            refresh_interval: Duration::from_secs_f64(1.0 / refresh_hz),
            next_id: 0,
            pending_frame: None,
            last_frame_at: None,
            timers: Vec::new(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// First refresh grid line strictly after `now`.
    fn next_refresh_after(&self, now: Instant) -> Instant {
        let elapsed = now.duration_since(self.origin).as_secs_f64();
        let interval = self.refresh_interval.as_secs_f64();
        let slots = (elapsed / interval).floor() + 1.0;
        self.origin + Duration::from_secs_f64(slots * interval)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Default for TokioHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHost for TokioHost {
    fn now_ms(&self) -> f64 {
        Instant::now().duration_since(self.origin).as_secs_f64() * 1000.0
    }

    fn frame_time_ms(&self) -> f64 {
        match self.last_frame_at {
            Some(at) => at.duration_since(self.origin).as_secs_f64() * 1000.0,
            None => self.now_ms(),
        }
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id());
        let due = self.next_refresh_after(Instant::now());
        self.pending_frame = Some((handle, due));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if matches!(self.pending_frame, Some((pending, _)) if pending == handle) {
            self.pending_frame = None;
        }
    }

    fn arm_timeout(&mut self, delay_ms: u64) -> TimerHandle {
        let handle = TimerHandle(self.next_id());
        self.timers
            .push((handle, Instant::now() + Duration::from_millis(delay_ms)));
        handle
    }

    fn disarm_timeout(&mut self, handle: TimerHandle) {
        self.timers.retain(|(h, _)| *h != handle);
    }

    fn poll(&mut self) -> Option<HostEvent> {
        let now = Instant::now();

        let due = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .min_by_key(|(_, (_, deadline))| *deadline)
            .map(|(i, _)| i);
        if let Some(index) = due {
            let (handle, _) = self.timers.remove(index);
            return Some(HostEvent::Timeout(handle));
        }

        match self.pending_frame {
            Some((handle, at)) if at <= now => {
                self.pending_frame = None;
                self.last_frame_at = Some(at);
                Some(HostEvent::Frame(handle))
            }
            _ => None,
        }
    }

    fn time_until_next_event(&self) -> Option<Duration> {
        let now = Instant::now();
        self.pending_frame
            .iter()
            .map(|(_, at)| *at)
            .chain(self.timers.iter().map(|(_, deadline)| *deadline))
            .min()
            .map(|at| at.saturating_duration_since(now))
    }
}

/// Run `engine` on the tokio clock until it stops.
///
/// The engine must already be started. Returns as soon as the loop halts,
/// whether by `stop()` from a callback owner or by a safety limit.
pub async fn drive<E>(engine: &mut E)
where
    E: AnimationEngine<Host = TokioHost> + ?Sized,
{
    while engine.is_running() {
        engine.pump();
        if !engine.is_running() {
            break;
        }
        let wait = engine.host().time_until_next_event().unwrap_or(IDLE_WAIT);
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnimationConfig, SafetyLimits};
    use crate::engine::{AnimationCore, FrameCallbacks, StopReason};

    #[tokio::test]
    async fn test_frame_arrives_on_next_refresh() {
        let mut host = TokioHost::with_refresh_rate(200.0);
        let handle = host.request_frame();
        assert_eq!(host.poll(), None);

        let wait = host.time_until_next_event().unwrap();
        assert!(wait <= host.refresh_interval());
        tokio::time::sleep(wait).await;

        assert_eq!(host.poll(), Some(HostEvent::Frame(handle)));
        assert_eq!(host.poll(), None);
    }

    #[tokio::test]
    async fn test_cancelled_frame_is_dropped() {
        let mut host = TokioHost::with_refresh_rate(200.0);
        let handle = host.request_frame();
        host.cancel_frame(handle);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(host.poll(), None);
        assert_eq!(host.time_until_next_event(), None);
    }

    #[tokio::test]
    async fn test_timeout_expires() {
        let mut host = TokioHost::new();
        let timer = host.arm_timeout(5);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(host.poll(), Some(HostEvent::Timeout(timer)));
    }

    #[test]
    fn test_invalid_refresh_rate_falls_back() {
        let host = TokioHost::with_refresh_rate(0.0);
        let expected = Duration::from_secs_f64(1.0 / DEFAULT_REFRESH_HZ);
        assert_eq!(host.refresh_interval(), expected);
    }

    #[tokio::test]
    async fn test_drive_runs_until_frame_cap() {
        let config = AnimationConfig {
            frame_rate: 500.0,
            max_fps: 500.0,
            safety: SafetyLimits {
                max_frames: Some(5),
                timeout_ms: Some(5_000),
            },
            ..AnimationConfig::default()
        };
        let mut core = AnimationCore::new(config, TokioHost::with_refresh_rate(500.0));
        core.start(FrameCallbacks::new());

        drive(&mut core).await;

        assert!(!core.is_running());
        assert_eq!(core.state().frame_count, 5);
        assert_eq!(
            core.last_stop_reason(),
            Some(StopReason::FrameCap { limit: 5 })
        );
    }
}
