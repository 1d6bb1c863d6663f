use std::panic::{self, AssertUnwindSafe};

use super::PerformanceMetrics;
use crate::error::{CallbackError, CallbackResult};

/// What `on_update` and `on_render` receive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Host time of this frame in milliseconds.
    pub time_ms: f64,
    /// Milliseconds since the previous processed frame.
    pub delta_ms: f64,
    /// Frame count before this frame was counted.
    pub frame: u64,
}

/// What `on_frame_end` receives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEnd {
    pub time_ms: f64,
    /// Frame count including this frame.
    pub frame_count: u64,
    pub fps: f64,
    pub average_fps: f64,
    /// Phase timings of this frame.
    pub metrics: PerformanceMetrics,
}

type FrameStartFn = Box<dyn FnMut(f64) -> CallbackResult>;
type TickFn = Box<dyn FnMut(&FrameTick) -> CallbackResult>;
type FrameEndFn = Box<dyn FnMut(&FrameEnd) -> CallbackResult>;

/// Lifecycle hooks handed to `start()`.
///
/// Invocation order inside one frame is fixed:
/// `on_frame_start` -> `on_update` -> `on_render` -> state publish -> `on_frame_end`.
/// A hook returning `Err` or panicking is logged and the frame continues.
#[derive(Default)]
pub struct FrameCallbacks {
    pub(crate) on_frame_start: Option<FrameStartFn>,
    pub(crate) on_update: Option<TickFn>,
    pub(crate) on_render: Option<TickFn>,
    pub(crate) on_frame_end: Option<FrameEndFn>,
}

impl FrameCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_frame_start<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64) -> CallbackResult + 'static,
    {
        self.on_frame_start = Some(Box::new(f));
        self
    }

    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: FnMut(&FrameTick) -> CallbackResult + 'static,
    {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_render<F>(mut self, f: F) -> Self
    where
        F: FnMut(&FrameTick) -> CallbackResult + 'static,
    {
        self.on_render = Some(Box::new(f));
        self
    }

    pub fn on_frame_end<F>(mut self, f: F) -> Self
    where
        F: FnMut(&FrameEnd) -> CallbackResult + 'static,
    {
        self.on_frame_end = Some(Box::new(f));
        self
    }

    /// Run `observer` at every frame end, ahead of any existing `on_frame_end`.
    pub(crate) fn observe_frame_end<F>(mut self, mut observer: F) -> Self
    where
        F: FnMut(&FrameEnd) + 'static,
    {
        let mut inner = self.on_frame_end.take();
        self.on_frame_end = Some(Box::new(move |end: &FrameEnd| {
            observer(end);
            match inner.as_mut() {
                Some(callback) => callback(end),
                None => Ok(()),
            }
        }));
        self
    }

    /// Forward `on_update` only for ticks `allow` accepts. Rejected ticks are
    /// dropped silently. No-op when there is no update hook.
    pub(crate) fn filter_update<P>(mut self, mut allow: P) -> Self
    where
        P: FnMut(&FrameTick) -> bool + 'static,
    {
        if let Some(mut inner) = self.on_update.take() {
            self.on_update = Some(Box::new(move |tick: &FrameTick| {
                if allow(tick) {
                    inner(tick)
                } else {
                    Ok(())
                }
            }));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_frame_start.is_none()
            && self.on_update.is_none()
            && self.on_render.is_none()
            && self.on_frame_end.is_none()
    }
}

impl std::fmt::Debug for FrameCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCallbacks")
            .field("on_frame_start", &self.on_frame_start.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_render", &self.on_render.is_some())
            .field("on_frame_end", &self.on_frame_end.is_some())
            .finish()
    }
}

/// Run one hook, containing both `Err` returns and panics.
///
/// Returns `false` when the hook faulted.
pub(crate) fn invoke<F>(hook: &'static str, frame: u64, f: F) -> bool
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log::error!("{} failed on frame {}: {}", hook, frame, err);
            false
        }
        Err(payload) => {
            let err = CallbackError::new(panic_message(payload.as_ref()));
            log::error!("{} panicked on frame {}: {}", hook, frame, err);
            false
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tick(frame: u64) -> FrameTick {
        FrameTick {
            time_ms: frame as f64 * 16.0,
            delta_ms: 16.0,
            frame,
        }
    }

    #[test]
    fn test_invoke_contains_errors() {
        assert!(invoke("on_update", 1, || Ok(())));
        assert!(!invoke("on_update", 1, || Err(CallbackError::new("boom"))));
    }

    #[test]
    fn test_invoke_contains_panics() {
        assert!(!invoke("on_render", 3, || panic!("render exploded")));
        assert!(!invoke("on_render", 3, || {
            let idx = 7;
            panic!("bad index {}", idx)
        }));
    }

    #[test]
    fn test_observe_frame_end_runs_before_inner() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let inner_order = Rc::clone(&order);
        let observer_order = Rc::clone(&order);

        let mut callbacks = FrameCallbacks::new()
            .on_frame_end(move |_| {
                inner_order.borrow_mut().push("inner");
                Ok(())
            })
            .observe_frame_end(move |_| observer_order.borrow_mut().push("observer"));

        let end = FrameEnd {
            time_ms: 0.0,
            frame_count: 1,
            fps: 60.0,
            average_fps: 60.0,
            metrics: PerformanceMetrics::default(),
        };
        let callback = callbacks.on_frame_end.as_mut().unwrap();
        callback(&end).unwrap();

        assert_eq!(*order.borrow(), vec!["observer", "inner"]);
    }

    #[test]
    fn test_observe_frame_end_without_inner() {
        let seen = Rc::new(RefCell::new(0u64));
        let seen_in = Rc::clone(&seen);
        let mut callbacks =
            FrameCallbacks::new().observe_frame_end(move |end| *seen_in.borrow_mut() = end.frame_count);

        let end = FrameEnd {
            time_ms: 0.0,
            frame_count: 9,
            fps: 0.0,
            average_fps: 0.0,
            metrics: PerformanceMetrics::default(),
        };
        (callbacks.on_frame_end.as_mut().unwrap())(&end).unwrap();
        assert_eq!(*seen.borrow(), 9);
    }

    #[test]
    fn test_filter_update_drops_rejected_ticks() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls_in = Rc::clone(&calls);

        let mut callbacks = FrameCallbacks::new()
            .on_update(move |t| {
                calls_in.borrow_mut().push(t.frame);
                Ok(())
            })
            .filter_update(|t| t.frame % 2 == 0);

        let update = callbacks.on_update.as_mut().unwrap();
        for frame in 0..6 {
            update(&tick(frame)).unwrap();
        }
        assert_eq!(*calls.borrow(), vec![0, 2, 4]);
    }

    #[test]
    fn test_filter_update_without_hook_is_noop() {
        let callbacks = FrameCallbacks::new().filter_update(|_| true);
        assert!(callbacks.is_empty());
    }
}
