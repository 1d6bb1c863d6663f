//! Cadence: a frame-paced animation loop that holds a target frame rate.
//!
//! The [`engine::AnimationCore`] runs a self-rescheduling tick on whatever
//! [`host::FrameHost`] it owns, gates work to the configured frame rate,
//! publishes timing state after every processed frame and stops itself when
//! a safety limit trips. Three wrappers share its public surface
//! ([`engine::AnimationEngine`]):
//!
//! - [`adaptive::AdaptiveAnimationEngine`] trades quality for frame rate with
//!   a hysteresis controller
//! - [`throttle::ThrottledAnimationEngine`] rate-limits the update hook
//! - [`optimized::PerformanceOptimizedEngine`] steps a preset ladder by FPS
//!   ratio and offers culling and level-of-detail helpers
//!
//! ```no_run
//! use cadence::config::AnimationConfig;
//! use cadence::engine::{AnimationCore, AnimationEngine, FrameCallbacks};
//! use cadence::host::{drive, TokioHost};
//!
//! # async fn run() {
//! let mut engine = AnimationCore::new(AnimationConfig::with_frame_rate(30.0), TokioHost::new());
//! engine.start(FrameCallbacks::new().on_render(|tick| {
//!     println!("frame {} after {:.1} ms", tick.frame, tick.delta_ms);
//!     Ok(())
//! }));
//! drive(&mut engine).await;
//! # }
//! ```

pub mod adaptive;
pub mod app;
pub mod clock;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod host;
pub mod monitor;
pub mod optimized;
pub mod strobe;
pub mod throttle;
pub mod watch;

pub use config::{AnimationConfig, AnimationConfigPatch, EngineSettings};
pub use engine::{AnimationEngine, FrameCallbacks};
pub use error::{CadenceError, CadenceResult, CallbackError, CallbackResult};
