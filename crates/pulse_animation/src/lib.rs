//! Pulse Animation Engine
//!
//! Closed-form spring physics on a cooperative frame loop.
//!
//! # Features
//!
//! - **Exact Spring Physics**: analytic damped-harmonic-oscillator solver,
//!   branch-correct across the underdamped, critical, and overdamped regimes
//! - **Interruptible**: retarget or re-tune a spring mid-flight with position
//!   and velocity preserved exactly
//! - **Cooperative Scheduling**: one frame loop drives every active spring,
//!   self-starting, self-stopping, and safe against re-entrant registration
//! - **Injected Frame Primitive**: bring your own vsync callback, fall back
//!   to a fixed-interval timer, or drive frames by hand in tests
//!
//! # Example
//!
//! ```
//! use pulse_animation::{ManualFrameSource, Scheduler, Spring};
//! use std::time::Duration;
//!
//! let frames = ManualFrameSource::new();
//! let scheduler = Scheduler::new(frames.clone());
//!
//! let spring = Spring::with_scheduler(scheduler, 1.0, 0.3, 0.0);
//! spring.set_target(100.0);
//! spring.start();
//!
//! for _ in 0..120 {
//!     frames.advance(Duration::from_millis(16));
//! }
//! assert_eq!(spring.value(), 100.0);
//! ```

pub mod frame;
pub mod oscillator;
pub mod scheduler;
pub mod spring;

pub use frame::{
    FrameCallback, FrameSource, IntervalFrameSource, ManualFrameSource, FALLBACK_FRAME_INTERVAL,
};
pub use oscillator::Oscillator;
pub use scheduler::{global_scheduler, set_global_scheduler, Animate, Scheduler};
pub use spring::{Keyframe, Spring, SpringParams, SubscriptionId, DEFAULT_SAMPLE_SCALE};
