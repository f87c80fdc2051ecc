//! Cooperative frame loop
//!
//! One loop drives every registered consumer once per display frame with the
//! elapsed wall-clock delta. The loop starts itself when the first consumer
//! registers, stops itself when the set drains, and survives a target
//! registering or deregistering (itself included) from inside its own
//! `update` call. A generation counter invalidates frame callbacks left over
//! from before a stop/start cycle, so at most one callback chain is ever
//! live.
//!
//! Hosts that suspend rendering (a hidden window, a backgrounded tab) call
//! [`Scheduler::stop`] on the way out and [`Scheduler::start`] on the way
//! back in; nothing else is required to pause and resume every animation.

use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use smallvec::SmallVec;

use crate::frame::{FrameSource, IntervalFrameSource};

/// Capability required of anything driven by the [`Scheduler`]: consume one
/// frame's elapsed time, in seconds.
pub trait Animate: Send + Sync {
    fn update(&self, dt: f64);
}

/// Shared handle to a frame loop. Cloning is cheap and every clone drives the
/// same loop.
///
/// The scheduler holds its targets weakly: registration never extends a
/// target's lifetime, and a dropped target is purged on the next frame.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

struct SchedulerShared {
    frames: Arc<dyn FrameSource>,
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    targets: Vec<Weak<dyn Animate>>,
    generation: u64,
    running: bool,
    previous_timestamp: Duration,
    speed_multiplier: f64,
}

impl Scheduler {
    pub fn new(frames: Arc<dyn FrameSource>) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                frames,
                state: Mutex::new(SchedulerState {
                    targets: Vec::new(),
                    generation: 0,
                    running: false,
                    previous_timestamp: Duration::ZERO,
                    speed_multiplier: 1.0,
                }),
            }),
        }
    }

    /// Add `target` to the frame loop, starting the loop if it is idle.
    /// Registering an already-registered target is a no-op.
    pub fn register(&self, target: Weak<dyn Animate>) {
        let mut state = self.shared.state.lock().unwrap();
        if !state.targets.iter().any(|known| known.ptr_eq(&target)) {
            state.targets.push(target);
        }
        if !state.running {
            Self::start_locked(&self.shared, &mut state);
        }
    }

    /// Remove `target` from the frame loop. The loop itself stops on its next
    /// frame if nothing remains registered.
    pub fn deregister(&self, target: &Weak<dyn Animate>) {
        let mut state = self.shared.state.lock().unwrap();
        state.targets.retain(|known| !known.ptr_eq(target));
    }

    /// Start the frame loop. No-op while already running.
    pub fn start(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if !state.running {
            Self::start_locked(&self.shared, &mut state);
        }
    }

    /// Stop the frame loop; any frame callback still in flight becomes a
    /// no-op. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.running {
            state.running = false;
            tracing::debug!("frame loop suspended");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().unwrap().running
    }

    /// Number of live registered targets.
    pub fn target_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap()
            .targets
            .iter()
            .filter(|target| target.strong_count() > 0)
            .count()
    }

    /// Global scalar applied to every delivered frame delta.
    pub fn speed_multiplier(&self) -> f64 {
        self.shared.state.lock().unwrap().speed_multiplier
    }

    pub fn set_speed_multiplier(&self, speed_multiplier: f64) {
        self.shared.state.lock().unwrap().speed_multiplier = speed_multiplier;
    }

    fn start_locked(shared: &Arc<SchedulerShared>, state: &mut SchedulerState) {
        state.running = true;
        state.generation += 1;
        state.previous_timestamp = shared.frames.now();
        tracing::debug!(generation = state.generation, "frame loop started");
        Self::schedule_step(shared, state.generation);
    }

    fn schedule_step(shared: &Arc<SchedulerShared>, generation: u64) {
        let frames = Arc::clone(&shared.frames);
        let shared = Arc::clone(shared);
        frames.schedule_frame(Box::new(move |timestamp| {
            Self::step(&shared, generation, timestamp);
        }));
    }

    fn step(shared: &Arc<SchedulerShared>, generation: u64, timestamp: Duration) {
        let batch: SmallVec<[Arc<dyn Animate>; 8]>;
        let dt;
        {
            let mut state = shared.state.lock().unwrap();
            if generation != state.generation || !state.running {
                // A stale callback from before a stop/start cycle.
                return;
            }
            state.targets.retain(|target| target.strong_count() > 0);
            if state.targets.is_empty() {
                state.running = false;
                tracing::debug!("frame loop stopped: no targets");
                return;
            }
            // Chain the next frame before dispatching, so a target mutating
            // the schedule from inside `update` cannot break the loop.
            Self::schedule_step(shared, generation);
            dt = timestamp
                .saturating_sub(state.previous_timestamp)
                .as_secs_f64()
                * state.speed_multiplier;
            state.previous_timestamp = timestamp;
            batch = state.targets.iter().filter_map(|target| target.upgrade()).collect();
        }
        // Dispatch with the lock released: targets may register, deregister,
        // or stop the loop from here.
        for target in batch {
            target.update(dt);
        }
    }
}

// ============================================================================
// Global scheduler
// ============================================================================

static GLOBAL_SCHEDULER: OnceLock<Scheduler> = OnceLock::new();

/// The process-wide scheduler every [`Spring`](crate::Spring) uses by
/// default. Lazily backed by the fallback interval source unless
/// [`set_global_scheduler`] installed a host-specific one first.
pub fn global_scheduler() -> Scheduler {
    GLOBAL_SCHEDULER
        .get_or_init(|| Scheduler::new(Arc::new(IntervalFrameSource::default())))
        .clone()
}

/// Install the process-wide scheduler. Call once at startup, before anything
/// touches [`global_scheduler`].
///
/// # Panics
///
/// Panics if the global scheduler has already been initialized.
pub fn set_global_scheduler(scheduler: Scheduler) {
    if GLOBAL_SCHEDULER.set(scheduler).is_err() {
        panic!("set_global_scheduler() called after the global scheduler was initialized");
    }
}
