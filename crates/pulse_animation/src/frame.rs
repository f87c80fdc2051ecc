//! Frame-scheduling primitive
//!
//! The scheduler never talks to the platform directly; it is handed a
//! [`FrameSource`] that schedules one callback per display frame. Hosts with
//! a real vsync signal implement the trait themselves; [`IntervalFrameSource`]
//! is the documented fallback for platforms without one, and
//! [`ManualFrameSource`] drives frames deterministically in tests and
//! headless tools.

use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// A callback fired once on the next frame, receiving the frame timestamp on
/// the source's clock.
pub type FrameCallback = Box<dyn FnOnce(Duration) + Send>;

/// Frame interval of the fallback source: ~60 frames per second.
pub const FALLBACK_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// A host-provided per-frame callback primitive.
///
/// Timestamps are measured from an arbitrary epoch fixed for the lifetime of
/// the source; only differences between them are meaningful.
pub trait FrameSource: Send + Sync {
    /// Schedule `callback` to run on the next frame.
    ///
    /// Implementations must not invoke the callback synchronously from
    /// inside this call; the callback re-enters the scheduler.
    fn schedule_frame(&self, callback: FrameCallback);

    /// Current time on the clock frame timestamps are reported against.
    fn now(&self) -> Duration;
}

/// Fallback frame source for hosts without a vsync callback: a worker thread
/// fires each scheduled callback after a fixed interval.
pub struct IntervalFrameSource {
    origin: Instant,
    frames: Sender<FrameCallback>,
}

impl IntervalFrameSource {
    pub fn new(interval: Duration) -> Self {
        let origin = Instant::now();
        let (frames, queue) = mpsc::channel::<FrameCallback>();
        // The worker exits once the source (and with it the sender) drops.
        thread::spawn(move || {
            while let Ok(callback) = queue.recv() {
                thread::sleep(interval);
                callback(origin.elapsed());
            }
        });
        Self { origin, frames }
    }
}

impl Default for IntervalFrameSource {
    fn default() -> Self {
        Self::new(FALLBACK_FRAME_INTERVAL)
    }
}

impl FrameSource for IntervalFrameSource {
    fn schedule_frame(&self, callback: FrameCallback) {
        // Send fails only during teardown, when frames no longer matter.
        let _ = self.frames.send(callback);
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic frame source with a hand-cranked clock.
///
/// Callbacks queue until [`advance`](Self::advance) moves the clock forward
/// and fires them; a callback scheduled while a batch runs waits for the next
/// call. [`pending`](Self::pending) exposes the number of in-flight frame
/// callbacks, which is how tests observe that only one callback chain exists.
#[derive(Default)]
pub struct ManualFrameSource {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    pending: Vec<FrameCallback>,
    now: Duration,
}

impl ManualFrameSource {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// Number of scheduled-but-unfired frame callbacks.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Advance the clock by `dt` and fire the callbacks that were pending on
    /// entry. Returns how many fired.
    pub fn advance(&self, dt: Duration) -> usize {
        let (batch, now) = {
            let mut state = self.state.lock().unwrap();
            state.now += dt;
            (std::mem::take(&mut state.pending), state.now)
        };
        let fired = batch.len();
        for callback in batch {
            callback(now);
        }
        fired
    }
}

impl FrameSource for ManualFrameSource {
    fn schedule_frame(&self, callback: FrameCallback) {
        self.state.lock().unwrap().pending.push(callback);
    }

    fn now(&self) -> Duration {
        self.state.lock().unwrap().now
    }
}
