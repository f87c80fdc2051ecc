//! Spring-animated values
//!
//! A [`Spring`] binds one [`Oscillator`] to the frame loop and presents a
//! mutable-value surface: set a target and the value glides toward it with
//! physically continuous position and velocity, no matter how often the
//! target, damping, or period change mid-flight. Subscribers receive the
//! current value once per frame while the spring is registered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use smallvec::SmallVec;

use crate::oscillator::Oscillator;
use crate::scheduler::{global_scheduler, Animate, Scheduler};

/// Default step divisor for [`Spring::keyframes`].
pub const DEFAULT_SAMPLE_SCALE: f64 = 60.0;

/// Hard ceiling on the keyframe sampling clock, in seconds. Bounds the
/// sequence for a spring whose stop predicate never fires.
const MAX_KEYFRAME_TIME: f64 = 1000.0;

const DEFAULT_TOLERANCE: f64 = 0.001;

// ============================================================================
// Parameters and presets
// ============================================================================

/// A damping-ratio/period pair describing a spring's feel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringParams {
    pub damping_ratio: f64,
    /// Nominal oscillation period in seconds.
    pub period: f64,
}

impl SpringParams {
    pub fn new(damping_ratio: f64, period: f64) -> Self {
        Self {
            damping_ratio,
            period,
        }
    }

    /// A gentle, slow spring (good for page transitions)
    pub fn gentle() -> Self {
        Self::new(0.64, 0.57)
    }

    /// A wobbly spring with overshoot (good for playful UI)
    pub fn wobbly() -> Self {
        Self::new(0.45, 0.47)
    }

    /// A stiff, snappy spring (good for buttons)
    pub fn stiff() -> Self {
        Self::new(0.75, 0.31)
    }

    /// A very stiff spring with minimal oscillation (good for quick responses)
    pub fn snappy() -> Self {
        Self::new(0.82, 0.26)
    }

    /// A slow spring with no overshoot (critically damped)
    pub fn molasses() -> Self {
        Self::new(1.0, 0.63)
    }

    /// Check if the spring is underdamped (will oscillate)
    pub fn is_underdamped(&self) -> bool {
        self.damping_ratio < 1.0
    }

    /// Check if the spring is critically damped (no oscillation, fastest settling)
    pub fn is_critically_damped(&self) -> bool {
        (self.damping_ratio - 1.0).abs() < 0.01
    }

    /// Check if the spring is overdamped (slow settling, no oscillation)
    pub fn is_overdamped(&self) -> bool {
        self.damping_ratio > 1.0
    }
}

impl Default for SpringParams {
    fn default() -> Self {
        Self::stiff()
    }
}

/// One pre-sampled point of a spring's future trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe {
    pub value: f64,
    /// Seconds after the sampling start.
    pub time: f64,
}

/// Handle returned by [`Spring::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type UpdateFn = Arc<dyn Fn(f64) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    callback: UpdateFn,
}

// ============================================================================
// Spring
// ============================================================================

/// A spring-animated value.
///
/// Cloning yields another handle to the same spring, so observers can keep a
/// shared reference while one owner drives mutation. While registered (see
/// [`start`](Self::start)), the frame loop advances the spring's clock and
/// notifies subscribers once per frame; with `stop_automatically` set the
/// spring snaps to its target and deregisters itself once within tolerance.
#[derive(Clone)]
pub struct Spring {
    inner: Arc<SpringInner>,
}

struct SpringInner {
    self_weak: Weak<SpringInner>,
    scheduler: Scheduler,
    state: Mutex<SpringState>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
}

struct SpringState {
    oscillator: Oscillator,
    /// Set once the first explicit target arrives; `finish` is a no-op
    /// before that.
    target: Option<f64>,
    /// Seconds since the last hydration.
    elapsed: f64,
    tolerance: f64,
    stop_automatically: bool,
    locked: bool,
}

impl SpringState {
    fn value(&self) -> f64 {
        self.oscillator.value_at(self.elapsed)
    }

    fn velocity(&self) -> f64 {
        self.oscillator.velocity_at(self.elapsed)
    }

    fn wants_update(&self) -> bool {
        (self.value() - self.oscillator.target()).abs() + self.velocity().abs() > self.tolerance
    }
}

impl Spring {
    /// Spring at rest at 0.0, driven by the global scheduler.
    pub fn new(damping_ratio: f64, period: f64) -> Self {
        Self::with_value(damping_ratio, period, 0.0)
    }

    /// Spring at rest at `value`, driven by the global scheduler.
    pub fn with_value(damping_ratio: f64, period: f64, value: f64) -> Self {
        Self::with_scheduler(global_scheduler(), damping_ratio, period, value)
    }

    /// Spring configured from a [`SpringParams`] preset.
    pub fn with_params(params: SpringParams) -> Self {
        Self::new(params.damping_ratio, params.period)
    }

    /// Spring bound to an explicit scheduler instance.
    pub fn with_scheduler(
        scheduler: Scheduler,
        damping_ratio: f64,
        period: f64,
        value: f64,
    ) -> Self {
        let inner = Arc::new_cyclic(|self_weak| SpringInner {
            self_weak: self_weak.clone(),
            scheduler,
            state: Mutex::new(SpringState {
                oscillator: Oscillator::new(damping_ratio, period, value),
                target: None,
                elapsed: 0.0,
                tolerance: DEFAULT_TOLERANCE,
                stop_automatically: true,
                locked: false,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        });
        Self { inner }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn value(&self) -> f64 {
        self.state().value()
    }

    /// Jump the value, preserving the current velocity.
    pub fn set_value(&self, value: f64) {
        let mut state = self.state();
        let elapsed = state.elapsed;
        state.oscillator.reset_value(elapsed, value);
        state.elapsed = 0.0;
    }

    pub fn velocity(&self) -> f64 {
        self.state().velocity()
    }

    /// Override the velocity, preserving the current value.
    pub fn set_velocity(&self, velocity: f64) {
        let mut state = self.state();
        let elapsed = state.elapsed;
        state.oscillator.reset_velocity(elapsed, velocity);
        state.elapsed = 0.0;
    }

    /// The last explicitly set target, if any.
    pub fn target(&self) -> Option<f64> {
        self.state().target
    }

    /// Retarget the spring, keeping position and velocity continuous. No-op
    /// if `target` already is the current target.
    pub fn set_target(&self, target: f64) {
        let mut state = self.state();
        if state.target == Some(target) {
            return;
        }
        let elapsed = state.elapsed;
        state.oscillator.retarget(elapsed, target);
        state.target = Some(target);
        state.elapsed = 0.0;
    }

    pub fn damping_ratio(&self) -> f64 {
        self.state().oscillator.damping_ratio()
    }

    pub fn set_damping_ratio(&self, damping_ratio: f64) {
        let mut state = self.state();
        let elapsed = state.elapsed;
        state.oscillator.reset_damping_ratio(elapsed, damping_ratio);
        state.elapsed = 0.0;
    }

    pub fn period(&self) -> f64 {
        self.state().oscillator.period()
    }

    pub fn set_period(&self, period: f64) {
        let mut state = self.state();
        let elapsed = state.elapsed;
        state.oscillator.reset_period(elapsed, period);
        state.elapsed = 0.0;
    }

    /// Change both physical characteristics in one step: damping first at the
    /// live clock, then the period against the already-reset clock, so the
    /// intermediate state is never resampled.
    pub fn set_damping_ratio_and_period(&self, damping_ratio: f64, period: f64) {
        let mut state = self.state();
        let elapsed = state.elapsed;
        state.oscillator.reset_damping_ratio(elapsed, damping_ratio);
        state.oscillator.reset_period(0.0, period);
        state.elapsed = 0.0;
    }

    /// Rest threshold on `|value − target| + |velocity|`.
    pub fn tolerance(&self) -> f64 {
        self.state().tolerance
    }

    pub fn set_tolerance(&self, tolerance: f64) {
        self.state().tolerance = tolerance;
    }

    /// Whether the spring deregisters itself on reaching rest.
    pub fn stop_automatically(&self) -> bool {
        self.state().stop_automatically
    }

    pub fn set_stop_automatically(&self, stop_automatically: bool) {
        self.state().stop_automatically = stop_automatically;
    }

    /// A locked spring's physical clock is frozen: the value holds still
    /// while an external driver owns it, but per-frame notifications keep
    /// flowing to subscribers.
    pub fn locked(&self) -> bool {
        self.state().locked
    }

    pub fn set_locked(&self, locked: bool) {
        self.state().locked = locked;
    }

    /// True while the spring is outside its rest tolerance.
    pub fn wants_update(&self) -> bool {
        self.state().wants_update()
    }

    // ------------------------------------------------------------------
    // Scheduling and notification
    // ------------------------------------------------------------------

    /// Register with the scheduler; the frame loop starts if it was idle.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Deregister from the scheduler.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Snap to the target: velocity zero, value exactly on target, one final
    /// notification, then deregister. No-op if no target was ever set.
    pub fn finish(&self) {
        self.inner.finish();
    }

    /// Advance the spring by one frame delta. Invoked by the scheduler while
    /// registered; callable directly by hosts that drive frames themselves.
    pub fn update(&self, dt: f64) {
        Animate::update(&*self.inner, dt);
    }

    /// Subscribe to per-frame value notifications. Callbacks run
    /// synchronously in subscription order; changes to the subscriber list
    /// from inside a callback apply from the next notification on.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.id != id);
    }

    // ------------------------------------------------------------------
    // Keyframe pre-sampling
    // ------------------------------------------------------------------

    /// Pre-sample the spring's trajectory from its current state, without
    /// touching the scheduler or the spring itself.
    ///
    /// Emits `(value, time)` pairs until `should_stop(value, velocity, time)`
    /// answers true, stepping by `max(0.01, sqrt(velocity) / sample_scale)`
    /// seconds. The sampling clock is clamped to 1000 s, so the sequence is
    /// finite even when the predicate never fires; on the downswing, where
    /// the velocity is negative, the step degrades to the 0.01 s floor.
    pub fn keyframes<F>(&self, mut should_stop: F, sample_scale: f64) -> Vec<Keyframe>
    where
        F: FnMut(f64, f64, f64) -> bool,
    {
        let (oscillator, start) = {
            let state = self.state();
            (state.oscillator, state.elapsed)
        };

        let mut frames = Vec::new();
        let mut t = start;
        loop {
            let value = oscillator.value_at(t);
            let velocity = oscillator.velocity_at(t);
            let time = t - start;
            frames.push(Keyframe { value, time });
            if should_stop(value, velocity, time) || t >= MAX_KEYFRAME_TIME {
                break;
            }
            t = (t + (velocity.sqrt() / sample_scale).max(0.01)).min(MAX_KEYFRAME_TIME);
        }
        frames
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SpringState> {
        self.inner.state.lock().unwrap()
    }
}

impl SpringInner {
    fn start(&self) {
        self.scheduler.register(self.self_weak.clone());
    }

    fn stop(&self) {
        let weak: Weak<dyn Animate> = self.self_weak.clone();
        self.scheduler.deregister(&weak);
    }

    fn finish(&self) {
        let target = {
            let mut state = self.state.lock().unwrap();
            let Some(target) = state.target else {
                return;
            };
            // Snap: zero velocity, exactly on target, no decay tail. Hydrating
            // at the rest state keeps both samples bit-exact afterwards.
            state.oscillator.hydrate(0.0, 0.0);
            state.elapsed = 0.0;
            target
        };
        tracing::trace!(value = target, "spring finished");
        self.notify(target);
        self.stop();
    }

    fn notify(&self, value: f64) {
        let callbacks: SmallVec<[UpdateFn; 4]> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers
                .iter()
                .map(|subscriber| subscriber.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(value);
        }
    }
}

impl Animate for SpringInner {
    fn update(&self, dt: f64) {
        let at_rest = {
            let mut state = self.state.lock().unwrap();
            if !state.locked {
                state.elapsed += dt;
            }
            state.stop_automatically && !state.wants_update()
        };
        if at_rest {
            self.finish();
            self.stop();
        }
        let value = self.state.lock().unwrap().value();
        self.notify(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ManualFrameSource;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    fn rig() -> (Arc<ManualFrameSource>, Scheduler) {
        let frames = ManualFrameSource::new();
        let scheduler = Scheduler::new(frames.clone());
        (frames, scheduler)
    }

    fn settle(frames: &ManualFrameSource, max_frames: usize) {
        for _ in 0..max_frames {
            if frames.advance(FRAME) == 0 {
                return;
            }
        }
    }

    #[test]
    fn spring_settles_to_target_and_deregisters() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler.clone(), 1.0, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();

        settle(&frames, 600);

        assert_eq!(spring.value(), 100.0);
        assert_eq!(spring.velocity(), 0.0);
        assert!(!spring.wants_update());
        assert_eq!(scheduler.target_count(), 0);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn spring_inherits_velocity_across_retarget() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.45, 0.47, 0.0);
        spring.set_target(100.0);
        spring.start();

        for _ in 0..10 {
            frames.advance(FRAME);
        }
        let velocity = spring.velocity();
        assert!(velocity > 0.0);

        spring.set_target(50.0);
        assert!((spring.velocity() - velocity).abs() < 1e-9);
    }

    #[test]
    fn set_value_preserves_velocity() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();
        for _ in 0..8 {
            frames.advance(FRAME);
        }

        let velocity = spring.velocity();
        spring.set_value(-20.0);

        assert!((spring.value() - -20.0).abs() < 1e-9);
        assert!((spring.velocity() - velocity).abs() < 1e-9);
    }

    #[test]
    fn set_velocity_preserves_value() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();
        for _ in 0..8 {
            frames.advance(FRAME);
        }

        let value = spring.value();
        spring.set_velocity(300.0);

        assert!((spring.value() - value).abs() < 1e-9);
        assert!((spring.velocity() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn combined_damping_and_period_change_is_continuous() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.4, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();
        for _ in 0..6 {
            frames.advance(FRAME);
        }

        let value = spring.value();
        let velocity = spring.velocity();
        spring.set_damping_ratio_and_period(0.8, 0.5);

        assert!((spring.value() - value).abs() < 1e-9);
        assert!((spring.velocity() - velocity).abs() < 1e-9);
        assert_eq!(spring.damping_ratio(), 0.8);
        assert!((spring.period() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn locked_spring_freezes_but_keeps_notifying() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();
        for _ in 0..5 {
            frames.advance(FRAME);
        }

        spring.set_locked(true);
        let value = spring.value();
        let velocity = spring.velocity();

        let notifications = Arc::new(AtomicUsize::new(0));
        let counter = notifications.clone();
        spring.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..10 {
            frames.advance(FRAME);
        }

        assert_eq!(spring.value(), value);
        assert_eq!(spring.velocity(), velocity);
        assert_eq!(notifications.load(Ordering::SeqCst), 10);

        spring.set_locked(false);
        frames.advance(FRAME);
        assert!(spring.value() != value);
    }

    #[test]
    fn finish_without_target_is_a_no_op() {
        let (_frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 7.0);

        let notifications = Arc::new(AtomicUsize::new(0));
        let counter = notifications.clone();
        spring.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        spring.finish();

        assert_eq!(spring.value(), 7.0);
        assert_eq!(spring.target(), None);
        assert_eq!(notifications.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn finish_snaps_exactly_and_notifies_once() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler.clone(), 0.5, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();
        for _ in 0..5 {
            frames.advance(FRAME);
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        spring.subscribe(move |value| sink.lock().unwrap().push(value));

        spring.finish();

        assert_eq!(*seen.lock().unwrap(), vec![100.0]);
        assert_eq!(spring.value(), 100.0);
        assert_eq!(spring.velocity(), 0.0);
        assert_eq!(scheduler.target_count(), 0);
    }

    #[test]
    fn subscribers_run_in_subscription_order() {
        let (_frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);

        let order = Arc::new(Mutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();
        let a = spring.subscribe(move |_| first.lock().unwrap().push(1));
        spring.subscribe(move |_| second.lock().unwrap().push(2));

        spring.update(0.016);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);

        spring.unsubscribe(a);
        spring.update(0.016);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 2]);
    }

    #[test]
    fn subscribers_may_read_the_spring() {
        let (_frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);
        spring.set_target(10.0);

        let observed = Arc::new(Mutex::new(None));
        let sink = observed.clone();
        let reader = spring.clone();
        spring.subscribe(move |value| {
            *sink.lock().unwrap() = Some((value, reader.value()));
        });

        spring.update(0.016);

        let (notified, read_back) = observed.lock().unwrap().unwrap();
        assert_eq!(notified, read_back);
    }

    #[test]
    fn keyframes_honor_the_stop_predicate() {
        let (_frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);
        spring.set_target(100.0);

        let frames = spring.keyframes(|_, _, time| time > 2.0, DEFAULT_SAMPLE_SCALE);

        let last = frames.last().unwrap();
        assert!(last.time > 2.0);
        // Exactly one sample past the cutoff.
        assert!(frames[frames.len() - 2].time <= 2.0);
        assert!(frames.iter().all(|frame| frame.time <= 1000.0));
        assert_eq!(frames[0].value, spring.value());
    }

    #[test]
    fn keyframes_stop_at_the_sampling_ceiling() {
        let (_frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler, 0.5, 0.3, 0.0);
        spring.set_target(1.0);

        let frames = spring.keyframes(|_, _, _| false, DEFAULT_SAMPLE_SCALE);

        assert_eq!(frames.last().unwrap().time, 1000.0);
        assert!(frames.iter().all(|frame| frame.time <= 1000.0));
    }

    #[test]
    fn manual_stop_keeps_state_put() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler.clone(), 0.5, 0.3, 0.0);
        spring.set_target(100.0);
        spring.start();
        for _ in 0..5 {
            frames.advance(FRAME);
        }

        spring.stop();
        let value = spring.value();

        frames.advance(FRAME);
        frames.advance(FRAME);
        assert_eq!(spring.value(), value);
        assert!(spring.wants_update());
    }

    #[test]
    fn auto_stop_can_be_disabled() {
        let (frames, scheduler) = rig();
        let spring = Spring::with_scheduler(scheduler.clone(), 1.0, 0.3, 0.0);
        spring.set_stop_automatically(false);
        spring.set_target(100.0);
        spring.start();

        for _ in 0..400 {
            frames.advance(FRAME);
        }

        // At rest, but still registered and never snapped.
        assert!(!spring.wants_update());
        assert_eq!(scheduler.target_count(), 1);
        assert!(scheduler.is_running());
    }

    #[test]
    fn preset_regimes_are_classified() {
        assert!(SpringParams::wobbly().is_underdamped());
        assert!(SpringParams::gentle().is_underdamped());
        assert!(SpringParams::stiff().is_underdamped());
        assert!(SpringParams::molasses().is_critically_damped());
        assert!(!SpringParams::molasses().is_overdamped());
    }
}
