//! Damped harmonic oscillator, solved in closed form
//!
//! The solver keeps a set of derived coefficients that are recomputed
//! ("hydrated") from a position/velocity pair whenever the oscillator is
//! re-parameterized, so position and velocity stay continuous across
//! mid-flight changes to the target, damping, or period.

use std::f64::consts::PI;

/// Floor for the damped-friction term. The exact critically-damped solution
/// has a removable singularity at ζ = 1; flooring the coefficient keeps the
/// overdamped branch finite and "approximately critical" there.
const MIN_DAMPED_FRICTION: f64 = 1e-5;

/// One-dimensional damped harmonic oscillator evaluated analytically.
///
/// The damping ratio ζ selects the regime: ζ < 1 oscillates (underdamped),
/// ζ = 1 is critically damped, ζ > 1 is overdamped. The friction coefficient
/// is derived from the nominal period as `c = ζ·4π/T`.
///
/// Time arguments are seconds relative to the last hydration. A zero or
/// negative period is not rejected; the derived coefficients then propagate
/// non-finite values (debug builds assert on construction).
#[derive(Clone, Copy, Debug)]
pub struct Oscillator {
    damping_ratio: f64,
    friction: f64,
    target: f64,

    // Derived on every hydration.
    omega0: f64,
    omega_d: f64,
    phi: f64,
    amplitude: f64,
    damped_friction: f64,
    a1: f64,
    a2: f64,
}

impl Oscillator {
    /// Create an oscillator at rest at `value`, with its target set to the
    /// same position.
    pub fn new(damping_ratio: f64, period: f64, value: f64) -> Self {
        debug_assert!(damping_ratio >= 0.0, "damping ratio must be non-negative");
        debug_assert!(period > 0.0, "period must be positive");

        let mut oscillator = Self {
            damping_ratio,
            friction: damping_ratio * 4.0 * PI / period,
            target: value,
            omega0: 0.0,
            omega_d: 0.0,
            phi: 0.0,
            amplitude: 0.0,
            damped_friction: 0.0,
            a1: 0.0,
            a2: 0.0,
        };
        oscillator.hydrate(0.0, 0.0);
        oscillator
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Nominal oscillation period, derived from `c = ζ·4π/T`. Undefined (NaN)
    /// for an undamped oscillator, whose friction is zero.
    pub fn period(&self) -> f64 {
        self.damping_ratio * 4.0 * PI / self.friction
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Recompute the derived coefficients for a new time origin at which the
    /// oscillator sits at `x0` (relative to the target) with velocity `v0`.
    pub fn hydrate(&mut self, x0: f64, v0: f64) {
        let c = self.friction;

        self.omega0 = if self.damping_ratio == 0.0 {
            0.0
        } else {
            c / (2.0 * self.damping_ratio)
        };
        // Only meaningful below critical damping; the overdamped branch
        // never reads it.
        self.omega_d = self.omega0 * (1.0 - self.damping_ratio * self.damping_ratio).sqrt();
        self.phi = (2.0 * v0 + c * x0).atan2(2.0 * x0 * self.omega_d);
        self.amplitude = if x0 == 0.0 {
            // cos(φ) is singular when the oscillator starts on the target.
            v0.signum() * v0 / self.omega_d
        } else {
            x0 / self.phi.cos()
        };
        // max() discards the NaN the square root produces below critical
        // damping; those coefficients are unused there.
        self.damped_friction =
            (((c / 2.0) * (c / 2.0) - self.omega0 * self.omega0).sqrt() * 2.0).max(MIN_DAMPED_FRICTION);
        self.a1 = (-2.0 * v0 + x0 * (-c + self.damped_friction)) / (2.0 * self.damped_friction);
        self.a2 = (2.0 * v0 + x0 * (c + self.damped_friction)) / (2.0 * self.damped_friction);
    }

    /// Position at `t` seconds after the last hydration.
    pub fn value_at(&self, t: f64) -> f64 {
        if self.damping_ratio < 1.0 {
            self.target
                + self.amplitude
                    * (-t * self.friction / 2.0).exp()
                    * (self.omega_d * t - self.phi).cos()
        } else {
            self.target
                + self.a1 * (t * (-self.friction - self.damped_friction) / 2.0).exp()
                + self.a2 * (t * (-self.friction + self.damped_friction) / 2.0).exp()
        }
    }

    /// Velocity at `t` seconds after the last hydration; the exact derivative
    /// of [`value_at`](Self::value_at).
    pub fn velocity_at(&self, t: f64) -> f64 {
        let c = self.friction;
        if self.damping_ratio < 1.0 {
            let theta = self.omega_d * t - self.phi;
            self.amplitude
                * (-t * c / 2.0).exp()
                * (-c / 2.0 * theta.cos() - self.omega_d * theta.sin())
        } else {
            let r1 = (-c - self.damped_friction) / 2.0;
            let r2 = (-c + self.damped_friction) / 2.0;
            self.a1 * r1 * (r1 * t).exp() + self.a2 * r2 * (r2 * t).exp()
        }
    }

    /// Change the target, preserving position and velocity as sampled at `t`.
    pub fn retarget(&mut self, t: f64, target: f64) {
        let value = self.value_at(t);
        let velocity = self.velocity_at(t);
        self.target = target;
        self.hydrate(value - self.target, velocity);
    }

    /// Override the velocity at `t`, preserving position.
    pub fn reset_velocity(&mut self, t: f64, velocity: f64) {
        let value = self.value_at(t);
        self.hydrate(value - self.target, velocity);
    }

    /// Override the position at `t`, preserving velocity.
    pub fn reset_value(&mut self, t: f64, value: f64) {
        let velocity = self.velocity_at(t);
        self.hydrate(value - self.target, velocity);
    }

    /// Change the damping ratio, preserving position and velocity as sampled
    /// at `t`. The friction coefficient is kept, so the implied period moves.
    pub fn reset_damping_ratio(&mut self, t: f64, damping_ratio: f64) {
        let value = self.value_at(t);
        let velocity = self.velocity_at(t);
        self.damping_ratio = damping_ratio;
        self.hydrate(value - self.target, velocity);
    }

    /// Change the friction coefficient, preserving position and velocity as
    /// sampled at `t`.
    pub fn reset_friction(&mut self, t: f64, friction: f64) {
        let value = self.value_at(t);
        let velocity = self.velocity_at(t);
        self.friction = friction;
        self.hydrate(value - self.target, velocity);
    }

    /// Change the nominal period, preserving position and velocity as sampled
    /// at `t`.
    pub fn reset_period(&mut self, t: f64, period: f64) {
        self.reset_friction(t, self.damping_ratio * 4.0 * PI / period);
    }
}
