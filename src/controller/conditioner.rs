//! Input conditioning: deadzone filtering and velocity integration
//!
//! The stick does not position the pointer directly. Each tick the filtered
//! deflection accelerates a velocity vector, friction decays it, and the
//! magnitude is capped at `max_velocity`. The pointer then moves by the
//! velocity scaled with `sensitivity`, truncated to whole pixels.
//!
//! ```text
//! raw (x, y) ──► deadzone ──► v += f·accel ──► v *= friction ──► |v| ≤ max ──► trunc(v·sens)
//! ```

use crate::config::Params;

/// Pointer velocity carried across ticks
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityState {
    pub vx: f64,
    pub vy: f64,
}

impl VelocityState {
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Zeroes values whose magnitude is below `deadzone`
///
/// Values outside the deadzone pass through unscaled.
pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

pub fn condition(raw_x: f64, raw_y: f64, deadzone: f64) -> (f64, f64) {
    (
        apply_deadzone(raw_x, deadzone),
        apply_deadzone(raw_y, deadzone),
    )
}

/// One integration step
///
/// Friction applies every step, with or without input, so a released stick
/// decays the velocity exponentially towards zero.
pub fn integrate(
    fx: f64,
    fy: f64,
    acceleration: f64,
    friction: f64,
    max_velocity: f64,
    state: VelocityState,
) -> VelocityState {
    let mut vx = (state.vx + fx * acceleration) * friction;
    let mut vy = (state.vy + fy * acceleration) * friction;

    let speed = (vx * vx + vy * vy).sqrt();
    if speed > max_velocity && speed > 0.0 {
        let scale = max_velocity / speed;
        vx *= scale;
        vy *= scale;
    }

    VelocityState { vx, vy }
}

/// Pixel delta for the current velocity
///
/// Truncates towards zero, so velocities under one pixel never move the
/// pointer.
pub fn motion_delta(state: VelocityState, sensitivity: f64) -> (i32, i32) {
    (
        (state.vx * sensitivity) as i32,
        (state.vy * sensitivity) as i32,
    )
}

/// Owns the velocity state between ticks
#[derive(Clone, Debug, Default)]
pub struct InputConditioner {
    velocity: VelocityState,
}

impl InputConditioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn velocity(&self) -> VelocityState {
        self.velocity
    }

    /// Filters a raw sample, advances the velocity and returns the pixel delta
    pub fn step(&mut self, raw_x: f64, raw_y: f64, params: &Params) -> (i32, i32) {
        let (fx, fy) = condition(raw_x, raw_y, params.deadzone);
        self.velocity = integrate(
            fx,
            fy,
            params.acceleration,
            params.friction,
            params.max_velocity,
            self.velocity,
        );
        motion_delta(self.velocity, params.sensitivity)
    }
}
