//! Physical defaults and solver limits for springs.

pub const STIFFNESS: f64 = 100.0;
pub const DAMPING: f64 = 10.0;
pub const MASS: f64 = 1.0;
pub const VELOCITY: f64 = 0.0;
/// Milliseconds.
pub const DURATION: f64 = 800.0;
pub const BOUNCE: f64 = 0.3;
/// Seconds.
pub const VISUAL_DURATION: f64 = 0.3;

pub const REST_SPEED_GRANULAR: f64 = 0.01;
pub const REST_SPEED_DEFAULT: f64 = 2.0;
pub const REST_DELTA_GRANULAR: f64 = 0.005;
pub const REST_DELTA_DEFAULT: f64 = 0.5;

/// Transitions smaller than this use the granular thresholds.
pub const GRANULAR_RANGE: f64 = 5.0;

/// Seconds.
pub const MIN_DURATION: f64 = 0.01;
/// Seconds.
pub const MAX_DURATION: f64 = 10.0;
pub const MIN_DAMPING: f64 = 0.05;
pub const MAX_DAMPING: f64 = 1.0;

/// Hyperbolic arguments above this overflow to infinity soon after.
pub const MAX_HYPERBOLIC_ARG: f64 = 300.0;
