//! Solve spring physics from a duration and bounce.

use log::warn;

use super::defaults;

const SAFE_MIN: f64 = 0.001;
const ROOT_ITERATIONS: usize = 12;

/// Physics derived from a duration-based description.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolvedSpring {
    pub stiffness: f64,
    pub damping: f64,
    /// Milliseconds.
    pub duration: f64,
}

#[inline]
pub(crate) fn calc_angular_freq(undamped_freq: f64, damping_ratio: f64) -> f64 {
    undamped_freq * (1.0 - damping_ratio * damping_ratio).sqrt()
}

fn approximate_root(envelope: impl Fn(f64) -> f64, derivative: impl Fn(f64) -> f64, initial_guess: f64) -> f64 {
    let mut result = initial_guess;
    for _ in 1..ROOT_ITERATIONS {
        result -= envelope(result) / derivative(result);
    }
    result
}

/// Find stiffness and damping for a spring settling in `duration_ms` with the
/// given `bounce`. `velocity` is in units per millisecond, already negated.
pub fn find_spring(duration_ms: f64, bounce: f64, velocity: f64, mass: f64) -> SolvedSpring {
    if duration_ms > defaults::MAX_DURATION * 1000.0 {
        warn!("spring duration {duration_ms}ms exceeds {}s; clamping", defaults::MAX_DURATION);
    }
    let damping_ratio = (1.0 - bounce).clamp(defaults::MIN_DAMPING, defaults::MAX_DAMPING);
    let duration = (duration_ms / 1000.0).clamp(defaults::MIN_DURATION, defaults::MAX_DURATION);

    let undamped_freq = if damping_ratio < 1.0 {
        let envelope = |freq: f64| {
            let exponential_decay = freq * damping_ratio;
            let delta = exponential_decay * duration;
            let a = exponential_decay - velocity;
            let b = calc_angular_freq(freq, damping_ratio);
            let c = (-delta).exp();
            SAFE_MIN - (a / b) * c
        };
        let derivative = |freq: f64| {
            let exponential_decay = freq * damping_ratio;
            let delta = exponential_decay * duration;
            let d = delta * velocity + velocity;
            let e = damping_ratio.powi(2) * freq.powi(2) * duration;
            let f = (-delta).exp();
            let g = calc_angular_freq(freq.powi(2), damping_ratio);
            let factor = if -envelope(freq) + SAFE_MIN > 0.0 { -1.0 } else { 1.0 };
            (factor * ((d - e) * f)) / g
        };
        approximate_root(envelope, derivative, 5.0 / duration)
    } else {
        let envelope = |freq: f64| {
            let a = (-freq * duration).exp();
            let b = (freq - velocity) * duration + 1.0;
            -SAFE_MIN + a * b
        };
        let derivative = |freq: f64| {
            let a = (-freq * duration).exp();
            let b = (velocity - freq) * (duration * duration);
            a * b
        };
        approximate_root(envelope, derivative, 5.0 / duration)
    };

    let duration = duration * 1000.0;
    if undamped_freq.is_nan() {
        warn!("spring solver diverged; using default stiffness and damping");
        return SolvedSpring {
            stiffness: defaults::STIFFNESS,
            damping: defaults::DAMPING,
            duration,
        };
    }
    let stiffness = undamped_freq.powi(2) * mass;
    SolvedSpring {
        stiffness,
        damping: damping_ratio * 2.0 * (mass * stiffness).sqrt(),
        duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_finite_physics() {
        let s = find_spring(800.0, 0.3, 0.0, 1.0);
        assert!(s.stiffness.is_finite() && s.stiffness > 0.0);
        assert!(s.damping.is_finite() && s.damping > 0.0);
        assert_eq!(s.duration, 800.0);
    }

    #[test]
    fn zero_bounce_is_critically_damped() {
        let s = find_spring(500.0, 0.0, 0.0, 1.0);
        let ratio = s.damping / (2.0 * s.stiffness.sqrt());
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duration_is_clamped() {
        assert_eq!(find_spring(60_000.0, 0.2, 0.0, 1.0).duration, 10_000.0);
    }
}
