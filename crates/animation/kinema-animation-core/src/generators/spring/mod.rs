//! Closed-form damped spring.
//!
//! Accepts physics (`stiffness`, `damping`, `mass`), a settle time
//! (`duration`, `bounce`) or a perceived duration (`visual_duration`,
//! `bounce`). Physics keys win when both are present.

pub mod defaults;
mod find;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

pub use find::{find_spring, SolvedSpring};

use super::{calc_generator_velocity, Generator, GeneratorState};
use find::calc_angular_freq;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringOptions {
    /// Origin and target.
    pub keyframes: [f64; 2],
    /// Initial velocity in units per second.
    pub velocity: f64,
    pub stiffness: Option<f64>,
    pub damping: Option<f64>,
    pub mass: Option<f64>,
    /// Milliseconds.
    pub duration: Option<f64>,
    pub bounce: Option<f64>,
    /// Seconds.
    pub visual_duration: Option<f64>,
    pub rest_speed: Option<f64>,
    pub rest_delta: Option<f64>,
}

impl SpringOptions {
    fn has_physics(&self) -> bool {
        self.stiffness.is_some() || self.damping.is_some() || self.mass.is_some()
    }

    fn has_duration(&self) -> bool {
        self.duration.is_some() || self.bounce.is_some() || self.visual_duration.is_some()
    }
}

/// Fully resolved spring parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Resolved {
    stiffness: f64,
    damping: f64,
    mass: f64,
    duration: f64,
    velocity: f64,
    from_duration: bool,
}

fn resolve_options(options: &SpringOptions) -> Resolved {
    let velocity = -(options.velocity / 1000.0);
    let mut resolved = Resolved {
        stiffness: options.stiffness.unwrap_or(defaults::STIFFNESS),
        damping: options.damping.unwrap_or(defaults::DAMPING),
        mass: options.mass.unwrap_or(defaults::MASS),
        duration: options.duration.unwrap_or(defaults::DURATION),
        velocity,
        from_duration: false,
    };
    if options.has_physics() || !options.has_duration() {
        return resolved;
    }
    if let Some(visual_duration) = options.visual_duration {
        let root = (2.0 * PI) / (visual_duration * 1.2);
        let stiffness = root * root;
        let bounce = options.bounce.unwrap_or(0.0);
        resolved.stiffness = stiffness;
        resolved.damping =
            2.0 * (1.0 - bounce).clamp(defaults::MIN_DAMPING, defaults::MAX_DAMPING) * stiffness.sqrt();
        resolved.mass = defaults::MASS;
    } else {
        let solved = find_spring(
            options.duration.unwrap_or(defaults::DURATION),
            options.bounce.unwrap_or(defaults::BOUNCE),
            velocity,
            defaults::MASS,
        );
        resolved.stiffness = solved.stiffness;
        resolved.damping = solved.damping;
        resolved.duration = solved.duration;
        resolved.mass = defaults::MASS;
        resolved.from_duration = true;
    }
    resolved
}

/// Damping regime with its precomputed frequency.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Regime {
    Under { angular_freq: f64 },
    Critical,
    Over { damped_angular_freq: f64 },
}

#[derive(Clone, Debug)]
pub struct Spring {
    origin: f64,
    target: f64,
    initial_velocity: f64,
    initial_delta: f64,
    damping_ratio: f64,
    undamped_angular_freq: f64,
    regime: Regime,
    rest_speed: f64,
    rest_delta: f64,
    from_duration: bool,
    duration: f64,
}

pub fn spring(options: SpringOptions) -> Spring {
    let [origin, target] = options.keyframes;
    let r = resolve_options(&options);
    let damping_ratio = r.damping / (2.0 * (r.stiffness * r.mass).sqrt());
    let initial_delta = target - origin;
    let undamped_angular_freq = (r.stiffness / r.mass).sqrt() / 1000.0;
    let granular = initial_delta.abs() < defaults::GRANULAR_RANGE;

    let rest_speed = options.rest_speed.filter(|v| *v != 0.0).unwrap_or(if granular {
        defaults::REST_SPEED_GRANULAR
    } else {
        defaults::REST_SPEED_DEFAULT
    });
    let rest_delta = options.rest_delta.filter(|v| *v != 0.0).unwrap_or(if granular {
        defaults::REST_DELTA_GRANULAR
    } else {
        defaults::REST_DELTA_DEFAULT
    });

    let regime = if damping_ratio < 1.0 {
        Regime::Under {
            angular_freq: calc_angular_freq(undamped_angular_freq, damping_ratio),
        }
    } else if damping_ratio == 1.0 {
        Regime::Critical
    } else {
        Regime::Over {
            damped_angular_freq: undamped_angular_freq * (damping_ratio * damping_ratio - 1.0).sqrt(),
        }
    };

    Spring {
        origin,
        target,
        initial_velocity: r.velocity,
        initial_delta,
        damping_ratio,
        undamped_angular_freq,
        regime,
        rest_speed,
        rest_delta,
        from_duration: r.from_duration,
        duration: r.duration,
    }
}

impl Spring {
    /// Position at `t` milliseconds.
    pub fn resolve(&self, t: f64) -> f64 {
        let (target, delta, v0) = (self.target, self.initial_delta, self.initial_velocity);
        let zeta = self.damping_ratio;
        let w0 = self.undamped_angular_freq;
        match self.regime {
            Regime::Under { angular_freq } => {
                let envelope = (-zeta * w0 * t).exp();
                target
                    - envelope
                        * (((v0 + zeta * w0 * delta) / angular_freq) * (angular_freq * t).sin()
                            + delta * (angular_freq * t).cos())
            }
            Regime::Critical => target - (-w0 * t).exp() * (delta + (v0 + w0 * delta) * t),
            Regime::Over { damped_angular_freq } => {
                let envelope = (-zeta * w0 * t).exp();
                let freq_for_t = (damped_angular_freq * t).min(defaults::MAX_HYPERBOLIC_ARG);
                target
                    - envelope
                        * ((v0 + zeta * w0 * delta) * freq_for_t.sinh() / damped_angular_freq
                            + delta * freq_for_t.cosh())
            }
        }
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Velocity in units per second at `t`.
    pub fn velocity_at(&self, t: f64) -> f64 {
        if t == 0.0 {
            return -self.initial_velocity * 1000.0;
        }
        calc_generator_velocity(|x| self.resolve(x), t, self.resolve(t))
    }
}

impl Generator<f64> for Spring {
    fn next(&mut self, t: f64) -> GeneratorState<f64> {
        let current = self.resolve(t);
        let done = if self.from_duration {
            t >= self.duration
        } else {
            let velocity = self.velocity_at(t);
            velocity.abs() <= self.rest_speed && (self.target - current).abs() <= self.rest_delta
        };
        GeneratorState {
            value: if done { self.target } else { current },
            done,
        }
    }

    fn calculated_duration(&self) -> Option<f64> {
        if self.from_duration && self.duration != 0.0 {
            Some(self.duration)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physics(stiffness: f64, damping: f64) -> SpringOptions {
        SpringOptions {
            keyframes: [0.0, 100.0],
            stiffness: Some(stiffness),
            damping: Some(damping),
            ..SpringOptions::default()
        }
    }

    #[test]
    fn starts_at_origin() {
        for opts in [physics(100.0, 10.0), physics(100.0, 20.0), physics(100.0, 60.0)] {
            let mut s = spring(opts);
            assert_eq!(s.next(0.0).value, 0.0);
        }
    }

    #[test]
    fn overdamped_stays_finite_for_long_times() {
        let s = spring(physics(1000.0, 2000.0));
        let v = s.resolve(1.0e7);
        assert!(v.is_finite());
    }

    #[test]
    fn velocity_carries_into_motion() {
        let mut still = spring(physics(100.0, 10.0));
        let mut pushed = spring(SpringOptions {
            velocity: 1000.0,
            ..physics(100.0, 10.0)
        });
        assert!(pushed.next(16.0).value > still.next(16.0).value);
        assert_eq!(pushed.velocity_at(0.0), 1000.0);
    }

    #[test]
    fn visual_duration_overrides_stiffness() {
        let s = spring(SpringOptions {
            keyframes: [0.0, 1.0],
            visual_duration: Some(0.5),
            bounce: Some(0.25),
            ..SpringOptions::default()
        });
        assert!((s.damping_ratio() - 0.75).abs() < 1e-9);
    }
}
