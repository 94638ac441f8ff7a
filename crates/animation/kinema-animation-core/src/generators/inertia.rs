//! Exponential decay with an optional spring bounce at `min`/`max`.

use std::fmt;
use std::rc::Rc;

use super::spring::{spring, Spring, SpringOptions};
use super::{calc_generator_velocity, Generator, GeneratorState};

#[derive(Clone)]
pub struct InertiaOptions {
    pub origin: f64,
    /// Units per second.
    pub velocity: f64,
    pub power: f64,
    /// Milliseconds.
    pub time_constant: f64,
    pub bounce_damping: f64,
    pub bounce_stiffness: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub rest_delta: f64,
    pub rest_speed: Option<f64>,
    /// Adjust the projected resting point, e.g. to snap to a grid.
    pub modify_target: Option<Rc<dyn Fn(f64) -> f64>>,
}

impl Default for InertiaOptions {
    fn default() -> Self {
        Self {
            origin: 0.0,
            velocity: 0.0,
            power: 0.8,
            time_constant: 325.0,
            bounce_damping: 10.0,
            bounce_stiffness: 500.0,
            min: None,
            max: None,
            rest_delta: 0.5,
            rest_speed: None,
            modify_target: None,
        }
    }
}

impl fmt::Debug for InertiaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InertiaOptions")
            .field("origin", &self.origin)
            .field("velocity", &self.velocity)
            .field("power", &self.power)
            .field("time_constant", &self.time_constant)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

pub struct Inertia {
    amplitude: f64,
    target: f64,
    time_constant: f64,
    rest_delta: f64,
    rest_speed: Option<f64>,
    bounce_damping: f64,
    bounce_stiffness: f64,
    min: Option<f64>,
    max: Option<f64>,
    state: GeneratorState<f64>,
    /// Boundary crossing time and the spring answering from then on.
    boundary: Option<(f64, Spring)>,
}

pub fn inertia(options: InertiaOptions) -> Inertia {
    let mut amplitude = options.power * options.velocity;
    let ideal = options.origin + amplitude;
    let target = match &options.modify_target {
        Some(modify) => modify(ideal),
        None => ideal,
    };
    if target != ideal {
        amplitude = target - options.origin;
    }
    let mut gen = Inertia {
        amplitude,
        target,
        time_constant: options.time_constant,
        rest_delta: options.rest_delta,
        rest_speed: options.rest_speed,
        bounce_damping: options.bounce_damping,
        bounce_stiffness: options.bounce_stiffness,
        min: options.min,
        max: options.max,
        state: GeneratorState {
            value: options.origin,
            done: false,
        },
        boundary: None,
    };
    gen.check_boundary(0.0);
    gen
}

impl Inertia {
    fn is_out_of_bounds(&self, v: f64) -> bool {
        self.min.map(|m| v < m).unwrap_or(false) || self.max.map(|m| v > m).unwrap_or(false)
    }

    fn nearest_boundary(&self, v: f64) -> f64 {
        match (self.min, self.max) {
            (None, Some(max)) => max,
            (Some(min), None) => min,
            (Some(min), Some(max)) => {
                if (min - v).abs() < (max - v).abs() {
                    min
                } else {
                    max
                }
            }
            (None, None) => v,
        }
    }

    fn calc_delta(&self, t: f64) -> f64 {
        -self.amplitude * (-t / self.time_constant).exp()
    }

    fn calc_latest(&self, t: f64) -> f64 {
        self.target + self.calc_delta(t)
    }

    fn apply_friction(&mut self, t: f64) {
        let delta = self.calc_delta(t);
        let latest = self.calc_latest(t);
        self.state.done = delta.abs() <= self.rest_delta;
        self.state.value = if self.state.done { self.target } else { latest };
    }

    fn check_boundary(&mut self, t: f64) {
        let value = self.state.value;
        if !self.is_out_of_bounds(value) {
            return;
        }
        let velocity = calc_generator_velocity(|x| self.calc_latest(x), t, value);
        let bounce = spring(SpringOptions {
            keyframes: [value, self.nearest_boundary(value)],
            velocity,
            damping: Some(self.bounce_damping),
            stiffness: Some(self.bounce_stiffness),
            rest_delta: Some(self.rest_delta),
            rest_speed: self.rest_speed,
            ..SpringOptions::default()
        });
        self.boundary = Some((t, bounce));
    }

    /// Time at which the decay crossed a bound, if it has.
    pub fn boundary_time(&self) -> Option<f64> {
        self.boundary.as_ref().map(|(t, _)| *t)
    }

    /// Resting point before any bounce.
    pub fn target(&self) -> f64 {
        self.target
    }
}

impl Generator<f64> for Inertia {
    fn next(&mut self, t: f64) -> GeneratorState<f64> {
        let mut updated = false;
        if self.boundary.is_none() {
            updated = true;
            self.apply_friction(t);
            self.check_boundary(t);
        }
        if let Some((reached, bounce)) = self.boundary.as_mut() {
            if t >= *reached {
                return bounce.next(t - *reached);
            }
        }
        if !updated {
            self.apply_friction(t);
        }
        self.state.clone()
    }

    fn calculated_duration(&self) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decays_towards_projected_target() {
        let mut gen = inertia(InertiaOptions {
            origin: 0.0,
            velocity: 1000.0,
            ..InertiaOptions::default()
        });
        assert_eq!(gen.next(0.0).value, 0.0);
        assert_eq!(gen.target(), 800.0);
        let mid = gen.next(325.0).value;
        assert!(mid > 400.0 && mid < 800.0);
        let end = gen.next(10_000.0);
        assert!(end.done);
        assert_eq!(end.value, 800.0);
    }

    #[test]
    fn modify_target_snaps() {
        let gen = inertia(InertiaOptions {
            velocity: 1000.0,
            modify_target: Some(Rc::new(|v| (v / 500.0).round() * 500.0)),
            ..InertiaOptions::default()
        });
        assert_eq!(gen.target(), 1000.0);
    }

    #[test]
    fn bounces_off_max() {
        let mut gen = inertia(InertiaOptions {
            velocity: 2000.0,
            max: Some(300.0),
            ..InertiaOptions::default()
        });
        let mut t = 0.0;
        while t < 3000.0 && gen.boundary_time().is_none() {
            gen.next(t);
            t += 16.0;
        }
        let crossed = gen.boundary_time().unwrap();
        let after = gen.next(crossed + 2000.0);
        assert!(after.done);
        assert_eq!(after.value, 300.0);
        assert_eq!(gen.next(crossed + 2000.0), after);
    }

    #[test]
    fn starting_out_of_bounds_springs_back_immediately() {
        let mut gen = inertia(InertiaOptions {
            origin: -50.0,
            min: Some(0.0),
            ..InertiaOptions::default()
        });
        assert_eq!(gen.boundary_time(), Some(0.0));
        assert_eq!(gen.next(0.0).value, -50.0);
    }
}
