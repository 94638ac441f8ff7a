//! Generators: pure functions of elapsed milliseconds producing a value and a
//! `done` flag.
//!
//! - keyframes: eased piecewise interpolation over a fixed duration
//! - spring: closed-form damped harmonic oscillator
//! - inertia: exponential decay with an optional spring bounce at bounds
//!
//! `next(t)` returns the same state for the same `t`; callers may sample a
//! generator several times per frame.

pub mod inertia;
pub mod keyframes;
pub mod spring;

use serde::{Deserialize, Serialize};

use crate::easing::{Easing, EasingFn};
pub use inertia::{inertia, Inertia, InertiaOptions};
pub use keyframes::{keyframes, Keyframes, KeyframesOptions};
pub use spring::{spring, Spring, SpringOptions};

/// Duration estimation stops here and reports an infinite duration.
pub const MAX_GENERATOR_DURATION: f64 = 20_000.0;

/// Window used to estimate instantaneous velocity.
pub const VELOCITY_SAMPLE_DURATION: f64 = 5.0;

const DURATION_STEP: f64 = 50.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState<T> {
    pub value: T,
    pub done: bool,
}

pub trait Generator<T> {
    /// State at `t` milliseconds after the start.
    fn next(&mut self, t: f64) -> GeneratorState<T>;

    /// Fixed duration, if the generator has one.
    fn calculated_duration(&self) -> Option<f64>;
}

/// Per-second velocity from a change over `frame_duration` milliseconds.
#[inline]
pub fn velocity_per_second(delta: f64, frame_duration: f64) -> f64 {
    if frame_duration != 0.0 {
        delta * (1000.0 / frame_duration)
    } else {
        0.0
    }
}

/// Backward difference over [`VELOCITY_SAMPLE_DURATION`].
pub fn calc_generator_velocity(resolve: impl Fn(f64) -> f64, t: f64, current: f64) -> f64 {
    let prev_t = (t - VELOCITY_SAMPLE_DURATION).max(0.0);
    velocity_per_second(current - resolve(prev_t), t - prev_t)
}

/// Step through the generator until it reports done. Returns `None` when it
/// is still running at [`MAX_GENERATOR_DURATION`].
pub fn calc_generator_duration<T>(generator: &mut dyn Generator<T>) -> Option<f64> {
    let mut duration = 0.0;
    let mut state = generator.next(duration);
    while !state.done && duration < MAX_GENERATOR_DURATION {
        duration += DURATION_STEP;
        state = generator.next(duration);
    }
    if duration >= MAX_GENERATOR_DURATION {
        None
    } else {
        Some(duration)
    }
}

/// Sample `duration` milliseconds at `resolution` millisecond steps,
/// including both endpoints.
pub fn sample(generator: &mut dyn Generator<f64>, duration: f64, resolution: f64) -> Vec<f64> {
    let count = ((duration / resolution.max(f64::EPSILON)).round() as usize).max(2);
    (0..count)
        .map(|i| {
            let t = duration * i as f64 / (count - 1) as f64;
            generator.next(t).value
        })
        .collect()
}

/// CSS `linear()` easing approximating `ease` over `duration` milliseconds.
pub fn linear_easing_string(ease: impl Fn(f64) -> f64, duration: f64, resolution: f64) -> String {
    let count = ((duration / resolution).round() as usize).max(2);
    let points: Vec<String> = (0..count)
        .map(|i| format!("{}", round_to(ease(i as f64 / (count - 1) as f64), 4)))
        .collect();
    format!("linear({})", points.join(", "))
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (v * factor).round() / factor
}

/// Turn a 0 -> 100 spring into an easing curve and the duration it needs.
/// Returns `None` for springs that do not settle.
pub fn generator_easing(options: &SpringOptions) -> Option<(Easing, f64)> {
    let mut gen = spring(SpringOptions {
        keyframes: [0.0, 100.0],
        ..options.clone()
    });
    let duration = calc_generator_duration(&mut gen)?.min(MAX_GENERATOR_DURATION);
    let ease = move |p: f64| {
        let mut g = gen.clone();
        g.next(duration * p).value / 100.0
    };
    Some((Easing::Custom(EasingFn(std::rc::Rc::new(ease))), duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_covers_endpoints() {
        let mut gen = spring(SpringOptions {
            keyframes: [0.0, 10.0],
            duration: Some(500.0),
            bounce: Some(0.0),
            ..SpringOptions::default()
        });
        let samples = sample(&mut gen, 500.0, 10.0);
        assert_eq!(samples.len(), 50);
        assert_eq!(samples[0], 0.0);
        assert_eq!(*samples.last().unwrap(), 10.0);
    }

    #[test]
    fn infinite_springs_have_no_duration() {
        let mut gen = spring(SpringOptions {
            keyframes: [0.0, 100.0],
            stiffness: Some(100.0),
            damping: Some(0.0),
            ..SpringOptions::default()
        });
        assert_eq!(calc_generator_duration(&mut gen), None);
    }

    #[test]
    fn spring_as_easing() {
        let (ease, duration) = generator_easing(&SpringOptions {
            stiffness: Some(400.0),
            damping: Some(40.0),
            ..SpringOptions::default()
        })
        .unwrap();
        assert!(duration > 0.0 && duration < MAX_GENERATOR_DURATION);
        assert_eq!(ease.ease(0.0), 0.0);
        assert_eq!(ease.ease(1.0), 1.0);
        let s = linear_easing_string(|p| ease.ease(p), duration, 10.0);
        assert!(s.starts_with("linear(0, "));
        assert!(s.ends_with(", 1)"));
    }
}
