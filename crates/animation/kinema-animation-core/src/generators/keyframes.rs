//! Eased keyframe interpolation over a fixed duration.

use kinema_api_core::Value;

use super::{Generator, GeneratorState};
use crate::easing::{EaseSpec, Easing};
use crate::interpolate::{convert_offset_to_times, default_offset, interpolate_values, Interpolator};

/// Milliseconds.
pub const DEFAULT_DURATION: f64 = 300.0;

#[derive(Clone, Debug, Default)]
pub struct KeyframesOptions {
    pub keyframes: Vec<Value>,
    /// Milliseconds.
    pub duration: f64,
    pub ease: Option<EaseSpec>,
    /// Offsets in 0..=1, one per keyframe.
    pub times: Option<Vec<f64>>,
}

pub struct Keyframes {
    interpolator: Interpolator<Value>,
    duration: f64,
    first: Value,
}

pub fn keyframes(options: KeyframesOptions) -> Keyframes {
    let KeyframesOptions {
        keyframes,
        duration,
        ease,
        times,
    } = options;
    let segments = keyframes.len().saturating_sub(1);
    let easings = ease
        .unwrap_or(EaseSpec::Single(Easing::EaseInOut))
        .for_segments(segments);
    let offsets = match times {
        Some(t) if t.len() == keyframes.len() => t,
        _ => default_offset(keyframes.len()),
    };
    let absolute = convert_offset_to_times(&offsets, duration);
    let interpolator = interpolate_values(&absolute, &keyframes, easings, true);
    Keyframes {
        interpolator,
        duration,
        first: keyframes.first().cloned().unwrap_or(Value::Number(0.0)),
    }
}

impl Generator<Value> for Keyframes {
    fn next(&mut self, t: f64) -> GeneratorState<Value> {
        GeneratorState {
            value: self.interpolator.at(t).unwrap_or_else(|| self.first.clone()),
            done: t >= self.duration,
        }
    }

    fn calculated_duration(&self) -> Option<f64> {
        Some(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_api_core::Rgba;

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| Value::Number(*v)).collect()
    }

    #[test]
    fn linear_segments_with_times() {
        let mut gen = keyframes(KeyframesOptions {
            keyframes: numbers(&[0.0, 100.0, 0.0]),
            duration: 1000.0,
            ease: Some(Easing::Linear.into()),
            times: Some(vec![0.0, 0.25, 1.0]),
        });
        assert_eq!(gen.next(0.0).value, Value::Number(0.0));
        assert_eq!(gen.next(250.0).value, Value::Number(100.0));
        assert_eq!(gen.next(625.0).value, Value::Number(50.0));
        let end = gen.next(1000.0);
        assert!(end.done);
        assert_eq!(end.value, Value::Number(0.0));
    }

    #[test]
    fn done_flag_tracks_duration() {
        let mut gen = keyframes(KeyframesOptions {
            keyframes: numbers(&[0.0, 1.0]),
            duration: DEFAULT_DURATION,
            ..KeyframesOptions::default()
        });
        assert!(!gen.next(299.0).done);
        assert!(gen.next(300.0).done);
        assert!(gen.next(301.0).done);
        assert_eq!(gen.calculated_duration(), Some(300.0));
    }

    #[test]
    fn colors_interpolate() {
        let red = Value::Color(Rgba::new(255.0, 0.0, 0.0, 1.0));
        let blue = Value::Color(Rgba::new(0.0, 0.0, 255.0, 1.0));
        let mut gen = keyframes(KeyframesOptions {
            keyframes: vec![red.clone(), blue.clone()],
            duration: 100.0,
            ..KeyframesOptions::default()
        });
        assert_eq!(gen.next(0.0).value, red);
        assert_eq!(gen.next(100.0).value, blue);
    }
}
