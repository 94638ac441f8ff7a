//! Piecewise interpolation from an input range onto output keyframes.

use kinema_api_core::{mix, mix_number, Value};

use crate::easing::Easing;

/// Position of `value` between `from` and `to`; an empty range reports 1.
#[inline]
pub fn progress(from: f64, to: f64, value: f64) -> f64 {
    let range = to - from;
    if range == 0.0 {
        1.0
    } else {
        (value - from) / range
    }
}

/// Append `remaining` evenly spaced offsets from the last entry up to 1.
pub fn fill_offset(offset: &mut Vec<f64>, remaining: usize) {
    let min = offset.last().copied().unwrap_or(0.0);
    for i in 1..=remaining {
        let p = progress(0.0, remaining as f64, i as f64);
        offset.push(mix_number(min, 1.0, p));
    }
}

/// Evenly spaced offsets `[0, .., 1]` for `len` keyframes.
pub fn default_offset(len: usize) -> Vec<f64> {
    let mut offset = vec![0.0];
    fill_offset(&mut offset, len.saturating_sub(1));
    offset
}

pub fn convert_offset_to_times(offset: &[f64], duration: f64) -> Vec<f64> {
    offset.iter().map(|o| o * duration).collect()
}

type SegmentMixer<T> = Box<dyn Fn(f64) -> T>;

/// Monotone time-to-value mapping built once from keyframes.
pub struct Interpolator<T> {
    input: Vec<f64>,
    mixers: Vec<SegmentMixer<T>>,
    easings: Vec<Easing>,
    constant: Option<T>,
    zero_range: bool,
    first: Option<T>,
    clamp: bool,
}

impl<T: Clone + 'static> Interpolator<T> {
    /// `mix_factory` builds the mixer for one pair of neighbouring outputs.
    pub fn new<F>(input: &[f64], output: &[T], easings: Vec<Easing>, clamp: bool, mix_factory: F) -> Self
    where
        F: Fn(&T, &T) -> SegmentMixer<T>,
    {
        let empty = Self {
            input: Vec::new(),
            mixers: Vec::new(),
            easings: Vec::new(),
            constant: None,
            zero_range: false,
            first: None,
            clamp,
        };
        let len = input.len().min(output.len());
        if len == 0 {
            return empty;
        }
        if len == 1 {
            return Self {
                constant: Some(output[0].clone()),
                ..empty
            };
        }

        let (mut input, mut output) = (input[..len].to_vec(), output[..len].to_vec());
        let zero_range = input[0] == input[1];
        if input[0] > input[len - 1] {
            input.reverse();
            output.reverse();
        }
        let mixers = output
            .windows(2)
            .map(|pair| mix_factory(&pair[0], &pair[1]))
            .collect();
        Self {
            input,
            mixers,
            easings,
            constant: None,
            zero_range,
            first: Some(output[0].clone()),
            clamp,
        }
    }

    pub fn at(&self, v: f64) -> Option<T> {
        if let Some(c) = &self.constant {
            return Some(c.clone());
        }
        let last = *self.input.last()?;
        let v = if self.clamp {
            v.max(self.input[0]).min(last)
        } else {
            v
        };
        if self.zero_range && v < self.input[0] {
            return self.first.clone();
        }
        let mut i = 0;
        if self.mixers.len() > 1 {
            while i < self.input.len() - 2 {
                if v < self.input[i + 1] {
                    break;
                }
                i += 1;
            }
        }
        let p = progress(self.input[i], self.input[i + 1], v);
        let eased = match self.easings.get(i) {
            Some(e) => e.ease(p),
            None => p,
        };
        Some((self.mixers[i])(eased))
    }
}

/// Interpolate between numbers.
pub fn interpolate_numbers(input: &[f64], output: &[f64], easings: Vec<Easing>, clamp: bool) -> Interpolator<f64> {
    Interpolator::new(input, output, easings, clamp, |a, b| {
        let (a, b) = (*a, *b);
        Box::new(move |p| mix_number(a, b, p))
    })
}

/// Interpolate between arbitrary values using the value mixers.
pub fn interpolate_values(input: &[f64], output: &[Value], easings: Vec<Easing>, clamp: bool) -> Interpolator<Value> {
    Interpolator::new(input, output, easings, clamp, |a, b| {
        let (a, b) = (a.clone(), b.clone());
        Box::new(move |p| mix(&a, &b, p))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert_eq!(default_offset(3), vec![0.0, 0.5, 1.0]);
        assert_eq!(default_offset(1), vec![0.0]);
        assert_eq!(convert_offset_to_times(&[0.0, 0.5, 1.0], 300.0), vec![0.0, 150.0, 300.0]);
    }

    #[test]
    fn clamps_and_picks_segments() {
        let i = interpolate_numbers(&[0.0, 100.0, 200.0], &[0.0, 10.0, 30.0], vec![], true);
        assert_eq!(i.at(-50.0), Some(0.0));
        assert_eq!(i.at(50.0), Some(5.0));
        assert_eq!(i.at(150.0), Some(20.0));
        assert_eq!(i.at(500.0), Some(30.0));
    }

    #[test]
    fn reversed_input_range() {
        let i = interpolate_numbers(&[1.0, 0.0], &[100.0, 0.0], vec![], true);
        assert_eq!(i.at(0.25), Some(25.0));
    }

    #[test]
    fn unclamped_extrapolates() {
        let i = interpolate_numbers(&[0.0, 1.0], &[0.0, 10.0], vec![], false);
        assert_eq!(i.at(2.0), Some(20.0));
    }
}
