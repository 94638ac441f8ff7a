//! RGBA colors and perceptual color mixing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Channels `red`, `green`, `blue` are 0..=255; `alpha` is 0..=1.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Same hue with zero alpha.
    pub fn transparent(&self) -> Rgba {
        Rgba {
            alpha: 0.0,
            ..*self
        }
    }
}

/// Mix one channel in squared (approximately linear light) space so midpoints
/// do not darken.
#[inline]
fn mix_channel(from: f64, to: f64, p: f64) -> f64 {
    let from_sq = from * from;
    let v = to * to * p + from_sq * (1.0 - p);
    if v < 0.0 {
        0.0
    } else {
        v.sqrt()
    }
}

/// Mix two colors at progress `p`.
pub fn mix_color(from: &Rgba, to: &Rgba, p: f64) -> Rgba {
    Rgba {
        red: mix_channel(from.red, to.red, p),
        green: mix_channel(from.green, to.green, p),
        blue: mix_channel(from.blue, to.blue, p),
        alpha: crate::mix::mix_number(from.alpha, to.alpha, p),
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({}, {}, {}, {})",
            self.red.round(),
            self.green.round(),
            self.blue.round(),
            self.alpha
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact() {
        let a = Rgba::new(255.0, 0.0, 12.0, 1.0);
        let b = Rgba::new(0.0, 128.0, 255.0, 0.25);
        assert_eq!(mix_color(&a, &b, 0.0), a);
        assert_eq!(mix_color(&a, &b, 1.0), b);
    }

    #[test]
    fn midpoint_is_brighter_than_linear() {
        let black = Rgba::new(0.0, 0.0, 0.0, 1.0);
        let white = Rgba::new(255.0, 255.0, 255.0, 1.0);
        let mid = mix_color(&black, &white, 0.5);
        assert!(mid.red > 127.5);
    }
}
