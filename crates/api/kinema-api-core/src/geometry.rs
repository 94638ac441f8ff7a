//! Layout geometry: axes, boxes and the deltas between them.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One-dimensional extent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.min == 0.0 && self.max == 0.0
    }

    #[inline]
    pub fn translate(&mut self, distance: f64) {
        self.min += distance;
        self.max += distance;
    }
}

/// Axis-aligned box in viewport coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: Axis,
    pub y: Axis,
}

impl LayoutBox {
    pub const fn new(x: Axis, y: Axis) -> Self {
        Self { x, y }
    }

    /// Build from `top/left/right/bottom` edges.
    pub fn from_edges(top: f64, left: f64, right: f64, bottom: f64) -> Self {
        Self {
            x: Axis::new(left, right),
            y: Axis::new(top, bottom),
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    /// Collapsed in both axes: nothing to animate from.
    #[inline]
    pub fn is_collapsed(&self) -> bool {
        self.x.length() == 0.0 && self.y.length() == 0.0
    }

    pub fn width(&self) -> f64 {
        self.x.length()
    }

    pub fn height(&self) -> f64 {
        self.y.length()
    }
}

/// Per-axis transform turning one box into another.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisDelta {
    pub translate: f64,
    pub scale: f64,
    /// Normalized origin (0..1) within the source axis.
    pub origin: f64,
    /// Absolute origin in viewport coordinates.
    pub origin_point: f64,
}

impl Default for AxisDelta {
    fn default() -> Self {
        Self {
            translate: 0.0,
            scale: 1.0,
            origin: 0.0,
            origin_point: 0.0,
        }
    }
}

impl AxisDelta {
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.translate == 0.0 && self.scale == 1.0
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub x: AxisDelta,
    pub y: AxisDelta,
}

impl Delta {
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.x.is_identity() && self.y.is_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_and_extent() {
        let b = LayoutBox::from_edges(10.0, 20.0, 120.0, 60.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 50.0);
        assert!(!b.is_zero());
        assert!(LayoutBox::from_edges(5.0, 5.0, 5.0, 5.0).is_collapsed());
        assert!(LayoutBox::default().is_zero());
    }

    #[test]
    fn default_delta_is_identity() {
        assert!(Delta::default().is_identity());
        let mut d = Delta::default();
        d.y.scale = 2.0;
        assert!(!d.is_identity());
    }
}
