//! Keeping a dragged element in place relative to its constraints when
//! an ancestor resizes mid-drag.

use kinema_animation_core::MotionValue;
use kinema_api_core::{mix_number, Axis, LayoutBox, Value};
use serde::{Deserialize, Serialize};

/// Axes a drag gesture moves.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragDirection {
    #[default]
    Both,
    X,
    Y,
}

impl DragDirection {
    fn allows_x(self) -> bool {
        matches!(self, DragDirection::Both | DragDirection::X)
    }

    fn allows_y(self) -> bool {
        matches!(self, DragDirection::Both | DragDirection::Y)
    }
}

fn progress(from: f64, to: f64, value: f64) -> f64 {
    let range = to - from;
    if range == 0.0 {
        1.0
    } else {
        (value - from) / range
    }
}

/// Where `source` sits within `target`, 0..=1. Whichever axis is longer
/// provides the range.
pub fn calc_origin(source: &Axis, target: &Axis) -> f64 {
    let source_length = source.length();
    let target_length = target.length();
    let origin = if target_length > source_length {
        progress(target.min, target.max - source_length, source.min)
    } else if source_length > target_length {
        progress(source.min, source.max - target_length, target.min)
    } else {
        0.5
    };
    origin.clamp(0.0, 1.0)
}

/// Offsets a `layout` axis can be dragged by while staying inside
/// `constraints`. A layout larger than its constraints swaps the bounds.
pub fn calc_viewport_axis_constraints(layout: &Axis, constraints: &Axis) -> Axis {
    let min = constraints.min - layout.min;
    let max = constraints.max - layout.max;
    if constraints.length() < layout.length() {
        Axis::new(max, min)
    } else {
        Axis::new(min, max)
    }
}

pub fn calc_viewport_constraints(layout: &LayoutBox, constraints: &LayoutBox) -> LayoutBox {
    LayoutBox::new(
        calc_viewport_axis_constraints(&layout.x, &constraints.x),
        calc_viewport_axis_constraints(&layout.y, &constraints.y),
    )
}

fn rescale_axis(value: &MotionValue, previous: &Axis, resolved: &Axis) {
    let Some(latest) = value.get_number() else {
        return;
    };
    let origin = calc_origin(&Axis::new(latest, latest), previous);
    value.set(value.get().with_number(mix_number(resolved.min, resolved.max, origin)));
}

/// Rescale the drag offsets `x` and `y` from the `previous` resolved
/// constraints to the `resolved` ones, keeping their relative position.
/// Any running animation on the offsets is stopped.
pub fn scale_position_within_constraints(
    direction: DragDirection,
    x: &MotionValue,
    y: &MotionValue,
    previous: &LayoutBox,
    resolved: &LayoutBox,
) {
    x.stop();
    y.stop();
    if direction.allows_x() {
        rescale_axis(x, &previous.x, &resolved.x);
    }
    if direction.allows_y() {
        rescale_axis(y, &previous.y, &resolved.y);
    }
}

/// Drag offsets as motion values, with the constraints they were last
/// resolved against.
#[derive(Clone)]
pub struct DragConstraints {
    pub direction: DragDirection,
    pub x: MotionValue,
    pub y: MotionValue,
    resolved: Option<LayoutBox>,
}

impl DragConstraints {
    pub fn new(direction: DragDirection, x: MotionValue, y: MotionValue) -> Self {
        Self {
            direction,
            x,
            y,
            resolved: None,
        }
    }

    pub fn resolved(&self) -> Option<LayoutBox> {
        self.resolved
    }

    /// Resolve against a new `layout` and `constraints` box. When
    /// constraints were resolved before, the offsets are rescaled to them.
    pub fn update(&mut self, layout: &LayoutBox, constraints: &LayoutBox) {
        let next = calc_viewport_constraints(layout, constraints);
        if let Some(previous) = self.resolved {
            scale_position_within_constraints(self.direction, &self.x, &self.y, &previous, &next);
        }
        self.resolved = Some(next);
    }

    /// Clamp a drag offset on `axis` into the resolved constraints.
    pub fn clamp(&self, value: &Value, x_axis: bool) -> Value {
        let (Some(resolved), Some(n)) = (self.resolved, value.as_number()) else {
            return value.clone();
        };
        let axis = if x_axis { resolved.x } else { resolved.y };
        value.with_number(n.clamp(axis.min.min(axis.max), axis.max.max(axis.min)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_animation_core::{Engine, MotionConfig};

    #[test]
    fn origin_within_longer_axis() {
        assert_eq!(calc_origin(&Axis::new(50.0, 50.0), &Axis::new(0.0, 100.0)), 0.5);
        assert_eq!(calc_origin(&Axis::new(0.0, 0.0), &Axis::new(0.0, 100.0)), 0.0);
        assert_eq!(calc_origin(&Axis::new(200.0, 200.0), &Axis::new(0.0, 100.0)), 1.0);
        assert_eq!(calc_origin(&Axis::new(0.0, 10.0), &Axis::new(0.0, 10.0)), 0.5);
    }

    #[test]
    fn oversized_layout_swaps_bounds() {
        let c = calc_viewport_axis_constraints(&Axis::new(0.0, 300.0), &Axis::new(0.0, 100.0));
        assert_eq!(c, Axis::new(0.0, -200.0));
        let c = calc_viewport_axis_constraints(&Axis::new(10.0, 60.0), &Axis::new(0.0, 100.0));
        assert_eq!(c, Axis::new(-10.0, 40.0));
    }

    #[test]
    fn resize_keeps_relative_position() {
        let engine = Engine::new(MotionConfig::manual());
        let x = engine.motion_value(Value::px(100.0));
        let y = engine.motion_value(0.0);
        let mut drag = DragConstraints::new(DragDirection::X, x.clone(), y.clone());
        let layout = LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0);
        drag.update(&layout, &LayoutBox::from_edges(0.0, 0.0, 300.0, 100.0));
        assert_eq!(drag.resolved().unwrap().x, Axis::new(0.0, 200.0));

        drag.update(&layout, &LayoutBox::from_edges(0.0, 0.0, 500.0, 100.0));
        assert_eq!(x.get(), Value::px(200.0));
        assert_eq!(y.get(), Value::Number(0.0));
        assert_eq!(drag.clamp(&Value::px(900.0), true), Value::px(400.0));
    }
}
