//! Box and delta math for layout projection.

pub mod apply;
pub mod calc;
pub mod remove;

use kinema_api_core::{mix_number, Axis, AxisDelta, Delta, LayoutBox};

pub use apply::{apply_box_delta, apply_tree_deltas, transform_box, TreeStep};
pub use calc::{calc_box_delta, calc_relative_box, calc_relative_position, is_near};
pub use remove::remove_box_transforms;

pub fn axis_delta_equals(a: &AxisDelta, b: &AxisDelta) -> bool {
    a.translate == b.translate && a.scale == b.scale && a.origin_point == b.origin_point
}

pub fn delta_equals(a: &Delta, b: &Delta) -> bool {
    axis_delta_equals(&a.x, &b.x) && axis_delta_equals(&a.y, &b.y)
}

pub fn box_equals_rounded(a: &LayoutBox, b: &LayoutBox) -> bool {
    a.x.min.round() == b.x.min.round()
        && a.x.max.round() == b.x.max.round()
        && a.y.min.round() == b.y.min.round()
        && a.y.max.round() == b.y.max.round()
}

pub fn round_box(b: &mut LayoutBox) {
    for axis in [&mut b.x, &mut b.y] {
        axis.min = axis.min.round();
        axis.max = axis.max.round();
    }
}

pub fn aspect_ratio(b: &LayoutBox) -> f64 {
    b.x.length() / b.y.length()
}

/// Interpolate from `delta` at progress 0 to identity at progress 1.
pub fn mix_axis_delta(output: &mut AxisDelta, delta: &AxisDelta, p: f64) {
    output.translate = mix_number(delta.translate, 0.0, p);
    output.scale = mix_number(delta.scale, 1.0, p);
    output.origin = delta.origin;
    output.origin_point = delta.origin_point;
}

pub fn mix_delta(output: &mut Delta, delta: &Delta, p: f64) {
    mix_axis_delta(&mut output.x, &delta.x, p);
    mix_axis_delta(&mut output.y, &delta.y, p);
}

pub fn mix_axis(output: &mut Axis, from: &Axis, to: &Axis, p: f64) {
    output.min = mix_number(from.min, to.min, p);
    output.max = mix_number(from.max, to.max, p);
}

pub fn mix_box(output: &mut LayoutBox, from: &LayoutBox, to: &LayoutBox, p: f64) {
    mix_axis(&mut output.x, &from.x, &to.x, p);
    mix_axis(&mut output.y, &from.y, &to.y, p);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_mixes_toward_identity() {
        let from = AxisDelta {
            translate: 100.0,
            scale: 3.0,
            origin: 0.5,
            origin_point: 40.0,
        };
        let mut out = AxisDelta::default();
        mix_axis_delta(&mut out, &from, 0.5);
        assert_eq!(out.translate, 50.0);
        assert_eq!(out.scale, 2.0);
        assert_eq!(out.origin_point, 40.0);
        mix_axis_delta(&mut out, &from, 1.0);
        assert!(out.is_identity());
    }

    #[test]
    fn rounded_equality() {
        let a = LayoutBox::from_edges(0.2, 0.4, 100.3, 50.1);
        let b = LayoutBox::from_edges(0.0, 0.0, 100.0, 50.0);
        assert!(box_equals_rounded(&a, &b));
        assert!(!box_equals_rounded(&a, &LayoutBox::from_edges(0.0, 0.0, 101.0, 50.0)));
    }
}
