//! Deltas between boxes, and boxes relative to a parent.

use kinema_api_core::{mix_number, Axis, AxisDelta, Delta, LayoutBox};

const SCALE_PRECISION: f64 = 0.0001;
const SCALE_MIN: f64 = 1.0 - SCALE_PRECISION;
const SCALE_MAX: f64 = 1.0 + SCALE_PRECISION;
const TRANSLATE_PRECISION: f64 = 0.01;

#[inline]
pub fn is_near(value: f64, target: f64, max_distance: f64) -> bool {
    (value - target).abs() <= max_distance
}

/// Delta that makes `source` look like `target`, measured around `origin`
/// (0..1 along the source axis). Near-identity results snap to identity.
pub fn calc_axis_delta(delta: &mut AxisDelta, source: &Axis, target: &Axis, origin: f64) {
    delta.origin = origin;
    delta.origin_point = mix_number(source.min, source.max, origin);
    delta.scale = target.length() / source.length();
    delta.translate = mix_number(target.min, target.max, origin) - delta.origin_point;

    if (SCALE_MIN..=SCALE_MAX).contains(&delta.scale) || delta.scale.is_nan() {
        delta.scale = 1.0;
    }
    if (-TRANSLATE_PRECISION..=TRANSLATE_PRECISION).contains(&delta.translate) || delta.translate.is_nan() {
        delta.translate = 0.0;
    }
}

pub fn calc_box_delta(delta: &mut Delta, source: &LayoutBox, target: &LayoutBox, origin: (f64, f64)) {
    calc_axis_delta(&mut delta.x, &source.x, &target.x, origin.0);
    calc_axis_delta(&mut delta.y, &source.y, &target.y, origin.1);
}

/// Absolute axis from one expressed relative to `parent`.
pub fn calc_relative_axis(target: &mut Axis, relative: &Axis, parent: &Axis) {
    target.min = parent.min + relative.min;
    target.max = target.min + relative.length();
}

pub fn calc_relative_box(target: &mut LayoutBox, relative: &LayoutBox, parent: &LayoutBox) {
    calc_relative_axis(&mut target.x, &relative.x, &parent.x);
    calc_relative_axis(&mut target.y, &relative.y, &parent.y);
}

/// `layout` expressed relative to `parent`.
pub fn calc_relative_axis_position(target: &mut Axis, layout: &Axis, parent: &Axis) {
    target.min = layout.min - parent.min;
    target.max = target.min + layout.length();
}

pub fn calc_relative_position(target: &mut LayoutBox, layout: &LayoutBox, parent: &LayoutBox) {
    calc_relative_axis_position(&mut target.x, &layout.x, &parent.x);
    calc_relative_axis_position(&mut target.y, &layout.y, &parent.y);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_between_boxes() {
        let mut d = AxisDelta::default();
        calc_axis_delta(&mut d, &Axis::new(0.0, 100.0), &Axis::new(100.0, 300.0), 0.5);
        assert_eq!(d.origin_point, 50.0);
        assert_eq!(d.scale, 2.0);
        assert_eq!(d.translate, 150.0);
    }

    #[test]
    fn near_identity_snaps() {
        let mut d = AxisDelta::default();
        calc_axis_delta(&mut d, &Axis::new(0.0, 100.0), &Axis::new(0.005, 100.00005), 0.5);
        assert_eq!(d.scale, 1.0);
        assert_eq!(d.translate, 0.0);
    }

    #[test]
    fn collapsed_source_is_identity() {
        let mut d = AxisDelta::default();
        calc_axis_delta(&mut d, &Axis::new(0.0, 0.0), &Axis::new(0.0, 0.0), 0.5);
        assert!(d.is_identity());
    }

    #[test]
    fn relative_round_trip() {
        let parent = LayoutBox::from_edges(10.0, 20.0, 220.0, 110.0);
        let layout = LayoutBox::from_edges(30.0, 40.0, 90.0, 80.0);
        let mut relative = LayoutBox::default();
        calc_relative_position(&mut relative, &layout, &parent);
        assert_eq!(relative.x, Axis::new(20.0, 70.0));
        let mut absolute = LayoutBox::default();
        calc_relative_box(&mut absolute, &relative, &parent);
        assert_eq!(absolute, layout);
    }
}
