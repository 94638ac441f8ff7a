//! Applying deltas and transforms to boxes.

use kinema_api_core::{mix_number, Axis, Delta, LayoutBox, Point};

use crate::transform::BoxTransform;

const TREE_SCALE_SNAP_MIN: f64 = 1.0 - 1e-12;
const TREE_SCALE_SNAP_MAX: f64 = 1.0 + 1e-12;

#[inline]
pub fn scale_point(point: f64, scale: f64, origin_point: f64) -> f64 {
    let distance = point - origin_point;
    origin_point + scale * distance
}

pub fn apply_point_delta(point: f64, translate: f64, scale: f64, origin_point: f64, box_scale: Option<f64>) -> f64 {
    let point = match box_scale {
        Some(s) => scale_point(point, s, origin_point),
        None => point,
    };
    scale_point(point, scale, origin_point) + translate
}

pub fn apply_axis_delta(axis: &mut Axis, translate: f64, scale: f64, origin_point: f64, box_scale: Option<f64>) {
    axis.min = apply_point_delta(axis.min, translate, scale, origin_point, box_scale);
    axis.max = apply_point_delta(axis.max, translate, scale, origin_point, box_scale);
}

pub fn apply_box_delta(target: &mut LayoutBox, delta: &Delta) {
    apply_axis_delta(&mut target.x, delta.x.translate, delta.x.scale, delta.x.origin_point, None);
    apply_axis_delta(&mut target.y, delta.y.translate, delta.y.scale, delta.y.origin_point, None);
}

/// Translate and scale `axis` around `axis_origin` (0..1 along the axis).
pub fn transform_axis(axis: &mut Axis, translate: f64, axis_scale: f64, box_scale: Option<f64>, axis_origin: f64) {
    let origin_point = mix_number(axis.min, axis.max, axis_origin);
    apply_axis_delta(axis, translate, axis_scale, origin_point, box_scale);
}

pub fn transform_box(target: &mut LayoutBox, t: &BoxTransform) {
    transform_axis(&mut target.x, t.x, t.scale_x, t.scale, t.origin_x);
    transform_axis(&mut target.y, t.y, t.scale_y, t.scale, t.origin_y);
}

/// Undo a scroll offset.
pub fn remove_scroll(target: &mut LayoutBox, offset: Point) {
    target.x.translate(-offset.x);
    target.y.translate(-offset.y);
}

/// One ancestor's contribution when correcting a layout for the tree.
#[derive(Clone, Debug, Default)]
pub struct TreeStep {
    pub delta: Option<Delta>,
    /// Scroll offset to remove first, for scroll containers in shared transitions.
    pub scroll: Option<Point>,
    /// Own transform to apply last, in shared transitions.
    pub transform: Option<BoxTransform>,
}

/// Apply every ancestor delta to `target` and accumulate their scale into
/// `tree_scale`, snapping scales indistinguishable from 1.
pub fn apply_tree_deltas(target: &mut LayoutBox, tree_scale: &mut Point, path: &[TreeStep]) {
    if path.is_empty() {
        return;
    }
    tree_scale.x = 1.0;
    tree_scale.y = 1.0;
    for step in path {
        if let Some(offset) = step.scroll {
            remove_scroll(target, offset);
        }
        if let Some(delta) = &step.delta {
            tree_scale.x *= delta.x.scale;
            tree_scale.y *= delta.y.scale;
            apply_box_delta(target, delta);
        }
        if let Some(transform) = &step.transform {
            transform_box(target, transform);
        }
    }
    if tree_scale.x > TREE_SCALE_SNAP_MIN && tree_scale.x < TREE_SCALE_SNAP_MAX {
        tree_scale.x = 1.0;
    }
    if tree_scale.y > TREE_SCALE_SNAP_MIN && tree_scale.y < TREE_SCALE_SNAP_MAX {
        tree_scale.y = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_api_core::AxisDelta;

    fn scaled(scale: f64) -> Delta {
        let axis = AxisDelta {
            scale,
            ..AxisDelta::default()
        };
        Delta { x: axis, y: axis }
    }

    #[test]
    fn point_delta_scales_then_translates() {
        assert_eq!(apply_point_delta(10.0, 5.0, 2.0, 0.0, None), 25.0);
        assert_eq!(apply_point_delta(10.0, 0.0, 2.0, 0.0, Some(2.0)), 40.0);
    }

    #[test]
    fn tree_scale_accumulates() {
        let mut b = LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0);
        let mut scale = Point::default();
        let path = [
            TreeStep {
                delta: Some(scaled(2.0)),
                ..TreeStep::default()
            },
            TreeStep {
                delta: Some(scaled(0.25)),
                ..TreeStep::default()
            },
        ];
        apply_tree_deltas(&mut b, &mut scale, &path);
        assert_eq!(scale, Point { x: 0.5, y: 0.5 });
        assert_eq!(b.width(), 50.0);
    }

    #[test]
    fn tree_scale_snaps_inside_band() {
        let mut b = LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0);
        let mut scale = Point::default();
        let path = [TreeStep {
            delta: Some(scaled(1.0 + 1e-13)),
            ..TreeStep::default()
        }];
        apply_tree_deltas(&mut b, &mut scale, &path);
        assert_eq!(scale.x, 1.0);

        let path = [TreeStep {
            delta: Some(scaled(1.0 + 1e-9)),
            ..TreeStep::default()
        }];
        apply_tree_deltas(&mut b, &mut scale, &path);
        assert_eq!(scale.x, 1.0 + 1e-9);
    }

    #[test]
    fn empty_path_leaves_scale_alone() {
        let mut b = LayoutBox::default();
        let mut scale = Point { x: 3.0, y: 3.0 };
        apply_tree_deltas(&mut b, &mut scale, &[]);
        assert_eq!(scale.x, 3.0);
    }
}
