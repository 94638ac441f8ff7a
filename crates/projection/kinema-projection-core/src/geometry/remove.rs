//! Inverse of [`super::apply`]: strip a transform out of a measured box.

use kinema_api_core::{mix_number, Axis, LayoutBox, Unit, Value, ValueMap};

use super::apply::scale_point;
use crate::transform::number_or;

pub fn remove_point_delta(point: f64, translate: f64, scale: f64, origin_point: f64, box_scale: Option<f64>) -> f64 {
    let mut point = point - translate;
    point = scale_point(point, 1.0 / scale, origin_point);
    if let Some(s) = box_scale {
        point = scale_point(point, 1.0 / s, origin_point);
    }
    point
}

/// Remove a translate/scale from `axis`. Percentage translates resolve
/// against `source`; the origin is taken from `origin_axis`.
#[allow(clippy::too_many_arguments)]
pub fn remove_axis_delta(
    axis: &mut Axis,
    translate: Option<&Value>,
    scale: f64,
    origin: f64,
    box_scale: Option<f64>,
    origin_axis: Option<&Axis>,
    source: Option<&Axis>,
) {
    let source = *source.unwrap_or(axis);
    let translate = match translate {
        Some(Value::Unit(pct, Unit::Percent)) => mix_number(source.min, source.max, pct / 100.0) - source.min,
        Some(v) => match v.as_number() {
            Some(n) => n,
            None => return,
        },
        None => 0.0,
    };
    let same_axis = origin_axis.is_none();
    let origin_axis = *origin_axis.unwrap_or(axis);
    let mut origin_point = mix_number(origin_axis.min, origin_axis.max, origin);
    if same_axis {
        origin_point -= translate;
    }
    axis.min = remove_point_delta(axis.min, translate, scale, origin_point, box_scale);
    axis.max = remove_point_delta(axis.max, translate, scale, origin_point, box_scale);
}

/// Remove `values`' own transform from `target`.
pub fn remove_box_transforms(
    target: &mut LayoutBox,
    values: &ValueMap,
    origin_box: Option<&LayoutBox>,
    source_box: Option<&LayoutBox>,
) {
    let box_scale = values.get("scale").and_then(Value::as_number);
    remove_axis_delta(
        &mut target.x,
        values.get("x"),
        number_or(values.get("scaleX"), 1.0),
        number_or(values.get("originX"), 0.5),
        box_scale,
        origin_box.map(|b| &b.x),
        source_box.map(|b| &b.x),
    );
    remove_axis_delta(
        &mut target.y,
        values.get("y"),
        number_or(values.get("scaleY"), 1.0),
        number_or(values.get("originY"), 0.5),
        box_scale,
        origin_box.map(|b| &b.y),
        source_box.map(|b| &b.y),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::apply::transform_axis;

    #[test]
    fn remove_undoes_transform() {
        let original = Axis::new(100.0, 200.0);
        let mut axis = original;
        transform_axis(&mut axis, 30.0, 2.0, None, 0.5);
        assert_ne!(axis, original);
        remove_axis_delta(&mut axis, Some(&Value::px(30.0)), 2.0, 0.5, None, None, None);
        assert!((axis.min - original.min).abs() < 1e-9);
        assert!((axis.max - original.max).abs() < 1e-9);
    }

    #[test]
    fn percent_translate_uses_source_axis() {
        let mut axis = Axis::new(50.0, 150.0);
        let source = Axis::new(0.0, 100.0);
        remove_axis_delta(&mut axis, Some(&Value::percent(50.0)), 1.0, 0.5, None, None, Some(&source));
        assert_eq!(axis, Axis::new(0.0, 100.0));
    }

    #[test]
    fn keyword_translate_is_ignored() {
        let mut axis = Axis::new(10.0, 20.0);
        remove_axis_delta(&mut axis, Some(&Value::keyword("auto")), 2.0, 0.5, None, None, None);
        assert_eq!(axis, Axis::new(10.0, 20.0));
    }
}
