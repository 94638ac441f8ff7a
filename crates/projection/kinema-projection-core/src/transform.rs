//! Reading transforms out of latest values, and building the projection
//! transform string.

use std::fmt::Write;

use kinema_api_core::{Delta, Point, Value, ValueMap};

#[inline]
pub fn number_or(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(Value::as_number).unwrap_or(default)
}

fn non_zero(values: &ValueMap, key: &str) -> bool {
    values.get(key).and_then(Value::as_number).is_some_and(|n| n != 0.0)
}

fn is_identity_scale(values: &ValueMap, key: &str) -> bool {
    values.get(key).and_then(Value::as_number).map_or(true, |s| s == 1.0)
}

pub fn has_scale(values: &ValueMap) -> bool {
    !is_identity_scale(values, "scale") || !is_identity_scale(values, "scaleX") || !is_identity_scale(values, "scaleY")
}

pub fn has_2d_translate(values: &ValueMap) -> bool {
    non_zero(values, "x") || non_zero(values, "y")
}

pub fn has_transform(values: &ValueMap) -> bool {
    has_scale(values)
        || has_2d_translate(values)
        || ["z", "rotate", "rotateX", "rotateY", "skewX", "skewY"]
            .iter()
            .any(|k| non_zero(values, k))
}

/// The translate/scale part of an element's own transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoxTransform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub scale: Option<f64>,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for BoxTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            scale: None,
            origin_x: 0.5,
            origin_y: 0.5,
        }
    }
}

impl BoxTransform {
    pub fn from_values(values: &ValueMap) -> Self {
        Self {
            x: number_or(values.get("x"), 0.0),
            y: number_or(values.get("y"), 0.0),
            scale_x: number_or(values.get("scaleX"), 1.0),
            scale_y: number_or(values.get("scaleY"), 1.0),
            scale: values.get("scale").and_then(Value::as_number),
            origin_x: number_or(values.get("originX"), 0.5),
            origin_y: number_or(values.get("originY"), 0.5),
        }
    }

    /// Pure translation, used to undo scroll offsets.
    pub fn translation(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

/// CSS transform rendering a layout as `delta` describes, cancelling the
/// inherited `tree_scale` and keeping the element's own rotation and skew.
pub fn build_projection_transform(delta: &Delta, tree_scale: Point, latest: Option<&ValueMap>) -> String {
    let mut transform = String::new();
    let x_translate = delta.x.translate / tree_scale.x;
    let y_translate = delta.y.translate / tree_scale.y;
    let z_translate = latest.map_or(0.0, |v| number_or(v.get("z"), 0.0));
    if x_translate != 0.0 || y_translate != 0.0 || z_translate != 0.0 {
        let _ = write!(transform, "translate3d({x_translate}px, {y_translate}px, {z_translate}px) ");
    }
    if tree_scale.x != 1.0 || tree_scale.y != 1.0 {
        let _ = write!(transform, "scale({}, {}) ", 1.0 / tree_scale.x, 1.0 / tree_scale.y);
    }
    if let Some(values) = latest {
        let perspective = number_or(values.get("transformPerspective"), 0.0);
        if perspective != 0.0 {
            transform = format!("perspective({perspective}px) {transform}");
        }
        for (key, function) in [
            ("rotate", "rotate"),
            ("rotateX", "rotateX"),
            ("rotateY", "rotateY"),
            ("skewX", "skewX"),
            ("skewY", "skewY"),
        ] {
            let angle = number_or(values.get(key), 0.0);
            if angle != 0.0 {
                let _ = write!(transform, "{function}({angle}deg) ");
            }
        }
    }
    let element_scale_x = delta.x.scale * tree_scale.x;
    let element_scale_y = delta.y.scale * tree_scale.y;
    if element_scale_x != 1.0 || element_scale_y != 1.0 {
        let _ = write!(transform, "scale({element_scale_x}, {element_scale_y})");
    }
    let transform = transform.trim_end();
    if transform.is_empty() {
        "none".to_string()
    } else {
        transform.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_api_core::AxisDelta;

    fn values(pairs: &[(&str, f64)]) -> ValueMap {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::Number(*v))).collect()
    }

    #[test]
    fn transform_detection() {
        assert!(!has_transform(&values(&[("scale", 1.0), ("x", 0.0)])));
        assert!(has_transform(&values(&[("rotate", 45.0)])));
        assert!(has_scale(&values(&[("scaleY", 0.5)])));
        assert!(has_2d_translate(&values(&[("y", 3.0)])));
    }

    #[test]
    fn identity_renders_none() {
        let s = build_projection_transform(&Delta::default(), Point { x: 1.0, y: 1.0 }, None);
        assert_eq!(s, "none");
    }

    #[test]
    fn tree_scale_is_cancelled() {
        let delta = Delta {
            x: AxisDelta {
                translate: 20.0,
                scale: 2.0,
                ..AxisDelta::default()
            },
            y: AxisDelta::default(),
        };
        let s = build_projection_transform(
            &delta,
            Point { x: 0.5, y: 1.0 },
            Some(&values(&[("rotate", 10.0)])),
        );
        assert_eq!(s, "translate3d(40px, 0px, 0px) scale(2, 1) rotate(10deg)");
    }
}
