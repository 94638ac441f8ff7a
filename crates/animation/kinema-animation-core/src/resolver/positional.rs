//! Layout-affecting values that may need measuring to convert between units.

use kinema_api_core::{LayoutBox, Unit, Value, ValueKind};

use crate::element::VisualElement;

pub const POSITIONAL_KEYS: [&str; 10] = [
    "width",
    "height",
    "top",
    "left",
    "right",
    "bottom",
    "x",
    "y",
    "translateX",
    "translateY",
];

pub fn is_positional_key(name: &str) -> bool {
    POSITIONAL_KEYS.contains(&name)
}

/// Dimension type of a keyframe, `None` for non-dimensional values.
/// `auto` counts as its own type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DimensionType {
    Number,
    Unit(Unit),
    Auto,
}

pub fn dimension_type(v: &Value) -> Option<DimensionType> {
    match v.kind() {
        ValueKind::Number => Some(DimensionType::Number),
        ValueKind::Unit(u) => Some(DimensionType::Unit(u)),
        ValueKind::Keyword if v.as_keyword().map(str::trim) == Some("auto") => Some(DimensionType::Auto),
        _ => None,
    }
}

pub fn is_num_or_px(t: Option<DimensionType>) -> bool {
    matches!(t, Some(DimensionType::Number) | Some(DimensionType::Unit(Unit::Px)))
}

fn read_px(element: &dyn VisualElement, name: &str) -> Option<f64> {
    element.read_value(name).and_then(|v| v.as_number())
}

fn current_number(element: &dyn VisualElement, name: &str) -> f64 {
    element
        .get_value(name)
        .and_then(|v| v.get_number())
        .or_else(|| read_px(element, name))
        .unwrap_or(0.0)
}

/// Measured pixel value of a positional key.
pub fn positional_value(name: &str, bbox: &LayoutBox, element: &dyn VisualElement) -> Option<Value> {
    let padding = |a: &str, b: &str| read_px(element, a).unwrap_or(0.0) + read_px(element, b).unwrap_or(0.0);
    let px = match name {
        "width" => bbox.width() - padding("paddingLeft", "paddingRight"),
        "height" => bbox.height() - padding("paddingTop", "paddingBottom"),
        "top" => read_px(element, "top").unwrap_or(bbox.y.min),
        "left" => read_px(element, "left").unwrap_or(bbox.x.min),
        "bottom" => read_px(element, "top").unwrap_or(bbox.y.min) + bbox.height(),
        "right" => read_px(element, "left").unwrap_or(bbox.x.min) + bbox.width(),
        "x" | "translateX" | "y" | "translateY" => current_number(element, name),
        _ => return None,
    };
    Some(Value::px(px))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_types() {
        assert_eq!(dimension_type(&Value::px(1.0)), Some(DimensionType::Unit(Unit::Px)));
        assert_eq!(dimension_type(&Value::keyword("auto")), Some(DimensionType::Auto));
        assert_eq!(dimension_type(&Value::keyword("none")), None);
        assert!(is_num_or_px(dimension_type(&Value::Number(3.0))));
        assert!(!is_num_or_px(dimension_type(&Value::percent(3.0))));
    }
}
