//! Projection styles: the transform, origin and opacity that render a
//! node's layout as its target, plus scale correction for values that
//! distort under a scale transform.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use kinema_animation_core::element::value_as_css;
use kinema_api_core::{mix_number, Axis, Delta, LayoutBox, Point, Token, Unit, Value, ValueMap};

use crate::transform::{build_projection_transform, has_transform};

/// Style properties to commit, in insertion order.
pub type StyleMap = IndexMap<String, String>;

/// What a corrector may read from the lead node.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScaleContext {
    pub target: Option<LayoutBox>,
    pub tree_scale: Point,
    pub projection_delta: Delta,
}

type CorrectFn = dyn Fn(&Value, &ScaleContext) -> String;

#[derive(Clone)]
pub struct ScaleCorrector {
    pub correct: Rc<CorrectFn>,
    /// Properties receiving the corrected value. Empty means the key itself.
    pub apply_to: Vec<String>,
}

impl ScaleCorrector {
    pub fn new(correct: impl Fn(&Value, &ScaleContext) -> String + 'static) -> Self {
        Self {
            correct: Rc::new(correct),
            apply_to: Vec::new(),
        }
    }

    pub fn applied_to(mut self, props: &[&str]) -> Self {
        self.apply_to = props.iter().map(|p| p.to_string()).collect();
        self
    }
}

impl fmt::Debug for ScaleCorrector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleCorrector").field("apply_to", &self.apply_to).finish()
    }
}

const RADII: [&str; 4] = [
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomLeftRadius",
    "borderBottomRightRadius",
];

/// Registry of scale correctors keyed by value name.
#[derive(Clone, Debug)]
pub struct ScaleCorrectors {
    entries: IndexMap<String, ScaleCorrector>,
}

impl Default for ScaleCorrectors {
    fn default() -> Self {
        let mut correctors = Self {
            entries: IndexMap::new(),
        };
        correctors.register("borderRadius", ScaleCorrector::new(correct_border_radius).applied_to(&RADII));
        for radius in RADII {
            correctors.register(radius, ScaleCorrector::new(correct_border_radius));
        }
        correctors.register("boxShadow", ScaleCorrector::new(correct_box_shadow));
        correctors
    }
}

impl ScaleCorrectors {
    pub fn register(&mut self, name: &str, corrector: ScaleCorrector) {
        self.entries.insert(name.to_string(), corrector);
    }

    pub fn get(&self, name: &str) -> Option<&ScaleCorrector> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScaleCorrector)> {
        self.entries.iter()
    }
}

pub fn pixels_to_percent(pixels: f64, axis: &Axis) -> f64 {
    if axis.max == axis.min {
        return 0.0;
    }
    pixels / axis.length() * 100.0
}

/// Express a pixel radius as per-axis percentages of the lead's target so
/// it survives the projection scale. Other units pass through.
pub fn correct_border_radius(latest: &Value, ctx: &ScaleContext) -> String {
    let pixels = match latest {
        Value::Number(n) | Value::Unit(n, Unit::Px) => *n,
        other => return value_as_css("borderRadius", other),
    };
    let Some(target) = ctx.target else {
        return value_as_css("borderRadius", latest);
    };
    let x = pixels_to_percent(pixels, &target.x);
    let y = pixels_to_percent(pixels, &target.y);
    format!("{x}% {y}%")
}

/// Divide shadow offsets by the axis scale and blur/spread by the average
/// scale. Shadow lists with more than five parts are left untouched.
pub fn correct_box_shadow(latest: &Value, ctx: &ScaleContext) -> String {
    let Value::Complex(shadow) = latest else {
        return latest.to_string();
    };
    if shadow.animatable_count() > 5 {
        return latest.to_string();
    }
    let x_scale = ctx.projection_delta.x.scale * ctx.tree_scale.x;
    let y_scale = ctx.projection_delta.y.scale * ctx.tree_scale.y;
    let average = mix_number(x_scale, y_scale, 0.5);

    let mut corrected = shadow.clone();
    let mut parts = corrected
        .tokens
        .iter_mut()
        .filter(|t| !matches!(t, Token::Text(_)))
        .peekable();
    if matches!(parts.peek(), Some(Token::Color(_))) {
        parts.next();
    }
    for (index, part) in parts.enumerate() {
        let divisor = match index {
            0 => x_scale,
            1 => y_scale,
            2 | 3 => average,
            _ => break,
        };
        match part {
            Token::Number(n) | Token::Unit(n, _) => *n /= divisor,
            _ if index < 2 => continue,
            _ => break,
        }
    }
    Value::Complex(corrected).to_string()
}

/// Inputs for [`projected_styles`], gathered from a node and its lead.
#[derive(Debug)]
pub struct StyleSource<'a> {
    pub is_lead: bool,
    pub has_layout_id: bool,
    pub projection_delta: &'a Delta,
    pub tree_scale: Point,
    /// The lead's animation values while it animates, else its latest values.
    pub lead_values: &'a ValueMap,
    pub lead_animating: bool,
    pub latest_values: &'a ValueMap,
    pub preserve_opacity: bool,
    pub pointer_events: Option<&'a str>,
    pub lead_target: Option<LayoutBox>,
}

fn css_opacity(v: Option<&Value>) -> Option<String> {
    v.map(|v| value_as_css("opacity", v))
}

/// Styles for a node with a projection delta and a resolved lead target.
pub fn projected_styles(source: &StyleSource<'_>, correctors: &ScaleCorrectors) -> StyleMap {
    let mut styles = StyleMap::new();
    styles.insert("visibility".into(), String::new());

    let transform = build_projection_transform(source.projection_delta, source.tree_scale, Some(source.lead_values));
    let delta = source.projection_delta;
    styles.insert(
        "transformOrigin".into(),
        format!("{}% {}% 0", delta.x.origin * 100.0, delta.y.origin * 100.0),
    );

    let opacity = if source.lead_animating {
        if source.is_lead {
            css_opacity(source.lead_values.get("opacity").or_else(|| source.latest_values.get("opacity")))
                .unwrap_or_else(|| "1".into())
        } else if source.preserve_opacity {
            css_opacity(source.latest_values.get("opacity")).unwrap_or_default()
        } else {
            css_opacity(source.lead_values.get("opacityExit")).unwrap_or_default()
        }
    } else if source.is_lead {
        css_opacity(source.lead_values.get("opacity")).unwrap_or_default()
    } else {
        css_opacity(source.lead_values.get("opacityExit")).unwrap_or_else(|| "0".into())
    };
    styles.insert("opacity".into(), opacity);

    let context = ScaleContext {
        target: source.lead_target,
        tree_scale: source.tree_scale,
        projection_delta: *delta,
    };
    for (key, corrector) in correctors.iter() {
        let Some(value) = source.lead_values.get(key) else {
            continue;
        };
        let corrected = if transform == "none" {
            value_as_css(key, value)
        } else {
            (corrector.correct)(value, &context)
        };
        if corrector.apply_to.is_empty() {
            styles.insert(key.clone(), corrected);
        } else {
            for prop in &corrector.apply_to {
                styles.insert(prop.clone(), corrected.clone());
            }
        }
    }

    if source.has_layout_id {
        let pointer_events = if source.is_lead {
            source.pointer_events.unwrap_or_default().to_string()
        } else {
            "none".to_string()
        };
        styles.insert("pointerEvents".into(), pointer_events);
    }
    styles.insert("transform".into(), transform);
    styles
}

/// Styles for a node that cannot project yet. `has_projected` is cleared
/// once the stale transform has been reset.
pub fn unprojected_styles(
    latest_values: &ValueMap,
    has_layout_id: bool,
    pointer_events: Option<&str>,
    has_projected: &mut bool,
) -> StyleMap {
    let mut styles = StyleMap::new();
    if has_layout_id {
        styles.insert(
            "opacity".into(),
            css_opacity(latest_values.get("opacity")).unwrap_or_else(|| "1".into()),
        );
        styles.insert("pointerEvents".into(), pointer_events.unwrap_or_default().to_string());
    }
    if *has_projected && !has_transform(latest_values) {
        styles.insert("transform".into(), "none".into());
        *has_projected = false;
    }
    styles
}

pub fn hidden_styles() -> StyleMap {
    let mut styles = StyleMap::new();
    styles.insert("visibility".into(), "hidden".into());
    styles
}

/// Styles clearing every projection output after a tree reset.
pub fn reset_styles(pointer_events: Option<&str>) -> StyleMap {
    let mut styles = StyleMap::new();
    styles.insert("visibility".into(), String::new());
    styles.insert("opacity".into(), String::new());
    styles.insert("pointerEvents".into(), pointer_events.unwrap_or_default().to_string());
    styles.insert("transform".into(), "none".into());
    styles
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_api_core::{AxisDelta, Complex, Rgba};

    fn scaled(x: f64, y: f64) -> Delta {
        Delta {
            x: AxisDelta {
                scale: x,
                origin: 0.5,
                ..AxisDelta::default()
            },
            y: AxisDelta {
                scale: y,
                origin: 0.5,
                ..AxisDelta::default()
            },
        }
    }

    #[test]
    fn border_radius_becomes_percentages() {
        let ctx = ScaleContext {
            target: Some(LayoutBox::from_edges(0.0, 0.0, 200.0, 100.0)),
            ..ScaleContext::default()
        };
        assert_eq!(correct_border_radius(&Value::px(20.0), &ctx), "10% 20%");
        assert_eq!(correct_border_radius(&Value::percent(50.0), &ctx), "50%");
        assert_eq!(correct_border_radius(&Value::Number(4.0), &ScaleContext::default()), "4px");
    }

    #[test]
    fn box_shadow_divides_by_scale() {
        let shadow = Value::Complex(Complex::new(vec![
            Token::Unit(10.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Unit(20.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Unit(30.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Color(Rgba::new(0.0, 0.0, 0.0, 0.5)),
        ]));
        let ctx = ScaleContext {
            tree_scale: Point { x: 1.0, y: 1.0 },
            projection_delta: scaled(2.0, 4.0),
            ..ScaleContext::default()
        };
        let corrected = correct_box_shadow(&shadow, &ctx);
        assert!(corrected.starts_with("5px 5px 10px "), "{corrected}");
    }

    #[test]
    fn box_shadow_skips_leading_color() {
        let shadow = Value::Complex(Complex::new(vec![
            Token::Color(Rgba::new(0.0, 0.0, 0.0, 1.0)),
            Token::Text(" ".into()),
            Token::Unit(8.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Unit(8.0, Unit::Px),
        ]));
        let ctx = ScaleContext {
            tree_scale: Point { x: 1.0, y: 1.0 },
            projection_delta: scaled(2.0, 2.0),
            ..ScaleContext::default()
        };
        assert!(correct_box_shadow(&shadow, &ctx).ends_with(" 4px 4px"));
    }

    #[test]
    fn follower_opacity_uses_exit_value() {
        let delta = scaled(2.0, 2.0);
        let lead_values: ValueMap = [("opacityExit".to_string(), Value::Number(0.25))].into_iter().collect();
        let latest = ValueMap::new();
        let source = StyleSource {
            is_lead: false,
            has_layout_id: true,
            projection_delta: &delta,
            tree_scale: Point { x: 1.0, y: 1.0 },
            lead_values: &lead_values,
            lead_animating: true,
            latest_values: &latest,
            preserve_opacity: false,
            pointer_events: None,
            lead_target: None,
        };
        let styles = projected_styles(&source, &ScaleCorrectors::default());
        assert_eq!(styles["opacity"], "0.25");
        assert_eq!(styles["pointerEvents"], "none");
        assert_eq!(styles["transformOrigin"], "50% 50% 0");
        assert_eq!(styles["transform"], "scale(2, 2)");
    }

    #[test]
    fn radius_uncorrected_without_transform() {
        let delta = Delta::default();
        let lead_values: ValueMap = [("borderRadius".to_string(), Value::Number(12.0))].into_iter().collect();
        let source = StyleSource {
            is_lead: true,
            has_layout_id: false,
            projection_delta: &delta,
            tree_scale: Point { x: 1.0, y: 1.0 },
            lead_values: &lead_values,
            lead_animating: false,
            latest_values: &lead_values,
            preserve_opacity: false,
            pointer_events: None,
            lead_target: Some(LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0)),
        };
        let styles = projected_styles(&source, &ScaleCorrectors::default());
        assert_eq!(styles["borderTopLeftRadius"], "12px");
        assert_eq!(styles["transform"], "none");
        assert!(!styles.contains_key("borderRadius"));
    }
}
