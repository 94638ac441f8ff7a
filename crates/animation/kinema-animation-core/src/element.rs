//! The boundary between the engine and whatever renders an element.
//!
//! [`VisualElement`] is what resolvers and controllers talk to. Hosts that do
//! not want to implement it directly can plug an [`ElementAdapter`] into a
//! [`MotionElement`], which owns the motion values, batches renders into the
//! render phase and turns latest values into styles or SVG attributes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use kinema_api_core::coercion::parse_css_variable;
use kinema_api_core::{LayoutBox, Value, ValueMap};

use crate::frameloop::{Frameloop, Phase, Process};
use crate::motion_value::MotionValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Html,
    Svg,
}

/// Order in which transform values are composed.
pub const TRANSFORM_PROP_ORDER: [&str; 17] = [
    "transformPerspective",
    "x",
    "y",
    "z",
    "translateX",
    "translateY",
    "translateZ",
    "scale",
    "scaleX",
    "scaleY",
    "rotate",
    "rotateX",
    "rotateY",
    "rotateZ",
    "skew",
    "skewX",
    "skewY",
];

pub fn is_transform_prop(name: &str) -> bool {
    TRANSFORM_PROP_ORDER.contains(&name)
}

/// Identity value of a transform component.
pub fn default_transform_value(name: &str) -> f64 {
    if name.starts_with("scale") {
        1.0
    } else {
        0.0
    }
}

fn transform_function(name: &str) -> &str {
    match name {
        "x" => "translateX",
        "y" => "translateY",
        "z" => "translateZ",
        "transformPerspective" => "perspective",
        other => other,
    }
}

fn transform_unit(name: &str) -> &'static str {
    if name.starts_with("rotate") || name.starts_with("skew") {
        "deg"
    } else if name.starts_with("scale") {
        ""
    } else {
        "px"
    }
}

const PX_PROPS: &[&str] = &[
    "width",
    "height",
    "minWidth",
    "maxWidth",
    "minHeight",
    "maxHeight",
    "top",
    "right",
    "bottom",
    "left",
    "padding",
    "paddingTop",
    "paddingRight",
    "paddingBottom",
    "paddingLeft",
    "margin",
    "marginTop",
    "marginRight",
    "marginBottom",
    "marginLeft",
    "borderRadius",
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomRightRadius",
    "borderBottomLeftRadius",
    "borderWidth",
    "fontSize",
    "perspective",
];

/// CSS text for a value, adding `px` to bare numbers of length properties.
pub fn value_as_css(name: &str, value: &Value) -> String {
    match value {
        Value::Number(n) if PX_PROPS.contains(&name) => format!("{n}px"),
        Value::Number(n) if is_transform_prop(name) => format!("{n}{}", transform_unit(name)),
        other => other.to_string(),
    }
}

/// Ordered transform string for the transform values `get` knows about.
/// Identity components are skipped; all-identity yields `"none"`.
pub fn build_transform(get: impl Fn(&str) -> Option<Value>) -> String {
    let mut parts = Vec::new();
    for name in TRANSFORM_PROP_ORDER {
        let Some(value) = get(name) else { continue };
        let is_default = match value.as_number() {
            Some(n) => match value {
                Value::Number(_) => n == default_transform_value(name),
                _ => n == 0.0,
            },
            None => false,
        };
        if !is_default {
            parts.push(format!("{}({})", transform_function(name), value_as_css(name, &value)));
        }
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" ")
    }
}

/// What an element needs to expose to be animated.
pub trait VisualElement {
    fn kind(&self) -> ElementKind;

    fn get_value(&self, name: &str) -> Option<MotionValue>;

    /// Existing value for `name`, or a new one starting at `init`.
    fn get_or_create_value(&self, name: &str, init: Value) -> MotionValue;

    fn value_names(&self) -> Vec<String>;

    /// Read a value from the rendered output, used when no motion value exists.
    fn read_value(&self, name: &str) -> Option<Value>;

    fn measure_viewport_box(&self) -> LayoutBox;

    /// Resolve a `var(--name[, fallback])` keyword.
    fn resolve_css_variable(&self, token: &Value) -> Option<Value>;

    /// Commit latest values synchronously.
    fn render(&self);

    fn supports_native_animation(&self) -> bool {
        false
    }

    /// Identifier shared with a handoff source.
    fn appear_id(&self) -> Option<String> {
        None
    }
}

/// Styles and attributes produced for one render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderState {
    pub style: IndexMap<String, String>,
    pub attrs: IndexMap<String, String>,
}

/// Host hooks behind a [`MotionElement`].
pub trait ElementAdapter {
    fn read_style(&self, name: &str) -> Option<Value>;
    fn measure(&self) -> LayoutBox;
    fn css_variable(&self, name: &str) -> Option<Value>;
    fn commit(&self, state: &RenderState);
    fn supports_native_animation(&self) -> bool {
        false
    }
}

const CAMEL_ATTRIBUTES: &[&str] = &[
    "viewBox",
    "preserveAspectRatio",
    "pathLength",
    "gradientTransform",
    "patternTransform",
];

fn dash_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Turn latest values into a render state for `kind`.
pub fn build_render_state(kind: ElementKind, latest: &IndexMap<String, Value>) -> RenderState {
    let mut state = RenderState::default();
    let mut has_transform = false;
    let mut origin = [None, None, None];
    for (name, value) in latest {
        if is_transform_prop(name) {
            has_transform = true;
            continue;
        }
        match name.as_str() {
            "originX" => origin[0] = Some(value.to_string()),
            "originY" => origin[1] = Some(value.to_string()),
            "originZ" => origin[2] = Some(value.to_string()),
            _ => {
                let css = value_as_css(name, value);
                match kind {
                    ElementKind::Html => {
                        state.style.insert(name.clone(), css);
                    }
                    ElementKind::Svg if CAMEL_ATTRIBUTES.contains(&name.as_str()) || name.starts_with("--") => {
                        state.attrs.insert(name.clone(), css);
                    }
                    ElementKind::Svg => {
                        state.attrs.insert(dash_case(name), css);
                    }
                }
            }
        }
    }
    if has_transform {
        let transform = build_transform(|name| latest.get(name).cloned());
        state.style.insert("transform".into(), transform);
    }
    if origin.iter().any(Option::is_some) {
        let [x, y, z] = origin;
        state.style.insert(
            "transformOrigin".into(),
            format!(
                "{} {} {}",
                x.unwrap_or_else(|| "50%".into()),
                y.unwrap_or_else(|| "50%".into()),
                z.unwrap_or_else(|| "0".into())
            ),
        );
    }
    state
}

/// Ready-made [`VisualElement`] backed by an [`ElementAdapter`].
pub struct MotionElement {
    kind: ElementKind,
    frameloop: Frameloop,
    adapter: Rc<dyn ElementAdapter>,
    values: RefCell<IndexMap<String, MotionValue>>,
    appear_id: RefCell<Option<String>>,
    render_process: Process,
    render_count: Cell<u64>,
}

impl MotionElement {
    pub fn new(kind: ElementKind, frameloop: &Frameloop, adapter: Rc<dyn ElementAdapter>) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<MotionElement>| {
            let weak = weak.clone();
            let render_process = frameloop.create_process(Phase::Render, move |_| {
                if let Some(element) = weak.upgrade() {
                    element.render();
                }
            });
            MotionElement {
                kind,
                frameloop: frameloop.clone(),
                adapter,
                values: RefCell::new(IndexMap::new()),
                appear_id: RefCell::new(None),
                render_process,
                render_count: Cell::new(0),
            }
        })
    }

    pub fn set_appear_id(&self, id: impl Into<String>) {
        *self.appear_id.borrow_mut() = Some(id.into());
    }

    /// Register `value` under `name`; its writes schedule a render.
    pub fn add_value(&self, name: &str, value: MotionValue) {
        let frameloop = self.frameloop.clone();
        let process = self.render_process.clone();
        // Kept attached for the value's lifetime.
        let _ = value.on_render_request(move |_| frameloop.schedule_process(&process, false, false));
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    pub fn remove_value(&self, name: &str) -> Option<MotionValue> {
        self.values.borrow_mut().shift_remove(name)
    }

    pub fn latest_values(&self) -> ValueMap {
        self.values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect()
    }

    pub fn build_render_state(&self) -> RenderState {
        let latest: IndexMap<String, Value> = self
            .values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect();
        build_render_state(self.kind, &latest)
    }

    /// Number of commits so far.
    pub fn render_count(&self) -> u64 {
        self.render_count.get()
    }
}

impl VisualElement for MotionElement {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn get_value(&self, name: &str) -> Option<MotionValue> {
        self.values.borrow().get(name).cloned()
    }

    fn get_or_create_value(&self, name: &str, init: Value) -> MotionValue {
        if let Some(existing) = self.get_value(name) {
            return existing;
        }
        let value = MotionValue::new(&self.frameloop, init);
        self.add_value(name, value.clone());
        value
    }

    fn value_names(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }

    fn read_value(&self, name: &str) -> Option<Value> {
        if is_transform_prop(name) {
            return Some(Value::Number(default_transform_value(name)));
        }
        self.adapter.read_style(name)
    }

    fn measure_viewport_box(&self) -> LayoutBox {
        self.adapter.measure()
    }

    fn resolve_css_variable(&self, token: &Value) -> Option<Value> {
        let (name, fallback) = parse_css_variable(token)?;
        self.adapter.css_variable(&name).or_else(|| {
            fallback.map(|f| match f.parse::<f64>() {
                Ok(n) => Value::Number(n),
                Err(_) => Value::keyword(f),
            })
        })
    }

    fn render(&self) {
        let state = self.build_render_state();
        self.render_count.set(self.render_count.get() + 1);
        self.adapter.commit(&state);
    }

    fn supports_native_animation(&self) -> bool {
        self.adapter.supports_native_animation()
    }

    fn appear_id(&self) -> Option<String> {
        self.appear_id.borrow().clone()
    }
}

impl fmt::Debug for MotionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionElement")
            .field("kind", &self.kind)
            .field("values", &self.value_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionConfig;

    #[derive(Default)]
    struct Recorder {
        commits: RefCell<Vec<RenderState>>,
    }

    impl ElementAdapter for Recorder {
        fn read_style(&self, _name: &str) -> Option<Value> {
            None
        }
        fn measure(&self) -> LayoutBox {
            LayoutBox::default()
        }
        fn css_variable(&self, name: &str) -> Option<Value> {
            (name == "--gap").then(|| Value::px(8.0))
        }
        fn commit(&self, state: &RenderState) {
            self.commits.borrow_mut().push(state.clone());
        }
    }

    #[test]
    fn transform_order_and_units() {
        let mut latest = IndexMap::new();
        latest.insert("rotate".to_string(), Value::Number(45.0));
        latest.insert("x".to_string(), Value::Number(10.0));
        latest.insert("scale".to_string(), Value::Number(1.0));
        let t = build_transform(|n| latest.get(n).cloned());
        assert_eq!(t, "translateX(10px) rotate(45deg)");

        latest.insert("x".to_string(), Value::Number(0.0));
        latest.insert("rotate".to_string(), Value::Number(0.0));
        assert_eq!(build_transform(|n| latest.get(n).cloned()), "none");
    }

    #[test]
    fn svg_attributes_are_dash_cased() {
        let mut latest = IndexMap::new();
        latest.insert("strokeWidth".to_string(), Value::Number(2.0));
        latest.insert("viewBox".to_string(), Value::keyword("0 0 10 10"));
        latest.insert("originX".to_string(), Value::percent(0.0));
        let state = build_render_state(ElementKind::Svg, &latest);
        assert_eq!(state.attrs.get("stroke-width").map(String::as_str), Some("2"));
        assert!(state.attrs.contains_key("viewBox"));
        assert_eq!(
            state.style.get("transformOrigin").map(String::as_str),
            Some("0% 50% 0")
        );
    }

    #[test]
    fn writes_batch_into_one_render() {
        let fl = Frameloop::new(&MotionConfig::manual());
        let adapter = Rc::new(Recorder::default());
        let element = MotionElement::new(ElementKind::Html, &fl, adapter.clone());
        let width = element.get_or_create_value("width", Value::Number(10.0));
        let opacity = element.get_or_create_value("opacity", Value::Number(1.0));
        width.set(20.0);
        opacity.set(0.5);
        fl.process_batch();
        let commits = adapter.commits.borrow();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].style.get("width").map(String::as_str), Some("20px"));
        assert_eq!(commits[0].style.get("opacity").map(String::as_str), Some("0.5"));
    }

    #[test]
    fn css_variables_use_fallback() {
        let fl = Frameloop::new(&MotionConfig::manual());
        let element = MotionElement::new(ElementKind::Html, &fl, Rc::new(Recorder::default()));
        assert_eq!(
            element.resolve_css_variable(&Value::keyword("var(--gap)")),
            Some(Value::px(8.0))
        );
        assert_eq!(
            element.resolve_css_variable(&Value::keyword("var(--missing, 3)")),
            Some(Value::Number(3.0))
        );
    }
}
