//! Transition options, their millisecond-resolved form and the defaults
//! picked per value.

use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use kinema_api_core::Value;

use crate::easing::{EaseSpec, Easing};
use crate::element::is_transform_prop;
use crate::generators::{InertiaOptions, SpringOptions};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    #[default]
    Loop,
    Reverse,
    Mirror,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationType {
    #[default]
    #[serde(alias = "tween")]
    Keyframes,
    Spring,
    #[serde(alias = "decay")]
    Inertia,
    /// Jump straight to the final keyframe.
    Instant,
}

/// Rewrites the projected resting point of an inertia animation.
#[derive(Clone)]
pub struct TargetModifier(pub Rc<dyn Fn(f64) -> f64>);

impl fmt::Debug for TargetModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TargetModifier(..)")
    }
}

/// Spring and inertia parameters. Unset fields fall back to generator defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsOptions {
    pub stiffness: Option<f64>,
    pub damping: Option<f64>,
    pub mass: Option<f64>,
    pub bounce: Option<f64>,
    /// Seconds.
    pub visual_duration: Option<f64>,
    pub rest_speed: Option<f64>,
    pub rest_delta: Option<f64>,
    pub power: Option<f64>,
    /// Milliseconds.
    pub time_constant: Option<f64>,
    pub bounce_stiffness: Option<f64>,
    pub bounce_damping: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(skip)]
    pub modify_target: Option<TargetModifier>,
}

impl PhysicsOptions {
    fn is_set(&self) -> bool {
        [
            self.stiffness,
            self.damping,
            self.mass,
            self.bounce,
            self.visual_duration,
            self.rest_speed,
            self.rest_delta,
            self.power,
            self.time_constant,
            self.bounce_stiffness,
            self.bounce_damping,
            self.min,
            self.max,
        ]
        .iter()
        .any(Option::is_some)
            || self.modify_target.is_some()
    }
}

/// User-facing transition. Durations and delays are in seconds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Transition {
    #[serde(rename = "type")]
    pub kind: Option<AnimationType>,
    pub duration: Option<f64>,
    pub delay: Option<f64>,
    pub ease: Option<EaseSpec>,
    pub times: Option<Vec<f64>>,
    pub repeat: Option<f64>,
    pub repeat_type: Option<RepeatType>,
    pub repeat_delay: Option<f64>,
    /// Units per second. Defaults to the value's tracked velocity.
    pub velocity: Option<f64>,
    #[serde(flatten)]
    pub physics: PhysicsOptions,
    /// Per-value overrides, keyed by value name.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub values: HashMap<String, Transition>,
}

impl Transition {
    pub fn spring() -> Self {
        Self {
            kind: Some(AnimationType::Spring),
            ..Self::default()
        }
    }

    pub fn tween(duration_s: f64, ease: impl Into<EaseSpec>) -> Self {
        Self {
            kind: Some(AnimationType::Keyframes),
            duration: Some(duration_s),
            ease: Some(ease.into()),
            ..Self::default()
        }
    }

    pub fn instant() -> Self {
        Self {
            kind: Some(AnimationType::Instant),
            ..Self::default()
        }
    }

    /// Whether anything beyond timing offsets was specified. Undefined
    /// transitions are replaced by [`default_transition`].
    pub fn is_defined(&self) -> bool {
        self.kind.is_some()
            || self.duration.is_some()
            || self.ease.is_some()
            || self.times.is_some()
            || self.physics.is_set()
    }

    /// The override registered for `name`, or this transition.
    pub fn for_value(&self, name: &str) -> Transition {
        match self.values.get(name) {
            Some(t) => t.clone(),
            None => {
                let mut t = self.clone();
                t.values.clear();
                t
            }
        }
    }
}

/// Fallback transition by value name and keyframe count.
pub fn default_transition(name: &str, keyframes: &[Option<Value>]) -> Transition {
    if is_transform_prop(name) {
        if name.starts_with("scale") {
            let target = keyframes.last().and_then(|k| k.as_ref()).and_then(Value::as_number);
            let damping = if target == Some(0.0) { 2.0 * 550f64.sqrt() } else { 30.0 };
            return Transition {
                kind: Some(AnimationType::Spring),
                physics: PhysicsOptions {
                    stiffness: Some(550.0),
                    damping: Some(damping),
                    rest_speed: Some(10.0),
                    ..PhysicsOptions::default()
                },
                ..Transition::default()
            };
        }
        return Transition {
            kind: Some(AnimationType::Spring),
            physics: PhysicsOptions {
                stiffness: Some(500.0),
                damping: Some(25.0),
                rest_speed: Some(10.0),
                ..PhysicsOptions::default()
            },
            ..Transition::default()
        };
    }
    if keyframes.len() > 2 {
        return Transition {
            kind: Some(AnimationType::Keyframes),
            duration: Some(0.8),
            ..Transition::default()
        };
    }
    Transition::tween(0.3, Easing::CubicBezier([0.25, 0.1, 0.35, 1.0]))
}

#[derive(Clone, Default)]
pub struct AnimationCallbacks {
    pub on_update: Option<Rc<dyn Fn(&Value)>>,
    pub on_play: Option<Rc<dyn Fn()>>,
    pub on_complete: Option<Rc<dyn Fn()>>,
    pub on_stop: Option<Rc<dyn Fn()>>,
}

impl fmt::Debug for AnimationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationCallbacks")
            .field("on_update", &self.on_update.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolved options handed to a controller. Times are in milliseconds.
#[derive(Clone, Debug)]
pub struct ValueAnimationOptions {
    pub name: String,
    pub keyframes: Vec<Value>,
    pub kind: AnimationType,
    pub duration: Option<f64>,
    pub ease: Option<EaseSpec>,
    pub times: Option<Vec<f64>>,
    pub delay: f64,
    pub repeat: f64,
    pub repeat_type: RepeatType,
    pub repeat_delay: f64,
    /// Units per second.
    pub velocity: f64,
    pub physics: PhysicsOptions,
    /// Symbolic keyframe written in place of the last resolved one on finish.
    pub final_keyframe: Option<Value>,
    pub start_time: Option<f64>,
    pub autoplay: bool,
    pub callbacks: AnimationCallbacks,
}

impl Default for ValueAnimationOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            keyframes: Vec::new(),
            kind: AnimationType::Keyframes,
            duration: None,
            ease: None,
            times: None,
            delay: 0.0,
            repeat: 0.0,
            repeat_type: RepeatType::Loop,
            repeat_delay: 0.0,
            velocity: 0.0,
            physics: PhysicsOptions::default(),
            final_keyframe: None,
            start_time: None,
            autoplay: true,
            callbacks: AnimationCallbacks::default(),
        }
    }
}

fn s_to_ms(s: f64) -> f64 {
    s * 1000.0
}

impl ValueAnimationOptions {
    /// Convert a seconds-based transition. `velocity` is used unless the
    /// transition carries its own.
    pub fn from_transition(name: &str, transition: &Transition, velocity: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: transition.kind.unwrap_or_default(),
            duration: transition.duration.map(s_to_ms),
            ease: transition.ease.clone(),
            times: transition.times.clone(),
            delay: transition.delay.map(s_to_ms).unwrap_or(0.0),
            repeat: transition.repeat.unwrap_or(0.0),
            repeat_type: transition.repeat_type.unwrap_or_default(),
            repeat_delay: transition.repeat_delay.map(s_to_ms).unwrap_or(0.0),
            velocity: transition.velocity.unwrap_or(velocity),
            physics: transition.physics.clone(),
            ..Self::default()
        }
    }

    pub fn spring_options(&self, origin: f64, target: f64) -> SpringOptions {
        let p = &self.physics;
        SpringOptions {
            keyframes: [origin, target],
            velocity: self.velocity,
            stiffness: p.stiffness,
            damping: p.damping,
            mass: p.mass,
            duration: self.duration,
            bounce: p.bounce,
            visual_duration: p.visual_duration,
            rest_speed: p.rest_speed,
            rest_delta: p.rest_delta,
        }
    }

    pub fn inertia_options(&self, origin: f64) -> InertiaOptions {
        let p = &self.physics;
        let d = InertiaOptions::default();
        InertiaOptions {
            origin,
            velocity: self.velocity,
            power: p.power.unwrap_or(d.power),
            time_constant: p.time_constant.unwrap_or(d.time_constant),
            bounce_damping: p.bounce_damping.unwrap_or(d.bounce_damping),
            bounce_stiffness: p.bounce_stiffness.unwrap_or(d.bounce_stiffness),
            min: p.min,
            max: p.max,
            rest_delta: p.rest_delta.unwrap_or(d.rest_delta),
            rest_speed: p.rest_speed,
            modify_target: p.modify_target.as_ref().map(|m| m.0.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_by_value() {
        let two = [Some(Value::Number(0.0)), Some(Value::Number(1.0))];
        let x = default_transition("x", &two);
        assert_eq!(x.kind, Some(AnimationType::Spring));
        assert_eq!(x.physics.stiffness, Some(500.0));

        let to_zero = [Some(Value::Number(1.0)), Some(Value::Number(0.0))];
        let scale = default_transition("scale", &to_zero);
        assert_eq!(scale.physics.damping, Some(2.0 * 550f64.sqrt()));
        assert_eq!(default_transition("scaleX", &two).physics.damping, Some(30.0));

        let three = [None, Some(Value::Number(1.0)), Some(Value::Number(2.0))];
        assert_eq!(default_transition("opacity", &three).duration, Some(0.8));
        assert_eq!(default_transition("opacity", &two).duration, Some(0.3));
    }

    #[test]
    fn parses_camel_case_json() {
        let t: Transition = serde_json::from_str(
            r#"{"type":"spring","stiffness":300,"repeatType":"mirror","repeat":2,"delay":0.5,
                "values":{"opacity":{"duration":1}}}"#,
        )
        .unwrap();
        assert!(t.is_defined());
        assert_eq!(t.kind, Some(AnimationType::Spring));
        assert_eq!(t.physics.stiffness, Some(300.0));
        assert_eq!(t.for_value("opacity").duration, Some(1.0));
        assert!(t.for_value("x").values.is_empty());

        let opts = ValueAnimationOptions::from_transition("x", &t, 12.0);
        assert_eq!(opts.delay, 500.0);
        assert_eq!(opts.repeat_type, RepeatType::Mirror);
        assert_eq!(opts.velocity, 12.0);
    }

    #[test]
    fn delay_alone_is_not_defined() {
        let t = Transition {
            delay: Some(1.0),
            ..Transition::default()
        };
        assert!(!t.is_defined());
    }
}
