//! Easing curves: named definitions, cubic beziers, steps and custom functions.

mod cubic_bezier;
mod modifiers;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize, Serializer};

pub use cubic_bezier::cubic_bezier;
pub use modifiers::{mirror_easing, reverse_easing};

use crate::error::{AnimationError, Result};

pub const EASE_IN: [f64; 4] = [0.42, 0.0, 1.0, 1.0];
pub const EASE_OUT: [f64; 4] = [0.0, 0.0, 0.58, 1.0];
pub const EASE_IN_OUT: [f64; 4] = [0.42, 0.0, 0.58, 1.0];
pub const EASE: [f64; 4] = [0.25, 0.1, 0.25, 1.0];
pub const BACK_OUT: [f64; 4] = [0.33, 1.53, 0.69, 0.99];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Start,
    #[default]
    End,
}

/// Shared easing closure.
#[derive(Clone)]
pub struct EasingFn(pub Rc<dyn Fn(f64) -> f64>);

impl fmt::Debug for EasingFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EasingFn(..)")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(try_from = "EasingRepr")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
    CircIn,
    CircOut,
    CircInOut,
    BackIn,
    BackOut,
    BackInOut,
    Anticipate,
    CubicBezier([f64; 4]),
    Steps(u32, StepDirection),
    Custom(EasingFn),
}

fn circ_in(p: f64) -> f64 {
    1.0 - p.clamp(-1.0, 1.0).acos().sin()
}

fn back_out(p: f64) -> f64 {
    cubic_bezier(BACK_OUT, p)
}

fn back_in(p: f64) -> f64 {
    reverse_easing(back_out, p)
}

fn anticipate(p: f64) -> f64 {
    let p = p * 2.0;
    if p < 1.0 {
        0.5 * back_in(p)
    } else {
        0.5 * (2.0 - 2f64.powf(-10.0 * (p - 1.0)))
    }
}

fn steps(count: u32, direction: StepDirection, p: f64) -> f64 {
    let count = count.max(1) as f64;
    let rounded = match direction {
        StepDirection::End => (p.min(0.999) * count).floor(),
        StepDirection::Start => (p.max(0.001) * count).ceil(),
    };
    (rounded / count).clamp(0.0, 1.0)
}

impl Easing {
    /// Look up a named definition.
    pub fn from_name(name: &str) -> Result<Easing> {
        Ok(match name {
            "linear" => Easing::Linear,
            "ease" => Easing::CubicBezier(EASE),
            "easeIn" => Easing::EaseIn,
            "easeOut" => Easing::EaseOut,
            "easeInOut" => Easing::EaseInOut,
            "circIn" => Easing::CircIn,
            "circOut" => Easing::CircOut,
            "circInOut" => Easing::CircInOut,
            "backIn" => Easing::BackIn,
            "backOut" => Easing::BackOut,
            "backInOut" => Easing::BackInOut,
            "anticipate" => Easing::Anticipate,
            _ => {
                return Err(AnimationError::UnknownEasing {
                    name: name.to_string(),
                })
            }
        })
    }

    pub fn name(&self) -> Option<&'static str> {
        Some(match self {
            Easing::Linear => "linear",
            Easing::EaseIn => "easeIn",
            Easing::EaseOut => "easeOut",
            Easing::EaseInOut => "easeInOut",
            Easing::CircIn => "circIn",
            Easing::CircOut => "circOut",
            Easing::CircInOut => "circInOut",
            Easing::BackIn => "backIn",
            Easing::BackOut => "backOut",
            Easing::BackInOut => "backInOut",
            Easing::Anticipate => "anticipate",
            _ => return None,
        })
    }

    pub fn custom(f: impl Fn(f64) -> f64 + 'static) -> Easing {
        Easing::Custom(EasingFn(Rc::new(f)))
    }

    /// Map linear progress to eased progress.
    pub fn ease(&self, p: f64) -> f64 {
        match self {
            Easing::Linear => p,
            Easing::EaseIn => cubic_bezier(EASE_IN, p),
            Easing::EaseOut => cubic_bezier(EASE_OUT, p),
            Easing::EaseInOut => cubic_bezier(EASE_IN_OUT, p),
            Easing::CircIn => circ_in(p),
            Easing::CircOut => reverse_easing(circ_in, p),
            Easing::CircInOut => mirror_easing(circ_in, p),
            Easing::BackIn => back_in(p),
            Easing::BackOut => back_out(p),
            Easing::BackInOut => mirror_easing(back_in, p),
            Easing::Anticipate => anticipate(p),
            Easing::CubicBezier(curve) => cubic_bezier(*curve, p),
            Easing::Steps(n, dir) => steps(*n, *dir, p),
            Easing::Custom(f) => (f.0)(p),
        }
    }

    #[inline]
    pub fn is_bezier(&self) -> bool {
        matches!(self, Easing::CubicBezier(_))
    }
}

impl PartialEq for Easing {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Easing::CubicBezier(a), Easing::CubicBezier(b)) => a == b,
            (Easing::Steps(a, da), Easing::Steps(b, db)) => a == b && da == db,
            (Easing::Custom(a), Easing::Custom(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => self.name().is_some() && self.name() == other.name(),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum EasingRepr {
    Name(String),
    Bezier([f64; 4]),
    Steps {
        steps: u32,
        #[serde(default)]
        direction: StepDirection,
    },
}

impl TryFrom<EasingRepr> for Easing {
    type Error = AnimationError;

    fn try_from(repr: EasingRepr) -> Result<Easing> {
        match repr {
            EasingRepr::Name(name) => Easing::from_name(&name),
            EasingRepr::Bezier(curve) => Ok(Easing::CubicBezier(curve)),
            EasingRepr::Steps { steps, direction } => Ok(Easing::Steps(steps, direction)),
        }
    }
}

impl Serialize for Easing {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let repr = match self {
            Easing::CubicBezier(curve) => EasingRepr::Bezier(*curve),
            Easing::Steps(steps, direction) => EasingRepr::Steps {
                steps: *steps,
                direction: *direction,
            },
            Easing::Custom(_) => {
                return Err(serde::ser::Error::custom(
                    "custom easing functions cannot be serialized",
                ))
            }
            named => EasingRepr::Name(named.name().unwrap_or("easeInOut").to_string()),
        };
        repr.serialize(serializer)
    }
}

/// One easing for every segment, or one per segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EaseSpec {
    Single(Easing),
    PerSegment(Vec<Easing>),
}

impl EaseSpec {
    /// Expand to exactly `segments` easings, repeating a single easing and
    /// padding short lists with linear.
    pub fn for_segments(&self, segments: usize) -> Vec<Easing> {
        match self {
            EaseSpec::Single(e) => vec![e.clone(); segments],
            EaseSpec::PerSegment(list) => (0..segments)
                .map(|i| list.get(i).cloned().unwrap_or(Easing::Linear))
                .collect(),
        }
    }
}

impl From<Easing> for EaseSpec {
    fn from(e: Easing) -> Self {
        EaseSpec::Single(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hold_for_named_curves() {
        for name in [
            "linear", "easeIn", "easeOut", "easeInOut", "circIn", "circOut", "circInOut",
            "backIn", "backOut", "backInOut",
        ] {
            let e = Easing::from_name(name).unwrap();
            assert!(e.ease(0.0).abs() < 1e-9, "{name} at 0");
            assert!((e.ease(1.0) - 1.0).abs() < 1e-9, "{name} at 1");
        }
    }

    #[test]
    fn back_in_undershoots() {
        assert!(Easing::BackIn.ease(0.2) < 0.0);
        assert!(Easing::BackOut.ease(0.8) > 1.0);
    }

    #[test]
    fn steps_quantize() {
        let e = Easing::Steps(4, StepDirection::End);
        assert_eq!(e.ease(0.3), 0.25);
        assert_eq!(e.ease(1.0), 0.75);
        let s = Easing::Steps(4, StepDirection::Start);
        assert_eq!(s.ease(0.0), 0.25);
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert!(matches!(
            Easing::from_name("wobble"),
            Err(AnimationError::UnknownEasing { .. })
        ));
    }

    #[test]
    fn serde_forms() {
        let named: Easing = serde_json::from_str("\"circOut\"").unwrap();
        assert_eq!(named, Easing::CircOut);
        let bezier: EaseSpec = serde_json::from_str("[0.4, 0, 0.1, 1]").unwrap();
        assert_eq!(bezier, EaseSpec::Single(Easing::CubicBezier([0.4, 0.0, 0.1, 1.0])));
        let list: EaseSpec = serde_json::from_str("[\"easeIn\", \"linear\"]").unwrap();
        assert_eq!(list.for_segments(3).len(), 3);
        assert_eq!(serde_json::to_string(&Easing::BackOut).unwrap(), "\"backOut\"");
    }
}
