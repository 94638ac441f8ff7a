//! Crossfading values between the outgoing and incoming members of a
//! shared layout stack.

use kinema_animation_core::Easing;
use kinema_api_core::{mix_number, Unit, Value, ValueMap};

const BORDERS: [&str; 4] = [
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomLeftRadius",
    "borderBottomRightRadius",
];

/// Remap `p` so the curve runs between `min` and `max` and is flat outside.
fn compress(min: f64, max: f64, p: f64, easing: impl Fn(f64) -> f64) -> f64 {
    if p < min {
        return 0.0;
    }
    if p > max {
        return 1.0;
    }
    easing((p - min) / (max - min))
}

/// Fade-in curve of the lead, complete by the midpoint.
pub fn ease_crossfade_in(p: f64) -> f64 {
    compress(0.0, 0.5, p, |t| Easing::CircOut.ease(t))
}

/// Fade-out curve of the follower, starting at the midpoint.
pub fn ease_crossfade_out(p: f64) -> f64 {
    compress(0.5, 0.95, p, |t| t)
}

fn opacity(values: &ValueMap) -> f64 {
    values.get("opacity").and_then(Value::as_number).unwrap_or(1.0)
}

fn radius<'a>(values: &'a ValueMap, name: &str) -> Option<&'a Value> {
    values.get(name).or_else(|| values.get("borderRadius"))
}

fn is_percent(value: &Value) -> bool {
    matches!(value, Value::Unit(_, Unit::Percent))
}

fn is_px(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::Unit(_, Unit::Px))
}

fn is_zero(value: &Value) -> bool {
    value.as_number() == Some(0.0)
}

/// Write the crossfaded opacity, border radii and rotation of `follow` and
/// `lead` at `progress` into `target`.
///
/// With `crossfade_opacity` the lead fades in on `opacity` while the
/// follower fades out on `opacityExit`. A lone member with no crossfade
/// mixes its own opacity instead.
pub fn mix_values(
    target: &mut ValueMap,
    follow: &ValueMap,
    lead: &ValueMap,
    progress: f64,
    crossfade_opacity: bool,
    is_only_member: bool,
) {
    if crossfade_opacity {
        target.insert(
            "opacity".into(),
            Value::Number(mix_number(0.0, opacity(lead), ease_crossfade_in(progress))),
        );
        target.insert(
            "opacityExit".into(),
            Value::Number(mix_number(opacity(follow), 0.0, ease_crossfade_out(progress))),
        );
    } else if is_only_member {
        target.insert(
            "opacity".into(),
            Value::Number(mix_number(opacity(follow), opacity(lead), progress)),
        );
    }

    let zero = Value::Number(0.0);
    for name in BORDERS {
        let (follow_radius, lead_radius) = match (radius(follow, name), radius(lead, name)) {
            (None, None) => continue,
            (f, l) => (f.unwrap_or(&zero), l.unwrap_or(&zero)),
        };
        let can_mix = is_zero(follow_radius) || is_zero(lead_radius) || is_px(follow_radius) == is_px(lead_radius);
        let mixed = if can_mix {
            let n = mix_number(
                follow_radius.as_number().unwrap_or(0.0),
                lead_radius.as_number().unwrap_or(0.0),
                progress,
            )
            .max(0.0);
            if is_percent(lead_radius) || is_percent(follow_radius) {
                Value::percent(n)
            } else {
                Value::px(n)
            }
        } else {
            lead_radius.clone()
        };
        target.insert(name.into(), mixed);
    }

    let rotate = |v: &ValueMap| v.get("rotate").and_then(Value::as_number).unwrap_or(0.0);
    let (follow_rotate, lead_rotate) = (rotate(follow), rotate(lead));
    if follow_rotate != 0.0 || lead_rotate != 0.0 {
        target.insert("rotate".into(), Value::Number(mix_number(follow_rotate, lead_rotate, progress)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> ValueMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn crossfade_curves_split_at_midpoint() {
        assert_eq!(ease_crossfade_in(0.0), 0.0);
        assert_eq!(ease_crossfade_in(0.5), 1.0);
        assert_eq!(ease_crossfade_in(0.8), 1.0);
        assert_eq!(ease_crossfade_out(0.4), 0.0);
        assert_eq!(ease_crossfade_out(0.5), 0.0);
        assert_eq!(ease_crossfade_out(0.96), 1.0);
    }

    #[test]
    fn opacity_crossfades() {
        let mut target = ValueMap::new();
        let follow = map(&[("opacity", Value::Number(1.0))]);
        let lead = map(&[("opacity", Value::Number(0.8))]);
        mix_values(&mut target, &follow, &lead, 0.5, true, false);
        assert_eq!(target["opacity"], Value::Number(0.8));
        assert_eq!(target["opacityExit"], Value::Number(1.0));

        let mut target = ValueMap::new();
        mix_values(&mut target, &follow, &lead, 0.5, false, true);
        assert!((target["opacity"].as_number().unwrap() - 0.9).abs() < 1e-12);
        assert!(!target.contains_key("opacityExit"));
    }

    #[test]
    fn radii_fall_back_to_shorthand_and_keep_units() {
        let mut target = ValueMap::new();
        let follow = map(&[("borderRadius", Value::px(10.0))]);
        let lead = map(&[("borderTopLeftRadius", Value::px(30.0))]);
        mix_values(&mut target, &follow, &lead, 0.5, false, false);
        assert_eq!(target["borderTopLeftRadius"], Value::px(20.0));
        assert_eq!(target["borderBottomRightRadius"], Value::px(5.0));

        let mut target = ValueMap::new();
        let follow = map(&[("borderRadius", Value::percent(50.0))]);
        let lead = map(&[("borderRadius", Value::px(8.0))]);
        mix_values(&mut target, &follow, &lead, 0.25, false, false);
        assert_eq!(target["borderTopRightRadius"], Value::px(8.0));

        let lead = map(&[("borderRadius", Value::Number(0.0))]);
        mix_values(&mut target, &follow, &lead, 0.5, false, false);
        assert_eq!(target["borderTopRightRadius"], Value::percent(25.0));
    }

    #[test]
    fn rotation_only_when_present() {
        let mut target = ValueMap::new();
        mix_values(&mut target, &ValueMap::new(), &ValueMap::new(), 0.5, false, false);
        assert!(target.is_empty());
        mix_values(
            &mut target,
            &map(&[("rotate", Value::Number(90.0))]),
            &ValueMap::new(),
            0.5,
            false,
            false,
        );
        assert_eq!(target["rotate"], Value::Number(45.0));
    }
}
