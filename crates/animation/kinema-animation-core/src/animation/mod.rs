//! Animation controllers: drive a generator across frames (or hand the work to
//! a native animator) and write the result into a motion value.

mod animate;
mod handoff;
mod js;
mod native;
mod transition;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use kinema_api_core::Value;

pub use animate::{
    animate, animate_value, can_animate, supports_native_animation, AnimateOptions, AsyncAnimation, InstantAnimation,
};
pub use handoff::{HandoffSource, HandoffTable};
pub use js::{JsAnimation, JsAnimationOptions};
pub use native::{
    map_easing_to_native, pregenerate_keyframes, NativeAnimation, NativeAnimationHandle, NativeAnimationOptions,
    NativeAnimator, NativeEasing,
};
pub use transition::{
    default_transition, AnimationCallbacks, AnimationType, PhysicsOptions, RepeatType, TargetModifier, Transition,
    ValueAnimationOptions,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Playback surface shared by software, native and pending animations.
/// Times are in milliseconds.
pub trait AnimationPlaybackControls {
    fn play(&self);
    fn pause(&self);
    /// Halt in place and settle the finish callbacks.
    fn stop(&self);
    /// Jump to the terminal keyframe.
    fn complete(&self);
    /// Return to the initial keyframe and go idle.
    fn cancel(&self);
    /// Run `on_finish` once the animation finishes or stops.
    fn then(&self, on_finish: Box<dyn FnOnce()>);
    fn time(&self) -> f64;
    fn set_time(&self, ms: f64);
    fn speed(&self) -> f64;
    fn set_speed(&self, speed: f64);
    fn duration(&self) -> f64;
    fn state(&self) -> AnimationState;
}

pub type AnimationHandle = Rc<dyn AnimationPlaybackControls>;

/// Terminal keyframe of a playback, honoring odd reversed repeats and
/// negative speed. A symbolic `final_keyframe` replaces the resolved last
/// keyframe.
pub fn get_final_keyframe(
    keyframes: &[Option<Value>],
    repeat: f64,
    repeat_type: RepeatType,
    final_keyframe: Option<&Value>,
    speed: f64,
) -> Option<Value> {
    let resolved: Vec<&Value> = keyframes.iter().flatten().collect();
    if resolved.is_empty() {
        return None;
    }
    let odd_reversed = repeat != 0.0 && repeat_type != RepeatType::Loop && repeat % 2.0 == 1.0;
    let index = if speed < 0.0 || odd_reversed {
        0
    } else {
        resolved.len() - 1
    };
    match final_keyframe {
        Some(f) if index != 0 => Some(f.clone()),
        _ => Some(resolved[index].clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kf(values: &[Option<f64>]) -> Vec<Option<Value>> {
        values.iter().map(|v| v.map(Value::Number)).collect()
    }

    #[test]
    fn final_keyframe_rules() {
        let frames = kf(&[None, Some(1.0), Some(2.0)]);
        assert_eq!(
            get_final_keyframe(&frames, 0.0, RepeatType::Loop, None, 1.0),
            Some(Value::Number(2.0))
        );
        assert_eq!(
            get_final_keyframe(&frames, 1.0, RepeatType::Reverse, None, 1.0),
            Some(Value::Number(1.0))
        );
        assert_eq!(
            get_final_keyframe(&frames, 1.0, RepeatType::Loop, None, 1.0),
            Some(Value::Number(2.0))
        );
        assert_eq!(
            get_final_keyframe(&frames, 0.0, RepeatType::Loop, None, -1.0),
            Some(Value::Number(1.0))
        );
        let none = Value::none();
        assert_eq!(
            get_final_keyframe(&frames, 0.0, RepeatType::Loop, Some(&none), 1.0),
            Some(none)
        );
        assert_eq!(get_final_keyframe(&kf(&[None]), 0.0, RepeatType::Loop, None, 1.0), None);
    }
}
