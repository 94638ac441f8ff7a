//! Hand-off of eligible animations to a host-native animator.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, warn};

use kinema_api_core::Value;

use super::js::JsAnimation;
use super::transition::{AnimationType, RepeatType, ValueAnimationOptions};
use super::{get_final_keyframe, AnimationPlaybackControls, AnimationState};
use crate::easing::{EaseSpec, Easing};
use crate::element::VisualElement;
use crate::frameloop::Frameloop;
use crate::generators::keyframes::DEFAULT_DURATION;
use crate::generators::{generator_easing, linear_easing_string, MAX_GENERATOR_DURATION};
use crate::motion_value::MotionValue;
use crate::Result;

/// Step used when sampling generators for native playback, in milliseconds.
const SAMPLE_DELTA: f64 = 10.0;

/// Native easing description.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeEasing {
    Named(&'static str),
    CubicBezier([f64; 4]),
    /// A `linear(...)` point list.
    Linear(String),
    PerSegment(Vec<NativeEasing>),
}

impl fmt::Display for NativeEasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeEasing::Named(name) => f.write_str(name),
            NativeEasing::CubicBezier([a, b, c, d]) => write!(f, "cubic-bezier({a}, {b}, {c}, {d})"),
            NativeEasing::Linear(points) => f.write_str(points),
            NativeEasing::PerSegment(list) => {
                let parts: Vec<String> = list.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

fn map_single(ease: &Easing, duration: f64, supports_linear: bool) -> NativeEasing {
    match ease {
        Easing::Linear => NativeEasing::Named("linear"),
        Easing::EaseIn => NativeEasing::Named("ease-in"),
        Easing::EaseOut => NativeEasing::Named("ease-out"),
        Easing::EaseInOut => NativeEasing::Named("ease-in-out"),
        Easing::CubicBezier(curve) => NativeEasing::CubicBezier(*curve),
        Easing::CircIn => NativeEasing::CubicBezier([0.0, 0.65, 0.55, 1.0]),
        Easing::CircOut => NativeEasing::CubicBezier([0.55, 0.0, 1.0, 0.45]),
        Easing::BackIn => NativeEasing::CubicBezier([0.31, 0.01, 0.66, -0.59]),
        Easing::BackOut => NativeEasing::CubicBezier([0.33, 1.53, 0.69, 0.99]),
        other if supports_linear => {
            let e = other.clone();
            NativeEasing::Linear(linear_easing_string(move |p| e.ease(p), duration, SAMPLE_DELTA))
        }
        other => {
            debug!("easing {:?} has no native form, using ease-out", other.name());
            NativeEasing::Named("ease-out")
        }
    }
}

/// Convert an easing for native playback over `duration` milliseconds.
pub fn map_easing_to_native(ease: &EaseSpec, duration: f64, supports_linear: bool) -> NativeEasing {
    match ease {
        EaseSpec::Single(e) => map_single(e, duration, supports_linear),
        EaseSpec::PerSegment(list) => {
            NativeEasing::PerSegment(list.iter().map(|e| map_single(e, duration, supports_linear)).collect())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NativeAnimationOptions {
    pub delay: f64,
    pub duration: f64,
    pub easing: NativeEasing,
    pub times: Option<Vec<f64>>,
    pub iterations: f64,
    pub alternate: bool,
}

/// A running native animation owned by the host.
pub trait NativeAnimationHandle {
    fn play(&self);
    fn pause(&self);
    fn cancel(&self) -> Result<()>;
    fn commit_styles(&self) -> Result<()>;
    /// Milliseconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&self, ms: f64);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    fn is_finished(&self) -> bool;
    fn set_on_finish(&self, on_finish: Box<dyn FnOnce()>);
}

/// Host collaborator able to run compositor animations.
pub trait NativeAnimator {
    fn supports_linear_easing(&self) -> bool;
    fn start_animation(
        &self,
        element: &dyn VisualElement,
        name: &str,
        keyframes: &[Value],
        options: &NativeAnimationOptions,
    ) -> Result<Rc<dyn NativeAnimationHandle>>;
}

/// Sample a generator-driven animation every 10ms into linear keyframes.
pub fn pregenerate_keyframes(frameloop: &Frameloop, options: &ValueAnimationOptions) -> ValueAnimationOptions {
    let sampler = JsAnimation::new(
        frameloop,
        ValueAnimationOptions {
            repeat: 0.0,
            delay: 0.0,
            autoplay: false,
            callbacks: Default::default(),
            ..options.clone()
        },
    );
    let mut frames = Vec::new();
    let mut t = 0.0;
    loop {
        let state = sampler.sample(t);
        frames.push(state.value);
        t += SAMPLE_DELTA;
        if state.done || t >= MAX_GENERATOR_DURATION {
            break;
        }
    }
    ValueAnimationOptions {
        keyframes: frames,
        kind: AnimationType::Keyframes,
        duration: Some(t - SAMPLE_DELTA),
        ease: Some(Easing::Linear.into()),
        times: None,
        ..options.clone()
    }
}

struct NativeInner {
    handle: Rc<dyn NativeAnimationHandle>,
    value: MotionValue,
    /// Options the handle was started with, used to reconstruct position.
    sample_options: ValueAnimationOptions,
    duration: f64,
    state: Cell<AnimationState>,
    is_stopped: Cell<bool>,
    on_finish: RefCell<Vec<Box<dyn FnOnce()>>>,
    finished: Cell<bool>,
}

/// Animation delegated to a [`NativeAnimator`]. The motion value is written
/// only on finish or interruption.
#[derive(Clone)]
pub struct NativeAnimation {
    inner: Rc<NativeInner>,
}

impl NativeAnimation {
    pub fn start(
        animator: &dyn NativeAnimator,
        element: &dyn VisualElement,
        value: &MotionValue,
        options: ValueAnimationOptions,
    ) -> Result<NativeAnimation> {
        let frameloop = value.frameloop().clone();
        let supports_linear = animator.supports_linear_easing();
        let mut run = options;
        let mut easing = None;
        let mut generated_duration = None;

        if run.kind == AnimationType::Spring {
            let solved = if supports_linear {
                generator_easing(&run.spring_options(0.0, 100.0))
            } else {
                None
            };
            match solved {
                Some((ease, duration)) => {
                    easing = Some(map_single(&ease, duration, true));
                    generated_duration = Some(duration);
                }
                None => run = pregenerate_keyframes(&frameloop, &run),
            }
        }

        let duration = generated_duration.or(run.duration).unwrap_or(DEFAULT_DURATION);
        let easing = easing.unwrap_or_else(|| {
            let ease = run.ease.clone().unwrap_or(EaseSpec::Single(Easing::EaseInOut));
            map_easing_to_native(&ease, duration, supports_linear)
        });
        let native_options = NativeAnimationOptions {
            delay: run.delay,
            duration,
            easing,
            times: run.times.clone(),
            iterations: run.repeat + 1.0,
            alternate: run.repeat_type == RepeatType::Reverse,
        };
        let handle = animator.start_animation(element, &run.name, &run.keyframes, &native_options)?;
        if let Some(start_time) = run.start_time {
            handle.set_current_time(frameloop.now() - start_time);
        }
        debug!("native animation started for {:?}", run.name);

        let animation = NativeAnimation {
            inner: Rc::new(NativeInner {
                handle: handle.clone(),
                value: value.clone(),
                sample_options: run,
                duration,
                state: Cell::new(AnimationState::Running),
                is_stopped: Cell::new(false),
                on_finish: RefCell::new(Vec::new()),
                finished: Cell::new(false),
            }),
        };
        let weak: Weak<NativeInner> = Rc::downgrade(&animation.inner);
        handle.set_on_finish(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                NativeAnimation { inner }.finish();
            }
        }));
        Ok(animation)
    }

    fn resolve_finished(&self) {
        self.inner.finished.set(true);
        let callbacks = std::mem::take(&mut *self.inner.on_finish.borrow_mut());
        for cb in callbacks {
            cb();
        }
    }

    fn cancel_handle(&self) {
        if let Err(err) = self.inner.handle.cancel() {
            warn!("native cancel failed for {:?}: {err}", self.inner.sample_options.name);
        }
    }

    fn finish(&self) {
        if self.inner.state.get() == AnimationState::Finished {
            return;
        }
        let options = &self.inner.sample_options;
        let frames: Vec<Option<Value>> = options.keyframes.iter().cloned().map(Some).collect();
        if let Some(v) = get_final_keyframe(
            &frames,
            options.repeat,
            options.repeat_type,
            options.final_keyframe.as_ref(),
            self.speed(),
        ) {
            self.inner.value.set(v);
        }
        self.inner.state.set(AnimationState::Finished);
        if let Some(on_complete) = &options.callbacks.on_complete {
            on_complete();
        }
        self.cancel_handle();
        self.resolve_finished();
    }
}

impl AnimationPlaybackControls for NativeAnimation {
    fn play(&self) {
        if self.inner.state.get() == AnimationState::Finished {
            return;
        }
        self.inner.handle.play();
        self.inner.state.set(AnimationState::Running);
        self.inner.finished.set(false);
    }

    fn pause(&self) {
        self.inner.handle.pause();
        self.inner.state.set(AnimationState::Paused);
    }

    /// Reconstructs the on-screen position and velocity from a software
    /// sample before cancelling the native effect.
    fn stop(&self) {
        if self.inner.is_stopped.replace(true) {
            return;
        }
        if matches!(self.inner.state.get(), AnimationState::Idle | AnimationState::Finished) {
            return;
        }
        let time = self.time();
        if time != 0.0 {
            let sampler = JsAnimation::new(
                self.inner.value.frameloop(),
                ValueAnimationOptions {
                    autoplay: false,
                    callbacks: Default::default(),
                    ..self.inner.sample_options.clone()
                },
            );
            let prev = sampler.sample(time - SAMPLE_DELTA).value;
            let current = sampler.sample(time).value;
            self.inner.value.set_with_velocity(prev, current, SAMPLE_DELTA);
        }
        if let Some(on_stop) = &self.inner.sample_options.callbacks.on_stop {
            on_stop();
        }
        self.cancel();
        self.resolve_finished();
    }

    fn complete(&self) {
        self.finish();
    }

    fn cancel(&self) {
        self.cancel_handle();
        if self.inner.state.get() != AnimationState::Finished {
            self.inner.state.set(AnimationState::Idle);
        }
    }

    fn then(&self, on_finish: Box<dyn FnOnce()>) {
        if self.inner.finished.get() {
            on_finish();
        } else {
            self.inner.on_finish.borrow_mut().push(on_finish);
        }
    }

    fn time(&self) -> f64 {
        self.inner.handle.current_time()
    }

    fn set_time(&self, ms: f64) {
        self.inner.handle.set_current_time(ms);
    }

    fn speed(&self) -> f64 {
        self.inner.handle.playback_rate()
    }

    fn set_speed(&self, speed: f64) {
        self.inner.handle.set_playback_rate(speed);
    }

    fn duration(&self) -> f64 {
        self.inner.duration
    }

    fn state(&self) -> AnimationState {
        if self.inner.handle.is_finished() {
            return AnimationState::Finished;
        }
        self.inner.state.get()
    }
}

impl fmt::Debug for NativeAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeAnimation")
            .field("name", &self.inner.sample_options.name)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionConfig;

    #[test]
    fn easing_strings() {
        assert_eq!(map_single(&Easing::EaseOut, 300.0, false).to_string(), "ease-out");
        assert_eq!(
            map_single(&Easing::BackOut, 300.0, false).to_string(),
            "cubic-bezier(0.33, 1.53, 0.69, 0.99)"
        );
        assert_eq!(map_single(&Easing::Anticipate, 300.0, false).to_string(), "ease-out");
        let stepped = Easing::Steps(4, crate::easing::StepDirection::End);
        let linear = map_single(&stepped, 300.0, true).to_string();
        assert!(linear.starts_with("linear(0, "));
        // End-aligned steps never reach the final step.
        assert!(linear.ends_with(", 0.75)"));
    }

    #[test]
    fn pregenerated_spring_settles_on_target() {
        let fl = Frameloop::new(&MotionConfig::manual());
        let options = ValueAnimationOptions {
            keyframes: vec![Value::Number(0.0), Value::Number(1.0)],
            kind: AnimationType::Spring,
            ..ValueAnimationOptions::default()
        };
        let generated = pregenerate_keyframes(&fl, &options);
        assert_eq!(generated.kind, AnimationType::Keyframes);
        assert_eq!(generated.keyframes.first(), Some(&Value::Number(0.0)));
        assert_eq!(generated.keyframes.last(), Some(&Value::Number(1.0)));
        let expected = (generated.keyframes.len() as f64 - 1.0) * SAMPLE_DELTA;
        assert_eq!(generated.duration, Some(expected));
    }
}
