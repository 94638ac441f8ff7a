//! Starting animations on motion values: transition defaults, the instant
//! path, keyframe resolution and the choice between native and software
//! playback.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

use kinema_api_core::coercion::is_animatable;
use kinema_api_core::Value;

use super::js::JsAnimation;
use super::native::NativeAnimation;
use super::transition::{
    default_transition, AnimationCallbacks, AnimationType, RepeatType, Transition, ValueAnimationOptions,
};
use super::{get_final_keyframe, AnimationHandle, AnimationPlaybackControls, AnimationState};
use crate::easing::Easing;
use crate::element::{is_transform_prop, ElementKind, VisualElement};
use crate::engine::Engine;
use crate::frameloop::Process;
use crate::motion_value::MotionValue;
use crate::resolver::KeyframeResolver;

/// Resolution slower than this starts the animation at resolution time
/// instead of creation time, in milliseconds.
const MAX_RESOLVE_DELAY: f64 = 40.0;

const ACCELERATED_VALUES: [&str; 4] = ["opacity", "clipPath", "filter", "transform"];

#[derive(Clone, Default)]
pub struct AnimateOptions {
    pub transition: Transition,
    /// Element owning the value. Enables reads, measurement and native playback.
    pub element: Option<Rc<dyn VisualElement>>,
    /// Extra callbacks, run after the value has been written.
    pub callbacks: AnimationCallbacks,
}

impl fmt::Debug for AnimateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimateOptions")
            .field("transition", &self.transition)
            .field("element", &self.element.is_some())
            .finish_non_exhaustive()
    }
}

/// Whether resolved keyframes describe something worth animating.
pub fn can_animate(keyframes: &[Value], name: &str, kind: AnimationType, velocity: f64) -> bool {
    let Some(origin) = keyframes.first() else {
        return false;
    };
    if name == "display" || name == "visibility" {
        return true;
    }
    let Some(target) = keyframes.last() else {
        return false;
    };
    let animatable = |v: &Value| name != "zIndex" && is_animatable(v);
    let (origin_ok, target_ok) = (animatable(origin), animatable(target));
    if origin_ok != target_ok {
        warn!(
            "cannot animate {name} from {origin} to {target}: {} is not animatable",
            if origin_ok { target } else { origin }
        );
    }
    if !origin_ok || !target_ok {
        return false;
    }
    let changed = keyframes.iter().any(|k| k != origin);
    changed || (matches!(kind, AnimationType::Spring | AnimationType::Inertia) && velocity != 0.0)
}

/// Whether these options can run on a native animator for `element`.
pub fn supports_native_animation(
    options: &ValueAnimationOptions,
    has_update_callback: bool,
    element: Option<&dyn VisualElement>,
) -> bool {
    let Some(element) = element else {
        return false;
    };
    element.kind() == ElementKind::Html
        && element.supports_native_animation()
        && ACCELERATED_VALUES.contains(&options.name.as_str())
        && !has_update_callback
        && options.repeat_delay == 0.0
        && options.repeat_type != RepeatType::Mirror
        && options.physics.damping != Some(0.0)
        && options.kind != AnimationType::Inertia
}

/// Animate `value`, known to its element as `name`, through `keyframes`.
/// A `None` keyframe is a wildcard: the first stands for the current value,
/// later ones repeat their predecessor.
pub fn animate(
    engine: &Engine,
    value: &MotionValue,
    name: &str,
    keyframes: Vec<Option<Value>>,
    options: AnimateOptions,
) -> AnimationHandle {
    let engine = engine.clone();
    let target = value.clone();
    let name = name.to_string();
    value.start(move || start_animation(&engine, &target, &name, keyframes, options))
}

/// Animate `value` from where it is to `to`.
pub fn animate_value(engine: &Engine, value: &MotionValue, to: impl Into<Value>, transition: Transition) -> AnimationHandle {
    animate(
        engine,
        value,
        "",
        vec![None, Some(to.into())],
        AnimateOptions {
            transition,
            ..AnimateOptions::default()
        },
    )
}

fn start_animation(
    engine: &Engine,
    value: &MotionValue,
    name: &str,
    keyframes: Vec<Option<Value>>,
    options: AnimateOptions,
) -> AnimationHandle {
    let AnimateOptions {
        transition,
        element,
        callbacks,
    } = options;
    let mut value_transition = transition.for_value(name);
    if engine.should_reduce_motion() && is_transform_prop(name) {
        value_transition.kind = Some(AnimationType::Instant);
    }

    let mut start_time = None;
    let mut is_handoff = false;
    if let (Some(source), Some(appear_id)) = (engine.handoff(), element.as_ref().and_then(|e| e.appear_id())) {
        if let Some(t) = source.start_time(&appear_id, name) {
            debug!("handing off {name} of {appear_id} started at {t:.1}ms");
            source.release(&appear_id, name);
            start_time = Some(t);
            is_handoff = true;
        }
    }

    let mut opts = ValueAnimationOptions::from_transition(name, &value_transition, value.get_velocity());
    opts.start_time = start_time;
    if opts.ease.is_none() {
        opts.ease = Some(Easing::EaseOut.into());
    }
    if !value_transition.is_defined() {
        let defaults = default_transition(name, &keyframes);
        opts.kind = defaults.kind.unwrap_or_default();
        opts.duration = defaults.duration.map(|s| s * 1000.0);
        if let Some(ease) = defaults.ease {
            opts.ease = Some(ease);
        }
        opts.physics = defaults.physics;
    }

    let config = engine.config();
    let mut should_skip = false;
    if opts.kind == AnimationType::Instant || (opts.duration == Some(0.0) && opts.repeat_delay == 0.0) {
        opts.duration = Some(0.0);
        opts.kind = AnimationType::Instant;
        if opts.delay == 0.0 {
            should_skip = true;
        }
    }
    if config.instant_animations || config.skip_animations {
        should_skip = true;
        opts.kind = AnimationType::Instant;
        opts.duration = Some(0.0);
        opts.delay = 0.0;
    }

    if should_skip && !is_handoff {
        if let Some(final_keyframe) = get_final_keyframe(&keyframes, opts.repeat, opts.repeat_type, None, 1.0) {
            let instant = InstantAnimation::start(value, final_keyframe, callbacks);
            return Rc::new(instant);
        }
    }

    let native_eligible = !is_handoff
        && engine.native_animator().is_some()
        && supports_native_animation(&opts, callbacks.on_update.is_some(), element.as_deref());

    let writer = value.clone();
    let user_update = callbacks.on_update.clone();
    opts.callbacks = AnimationCallbacks {
        on_update: Some(Rc::new(move |v: &Value| {
            writer.set(v.clone());
            if let Some(cb) = &user_update {
                cb(v);
            }
        })),
        ..callbacks
    };

    let animation = AsyncAnimation::new(engine, value, opts, element, native_eligible);
    animation.resolve(keyframes);
    Rc::new(animation)
}

/// Writes the final keyframe on the next update phase, with no frames in between.
pub struct InstantAnimation {
    process: Process,
    value: MotionValue,
    state: Rc<Cell<AnimationState>>,
    on_finish: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
    finished: Rc<Cell<bool>>,
}

impl InstantAnimation {
    fn start(value: &MotionValue, final_keyframe: Value, callbacks: AnimationCallbacks) -> Self {
        let state = Rc::new(Cell::new(AnimationState::Running));
        let on_finish: Rc<RefCell<Vec<Box<dyn FnOnce()>>>> = Rc::default();
        let finished = Rc::new(Cell::new(false));
        let (writer, done, finish) = (value.clone(), state.clone(), on_finish.clone());
        let settled = finished.clone();
        let mut payload = Some(final_keyframe);
        let process = value.frameloop().update(move |_| {
            let Some(v) = payload.take() else { return };
            writer.set(v.clone());
            if let Some(cb) = &callbacks.on_update {
                cb(&v);
            }
            done.set(AnimationState::Finished);
            if let Some(cb) = &callbacks.on_complete {
                cb();
            }
            settled.set(true);
            let pending = std::mem::take(&mut *finish.borrow_mut());
            for cb in pending {
                cb();
            }
        });
        Self {
            process,
            value: value.clone(),
            state,
            on_finish,
            finished,
        }
    }

    fn settle(&self) {
        self.finished.set(true);
        let pending = std::mem::take(&mut *self.on_finish.borrow_mut());
        for cb in pending {
            cb();
        }
    }
}

impl AnimationPlaybackControls for InstantAnimation {
    fn play(&self) {}

    fn pause(&self) {}

    fn stop(&self) {
        if self.state.get() == AnimationState::Running {
            self.value.frameloop().cancel(&self.process);
            self.state.set(AnimationState::Idle);
            self.settle();
        }
    }

    fn complete(&self) {}

    fn cancel(&self) {
        self.stop();
    }

    fn then(&self, on_finish: Box<dyn FnOnce()>) {
        if self.finished.get() {
            on_finish();
        } else {
            self.on_finish.borrow_mut().push(on_finish);
        }
    }

    fn time(&self) -> f64 {
        0.0
    }

    fn set_time(&self, _ms: f64) {}

    fn speed(&self) -> f64 {
        1.0
    }

    fn set_speed(&self, _speed: f64) {}

    fn duration(&self) -> f64 {
        0.0
    }

    fn state(&self) -> AnimationState {
        self.state.get()
    }
}

/// Operations requested before keyframes resolved, replayed afterwards.
#[derive(Default)]
struct PendingOps {
    play_state: Option<AnimationState>,
    speed: Option<f64>,
    time: Option<f64>,
}

struct AsyncInner {
    engine: Engine,
    value: MotionValue,
    options: RefCell<Option<ValueAnimationOptions>>,
    element: Option<Rc<dyn VisualElement>>,
    native_eligible: bool,
    resolver: RefCell<Option<KeyframeResolver>>,
    animation: RefCell<Option<AnimationHandle>>,
    pending: RefCell<PendingOps>,
    on_finish: RefCell<Vec<Box<dyn FnOnce()>>>,
    finished: Cell<bool>,
    created_at: f64,
    is_stopped: Cell<bool>,
}

/// Controller that resolves keyframes first, then delegates to a native or
/// software animation. Controls used before resolution are queued.
#[derive(Clone)]
pub struct AsyncAnimation {
    inner: Rc<AsyncInner>,
}

impl AsyncAnimation {
    fn new(
        engine: &Engine,
        value: &MotionValue,
        options: ValueAnimationOptions,
        element: Option<Rc<dyn VisualElement>>,
        native_eligible: bool,
    ) -> Self {
        Self {
            inner: Rc::new(AsyncInner {
                engine: engine.clone(),
                value: value.clone(),
                options: RefCell::new(Some(options)),
                element,
                native_eligible,
                resolver: RefCell::new(None),
                animation: RefCell::new(None),
                pending: RefCell::new(PendingOps::default()),
                on_finish: RefCell::new(Vec::new()),
                finished: Cell::new(false),
                created_at: engine.frameloop().now(),
                is_stopped: Cell::new(false),
            }),
        }
    }

    fn resolve(&self, keyframes: Vec<Option<Value>>) {
        let name = self
            .inner
            .options
            .borrow()
            .as_ref()
            .map(|o| o.name.clone())
            .unwrap_or_default();
        let weak = Rc::downgrade(&self.inner);
        let resolver = KeyframeResolver::new(
            self.inner.engine.resolvers(),
            &name,
            keyframes,
            Some(self.inner.value.clone()),
            self.inner.element.clone(),
            move |frames, final_keyframe| {
                if let Some(inner) = weak.upgrade() {
                    AsyncAnimation { inner }.on_keyframes_resolved(frames, final_keyframe);
                }
            },
        );
        *self.inner.resolver.borrow_mut() = Some(resolver.clone());
        resolver.schedule_resolve();
    }

    fn settle(&self) {
        self.inner.finished.set(true);
        let pending = std::mem::take(&mut *self.inner.on_finish.borrow_mut());
        for cb in pending {
            cb();
        }
    }

    fn on_keyframes_resolved(&self, frames: Vec<Value>, final_keyframe: Option<Value>) {
        let Some(mut options) = self.inner.options.borrow_mut().take() else {
            return;
        };
        let resolved_at = self.inner.engine.frameloop().now();
        options.keyframes = frames;
        options.final_keyframe = final_keyframe;
        if options.start_time.is_none() {
            let late = resolved_at - self.inner.created_at > MAX_RESOLVE_DELAY;
            options.start_time = Some(if late { resolved_at } else { self.inner.created_at });
        }

        if !can_animate(&options.keyframes, &options.name, options.kind, options.velocity) {
            let config = self.inner.engine.config();
            if config.instant_animations || options.delay == 0.0 {
                let frames: Vec<Option<Value>> = options.keyframes.iter().cloned().map(Some).collect();
                let last = get_final_keyframe(
                    &frames,
                    options.repeat,
                    options.repeat_type,
                    options.final_keyframe.as_ref(),
                    1.0,
                );
                if let (Some(v), Some(on_update)) = (last, &options.callbacks.on_update) {
                    on_update(&v);
                }
                if let Some(on_complete) = &options.callbacks.on_complete {
                    on_complete();
                }
                self.settle();
                return;
            }
            options.kind = AnimationType::Instant;
            options.duration = Some(0.0);
        }

        let animation = self.build(options);
        self.settle_with(&animation);
        *self.inner.animation.borrow_mut() = Some(animation.clone());

        let pending = std::mem::take(&mut *self.inner.pending.borrow_mut());
        if let Some(speed) = pending.speed {
            animation.set_speed(speed);
        }
        if let Some(time) = pending.time {
            animation.set_time(time);
        }
        match pending.play_state {
            Some(AnimationState::Paused) => animation.pause(),
            Some(AnimationState::Finished) => animation.complete(),
            Some(AnimationState::Idle) => animation.cancel(),
            _ => {}
        }
    }

    /// Release our `then` callbacks when `animation` finishes.
    fn settle_with(&self, animation: &AnimationHandle) {
        let weak = Rc::downgrade(&self.inner);
        animation.then(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                AsyncAnimation { inner }.settle();
            }
        }));
    }

    fn build(&self, options: ValueAnimationOptions) -> AnimationHandle {
        if self.inner.native_eligible {
            if let (Some(animator), Some(element)) = (self.inner.engine.native_animator(), &self.inner.element) {
                match NativeAnimation::start(animator.as_ref(), element.as_ref(), &self.inner.value, options.clone()) {
                    Ok(native) => return Rc::new(native),
                    Err(err) => warn!("native animation of {} failed, running in software: {err}", options.name),
                }
            }
        }
        Rc::new(JsAnimation::new(self.inner.engine.frameloop(), options))
    }

    /// The delegate, forcing keyframe resolution if it is still pending.
    fn resolved(&self) -> Option<AnimationHandle> {
        if self.inner.animation.borrow().is_none() && !self.inner.is_stopped.get() {
            let resolver = self.inner.resolver.borrow().clone();
            if let Some(resolver) = resolver {
                resolver.flush();
            }
        }
        self.inner.animation.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.animation.borrow().is_some()
    }
}

impl AnimationPlaybackControls for AsyncAnimation {
    fn play(&self) {
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => {
                a.play();
                if self.inner.finished.replace(false) {
                    self.settle_with(&a);
                }
            }
            None => {
                self.inner.pending.borrow_mut().play_state = Some(AnimationState::Running);
                let resolver = self.inner.resolver.borrow().clone();
                if let Some(r) = resolver {
                    r.resume();
                }
            }
        }
    }

    fn pause(&self) {
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => a.pause(),
            None => self.inner.pending.borrow_mut().play_state = Some(AnimationState::Paused),
        }
    }

    fn stop(&self) {
        self.inner.is_stopped.set(true);
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => a.stop(),
            None => {
                let resolver = self.inner.resolver.borrow().clone();
                if let Some(r) = resolver {
                    r.cancel();
                }
                self.settle();
            }
        }
    }

    fn complete(&self) {
        match self.resolved() {
            Some(a) => a.complete(),
            None => self.inner.pending.borrow_mut().play_state = Some(AnimationState::Finished),
        }
    }

    fn cancel(&self) {
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => a.cancel(),
            None => {
                let resolver = self.inner.resolver.borrow().clone();
                if let Some(r) = resolver {
                    r.cancel();
                }
                self.inner.pending.borrow_mut().play_state = Some(AnimationState::Idle);
            }
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
        self.resolved().map(|a| a.time()).unwrap_or(0.0)
    }

    fn set_time(&self, ms: f64) {
        match self.resolved() {
            Some(a) => a.set_time(ms),
            None => self.inner.pending.borrow_mut().time = Some(ms),
        }
    }

    fn speed(&self) -> f64 {
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => a.speed(),
            None => self.inner.pending.borrow().speed.unwrap_or(1.0),
        }
    }

    fn set_speed(&self, speed: f64) {
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => a.set_speed(speed),
            None => self.inner.pending.borrow_mut().speed = Some(speed),
        }
    }

    fn duration(&self) -> f64 {
        self.resolved().map(|a| a.duration()).unwrap_or(0.0)
    }

    fn state(&self) -> AnimationState {
        let animation = self.inner.animation.borrow().clone();
        match animation {
            Some(a) => a.state(),
            None => self.inner.pending.borrow().play_state.unwrap_or(AnimationState::Idle),
        }
    }
}

impl fmt::Debug for AsyncAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncAnimation")
            .field("resolved", &self.is_resolved())
            .field("stopped", &self.inner.is_stopped.get())
            .finish()
    }
}
