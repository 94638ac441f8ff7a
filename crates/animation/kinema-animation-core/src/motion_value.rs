//! Observable values with velocity tracking.
//!
//! A `MotionValue` is a cheap handle: clones observe and drive the same value.
//! At most one animation drives a value at a time; dependents are held weakly
//! so derived values never keep their sources alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use kinema_api_core::coercion::is_numeric_like;
use kinema_api_core::Value;

use crate::animation::AnimationHandle;
use crate::frameloop::Frameloop;
use crate::generators::velocity_per_second;
use crate::subscription::{Subscription, SubscriptionManager};

/// Default recency window for velocity, in milliseconds.
pub const MAX_VELOCITY_DELTA: f64 = 30.0;

/// Receives the requested value and the real setter.
pub type PassiveEffect = Rc<dyn Fn(Value, &dyn Fn(Value))>;

struct State {
    current: Value,
    prev: Option<Value>,
    prev_frame_value: Option<Value>,
    updated_at: f64,
    prev_updated_at: Option<f64>,
    can_track_velocity: bool,
    animation: Option<AnimationHandle>,
    passive_effect: Option<PassiveEffect>,
    stop_passive_effect: Option<Box<dyn FnOnce()>>,
    dependents: Vec<Weak<Inner>>,
}

#[derive(Default)]
struct Events {
    change: SubscriptionManager<Value>,
    render_request: SubscriptionManager<Value>,
    animation_start: SubscriptionManager<()>,
    animation_complete: SubscriptionManager<()>,
    animation_cancel: SubscriptionManager<()>,
    destroy: SubscriptionManager<()>,
}

struct Inner {
    state: RefCell<State>,
    events: Events,
    frameloop: Frameloop,
    velocity_window: f64,
    has_animated: Cell<bool>,
}

#[derive(Clone)]
pub struct MotionValue {
    inner: Rc<Inner>,
}

impl MotionValue {
    pub fn new(frameloop: &Frameloop, init: impl Into<Value>) -> Self {
        Self::with_velocity_window(frameloop, init, MAX_VELOCITY_DELTA)
    }

    pub fn with_velocity_window(frameloop: &Frameloop, init: impl Into<Value>, window_ms: f64) -> Self {
        let current = init.into();
        let can_track_velocity = is_numeric_like(&current);
        let state = State {
            current,
            prev: None,
            prev_frame_value: None,
            updated_at: frameloop.now(),
            prev_updated_at: None,
            can_track_velocity,
            animation: None,
            passive_effect: None,
            stop_passive_effect: None,
            dependents: Vec::new(),
        };
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(state),
                events: Events::default(),
                frameloop: frameloop.clone(),
                velocity_window: window_ms,
                has_animated: Cell::new(false),
            }),
        }
    }

    pub fn frameloop(&self) -> &Frameloop {
        &self.inner.frameloop
    }

    pub fn get(&self) -> Value {
        self.inner.state.borrow().current.clone()
    }

    /// Numeric payload of the current value.
    pub fn get_number(&self) -> Option<f64> {
        self.inner.state.borrow().current.as_number()
    }

    pub fn get_previous(&self) -> Option<Value> {
        self.inner.state.borrow().prev.clone()
    }

    pub fn ptr_eq(&self, other: &MotionValue) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write a value, routing through the passive effect if one is attached.
    pub fn set(&self, v: impl Into<Value>) {
        self.set_with_render(v.into(), true);
    }

    pub fn set_with_render(&self, v: Value, render: bool) {
        let effect = self.inner.state.borrow().passive_effect.clone();
        match effect {
            Some(effect) if render => {
                let this = self.clone();
                effect(v, &move |next: Value| this.update_and_notify(next, true));
            }
            _ => self.update_and_notify(v, render),
        }
    }

    /// Set `current` while seeding velocity as if `prev` was seen `delta` ms ago.
    pub fn set_with_velocity(&self, prev: Value, current: Value, delta: f64) {
        self.set(current);
        let mut state = self.inner.state.borrow_mut();
        state.prev = None;
        state.prev_frame_value = Some(prev);
        state.prev_updated_at = Some(state.updated_at - delta);
    }

    /// Set without velocity: the next read reports zero velocity.
    pub fn jump(&self, v: impl Into<Value>, end_animation: bool) {
        let v = v.into();
        self.update_and_notify(v.clone(), true);
        {
            let mut state = self.inner.state.borrow_mut();
            state.prev = Some(v);
            state.prev_updated_at = None;
            state.prev_frame_value = None;
        }
        if end_animation {
            self.stop();
        }
        let stop_passive = self.inner.state.borrow_mut().stop_passive_effect.take();
        if let Some(stop) = stop_passive {
            stop();
        }
    }

    fn update_and_notify(&self, v: Value, render: bool) {
        let now = self.inner.frameloop.now();
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            if state.updated_at != now {
                state.prev_frame_value = Some(state.current.clone());
                state.prev_updated_at = Some(state.updated_at);
            }
            let prev = std::mem::replace(&mut state.current, v);
            state.updated_at = now;
            let changed = prev != state.current;
            state.prev = Some(prev);
            changed
        };
        if changed {
            let current = self.get();
            self.inner.events.change.notify(&current);
            self.mark_dependents_dirty();
        }
        if render {
            let current = self.get();
            self.inner.events.render_request.notify(&current);
        }
    }

    fn mark_dependents_dirty(&self) {
        let dependents: Vec<Rc<Inner>> = {
            let mut state = self.inner.state.borrow_mut();
            state.dependents.retain(|d| d.strong_count() > 0);
            state.dependents.iter().filter_map(|d| d.upgrade()).collect()
        };
        for inner in dependents {
            MotionValue { inner }.dirty();
        }
    }

    /// Re-notify change listeners with the current value.
    pub fn dirty(&self) {
        let current = self.get();
        self.inner.events.change.notify(&current);
    }

    pub fn add_dependent(&self, dependent: &MotionValue) {
        let mut state = self.inner.state.borrow_mut();
        if !state
            .dependents
            .iter()
            .any(|d| std::ptr::eq(d.as_ptr(), Rc::as_ptr(&dependent.inner)))
        {
            state.dependents.push(Rc::downgrade(&dependent.inner));
        }
    }

    pub fn remove_dependent(&self, dependent: &MotionValue) {
        self.inner
            .state
            .borrow_mut()
            .dependents
            .retain(|d| !std::ptr::eq(d.as_ptr(), Rc::as_ptr(&dependent.inner)));
    }

    /// Per-second velocity, zero for non-numeric or stale values.
    pub fn get_velocity(&self) -> f64 {
        let now = self.inner.frameloop.now();
        let window = self.inner.velocity_window;
        let state = self.inner.state.borrow();
        let (Some(prev_value), Some(prev_at)) = (&state.prev_frame_value, state.prev_updated_at) else {
            return 0.0;
        };
        if !state.can_track_velocity || now - state.updated_at > window {
            return 0.0;
        }
        let (Some(current), Some(prev)) = (state.current.as_number(), prev_value.as_number()) else {
            return 0.0;
        };
        let delta = (state.updated_at - prev_at).min(window);
        velocity_per_second(current - prev, delta)
    }

    pub fn on_change(&self, listener: impl Fn(&Value) + 'static) -> Subscription {
        let sub = self.inner.events.change.add(listener);
        let weak = Rc::downgrade(&self.inner);
        sub.then(move || {
            let Some(inner) = weak.upgrade() else { return };
            let this = MotionValue { inner };
            if this.inner.events.change.is_empty() && this.is_animating() {
                let weak = Rc::downgrade(&this.inner);
                this.inner.frameloop.read(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        let this = MotionValue { inner };
                        if this.inner.events.change.is_empty() {
                            this.stop();
                        }
                    }
                });
            }
        })
    }

    pub fn on_render_request(&self, listener: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.events.render_request.add(listener)
    }

    pub fn on_animation_start(&self, listener: impl Fn() + 'static) -> Subscription {
        self.inner.events.animation_start.add(move |_| listener())
    }

    pub fn on_animation_complete(&self, listener: impl Fn() + 'static) -> Subscription {
        self.inner.events.animation_complete.add(move |_| listener())
    }

    pub fn on_animation_cancel(&self, listener: impl Fn() + 'static) -> Subscription {
        self.inner.events.animation_cancel.add(move |_| listener())
    }

    pub fn on_destroy(&self, listener: impl Fn() + 'static) -> Subscription {
        self.inner.events.destroy.add(move |_| listener())
    }

    /// Let an input source intercept `set`.
    pub fn attach(&self, passive_effect: PassiveEffect, stop_passive_effect: impl FnOnce() + 'static) {
        let mut state = self.inner.state.borrow_mut();
        state.passive_effect = Some(passive_effect);
        state.stop_passive_effect = Some(Box::new(stop_passive_effect));
    }

    pub fn has_passive_effect(&self) -> bool {
        self.inner.state.borrow().passive_effect.is_some()
    }

    /// Stop the current animation, then install the one `start` builds.
    pub fn start(&self, start: impl FnOnce() -> AnimationHandle) -> AnimationHandle {
        self.stop();
        self.inner.has_animated.set(true);
        let animation = start();
        self.inner.state.borrow_mut().animation = Some(animation.clone());
        self.inner.events.animation_start.notify(&());

        let weak = Rc::downgrade(&self.inner);
        let started = Rc::downgrade(&animation);
        animation.then(Box::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            let is_current = {
                let state = inner.state.borrow();
                match (&state.animation, started.upgrade()) {
                    (Some(current), Some(started)) => Rc::ptr_eq(current, &started),
                    _ => false,
                }
            };
            if is_current {
                inner.state.borrow_mut().animation = None;
                inner.events.animation_complete.notify(&());
            }
        }));
        animation
    }

    pub fn stop(&self) {
        let animation = self.inner.state.borrow_mut().animation.take();
        if let Some(animation) = animation {
            animation.stop();
            self.inner.events.animation_cancel.notify(&());
        }
    }

    pub fn is_animating(&self) -> bool {
        self.inner.state.borrow().animation.is_some()
    }

    pub fn animation(&self) -> Option<AnimationHandle> {
        self.inner.state.borrow().animation.clone()
    }

    pub fn has_animated(&self) -> bool {
        self.inner.has_animated.get()
    }

    pub fn clear_listeners(&self) {
        let e = &self.inner.events;
        e.change.clear();
        e.render_request.clear();
        e.animation_start.clear();
        e.animation_complete.clear();
        e.animation_cancel.clear();
    }

    pub fn destroy(&self) {
        self.inner.state.borrow_mut().dependents.clear();
        self.inner.events.destroy.notify(&());
        self.clear_listeners();
        self.inner.events.destroy.clear();
        self.stop();
        let stop_passive = self.inner.state.borrow_mut().stop_passive_effect.take();
        if let Some(stop) = stop_passive {
            stop();
        }
    }
}

impl fmt::Debug for MotionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("MotionValue")
            .field("current", &state.current)
            .field("updated_at", &state.updated_at)
            .field("animating", &state.animation.is_some())
            .finish()
    }
}
