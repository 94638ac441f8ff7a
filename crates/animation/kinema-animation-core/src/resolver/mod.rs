//! Keyframe resolution: turn user keyframes (with wildcards, CSS variables,
//! "none" and mismatched units) into concrete values an animation can mix.
//!
//! Resolvers bound to an element are asynchronous. They join the engine's
//! [`ResolverQueue`], which reads every pending resolver in the `Read` phase
//! and measures then completes them in `ResolveKeyframes`, so that all
//! layout reads of a frame happen together.

mod none;
mod positional;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace};

use kinema_api_core::coercion::is_css_variable;
use kinema_api_core::Value;

use crate::element::{VisualElement, TRANSFORM_PROP_ORDER};
use crate::frameloop::Frameloop;
use crate::ids::{IdAllocator, ResolverId};
use crate::motion_value::MotionValue;

pub use none::{make_none_keyframes_animatable, none_keyframe_indexes};
pub use positional::{dimension_type, is_num_or_px, is_positional_key, positional_value, DimensionType};

/// Receives the resolved keyframes and the symbolic final keyframe, if any.
pub type OnResolved = Box<dyn FnOnce(Vec<Value>, Option<Value>)>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResolverState {
    Pending,
    Scheduled,
    Complete,
}

struct ResolverInner {
    id: ResolverId,
    name: String,
    element: Option<Rc<dyn VisualElement>>,
    value: Option<MotionValue>,
    queue: ResolverQueue,
    keyframes: RefCell<Vec<Option<Value>>>,
    final_keyframe: RefCell<Option<Value>>,
    measured_origin: RefCell<Option<Value>>,
    on_complete: RefCell<Option<OnResolved>>,
    state: Cell<ResolverState>,
    has_read: Cell<bool>,
    needs_measurement: Cell<bool>,
    is_forced: Cell<bool>,
}

#[derive(Clone)]
pub struct KeyframeResolver {
    inner: Rc<ResolverInner>,
}

impl KeyframeResolver {
    /// Build a resolver; nothing happens until [`Self::schedule_resolve`].
    pub fn new(
        queue: &ResolverQueue,
        name: &str,
        keyframes: Vec<Option<Value>>,
        value: Option<MotionValue>,
        element: Option<Rc<dyn VisualElement>>,
        on_complete: impl FnOnce(Vec<Value>, Option<Value>) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ResolverInner {
                id: queue.alloc_id(),
                name: name.to_string(),
                element,
                value,
                queue: queue.clone(),
                keyframes: RefCell::new(keyframes),
                final_keyframe: RefCell::new(None),
                measured_origin: RefCell::new(None),
                on_complete: RefCell::new(Some(Box::new(on_complete))),
                state: Cell::new(ResolverState::Pending),
                has_read: Cell::new(false),
                needs_measurement: Cell::new(false),
                is_forced: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> ResolverId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ResolverState {
        self.inner.state.get()
    }

    pub fn is_async(&self) -> bool {
        self.inner.element.is_some()
    }

    pub fn needs_measurement(&self) -> bool {
        self.inner.needs_measurement.get()
    }

    pub fn is_forced(&self) -> bool {
        self.inner.is_forced.get()
    }

    pub fn keyframes(&self) -> Vec<Option<Value>> {
        self.inner.keyframes.borrow().clone()
    }

    pub fn final_keyframe(&self) -> Option<Value> {
        self.inner.final_keyframe.borrow().clone()
    }

    pub fn schedule_resolve(&self) {
        self.inner.state.set(ResolverState::Scheduled);
        if self.is_async() {
            self.inner.queue.enqueue(self.clone());
        } else {
            self.read_keyframes();
            self.complete();
        }
    }

    /// Resolve now, together with everything else pending in the queue.
    pub fn flush(&self) {
        if self.state() != ResolverState::Scheduled {
            return;
        }
        self.inner.is_forced.set(true);
        if self.is_async() {
            self.inner.queue.flush();
        }
    }

    pub fn cancel(&self) {
        if self.state() == ResolverState::Complete {
            return;
        }
        self.inner.state.set(ResolverState::Pending);
        self.inner.queue.remove(self.inner.id);
    }

    pub fn resume(&self) {
        if self.state() == ResolverState::Pending {
            self.schedule_resolve();
        }
    }

    /// Fill wildcard keyframes: the first from the motion value, the
    /// element or the final keyframe; later ones from their predecessor.
    fn fill_wildcards(&self) {
        let first_missing = self.inner.keyframes.borrow().first().map(Option::is_none).unwrap_or(false);
        if first_missing {
            let current = self.inner.value.as_ref().map(MotionValue::get);
            let read = match (&current, &self.inner.element) {
                (None, Some(element)) => element.read_value(&self.inner.name),
                _ => None,
            };
            let mut kf = self.inner.keyframes.borrow_mut();
            let last = kf.last().cloned().flatten();
            kf[0] = current.or(read).or(last);
        }
        let mut kf = self.inner.keyframes.borrow_mut();
        for i in 1..kf.len() {
            if kf[i].is_none() {
                kf[i] = kf[i - 1].clone();
            }
        }
    }

    pub fn read_keyframes(&self) {
        self.inner.has_read.set(true);
        self.fill_wildcards();
        let Some(element) = self.inner.element.clone() else {
            self.resolve_none_keyframes();
            return;
        };

        let frames = self.keyframes();
        let last = frames.len().saturating_sub(1);
        for (i, frame) in frames.iter().enumerate() {
            let Some(frame) = frame else { continue };
            if !is_css_variable(frame) {
                continue;
            }
            if let Some(resolved) = element.resolve_css_variable(frame) {
                self.inner.keyframes.borrow_mut()[i] = Some(resolved);
            }
            if i == last {
                *self.inner.final_keyframe.borrow_mut() = Some(frame.clone());
            }
        }

        self.resolve_none_keyframes();

        if !is_positional_key(&self.inner.name) || frames.len() != 2 {
            return;
        }
        let mut kf = self.inner.keyframes.borrow_mut();
        let (Some(origin), Some(target)) = (kf[0].clone(), kf[1].clone()) else {
            return;
        };
        let origin_type = dimension_type(&origin);
        let target_type = dimension_type(&target);
        if origin_type == target_type {
            return;
        }
        if is_num_or_px(origin_type) && is_num_or_px(target_type) {
            for slot in kf.iter_mut() {
                if let Some(Value::Unit(n, _)) = slot {
                    *slot = Some(Value::Number(*n));
                }
            }
        } else {
            trace!("{} needs measuring ({origin} -> {target})", self.inner.name);
            self.inner.needs_measurement.set(true);
        }
    }

    fn resolve_none_keyframes(&self) {
        let mut kf = self.inner.keyframes.borrow_mut();
        let indexes = none_keyframe_indexes(&kf);
        if indexes.is_empty() {
            return;
        }
        let last = kf.len() - 1;
        let original_last = kf[last].clone();
        make_none_keyframes_animatable(&mut kf, &indexes);
        if indexes.contains(&last) && kf[last] != original_last {
            let mut final_keyframe = self.inner.final_keyframe.borrow_mut();
            if final_keyframe.is_none() {
                *final_keyframe = original_last;
            }
        }
    }

    fn measure_initial_state(&self) {
        let Some(element) = self.inner.element.clone() else { return };
        let name = &self.inner.name;
        let origin = positional_value(name, &element.measure_viewport_box(), element.as_ref());
        *self.inner.measured_origin.borrow_mut() = origin.clone();
        let target = {
            let mut kf = self.inner.keyframes.borrow_mut();
            if let Some(origin) = origin {
                kf[0] = Some(origin);
            }
            kf.last().cloned().flatten()
        };
        if let Some(target) = target {
            element.get_or_create_value(name, target.clone()).jump(target, false);
        }
    }

    fn measure_end_state(&self) {
        let Some(element) = self.inner.element.clone() else { return };
        let name = &self.inner.name;
        let origin = self.inner.measured_origin.borrow().clone();
        if let (Some(value), Some(origin)) = (element.get_value(name), origin) {
            value.jump(origin, false);
        }
        let measured = positional_value(name, &element.measure_viewport_box(), element.as_ref());
        let unresolved_final = {
            let mut kf = self.inner.keyframes.borrow_mut();
            let last = kf.len() - 1;
            let before = kf[last].clone();
            if measured.is_some() {
                kf[last] = measured;
            }
            before
        };
        {
            let mut final_keyframe = self.inner.final_keyframe.borrow_mut();
            if final_keyframe.is_none() {
                *final_keyframe = unresolved_final;
            }
        }
        self.resolve_none_keyframes();
    }

    fn complete(&self) {
        self.inner.state.set(ResolverState::Complete);
        let frames: Vec<Value> = self.inner.keyframes.borrow().iter().flatten().cloned().collect();
        let final_keyframe = self.final_keyframe();
        let on_complete = self.inner.on_complete.borrow_mut().take();
        if let Some(on_complete) = on_complete {
            on_complete(frames, final_keyframe);
        }
    }
}

impl fmt::Debug for KeyframeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyframeResolver")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.inner.state.get())
            .field("keyframes", &*self.inner.keyframes.borrow())
            .finish()
    }
}

/// Set non-translational transforms to identity so measurements see the
/// untransformed layout. Returns what was removed.
fn remove_non_translational_transforms(element: &dyn VisualElement) -> Vec<(String, Value)> {
    let mut removed = Vec::new();
    for name in TRANSFORM_PROP_ORDER {
        if matches!(name, "x" | "y" | "translateX" | "translateY") {
            continue;
        }
        if let Some(value) = element.get_value(name) {
            removed.push((name.to_string(), value.get()));
            let identity = if name.starts_with("scale") { 1.0 } else { 0.0 };
            value.set(identity);
        }
    }
    removed
}

struct QueueInner {
    frameloop: Frameloop,
    pending: RefCell<IndexMap<ResolverId, KeyframeResolver>>,
    scheduled: Cell<bool>,
    any_needs_measurement: Cell<bool>,
    ids: RefCell<IdAllocator>,
}

/// Batches asynchronous resolvers into the frame loop.
#[derive(Clone)]
pub struct ResolverQueue {
    inner: Rc<QueueInner>,
}

impl ResolverQueue {
    pub fn new(frameloop: &Frameloop) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                frameloop: frameloop.clone(),
                pending: RefCell::new(IndexMap::new()),
                scheduled: Cell::new(false),
                any_needs_measurement: Cell::new(false),
                ids: RefCell::new(IdAllocator::new()),
            }),
        }
    }

    fn alloc_id(&self) -> ResolverId {
        self.inner.ids.borrow_mut().alloc_resolver()
    }

    pub fn len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.borrow().is_empty()
    }

    fn enqueue(&self, resolver: KeyframeResolver) {
        self.inner.pending.borrow_mut().insert(resolver.id(), resolver);
        self.schedule();
    }

    fn schedule(&self) {
        if self.inner.scheduled.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        self.inner.frameloop.read(move |_| {
            if let Some(inner) = weak.upgrade() {
                ResolverQueue { inner }.read_all();
            }
        });
        let weak = Rc::downgrade(&self.inner);
        self.inner.frameloop.resolve_keyframes(move |_| {
            if let Some(inner) = weak.upgrade() {
                ResolverQueue { inner }.measure_all();
            }
        });
    }

    fn remove(&self, id: ResolverId) {
        self.inner.pending.borrow_mut().shift_remove(&id);
    }

    fn next_unread(&self) -> Option<KeyframeResolver> {
        self.inner
            .pending
            .borrow()
            .values()
            .find(|r| !r.inner.has_read.get())
            .cloned()
    }

    fn take_next_read(&self) -> Option<KeyframeResolver> {
        let mut pending = self.inner.pending.borrow_mut();
        let index = pending.values().position(|r| r.inner.has_read.get())?;
        pending.shift_remove_index(index).map(|(_, r)| r)
    }

    pub fn read_all(&self) {
        while let Some(resolver) = self.next_unread() {
            resolver.read_keyframes();
            if resolver.needs_measurement() {
                self.inner.any_needs_measurement.set(true);
            }
        }
    }

    pub fn measure_all(&self) {
        if self.inner.any_needs_measurement.get() {
            self.measure_pending();
        }
        self.inner.any_needs_measurement.set(false);
        self.inner.scheduled.set(false);

        while let Some(resolver) = self.take_next_read() {
            resolver.complete();
        }
        if !self.is_empty() {
            self.schedule();
        }
    }

    fn measure_pending(&self) {
        let to_measure: Vec<KeyframeResolver> = self
            .inner
            .pending
            .borrow()
            .values()
            .filter(|r| r.inner.has_read.get() && r.needs_measurement())
            .cloned()
            .collect();
        let mut elements: Vec<Rc<dyn VisualElement>> = Vec::new();
        for r in &to_measure {
            if let Some(e) = &r.inner.element {
                if !elements.iter().any(|x| Rc::ptr_eq(x, e)) {
                    elements.push(e.clone());
                }
            }
        }
        debug!(
            "measuring {} keyframe resolvers across {} elements",
            to_measure.len(),
            elements.len()
        );

        let removed: Vec<Vec<(String, Value)>> = elements
            .iter()
            .map(|e| remove_non_translational_transforms(e.as_ref()))
            .collect();
        for element in &elements {
            element.render();
        }
        for r in &to_measure {
            r.measure_initial_state();
        }
        for (element, removed) in elements.iter().zip(removed) {
            element.render();
            for (name, v) in removed {
                if let Some(value) = element.get_value(&name) {
                    value.set(v);
                }
            }
        }
        for r in &to_measure {
            r.measure_end_state();
        }
    }

    /// Read, measure and complete everything pending, synchronously.
    pub fn flush(&self) {
        self.read_all();
        self.measure_all();
    }
}

impl fmt::Debug for ResolverQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverQueue")
            .field("pending", &self.len())
            .field("scheduled", &self.inner.scheduled.get())
            .finish()
    }
}
