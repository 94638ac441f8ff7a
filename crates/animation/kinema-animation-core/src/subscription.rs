//! Listener lists with detachable handles.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::ids::ListenerId;

type Listener<T> = Rc<dyn Fn(&T)>;

struct Listeners<T> {
    next: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, Listener<T>)>>,
}

/// Ordered listener list. Notification iterates a snapshot so listeners may
/// add or remove subscriptions while being notified.
pub struct SubscriptionManager<T> {
    inner: Rc<Listeners<T>>,
}

impl<T: 'static> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(Listeners {
                next: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<T: 'static> SubscriptionManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = ListenerId(self.inner.next.get());
        self.inner.next.set(id.0 + 1);
        self.inner
            .entries
            .borrow_mut()
            .push((id, Rc::new(listener)));
        let weak: Weak<Listeners<T>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(list) = weak.upgrade() {
                list.entries.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.entries.borrow_mut().clear();
    }
}

/// Handle returned by every `on_*` registration. Dropping it keeps the
/// listener attached; call [`Subscription::unsubscribe`] to detach.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Chain an extra action to run after detaching.
    pub fn then(mut self, after: impl FnOnce() + 'static) -> Self {
        let first = self.detach.take();
        Self::new(move || {
            if let Some(f) = first {
                f();
            }
            after();
        })
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.detach.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_and_unsubscribe() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let sub = manager.add(move |v| s.borrow_mut().push(*v));
        manager.notify(&1);
        sub.unsubscribe();
        manager.notify(&2);
        assert_eq!(*seen.borrow(), vec![1]);
        assert!(manager.is_empty());
    }
}
