//! Synchronous pub-sub with snapshot delivery.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type ListenerFn<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    next_id: u64,
    listeners: Vec<(u64, ListenerFn<T>)>,
}

/// Single-threaded event emitter. `emit` snapshots the listener list, so
/// subscribing or unsubscribing mid-delivery never affects the other
/// deliveries of that emission.
pub struct Emitter<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. The returned guard removes it; dropping the
    /// guard without calling `unsubscribe` leaves the listener in place.
    pub fn on(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Rc::new(f)));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::from_fn(move || remove(&weak, id))
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<ListenerFn<T>> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for f in snapshot {
            f(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

fn remove<T>(weak: &Weak<RefCell<Inner<T>>>, id: u64) {
    if let Some(inner) = weak.upgrade() {
        inner.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
    }
}

/// Unsubscribe guard. Removal is explicit; there is no `Drop` impl, so the
/// guard can be stowed in a teardown closure or simply forgotten.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(f)),
        }
    }

    /// Guard that removes several subscriptions at once.
    pub fn combined(subs: Vec<Subscription>) -> Self {
        Self::from_fn(move || {
            for sub in subs {
                sub.unsubscribe();
            }
        })
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.remove.take() {
            f();
        }
    }

    /// The removal closure itself, for wiring into dispose lists.
    pub fn into_unsubscribe(mut self) -> Box<dyn FnOnce()> {
        self.remove.take().unwrap_or_else(|| Box::new(|| {}))
    }
}
