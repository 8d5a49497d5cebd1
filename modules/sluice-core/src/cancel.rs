//! The cancellation primitive every flow step shares.

use std::cell::RefCell;
use std::rc::Rc;

type Listener = Box<dyn FnOnce()>;

#[derive(Default)]
struct Inner {
    cancelled: bool,
    disposed: bool,
    on_cancel: Vec<Listener>,
    on_dispose: Vec<Listener>,
}

/// Disposable handle with independent cancel and dispose signals.
///
/// Cancel means "stop producing results"; dispose means "tear down and
/// release everything". Each signal is idempotent and fires its listener
/// list at most once, in registration order. Dispose discards all listener
/// storage, so registration after dispose is a silent no-op.
///
/// Linking a child to a parent (`link_parent`) registers a cancel-listener
/// on the parent, forming a cancellation tree: the parent's `cancel`
/// synchronously cancels every linked child.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Rc<RefCell<Inner>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh token, linked to `parent` when one is given.
    pub fn child_of(parent: Option<&CancelToken>) -> Self {
        let token = Self::new();
        if let Some(parent) = parent {
            token.link_parent(parent);
        }
        token
    }

    pub fn cancelled(&self) -> bool {
        self.inner.borrow().cancelled
    }

    pub fn disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Register a cancel-listener. Dropped unseen when the token is already
    /// cancelled or disposed.
    pub fn on_cancel(&self, f: impl FnOnce() + 'static) {
        let mut inner = self.inner.borrow_mut();
        if inner.cancelled || inner.disposed {
            return;
        }
        inner.on_cancel.push(Box::new(f));
    }

    /// Register a dispose-listener. Dropped unseen when the token is
    /// already disposed.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        let mut inner = self.inner.borrow_mut();
        if inner.disposed {
            return;
        }
        inner.on_dispose.push(Box::new(f));
    }

    /// Idempotent. Sets the flag first, then runs the cancel-listeners in
    /// registration order. The interior borrow is released before any
    /// listener runs, so listeners may re-enter the token.
    pub fn cancel(&self) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled {
                return;
            }
            inner.cancelled = true;
            std::mem::take(&mut inner.on_cancel)
        };
        for f in listeners {
            f();
        }
    }

    /// Idempotent. Runs the dispose-listeners, then discards all listener
    /// storage.
    pub fn dispose(&self) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.on_cancel.clear();
            std::mem::take(&mut inner.on_dispose)
        };
        for f in listeners {
            f();
        }
    }

    /// Parent cancellation propagates to this token. Linking to an
    /// already-cancelled parent is a no-op, matching listener registration
    /// after the signal.
    pub fn link_parent(&self, parent: &CancelToken) {
        let child = self.clone();
        parent.on_cancel(move || child.cancel());
    }
}
