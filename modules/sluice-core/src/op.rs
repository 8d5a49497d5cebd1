//! Eagerly-started asynchronous operations with a two-outcome settlement.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::scheduler::Scheduler;

type SettleFn = Box<dyn FnOnce(&Value)>;

enum State {
    Pending {
        on_ok: Vec<SettleFn>,
        on_err: Vec<SettleFn>,
    },
    Resolved(Value),
    Rejected(Value),
}

/// A computation that settles at most once with a success or failure value.
///
/// Continuations registered after settlement run synchronously at
/// registration; continuations registered before run synchronously when the
/// [`Resolver`] settles. Many listeners may observe the same operation.
#[derive(Clone)]
pub struct AsyncOp {
    inner: Rc<RefCell<State>>,
}

impl AsyncOp {
    /// An unsettled operation plus the handle that settles it.
    pub fn pending() -> (Self, Resolver) {
        let inner = Rc::new(RefCell::new(State::Pending {
            on_ok: Vec::new(),
            on_err: Vec::new(),
        }));
        (
            Self {
                inner: inner.clone(),
            },
            Resolver { inner },
        )
    }

    pub fn resolved(value: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::Resolved(value))),
        }
    }

    pub fn rejected(error: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::Rejected(error))),
        }
    }

    /// Timed helper: resolves with `value` after `ms` on the scheduler
    /// clock.
    pub fn delayed(scheduler: &Scheduler, ms: u64, value: Value) -> Self {
        let (op, resolver) = Self::pending();
        scheduler.schedule(ms, move || resolver.resolve(value));
        op
    }

    pub fn settled(&self) -> bool {
        !matches!(&*self.inner.borrow(), State::Pending { .. })
    }

    /// Register both continuations. Exactly one ever runs.
    pub fn on_settle(
        &self,
        ok: impl FnOnce(&Value) + 'static,
        err: impl FnOnce(&Value) + 'static,
    ) {
        let deferred: Option<Box<dyn FnOnce()>> = {
            let mut state = self.inner.borrow_mut();
            match &mut *state {
                State::Pending { on_ok, on_err } => {
                    on_ok.push(Box::new(ok));
                    on_err.push(Box::new(err));
                    None
                }
                State::Resolved(value) => {
                    let value = value.clone();
                    Some(Box::new(move || ok(&value)))
                }
                State::Rejected(error) => {
                    let error = error.clone();
                    Some(Box::new(move || err(&error)))
                }
            }
        };
        if let Some(f) = deferred {
            f();
        }
    }

    /// Success continuation only; a failure is dropped silently.
    pub fn on_success(&self, ok: impl FnOnce(&Value) + 'static) {
        self.on_settle(ok, |_| {});
    }
}

/// Settles its operation at most once; later calls are ignored.
#[derive(Clone)]
pub struct Resolver {
    inner: Rc<RefCell<State>>,
}

impl Resolver {
    pub fn resolve(&self, value: Value) {
        settle(&self.inner, State::Resolved(value));
    }

    pub fn reject(&self, error: Value) {
        settle(&self.inner, State::Rejected(error));
    }
}

fn settle(inner: &Rc<RefCell<State>>, outcome: State) {
    let callbacks = {
        let mut state = inner.borrow_mut();
        if !matches!(&*state, State::Pending { .. }) {
            return;
        }
        let previous = std::mem::replace(&mut *state, outcome);
        match previous {
            State::Pending { on_ok, on_err } => match &*state {
                State::Resolved(value) => Some((on_ok, value.clone())),
                State::Rejected(error) => Some((on_err, error.clone())),
                State::Pending { .. } => None,
            },
            _ => None,
        }
    };
    if let Some((callbacks, value)) = callbacks {
        for f in callbacks {
            f(&value);
        }
    }
}
