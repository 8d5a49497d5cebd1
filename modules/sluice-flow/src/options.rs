//! The invocation contract shared by every combinator.

use std::rc::Rc;

use serde_json::Value;

use sluice_core::{CancelToken, DispatchEvent, Scheduler};

/// Dispatch an action into the store.
pub type DispatchFn = Rc<dyn Fn(&str, Value)>;

/// Listener on the dispatch stream.
pub type ListenerFn = Rc<dyn Fn(&DispatchEvent)>;

/// Tears down one dispatch-stream subscription.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Subscribe a listener to every dispatch event.
pub type SubscribeFn = Rc<dyn Fn(ListenerFn) -> Unsubscribe>;

/// Completion callback. May fire more than once for repeatable steps.
pub type DoneFn = Rc<dyn Fn(Value)>;

/// The collaborators every flow invocation carries: the store's dispatch
/// function, the dispatch-stream subscribe function, and the scheduler all
/// timed steps arm timers on. Passed explicitly — there is no ambient
/// state in the engine.
#[derive(Clone)]
pub struct FlowCtx {
    pub dispatch: DispatchFn,
    pub subscribe: SubscribeFn,
    pub scheduler: Scheduler,
}

impl FlowCtx {
    pub fn new(dispatch: DispatchFn, subscribe: SubscribeFn, scheduler: Scheduler) -> Self {
        Self {
            dispatch,
            subscribe,
            scheduler,
        }
    }
}

/// Per-invocation options layered over the context: an optional completion
/// callback and an optional parent token for cancellation linking.
#[derive(Clone)]
pub struct FlowOptions {
    pub ctx: FlowCtx,
    pub on_done: Option<DoneFn>,
    pub cancel: Option<CancelToken>,
}

impl FlowOptions {
    pub fn new(ctx: FlowCtx) -> Self {
        Self {
            ctx,
            on_done: None,
            cancel: None,
        }
    }

    pub fn with_done(mut self, f: impl Fn(Value) + 'static) -> Self {
        self.on_done = Some(Rc::new(f));
        self
    }

    pub fn with_done_fn(mut self, f: DoneFn) -> Self {
        self.on_done = Some(f);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The completion callback, or a no-op when none was supplied.
    pub fn done(&self) -> DoneFn {
        self.on_done
            .clone()
            .unwrap_or_else(|| Rc::new(|_: Value| {}))
    }
}
