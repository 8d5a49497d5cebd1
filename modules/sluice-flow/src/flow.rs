use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use sluice_core::CancelToken;

use crate::options::FlowOptions;

/// What kind of combinator produced a flow. Carried so composition sites
/// can tell flow steps apart without probing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Delay,
    Call,
    When,
    Pipe,
    Parallel,
    Latest,
    Debounce,
}

/// A composable, cancellable unit of control flow.
///
/// Invoking a flow starts it: the body runs synchronously to its first
/// suspension point (a pending timer, async settlement, or pattern
/// subscription) and returns the token that tears it down. Clones share
/// the underlying closure state, so stateful combinators (`latest`,
/// `debounce`) supersede across clones as well.
#[derive(Clone)]
pub struct Flow {
    kind: FlowKind,
    invoke: Rc<dyn Fn(Value, FlowOptions) -> CancelToken>,
}

impl Flow {
    pub fn new(kind: FlowKind, invoke: impl Fn(Value, FlowOptions) -> CancelToken + 'static) -> Self {
        Self {
            kind,
            invoke: Rc::new(invoke),
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn invoke(&self, prev: Value, options: FlowOptions) -> CancelToken {
        (self.invoke)(prev, options)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Flow").field(&self.kind).finish()
    }
}
