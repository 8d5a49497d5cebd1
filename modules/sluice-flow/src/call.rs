use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use sluice_core::{AsyncOp, CancelToken};

use crate::flow::{Flow, FlowKind};
use crate::options::FlowOptions;

/// What a plain step function may return: an immediate value, a deferred
/// async operation, or a nested flow whose completion is forwarded.
pub enum StepOutcome {
    Value(Value),
    Async(AsyncOp),
    Flow(Flow),
}

impl From<Value> for StepOutcome {
    fn from(value: Value) -> Self {
        StepOutcome::Value(value)
    }
}

impl From<AsyncOp> for StepOutcome {
    fn from(op: AsyncOp) -> Self {
        StepOutcome::Async(op)
    }
}

impl From<Flow> for StepOutcome {
    fn from(flow: Flow) -> Self {
        StepOutcome::Flow(flow)
    }
}

type StepFn = Rc<dyn Fn(Value) -> StepOutcome>;

/// Target of a `call` step.
#[derive(Clone)]
pub enum CallTarget {
    /// Dispatch this action name with the (mapped) payload; completes
    /// immediately with no meaningful result.
    Action(String),
    /// Invoke a plain function; its [`StepOutcome`] decides completion.
    Func(StepFn),
    /// Delegate to another flow, forwarding options and its token.
    Flow(Flow),
    /// Fire every target independently — parallel composition.
    Many(Vec<CallTarget>),
}

impl CallTarget {
    pub fn action(name: impl Into<String>) -> Self {
        CallTarget::Action(name.into())
    }

    pub fn func(f: impl Fn(Value) -> StepOutcome + 'static) -> Self {
        CallTarget::Func(Rc::new(f))
    }
}

impl From<&str> for CallTarget {
    fn from(name: &str) -> Self {
        CallTarget::Action(name.to_string())
    }
}

impl From<String> for CallTarget {
    fn from(name: String) -> Self {
        CallTarget::Action(name)
    }
}

impl From<Flow> for CallTarget {
    fn from(flow: Flow) -> Self {
        CallTarget::Flow(flow)
    }
}

impl From<Vec<CallTarget>> for CallTarget {
    fn from(targets: Vec<CallTarget>) -> Self {
        CallTarget::Many(targets)
    }
}

/// Rewrites the incoming payload before the target sees it.
#[derive(Clone)]
pub enum PayloadMap {
    Func(Rc<dyn Fn(Value) -> Value>),
    Const(Value),
}

impl PayloadMap {
    pub fn func(f: impl Fn(Value) -> Value + 'static) -> Self {
        PayloadMap::Func(Rc::new(f))
    }

    fn apply(&self, payload: Value) -> Value {
        match self {
            PayloadMap::Func(f) => f(payload),
            PayloadMap::Const(value) => value.clone(),
        }
    }
}

impl From<Value> for PayloadMap {
    fn from(value: Value) -> Self {
        PayloadMap::Const(value)
    }
}

/// Build a flow around `target`. A `Many` target becomes the parallel
/// composition; everything else becomes a single call step.
pub fn call(target: impl Into<CallTarget>) -> Flow {
    call_inner(target.into(), None)
}

/// Like [`call`], with a payload mapper applied first. The mapper is
/// ignored by parallel composition, which always forwards the original
/// payload.
pub fn call_with(target: impl Into<CallTarget>, map: impl Into<PayloadMap>) -> Flow {
    call_inner(target.into(), Some(map.into()))
}

fn call_inner(target: CallTarget, map: Option<PayloadMap>) -> Flow {
    match target {
        CallTarget::Many(targets) => parallel(targets),
        target => Flow::new(FlowKind::Call, move |payload, options| {
            let payload = match &map {
                Some(map) => map.apply(payload),
                None => payload,
            };

            match &target {
                // Delegate directly, forwarding options and its token.
                CallTarget::Flow(flow) => flow.invoke(payload, options),
                CallTarget::Action(name) => {
                    let token = CancelToken::child_of(options.cancel.as_ref());
                    (options.ctx.dispatch)(name, payload);
                    options.done()(Value::Null);
                    token
                }
                CallTarget::Func(f) => {
                    let token = CancelToken::child_of(options.cancel.as_ref());
                    match f(payload.clone()) {
                        StepOutcome::Value(value) => options.done()(value),
                        StepOutcome::Async(op) => {
                            let done = options.done();
                            let guard = token.clone();
                            op.on_settle(
                                move |value| {
                                    if guard.cancelled() {
                                        return;
                                    }
                                    done(value.clone());
                                },
                                |error| {
                                    debug!(%error, "async step failed; result dropped");
                                },
                            );
                        }
                        StepOutcome::Flow(flow) => {
                            let mut inner = options.clone();
                            inner.cancel = Some(token.clone());
                            flow.invoke(payload, inner);
                        }
                    }
                    token
                }
                // Routed to `parallel` at construction.
                CallTarget::Many(_) => CancelToken::new(),
            }
        }),
    }
}

/// Fire every target immediately as an independent call, then complete
/// synchronously with the original payload — fire-and-forget with an
/// immediate done signal. Children link to the parallel's parent token, so
/// cancellation still reaches them after the done signal.
fn parallel(targets: Vec<CallTarget>) -> Flow {
    Flow::new(FlowKind::Parallel, move |payload, options| {
        for target in &targets {
            call(target.clone()).invoke(
                payload.clone(),
                FlowOptions {
                    ctx: options.ctx.clone(),
                    on_done: None,
                    cancel: options.cancel.clone(),
                },
            );
        }
        let token = CancelToken::child_of(options.cancel.as_ref());
        options.done()(payload);
        token
    })
}
