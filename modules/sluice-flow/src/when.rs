//! The race/aggregation primitive over heterogeneous inputs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};
use tracing::debug;

use sluice_core::{AsyncOp, CancelToken, FlowError, Pattern};

use crate::call::{call, CallTarget};
use crate::flow::{Flow, FlowKind};
use crate::options::{FlowCtx, FlowOptions, ListenerFn};

/// One branch of a `when` aggregation or race.
#[derive(Clone)]
pub enum Racer {
    /// Action-pattern subscription; fires on every matching dispatch.
    Pattern(String),
    /// Settles once; success feeds the machinery, failure the error hook.
    Async(AsyncOp),
    /// Live sub-flow; its completion feeds the machinery and its token is
    /// recorded so a losing racer can be cancelled.
    Flow(Flow),
}

impl From<&str> for Racer {
    fn from(pattern: &str) -> Self {
        Racer::Pattern(pattern.to_string())
    }
}

impl From<String> for Racer {
    fn from(pattern: String) -> Self {
        Racer::Pattern(pattern)
    }
}

impl From<AsyncOp> for Racer {
    fn from(op: AsyncOp) -> Self {
        Racer::Async(op)
    }
}

impl From<Flow> for Racer {
    fn from(flow: Flow) -> Self {
        Racer::Flow(flow)
    }
}

/// Input to [`when`], normalized per invocation.
#[derive(Clone)]
pub enum WhenInput {
    /// A single repeatable pattern subscription.
    Pattern(String),
    /// A single async racer.
    Async(AsyncOp),
    /// A running sub-flow that completes the `when` directly.
    Flow(Flow),
    /// Ordered aggregation: every racer must complete at least once; the
    /// completion callback receives the results in slot order, once.
    All(Vec<Racer>),
    /// Labelled race: the first racer to succeed wins and cancels the
    /// rest.
    Race(Vec<(String, Racer)>),
    /// Computed racers: resolved once per invocation, then re-normalized.
    Dynamic(Rc<dyn Fn(Value, &FlowOptions) -> WhenInput>),
}

impl WhenInput {
    pub fn race<S: Into<String>>(entries: Vec<(S, Racer)>) -> Self {
        WhenInput::Race(
            entries
                .into_iter()
                .map(|(label, racer)| (label.into(), racer))
                .collect(),
        )
    }

    pub fn dynamic(f: impl Fn(Value, &FlowOptions) -> WhenInput + 'static) -> Self {
        WhenInput::Dynamic(Rc::new(f))
    }
}

impl From<&str> for WhenInput {
    fn from(pattern: &str) -> Self {
        WhenInput::Pattern(pattern.to_string())
    }
}

impl From<String> for WhenInput {
    fn from(pattern: String) -> Self {
        WhenInput::Pattern(pattern)
    }
}

impl From<AsyncOp> for WhenInput {
    fn from(op: AsyncOp) -> Self {
        WhenInput::Async(op)
    }
}

impl From<Flow> for WhenInput {
    fn from(flow: Flow) -> Self {
        WhenInput::Flow(flow)
    }
}

impl From<Vec<Racer>> for WhenInput {
    fn from(racers: Vec<Racer>) -> Self {
        WhenInput::All(racers)
    }
}

/// The success record a `Func` handler receives. `action` is the matched
/// action name for pattern racers and `None` for async and flow racers.
#[derive(Debug, Clone)]
pub struct WhenEvent {
    pub action: Option<String>,
    pub payload: Value,
}

/// Descriptor hooks. Each hook is a call target, so a plain function, an
/// action name, or a nested flow all work.
#[derive(Clone, Default)]
pub struct WhenHooks {
    pub on_success: Option<CallTarget>,
    pub on_error: Option<CallTarget>,
    pub on_loading: Option<CallTarget>,
    pub on_done: Option<CallTarget>,
}

impl WhenHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(mut self, target: impl Into<CallTarget>) -> Self {
        self.on_success = Some(target.into());
        self
    }

    pub fn error(mut self, target: impl Into<CallTarget>) -> Self {
        self.on_error = Some(target.into());
        self
    }

    pub fn loading(mut self, target: impl Into<CallTarget>) -> Self {
        self.on_loading = Some(target.into());
        self
    }

    pub fn done(mut self, target: impl Into<CallTarget>) -> Self {
        self.on_done = Some(target.into());
        self
    }
}

/// How `when` reports successes.
///
/// `Func` and `Flow` handlers observe every success event; outside race
/// mode they suppress completion bookkeeping entirely, which is what makes
/// a lone pattern subscription fire indefinitely ("every match"). The
/// `Hooks` form settles the `when` on its completion signal instead.
#[derive(Clone, Default)]
pub enum WhenHandler {
    #[default]
    None,
    Func(Rc<dyn Fn(&WhenEvent)>),
    Flow(Flow),
    Hooks(WhenHooks),
}

impl WhenHandler {
    pub fn func(f: impl Fn(&WhenEvent) + 'static) -> Self {
        WhenHandler::Func(Rc::new(f))
    }
}

impl From<Flow> for WhenHandler {
    fn from(flow: Flow) -> Self {
        WhenHandler::Flow(flow)
    }
}

impl From<WhenHooks> for WhenHandler {
    fn from(hooks: WhenHooks) -> Self {
        WhenHandler::Hooks(hooks)
    }
}

/// Build the race/aggregation flow. Pattern strings anywhere in the input
/// are validated here — malformed patterns fail fast at construction, not
/// at dispatch.
pub fn when(
    input: impl Into<WhenInput>,
    handler: impl Into<WhenHandler>,
) -> Result<Flow, FlowError> {
    let input = input.into();
    let handler = handler.into();
    validate(&input)?;
    Ok(Flow::new(FlowKind::When, move |prev, options| {
        run_when(input.clone(), handler.clone(), prev, options)
    }))
}

fn validate(input: &WhenInput) -> Result<(), FlowError> {
    match input {
        WhenInput::Pattern(pattern) => Pattern::parse(pattern).map(drop),
        WhenInput::All(racers) => racers.iter().try_for_each(validate_racer),
        WhenInput::Race(entries) => entries.iter().try_for_each(|(_, r)| validate_racer(r)),
        _ => Ok(()),
    }
}

fn validate_racer(racer: &Racer) -> Result<(), FlowError> {
    match racer {
        Racer::Pattern(pattern) => Pattern::parse(pattern).map(drop),
        _ => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Single,
    All,
    Race,
}

struct WhenRun {
    token: CancelToken,
    ctx: FlowCtx,
    outer_done: Option<crate::options::DoneFn>,
    handler: WhenHandler,
    mode: Mode,
    labels: Vec<String>,
    slots: RefCell<Vec<Option<Value>>>,
    cancels: RefCell<Vec<Option<CancelToken>>>,
    done: Cell<bool>,
    done_hook_fired: Cell<bool>,
}

fn run_when(
    mut input: WhenInput,
    handler: WhenHandler,
    prev: Value,
    options: FlowOptions,
) -> CancelToken {
    let token = CancelToken::child_of(options.cancel.as_ref());

    let (mode, racers, labels) = loop {
        match input {
            WhenInput::Dynamic(f) => input = f(prev.clone(), &options),
            WhenInput::Flow(flow) => {
                // The sub-flow completes the `when` directly.
                let outer_done = options.on_done.clone();
                let t = token.clone();
                let mut inner = options.clone();
                inner.cancel = Some(token.clone());
                inner.on_done = Some(Rc::new(move |value| {
                    t.dispose();
                    if let Some(done) = &outer_done {
                        done(value);
                    }
                }));
                flow.invoke(prev, inner);
                return token;
            }
            WhenInput::Pattern(pattern) => {
                break (Mode::Single, vec![Racer::Pattern(pattern)], Vec::new())
            }
            WhenInput::Async(op) => break (Mode::Single, vec![Racer::Async(op)], Vec::new()),
            WhenInput::All(racers) => break (Mode::All, racers, Vec::new()),
            WhenInput::Race(entries) => {
                let (labels, racers): (Vec<String>, Vec<Racer>) = entries.into_iter().unzip();
                break (Mode::Race, racers, labels);
            }
        }
    };

    let count = racers.len();
    let run = Rc::new(WhenRun {
        token: token.clone(),
        ctx: options.ctx.clone(),
        outer_done: options.on_done.clone(),
        handler,
        mode,
        labels,
        slots: RefCell::new(vec![None; count]),
        cancels: RefCell::new(vec![None; count]),
        done: Cell::new(false),
        done_hook_fired: Cell::new(false),
    });

    // Racers arm in index order; a racer settling synchronously during the
    // sweep (an already-resolved op, a zero delay inside the same tick)
    // can finish the whole `when` before the rest ever arm.
    for (index, racer) in racers.into_iter().enumerate() {
        if run.done.get() {
            break;
        }
        arm(&run, index, racer, prev.clone());
    }

    token
}

fn arm(run: &Rc<WhenRun>, index: usize, racer: Racer, prev: Value) {
    match racer {
        Racer::Pattern(pattern) => {
            let Ok(parsed) = Pattern::parse(&pattern) else {
                // Validated at construction; dynamic inputs can still slip
                // a bad pattern through — surface it and arm nothing.
                tracing::error!(pattern = %pattern, "invalid pattern in when racer");
                return;
            };
            let matcher = parsed.matcher();
            let r = Rc::clone(run);
            let listener: ListenerFn = Rc::new(move |event| {
                if matcher.matches(&event.action) {
                    handle_success(&r, index, Some(event.action.clone()), event.payload.clone());
                }
            });
            let unsubscribe = (run.ctx.subscribe)(listener);
            run.token.on_dispose(move || unsubscribe());
        }
        Racer::Async(op) => {
            if let WhenHandler::Hooks(hooks) = &run.handler {
                if let Some(loading) = &hooks.on_loading {
                    invoke_hook(run, loading, Value::Null);
                }
            }
            let ok = Rc::clone(run);
            let err = Rc::clone(run);
            op.on_settle(
                move |value| handle_success(&ok, index, None, value.clone()),
                move |error| handle_error(&err, error.clone()),
            );
        }
        Racer::Flow(flow) => {
            let r = Rc::clone(run);
            let child = flow.invoke(
                prev,
                FlowOptions {
                    ctx: run.ctx.clone(),
                    on_done: Some(Rc::new(move |value| handle_success(&r, index, None, value))),
                    cancel: Some(run.token.clone()),
                },
            );
            run.cancels.borrow_mut()[index] = Some(child);
        }
    }
}

fn handle_success(run: &Rc<WhenRun>, index: usize, action: Option<String>, payload: Value) {
    if run.done.get() || run.token.cancelled() {
        return;
    }

    let is_race = run.mode == Mode::Race;
    match &run.handler {
        WhenHandler::Func(f) => {
            f(&WhenEvent {
                action: action.clone(),
                payload: payload.clone(),
            });
            if !is_race {
                return;
            }
        }
        WhenHandler::Flow(flow) => {
            flow.invoke(
                json!({ "action": action.clone(), "payload": payload.clone() }),
                FlowOptions {
                    ctx: run.ctx.clone(),
                    on_done: None,
                    cancel: Some(run.token.clone()),
                },
            );
            if !is_race {
                return;
            }
        }
        _ => {}
    }

    match run.mode {
        Mode::Single => {
            run.done.set(true);
            run.token.dispose();
            success_hook(run, payload.clone());
            outer_done(run, payload);
            fire_done_hook(run);
        }
        Mode::All => {
            let all_filled = {
                let mut slots = run.slots.borrow_mut();
                slots[index] = Some(payload.clone());
                slots.iter().all(Option::is_some)
            };
            if all_filled {
                run.done.set(true);
                run.token.dispose();
            }
            success_hook(run, payload);
            if all_filled {
                let values: Vec<Value> = run
                    .slots
                    .borrow()
                    .iter()
                    .map(|slot| slot.clone().unwrap_or(Value::Null))
                    .collect();
                outer_done(run, Value::Array(values));
                fire_done_hook(run);
            }
        }
        Mode::Race => {
            run.done.set(true);
            debug!(winner = %run.labels[index], "race settled");
            cancel_others(run, index);
            run.token.dispose();
            let entry = json!({ "type": action, "payload": payload });
            success_hook(run, entry.clone());
            let mut result = serde_json::Map::new();
            result.insert(run.labels[index].clone(), entry);
            outer_done(run, Value::Object(result));
            fire_done_hook(run);
        }
    }
}

fn handle_error(run: &Rc<WhenRun>, error: Value) {
    if run.token.cancelled() {
        return;
    }
    match &run.handler {
        WhenHandler::Hooks(hooks) if hooks.on_error.is_some() => {
            if let Some(on_error) = &hooks.on_error {
                invoke_hook(run, on_error, error);
            }
        }
        _ => {
            // No error hook registered means failures are intentionally
            // ignored for this racer.
            debug!(%error, "when racer failed; no error hook");
        }
    }
    fire_done_hook(run);
}

fn success_hook(run: &Rc<WhenRun>, result: Value) {
    if let WhenHandler::Hooks(hooks) = &run.handler {
        if let Some(on_success) = &hooks.on_success {
            invoke_hook(run, on_success, result);
        }
    }
}

/// The `on_done` hook fires once per settlement: winner chosen, all slots
/// filled, or an error path completed.
fn fire_done_hook(run: &Rc<WhenRun>) {
    if run.done_hook_fired.replace(true) {
        return;
    }
    if let WhenHandler::Hooks(hooks) = &run.handler {
        if let Some(on_done) = &hooks.on_done {
            invoke_hook(run, on_done, Value::Null);
        }
    }
}

fn outer_done(run: &Rc<WhenRun>, value: Value) {
    if let Some(done) = &run.outer_done {
        done(value);
    }
}

fn invoke_hook(run: &Rc<WhenRun>, target: &CallTarget, payload: Value) {
    call(target.clone()).invoke(
        payload,
        FlowOptions {
            ctx: run.ctx.clone(),
            on_done: None,
            cancel: Some(run.token.clone()),
        },
    );
}

fn cancel_others(run: &Rc<WhenRun>, winner: usize) {
    let snapshot: Vec<Option<CancelToken>> = run.cancels.borrow().clone();
    for (index, cancel) in snapshot.into_iter().enumerate() {
        if index == winner {
            continue;
        }
        if let Some(token) = cancel {
            token.cancel();
        }
    }
}
