//! The store: a JSON state object behind a middleware-wrapped dispatch,
//! with per-action channels, change notifications, async-mode loadables,
//! and the collaborators the flow engine consumes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace};

use sluice_core::{AsyncOp, DispatchEvent, Emitter, FlowError, Pattern, Scheduler, Subscription};
use sluice_flow::{DispatchFn, FlowCtx, FlowOptions, ListenerFn, SubscribeFn, Unsubscribe};

use crate::effect::EffectCtx;
use crate::logic::{FlowDef, Logic, StateDefault};
use crate::middleware::{self, Middleware};
use crate::reducer::{reducer_from_action, reducer_from_prop, ReducerArgs, StateReduceFn};
use crate::Loadable;

/// How async-mode companion actions are named for a matching action.
#[derive(Debug, Clone)]
pub enum AsyncNaming {
    /// Shared `async.*` names for every matching action.
    Default,
    /// Per-action names: `<action>.loading`, `<action>.success`, ...
    Dynamic,
    /// Explicit names; `None` disables that phase.
    Custom(AsyncNames),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsyncNames {
    pub loading: Option<String>,
    pub success: Option<String>,
    pub error: Option<String>,
    pub done: Option<String>,
}

impl AsyncNames {
    fn shared() -> Self {
        Self {
            loading: Some("async.loading".to_string()),
            success: Some("async.success".to_string()),
            error: Some("async.error".to_string()),
            done: Some("async.done".to_string()),
        }
    }

    /// The per-action naming scheme, as a base for custom overrides.
    pub fn dynamic_for(action: &str) -> Self {
        Self {
            loading: Some(format!("{action}.loading")),
            success: Some(format!("{action}.success")),
            error: Some(format!("{action}.error")),
            done: Some(format!("{action}.done")),
        }
    }
}

impl AsyncNaming {
    fn resolve(&self, action: &str) -> AsyncNames {
        match self {
            AsyncNaming::Default => AsyncNames::shared(),
            AsyncNaming::Dynamic => AsyncNames::dynamic_for(action),
            AsyncNaming::Custom(names) => names.clone(),
        }
    }
}

struct StoreInner {
    state: RefCell<Value>,
    reducers: RefCell<Vec<StateReduceFn>>,
    dispatch_events: Emitter<DispatchEvent>,
    change_events: Emitter<Value>,
    action_events: RefCell<HashMap<String, Emitter<DispatchEvent>>>,
    scheduler: Scheduler,
    data: Rc<RefCell<HashMap<String, Value>>>,
    async_mode: Vec<(Pattern, AsyncNaming)>,
    async_generation: RefCell<HashMap<String, u64>>,
    /// Middleware-composed dispatch; set once during construction.
    dispatch: RefCell<Option<DispatchFn>>,
    /// Registered dispatcher names; the flag marks public names.
    dispatchers: RefCell<BTreeMap<String, bool>>,
}

/// Builder for a store with middleware and async-mode configuration.
#[derive(Default)]
pub struct StoreBuilder {
    middleware: Vec<Middleware>,
    async_mode: Option<Vec<(String, AsyncNaming)>>,
}

impl StoreBuilder {
    pub fn middleware(mut self, m: Middleware) -> Self {
        self.middleware.push(m);
        self
    }

    /// Add an async-mode entry: actions matching `pattern` get companion
    /// actions named per `naming`. Entries are tried in order; the first
    /// match wins. With no entries at all, every action uses the shared
    /// `async.*` names.
    pub fn async_mode(mut self, pattern: impl Into<String>, naming: AsyncNaming) -> Self {
        self.async_mode
            .get_or_insert_with(Vec::new)
            .push((pattern.into(), naming));
        self
    }

    /// Disable async-mode companion actions entirely.
    pub fn no_async_mode(mut self) -> Self {
        self.async_mode = Some(Vec::new());
        self
    }

    pub fn build(self) -> Result<Store, FlowError> {
        let async_mode = match self.async_mode {
            None => vec![(Pattern::Any, AsyncNaming::Default)],
            Some(entries) => entries
                .into_iter()
                .map(|(pattern, naming)| Ok((Pattern::parse(&pattern)?, naming)))
                .collect::<Result<_, FlowError>>()?,
        };
        Ok(Store::assemble(self.middleware, async_mode))
    }
}

/// Cloneable handle to one store. All clones share the same state, stream,
/// and scheduler.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// A store with no middleware and the default async mode.
    pub fn new() -> Self {
        Self::assemble(Vec::new(), vec![(Pattern::Any, AsyncNaming::Default)])
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    fn assemble(middleware: Vec<Middleware>, async_mode: Vec<(Pattern, AsyncNaming)>) -> Self {
        let inner = Rc::new(StoreInner {
            state: RefCell::new(Value::Object(serde_json::Map::new())),
            reducers: RefCell::new(Vec::new()),
            dispatch_events: Emitter::new(),
            change_events: Emitter::new(),
            action_events: RefCell::new(HashMap::new()),
            scheduler: Scheduler::new(),
            data: Rc::new(RefCell::new(HashMap::new())),
            async_mode,
            async_generation: RefCell::new(HashMap::new()),
            dispatch: RefCell::new(None),
            dispatchers: RefCell::new(BTreeMap::new()),
        });

        let weak = Rc::downgrade(&inner);
        let base: DispatchFn = Rc::new(move |action: &str, payload: Value| {
            if let Some(inner) = weak.upgrade() {
                Store { inner }.reduce_and_publish(action, payload);
            }
        });
        let weak = Rc::downgrade(&inner);
        let get: Rc<dyn Fn() -> Value> = Rc::new(move || match weak.upgrade() {
            Some(inner) => inner.state.borrow().clone(),
            None => Value::Null,
        });
        let composed = middleware::apply(get, base, &middleware);
        *inner.dispatch.borrow_mut() = Some(composed);

        Store { inner }
    }

    // -- dispatch ----------------------------------------------------------

    /// Dispatch an action through the middleware chain.
    pub fn call(&self, action: &str, payload: Value) {
        let dispatch = self.inner.dispatch.borrow().clone();
        match dispatch {
            Some(dispatch) => dispatch(action, payload),
            None => self.reduce_and_publish(action, payload),
        }
    }

    fn reduce_and_publish(&self, action: &str, payload: Value) {
        trace!(action, "dispatch");
        let args = ReducerArgs {
            action: action.to_string(),
            payload: payload.clone(),
        };
        let reducers = self.inner.reducers.borrow().clone();
        let current = self.inner.state.borrow().clone();
        let next = reducers
            .iter()
            .fold(current, |state, reduce| reduce(state, &args));
        self.replace_state(next);

        let event = DispatchEvent::new(action, payload);
        self.inner.dispatch_events.emit(&event);
        let channel = self.inner.action_events.borrow().get(action).cloned();
        if let Some(channel) = channel {
            channel.emit(&event);
        }
    }

    fn replace_state(&self, next: Value) {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            if *state != next {
                *state = next;
                true
            } else {
                false
            }
        };
        if changed {
            let snapshot = self.get();
            self.inner.change_events.emit(&snapshot);
        }
    }

    // -- reads -------------------------------------------------------------

    pub fn get(&self) -> Value {
        self.inner.state.borrow().clone()
    }

    pub fn get_prop(&self, key: &str) -> Value {
        self.inner
            .state
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn scheduler(&self) -> Scheduler {
        self.inner.scheduler.clone()
    }

    pub fn data(&self) -> Rc<RefCell<HashMap<String, Value>>> {
        self.inner.data.clone()
    }

    // -- subscriptions -----------------------------------------------------

    /// Every dispatch, regardless of action.
    pub fn on(&self, f: impl Fn(&DispatchEvent) + 'static) -> Subscription {
        self.inner.dispatch_events.on(f)
    }

    /// Dispatches matching an action pattern. Literal patterns ride their
    /// per-action channel; the rest filter the firehose.
    pub fn on_action(
        &self,
        pattern: &str,
        f: impl Fn(&DispatchEvent) + 'static,
    ) -> Result<Subscription, FlowError> {
        let pattern = Pattern::parse(pattern)?;
        Ok(self.subscribe_pattern(&pattern, Rc::new(f)))
    }

    /// Actual state changes (dispatches that left the state untouched do
    /// not fire).
    pub fn on_change(&self, f: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.change_events.on(f)
    }

    fn subscribe_pattern(&self, pattern: &Pattern, f: Rc<dyn Fn(&DispatchEvent)>) -> Subscription {
        if let Some(literals) = pattern.literals() {
            let subs = literals
                .iter()
                .map(|name| {
                    let f = f.clone();
                    self.action_channel(name).on(move |event| f(event))
                })
                .collect();
            return Subscription::combined(subs);
        }
        let matcher = pattern.matcher();
        self.inner.dispatch_events.on(move |event| {
            if matcher.matches(&event.action) {
                f(event);
            }
        })
    }

    fn action_channel(&self, name: &str) -> Emitter<DispatchEvent> {
        self.inner
            .action_events
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    // -- dispatchers -------------------------------------------------------

    /// A dispatch handle for a registered public action name. Names with
    /// the `_` prefix are private: registered, but never exposed here.
    pub fn dispatcher(&self, name: &str) -> Option<Dispatcher> {
        let public = *self.inner.dispatchers.borrow().get(name)?;
        if !public {
            return None;
        }
        Some(Dispatcher {
            name: name.to_string(),
            store: self.clone(),
        })
    }

    /// Registered public action names, sorted.
    pub fn action_names(&self) -> Vec<String> {
        self.inner
            .dispatchers
            .borrow()
            .iter()
            .filter(|(_, public)| **public)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn register_dispatchers(&self, pattern: &Pattern) {
        let Some(literals) = pattern.literals() else {
            return;
        };
        let mut dispatchers = self.inner.dispatchers.borrow_mut();
        for name in literals {
            if dispatchers.contains_key(name) {
                continue;
            }
            dispatchers.insert(name.clone(), !name.starts_with('_'));
        }
    }

    // -- flow wiring -------------------------------------------------------

    /// The dispatch function handed to flows and middleware consumers.
    pub fn dispatch_fn(&self) -> DispatchFn {
        let weak = Rc::downgrade(&self.inner);
        Rc::new(move |action: &str, payload: Value| {
            if let Some(inner) = weak.upgrade() {
                Store { inner }.call(action, payload);
            }
        })
    }

    /// The collaborators a flow invocation needs, wired to this store.
    pub fn flow_ctx(&self) -> FlowCtx {
        let weak = Rc::downgrade(&self.inner);
        let subscribe: SubscribeFn = Rc::new(move |listener: ListenerFn| -> Unsubscribe {
            match weak.upgrade() {
                Some(inner) => inner
                    .dispatch_events
                    .on(move |event| listener(event))
                    .into_unsubscribe(),
                None => Box::new(|| {}),
            }
        });
        FlowCtx::new(self.dispatch_fn(), subscribe, self.inner.scheduler.clone())
    }

    // -- logic modules -----------------------------------------------------

    /// Apply a logic module: register its reducers and effects, merge its
    /// state defaults (existing keys win), run its init effect, then start
    /// its flow roots.
    pub fn use_logic(&self, logic: Logic) -> Result<(), FlowError> {
        if let Some(reason) = logic.invalid_state {
            return Err(FlowError::InvalidLogic(reason));
        }

        for (key, def) in logic.action_reducers {
            let pattern = Pattern::parse(&key)?;
            self.register_dispatchers(&pattern);
            self.inner
                .reducers
                .borrow_mut()
                .push(reducer_from_action(pattern, def));
        }
        for reduce in logic.raw_reducers {
            self.inner.reducers.borrow_mut().push(reduce);
        }
        for (prop, entries) in logic.prop_reducers {
            let entries = entries
                .into_iter()
                .map(|(key, f)| Ok((Pattern::parse(&key)?, f)))
                .collect::<Result<Vec<_>, FlowError>>()?;
            self.inner
                .reducers
                .borrow_mut()
                .push(reducer_from_prop(prop, entries));
        }

        for (key, effect) in logic.effects {
            let pattern = Pattern::parse(&key)?;
            self.register_dispatchers(&pattern);
            let weak = Rc::downgrade(&self.inner);
            let listener = move |event: &DispatchEvent| {
                if let Some(inner) = weak.upgrade() {
                    let ctx = EffectCtx::new(event.action.clone(), Store { inner });
                    effect(event.payload.clone(), &ctx);
                }
            };
            // Persistent: the guard is dropped, the listener stays.
            let _ = self.subscribe_pattern(&pattern, Rc::new(listener));
        }

        self.merge_state(logic.state_defaults);

        for f in logic.dispatch_listeners {
            let _ = self.inner.dispatch_events.on(move |event| f(event));
        }
        for f in logic.change_listeners {
            let _ = self.inner.change_events.on(move |state| f(state));
        }

        if let Some(init) = logic.init {
            let ctx = EffectCtx::new("init", self.clone());
            init(Value::Null, &ctx);
        }

        let initial = self.get();
        let options = FlowOptions::new(self.flow_ctx());
        for def in logic.flows {
            let flow = match def {
                FlowDef::Built(flow) => flow,
                FlowDef::Factory(make) => make(self),
            };
            flow.invoke(initial.clone(), options.clone());
        }

        Ok(())
    }

    fn merge_state(&self, defaults: Vec<(String, StateDefault)>) {
        if defaults.is_empty() {
            return;
        }
        let mut map = match self.get() {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, default) in defaults {
            if map.contains_key(&key) {
                continue;
            }
            let value = match default {
                StateDefault::Value(value) => value,
                StateDefault::Lazy(f) => f(),
            };
            map.insert(key, value);
        }
        self.replace_state(Value::Object(map));
    }

    // -- async mode --------------------------------------------------------

    /// Dispatch an action whose payload is still settling. The matching
    /// async-mode entry decides the companion actions: loading now, then
    /// success (plus the plain action with the raw value) or error, then
    /// done — each carrying a [`Loadable`]. A newer operation for the same
    /// action marks earlier settlements `outdated`.
    pub fn dispatch_async(&self, action: &str, op: AsyncOp) {
        let generation = {
            let mut generations = self.inner.async_generation.borrow_mut();
            let slot = generations.entry(action.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };

        let naming = self
            .inner
            .async_mode
            .iter()
            .find(|(pattern, _)| pattern.matcher().matches(action))
            .map(|(_, naming)| naming.clone());
        let Some(naming) = naming else {
            // No async-mode entry: settle into a plain dispatch.
            let store = self.clone();
            let action = action.to_string();
            op.on_success(move |value| store.call(&action, value.clone()));
            return;
        };
        let names = naming.resolve(action);
        debug!(action, generation, "async dispatch started");

        if let Some(loading) = &names.loading {
            self.call(loading, Loadable::loading(action).into_value());
        }

        let ok_store = self.clone();
        let ok_action = action.to_string();
        let ok_names = names.clone();
        let err_store = self.clone();
        let err_action = action.to_string();
        op.on_settle(
            move |value| {
                let mut loadable = Loadable::has_value(&ok_action, value.clone());
                loadable.outdated = ok_store.generation(&ok_action) != generation;
                debug!(action = %ok_action, outdated = loadable.outdated, "async dispatch resolved");
                if let Some(success) = &ok_names.success {
                    ok_store.call(success, loadable.clone().into_value());
                }
                ok_store.call(&ok_action, value.clone());
                if let Some(done) = &ok_names.done {
                    ok_store.call(done, loadable.into_value());
                }
            },
            move |error| {
                let mut loadable = Loadable::has_error(&err_action, error.clone());
                loadable.outdated = err_store.generation(&err_action) != generation;
                debug!(action = %err_action, "async dispatch rejected");
                if let Some(error_name) = &names.error {
                    err_store.call(error_name, loadable.clone().into_value());
                }
                if let Some(done) = &names.done {
                    err_store.call(done, loadable.into_value());
                }
            },
        );
    }

    fn generation(&self, action: &str) -> u64 {
        self.inner
            .async_generation
            .borrow()
            .get(action)
            .copied()
            .unwrap_or(0)
    }
}

/// Cloneable dispatch handle for one public action name.
#[derive(Clone)]
pub struct Dispatcher {
    name: String,
    store: Store,
}

impl Dispatcher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, payload: Value) {
        self.store.call(&self.name, payload);
    }
}
