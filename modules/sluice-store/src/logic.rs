//! Logic modules: the unit a store applies — state defaults, reducers,
//! effects, listeners, and flow roots bundled together.

use std::rc::Rc;

use serde_json::Value;

use sluice_core::DispatchEvent;
use sluice_flow::Flow;

use crate::effect::EffectCtx;
use crate::reducer::{ActionReducers, PropReduceFn, ReducerArgs, StateReduceFn};
use crate::store::Store;

pub(crate) type EffectFn = Rc<dyn Fn(Value, &EffectCtx)>;

pub(crate) enum StateDefault {
    Value(Value),
    /// Evaluated at merge time, once, and only when the key is absent.
    Lazy(Rc<dyn Fn() -> Value>),
}

pub(crate) enum FlowDef {
    Built(Flow),
    /// Computed against the live store, so a flow body can read state.
    Factory(Rc<dyn Fn(&Store) -> Flow>),
}

/// Builder for one logic module. Applied with [`Store::use_logic`]; pattern
/// strings are validated there, so assembly itself never fails.
#[derive(Default)]
pub struct Logic {
    pub(crate) state_defaults: Vec<(String, StateDefault)>,
    pub(crate) invalid_state: Option<String>,
    pub(crate) action_reducers: Vec<(String, ActionReducers)>,
    pub(crate) raw_reducers: Vec<StateReduceFn>,
    pub(crate) prop_reducers: Vec<(String, Vec<(String, PropReduceFn)>)>,
    pub(crate) effects: Vec<(String, EffectFn)>,
    pub(crate) flows: Vec<FlowDef>,
    pub(crate) dispatch_listeners: Vec<Rc<dyn Fn(&DispatchEvent)>>,
    pub(crate) change_listeners: Vec<Rc<dyn Fn(&Value)>>,
    pub(crate) init: Option<EffectFn>,
}

impl Logic {
    pub fn new() -> Self {
        Self::default()
    }

    /// State defaults as a JSON object. Keys already present in the store
    /// keep their existing value when the module is applied.
    pub fn state(mut self, defaults: Value) -> Self {
        match defaults {
            Value::Object(map) => {
                for (key, value) in map {
                    self.state_defaults.push((key, StateDefault::Value(value)));
                }
            }
            other => {
                self.invalid_state = Some(format!(
                    "state defaults must be an object, got {other}"
                ));
            }
        }
        self
    }

    /// A default computed at apply time, only when the key is absent.
    pub fn state_lazy(mut self, key: impl Into<String>, f: impl Fn() -> Value + 'static) -> Self {
        self.state_defaults
            .push((key.into(), StateDefault::Lazy(Rc::new(f))));
        self
    }

    /// Prop updates guarded by an action pattern. Literal names become
    /// dispatcher handles on the store.
    pub fn reducer(mut self, pattern: impl Into<String>, def: ActionReducers) -> Self {
        self.action_reducers.push((pattern.into(), def));
        self
    }

    /// A whole-state reducer, run on every action.
    pub fn reducer_fn(mut self, f: impl Fn(Value, &ReducerArgs) -> Value + 'static) -> Self {
        self.raw_reducers.push(Rc::new(f));
        self
    }

    /// A reducer scoped to one prop, guarded by an action pattern.
    pub fn prop_reducer(
        mut self,
        prop: impl Into<String>,
        pattern: impl Into<String>,
        f: impl Fn(Value, &ReducerArgs) -> Value + 'static,
    ) -> Self {
        self.prop_reducer_fn(prop, pattern, Rc::new(f))
    }

    /// Same, taking an already-built reducer (e.g. a loadable rule chain).
    pub fn prop_reducer_fn(
        mut self,
        prop: impl Into<String>,
        pattern: impl Into<String>,
        f: PropReduceFn,
    ) -> Self {
        let prop = prop.into();
        let pattern = pattern.into();
        if let Some((_, entries)) = self
            .prop_reducers
            .iter_mut()
            .find(|(existing, _)| *existing == prop)
        {
            entries.push((pattern, f));
        } else {
            self.prop_reducers.push((prop, vec![(pattern, f)]));
        }
        self
    }

    /// An effect run on every dispatch matching the pattern. The pattern's
    /// literal names become dispatcher handles too.
    pub fn effect(
        mut self,
        pattern: impl Into<String>,
        f: impl Fn(Value, &EffectCtx) + 'static,
    ) -> Self {
        self.effects.push((pattern.into(), Rc::new(f)));
        self
    }

    /// A flow root, invoked once when the module is applied.
    pub fn flow(mut self, flow: Flow) -> Self {
        self.flows.push(FlowDef::Built(flow));
        self
    }

    /// A flow root computed against the live store.
    pub fn flow_fn(mut self, f: impl Fn(&Store) -> Flow + 'static) -> Self {
        self.flows.push(FlowDef::Factory(Rc::new(f)));
        self
    }

    /// Observe every dispatch on this store.
    pub fn on_dispatch(mut self, f: impl Fn(&DispatchEvent) + 'static) -> Self {
        self.dispatch_listeners.push(Rc::new(f));
        self
    }

    /// Observe every actual state change.
    pub fn on_change(mut self, f: impl Fn(&Value) + 'static) -> Self {
        self.change_listeners.push(Rc::new(f));
        self
    }

    /// Run once when the module is applied, before the flow roots start.
    pub fn init(mut self, f: impl Fn(Value, &EffectCtx) + 'static) -> Self {
        self.init = Some(Rc::new(f));
        self
    }
}
