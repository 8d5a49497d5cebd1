//! Loadables: the record describing one async action's load state, carried
//! as an action payload, plus the rule-driven reducer builder for mapping
//! loadables into state props.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::reducer::{PropReduceFn, ReducerArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    HasValue,
    HasError,
}

/// One async action's load state. Round-trips through the payload `Value`
/// under the `$kind` marker so reducers can recognize it among ordinary
/// payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$kind")]
pub struct Loadable {
    pub action: String,
    pub state: LoadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default)]
    pub outdated: bool,
}

impl Loadable {
    pub fn loading(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            state: LoadState::Loading,
            value: None,
            error: None,
            outdated: false,
        }
    }

    pub fn has_value(action: impl Into<String>, value: Value) -> Self {
        Self {
            action: action.into(),
            state: LoadState::HasValue,
            value: Some(value),
            error: None,
            outdated: false,
        }
    }

    pub fn has_error(action: impl Into<String>, error: Value) -> Self {
        Self {
            action: action.into(),
            state: LoadState::HasError,
            value: None,
            error: Some(error),
            outdated: false,
        }
    }

    /// The loaded value, or `default` when none is present.
    pub fn value_or(&self, default: Value) -> Value {
        self.value.clone().unwrap_or(default)
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).expect("loadable serialization should never fail")
    }

    /// Recognize a loadable payload; ordinary payloads return `None`.
    pub fn from_value(value: &Value) -> Option<Loadable> {
        value.get("$kind")?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// What a matching rule writes into the prop.
#[derive(Clone)]
pub enum LoadableResult {
    Field(LoadableField),
    Func(Rc<dyn Fn(&Loadable, Value, &ReducerArgs) -> Value>),
}

impl LoadableResult {
    pub fn func(f: impl Fn(&Loadable, Value, &ReducerArgs) -> Value + 'static) -> Self {
        LoadableResult::Func(Rc::new(f))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadableField {
    Value,
    Error,
    State,
    Outdated,
}

/// One rule for the loadable reducer: optional filters plus the result to
/// write when they all pass.
#[derive(Clone, TypedBuilder)]
pub struct LoadableRule {
    #[builder(default, setter(strip_option, into))]
    pub action: Option<String>,
    #[builder(default, setter(strip_option))]
    pub outdated: Option<bool>,
    #[builder(default, setter(strip_option))]
    pub state: Option<LoadState>,
    pub result: LoadableResult,
}

impl LoadableRule {
    fn applies(&self, loadable: &Loadable) -> bool {
        if let Some(action) = &self.action {
            if action != &loadable.action {
                return false;
            }
        }
        if let Some(outdated) = self.outdated {
            if outdated != loadable.outdated {
                return false;
            }
        }
        if let Some(state) = self.state {
            if state != loadable.state {
                return false;
            }
        }
        true
    }

    fn apply(&self, loadable: &Loadable, current: Value, args: &ReducerArgs) -> Value {
        match &self.result {
            LoadableResult::Field(field) => match field {
                LoadableField::Value => loadable.value_or(Value::Null),
                LoadableField::Error => loadable.error.clone().unwrap_or(Value::Null),
                LoadableField::State => serde_json::to_value(loadable.state)
                    .expect("load state serialization should never fail"),
                LoadableField::Outdated => Value::Bool(loadable.outdated),
            },
            LoadableResult::Func(f) => f(loadable, current, args),
        }
    }
}

/// Chain rules into one prop reducer: payloads that are not loadables pass
/// through, and rules apply in declaration order.
pub fn rule_reducer(rules: Vec<LoadableRule>) -> PropReduceFn {
    Rc::new(move |current: Value, args: &ReducerArgs| {
        let Some(loadable) = Loadable::from_value(&args.payload) else {
            return current;
        };
        rules.iter().fold(current, |value, rule| {
            if rule.applies(&loadable) {
                rule.apply(&loadable, value, args)
            } else {
                value
            }
        })
    })
}
