//! Reducer shapes: whole-state reducers, per-action prop updates, and
//! prop-scoped reducers keyed by action pattern.

use std::rc::Rc;

use serde_json::Value;

use sluice_core::{Matcher, Pattern};

/// What a reducer sees besides the state: the action name and its payload.
#[derive(Debug, Clone)]
pub struct ReducerArgs {
    pub action: String,
    pub payload: Value,
}

/// Whole-state reducer. The state object goes in owned and comes back out;
/// returning it untouched means "not mine".
pub type StateReduceFn = Rc<dyn Fn(Value, &ReducerArgs) -> Value>;

/// Prop-scoped reducer: old prop value in, new prop value out.
pub type PropReduceFn = Rc<dyn Fn(Value, &ReducerArgs) -> Value>;

/// Maps the dispatched payload before prop reducers see it.
pub type PayloadMapFn = Rc<dyn Fn(&Value, &ReducerArgs) -> Value>;

enum PropUpdate {
    Func(PropReduceFn),
    Const(Value),
}

/// Per-action prop updates. Each listed prop gets its own update function
/// (or constant); the state object is only rewritten for props that
/// actually changed.
#[derive(Default)]
pub struct ActionReducers {
    payload_map: Option<PayloadMapFn>,
    props: Vec<(String, PropUpdate)>,
}

impl ActionReducers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite the payload (given the whole state) before the prop
    /// updates run.
    pub fn map_payload(mut self, f: impl Fn(&Value, &ReducerArgs) -> Value + 'static) -> Self {
        self.payload_map = Some(Rc::new(f));
        self
    }

    /// Update one prop from its old value and the (mapped) args.
    pub fn prop(mut self, name: impl Into<String>, f: impl Fn(Value, &ReducerArgs) -> Value + 'static) -> Self {
        self.props.push((name.into(), PropUpdate::Func(Rc::new(f))));
        self
    }

    /// Set one prop to a constant whenever the action matches.
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.push((name.into(), PropUpdate::Const(value)));
        self
    }
}

/// Compile per-action prop updates into a whole-state reducer guarded by
/// the action pattern.
pub(crate) fn reducer_from_action(pattern: Pattern, def: ActionReducers) -> StateReduceFn {
    let matcher = pattern.matcher();
    Rc::new(move |state: Value, args: &ReducerArgs| {
        if !matcher.matches(&args.action) {
            return state;
        }
        let mut map = match state {
            Value::Object(map) => map,
            other => return other,
        };
        let mapped = match &def.payload_map {
            Some(f) => {
                let whole = Value::Object(map.clone());
                ReducerArgs {
                    action: args.action.clone(),
                    payload: f(&whole, args),
                }
            }
            None => args.clone(),
        };
        for (name, update) in &def.props {
            let current = map.get(name).cloned().unwrap_or(Value::Null);
            let next = match update {
                PropUpdate::Func(f) => f(current.clone(), &mapped),
                PropUpdate::Const(value) => value.clone(),
            };
            if next != current {
                map.insert(name.clone(), next);
            }
        }
        Value::Object(map)
    })
}

/// Compile a prop-scoped reducer list (action pattern per entry) into a
/// whole-state reducer for that one prop.
pub(crate) fn reducer_from_prop(prop: String, entries: Vec<(Pattern, PropReduceFn)>) -> StateReduceFn {
    let entries: Vec<(Matcher, PropReduceFn)> = entries
        .into_iter()
        .map(|(pattern, f)| (pattern.matcher(), f))
        .collect();
    Rc::new(move |state: Value, args: &ReducerArgs| {
        let mut map = match state {
            Value::Object(map) => map,
            other => return other,
        };
        let current = map.get(&prop).cloned().unwrap_or(Value::Null);
        let next = entries.iter().fold(current.clone(), |value, (matcher, f)| {
            if matcher.matches(&args.action) {
                f(value, args)
            } else {
                value
            }
        });
        if next != current {
            map.insert(prop.clone(), next);
        }
        Value::Object(map)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(action: &str, payload: Value) -> ReducerArgs {
        ReducerArgs {
            action: action.to_string(),
            payload,
        }
    }

    #[test]
    fn action_reducer_only_touches_matching_actions() {
        let reduce = reducer_from_action(
            Pattern::parse("increase").unwrap(),
            ActionReducers::new().prop("count", |value, _| {
                json!(value.as_i64().unwrap_or(0) + 1)
            }),
        );

        let state = json!({ "count": 1 });
        let state = reduce(state, &args("increase", Value::Null));
        assert_eq!(state, json!({ "count": 2 }));

        let state = reduce(state, &args("decrease", Value::Null));
        assert_eq!(state, json!({ "count": 2 }));
    }

    #[test]
    fn payload_map_rewrites_before_prop_updates() {
        let reduce = reducer_from_action(
            Pattern::parse("add").unwrap(),
            ActionReducers::new()
                .map_payload(|_, args| json!(args.payload.as_i64().unwrap_or(0) * 10))
                .prop("total", |value, args| {
                    json!(value.as_i64().unwrap_or(0) + args.payload.as_i64().unwrap_or(0))
                }),
        );

        let state = reduce(json!({ "total": 0 }), &args("add", json!(3)));
        assert_eq!(state, json!({ "total": 30 }));
    }

    #[test]
    fn constant_updates_apply_on_match() {
        let reduce = reducer_from_action(
            Pattern::parse("reset").unwrap(),
            ActionReducers::new().set("count", json!(0)),
        );

        let state = reduce(json!({ "count": 42 }), &args("reset", Value::Null));
        assert_eq!(state, json!({ "count": 0 }));
    }

    #[test]
    fn prop_reducer_folds_matching_entries_in_order() {
        let reduce = reducer_from_prop(
            "log".to_string(),
            vec![
                (
                    Pattern::parse("*").unwrap(),
                    Rc::new(|value: Value, args: &ReducerArgs| {
                        let mut items = value.as_array().cloned().unwrap_or_default();
                        items.push(json!(args.action));
                        Value::Array(items)
                    }) as PropReduceFn,
                ),
                (
                    Pattern::parse("clear").unwrap(),
                    Rc::new(|_: Value, _: &ReducerArgs| json!([])) as PropReduceFn,
                ),
            ],
        );

        let state = reduce(json!({ "log": [] }), &args("first", Value::Null));
        assert_eq!(state, json!({ "log": ["first"] }));

        // "clear" matches both entries: append, then wipe.
        let state = reduce(state, &args("clear", Value::Null));
        assert_eq!(state, json!({ "log": [] }));
    }
}
