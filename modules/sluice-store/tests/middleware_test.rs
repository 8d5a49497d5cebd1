//! Middleware composition around the dispatch path.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use sluice_store::{ActionReducers, Logic, Middleware, MiddlewareLayer, Store};

fn tagging(order: Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> Middleware {
    Rc::new(move |_api| -> MiddlewareLayer {
        let order = order.clone();
        Box::new(move |next| {
            Rc::new(move |action: &str, payload: Value| {
                order.borrow_mut().push(tag);
                next(action, payload);
            })
        })
    })
}

#[test]
fn middleware_runs_in_list_order_around_the_base_dispatch() {
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let store = Store::builder()
        .middleware(tagging(order.clone(), "outer"))
        .middleware(tagging(order.clone(), "inner"))
        .build()
        .unwrap();
    store
        .use_logic(
            Logic::new()
                .state(json!({ "count": 0 }))
                .reducer(
                    "increase",
                    ActionReducers::new().prop("count", |value, _| {
                        json!(value.as_i64().unwrap_or(0) + 1)
                    }),
                ),
        )
        .unwrap();

    store.call("increase", Value::Null);

    assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    assert_eq!(store.get_prop("count"), json!(1));
}

#[test]
fn middleware_can_rewrite_the_payload() {
    let doubling: Middleware = Rc::new(|_api| -> MiddlewareLayer {
        Box::new(|next| {
            Rc::new(move |action: &str, payload: Value| {
                let doubled = json!(payload.as_i64().unwrap_or(0) * 2);
                next(action, doubled);
            })
        })
    });

    let store = Store::builder().middleware(doubling).build().unwrap();
    store
        .use_logic(
            Logic::new().state(json!({ "last": null })).reducer(
                "record",
                ActionReducers::new().prop("last", |_, args| args.payload.clone()),
            ),
        )
        .unwrap();

    store.call("record", json!(21));
    assert_eq!(store.get_prop("last"), json!(42));
}

#[test]
fn middleware_can_swallow_actions() {
    let filter: Middleware = Rc::new(|_api| -> MiddlewareLayer {
        Box::new(|next| {
            Rc::new(move |action: &str, payload: Value| {
                if action.starts_with("blocked.") {
                    return;
                }
                next(action, payload);
            })
        })
    });

    let store = Store::builder().middleware(filter).build().unwrap();
    let seen = Rc::new(RefCell::new(0));
    let s = seen.clone();
    let _sub = store.on(move |_| *s.borrow_mut() += 1);

    store.call("blocked.ping", Value::Null);
    store.call("allowed", Value::Null);

    assert_eq!(*seen.borrow(), 1);
}

#[test]
fn middleware_reads_state_through_its_api() {
    let snapshot: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));

    let observing: Middleware = {
        let snapshot = snapshot.clone();
        Rc::new(move |api| -> MiddlewareLayer {
            let get = api.get.clone();
            let snapshot = snapshot.clone();
            Box::new(move |next| {
                Rc::new(move |action: &str, payload: Value| {
                    *snapshot.borrow_mut() = Some(get());
                    next(action, payload);
                })
            })
        })
    };

    let store = Store::builder().middleware(observing).build().unwrap();
    store
        .use_logic(Logic::new().state(json!({ "ready": true })))
        .unwrap();

    store.call("anything", Value::Null);
    assert_eq!(*snapshot.borrow(), Some(json!({ "ready": true })));
}

#[test]
#[should_panic(expected = "while constructing middleware")]
fn dispatching_during_construction_fails_fast() {
    let eager: Middleware = Rc::new(|api| -> MiddlewareLayer {
        (api.dispatch)("too-early", Value::Null);
        Box::new(|next| next)
    });

    let _ = Store::builder().middleware(eager).build();
}
