//! Dispatch-wrapping middleware, composed right-to-left so the first
//! middleware in the list sees each action first.

use std::rc::Rc;

use serde_json::Value;

use sluice_flow::DispatchFn;

/// What a middleware sees while it is being constructed: a state reader
/// and a dispatch guard. Dispatching during construction would skip part
/// of the chain, so the guard fails fast instead.
pub struct MiddlewareApi {
    pub get: Rc<dyn Fn() -> Value>,
    pub dispatch: DispatchFn,
}

/// Wraps the next dispatch function in the chain.
pub type MiddlewareLayer = Box<dyn FnOnce(DispatchFn) -> DispatchFn>;

/// Builds a layer from the construction-time api.
pub type Middleware = Rc<dyn Fn(&MiddlewareApi) -> MiddlewareLayer>;

pub(crate) fn apply(
    get: Rc<dyn Fn() -> Value>,
    base: DispatchFn,
    middleware: &[Middleware],
) -> DispatchFn {
    let api = MiddlewareApi {
        get,
        dispatch: Rc::new(|action: &str, _payload: Value| {
            panic!(
                "dispatching {action:?} while constructing middleware is not allowed; \
                 other middleware would not be applied to this dispatch"
            );
        }),
    };
    let layers: Vec<MiddlewareLayer> = middleware.iter().map(|m| m(&api)).collect();
    layers
        .into_iter()
        .rev()
        .fold(base, |next, layer| layer(next))
}
