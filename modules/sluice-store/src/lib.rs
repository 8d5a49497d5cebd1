//! The state container: a single JSON state object updated only through
//! named actions, with logic modules bundling reducers, effects, and flow
//! roots, a middleware chain around dispatch, and async-mode loadables.
//!
//! The store provides the two collaborators the flow engine consumes — a
//! dispatch function and a dispatch-stream subscription — plus the
//! scheduler timed combinators arm timers on.

pub mod effect;
pub mod loadable;
pub mod logic;
pub mod middleware;
pub mod reducer;
pub mod store;
pub mod timing;

pub use effect::EffectCtx;
pub use loadable::{Loadable, LoadableField, LoadableResult, LoadableRule, LoadState};
pub use logic::Logic;
pub use middleware::{Middleware, MiddlewareApi, MiddlewareLayer};
pub use reducer::{ActionReducers, PropReduceFn, ReducerArgs, StateReduceFn};
pub use store::{AsyncNames, AsyncNaming, Dispatcher, Store, StoreBuilder};
