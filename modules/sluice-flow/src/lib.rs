//! Cancellable, composable flow combinators driven by a dispatch stream.
//!
//! A flow is a tagged callable: invoked with the previous step's value and
//! a set of options (collaborators, completion callback, parent token), it
//! starts its work and returns a [`sluice_core::CancelToken`]. Combinators
//! build flows out of flows, plain functions, action-pattern strings, and
//! async operations:
//!
//! - [`call`] — dispatch an action, run a function, or delegate to a flow;
//!   a list fans out in parallel.
//! - [`when`] — race or aggregate heterogeneous racers: pattern
//!   subscriptions, async operations, nested flows.
//! - [`pipe`] — sequential composition with a single spanning token.
//! - [`latest`] — cancel the previous in-flight instance on every call.
//! - [`debounce`] — quiet-period gate in front of a flow.
//! - [`delay`] — timed completion on the scheduler clock.

pub mod call;
pub mod delay;
pub mod driver;
pub mod flow;
pub mod latest;
pub mod options;
pub mod pipe;
pub mod when;

pub use call::{call, call_with, CallTarget, PayloadMap, StepOutcome};
pub use delay::{delay, delay_value};
pub use flow::{Flow, FlowKind};
pub use latest::{debounce, latest};
pub use options::{DispatchFn, DoneFn, FlowCtx, FlowOptions, ListenerFn, SubscribeFn, Unsubscribe};
pub use pipe::pipe;
pub use when::{when, Racer, WhenEvent, WhenHandler, WhenHooks, WhenInput};
