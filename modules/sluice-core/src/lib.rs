//! Leaves of the flow engine: the dispatch event record, the synchronous
//! pub-sub emitter, the cancellation token, the action pattern matcher,
//! the cooperative scheduler, and the async operation primitive.
//!
//! Everything here is single-threaded by design. Delivery is synchronous:
//! emitting an event, settling an operation, or advancing the clock runs
//! the registered callbacks before returning.

pub mod cancel;
pub mod emitter;
pub mod error;
pub mod event;
pub mod op;
pub mod pattern;
pub mod scheduler;

pub use cancel::CancelToken;
pub use emitter::{Emitter, Subscription};
pub use error::FlowError;
pub use event::DispatchEvent;
pub use op::{AsyncOp, Resolver};
pub use pattern::{Matcher, Pattern};
pub use scheduler::{Scheduler, TimerId};
