//! Supersession combinators: `latest` and `debounce`.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use sluice_core::CancelToken;

use crate::call::{call, CallTarget};
use crate::flow::{Flow, FlowKind};

/// Take-latest: every invocation cancels the previous invocation's token
/// before starting a fresh `call(target)`. At most one in-flight instance
/// survives to completion; superseded work is cancelled, not awaited, so
/// long bodies must check their token.
pub fn latest(target: impl Into<CallTarget>) -> Flow {
    let target = target.into();
    let previous: Rc<RefCell<Option<CancelToken>>> = Rc::new(RefCell::new(None));

    Flow::new(FlowKind::Latest, move |payload, options| {
        let superseded = previous.borrow_mut().take();
        if let Some(token) = superseded {
            debug!("superseding in-flight instance");
            token.cancel();
        }

        let token = CancelToken::child_of(options.cancel.as_ref());
        *previous.borrow_mut() = Some(token.clone());

        let mut inner = options.clone();
        inner.cancel = Some(token.clone());
        call(target.clone()).invoke(payload, inner);

        token
    })
}

/// Quiet-period gate: each invocation disarms the previous pending timer
/// and arms a new one for `ms`; only when the quiet period elapses does
/// `call(target)` start. Typically composed as `latest(debounce(...))` so
/// in-flight-cancel and quiet-period semantics apply together.
pub fn debounce(ms: u64, target: impl Into<CallTarget>) -> Flow {
    let target = target.into();
    let previous: Rc<RefCell<Option<CancelToken>>> = Rc::new(RefCell::new(None));

    Flow::new(FlowKind::Debounce, move |payload, options| {
        let superseded = previous.borrow_mut().take();
        if let Some(token) = superseded {
            token.cancel();
        }

        let token = CancelToken::child_of(options.cancel.as_ref());
        *previous.borrow_mut() = Some(token.clone());

        let target = target.clone();
        let mut inner = options.clone();
        inner.cancel = Some(token.clone());
        let timer = options
            .ctx
            .scheduler
            .schedule(ms, move || {
                call(target).invoke(payload, inner);
            });

        let scheduler = options.ctx.scheduler.clone();
        token.on_cancel(move || scheduler.cancel(timer));

        token
    })
}
