//! Plain-callback timing wrappers over the scheduler clock, for use
//! inside effect bodies.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use sluice_core::{Scheduler, TimerId};

/// Collapse a burst of calls into one invocation of `f` after `ms` of
/// quiet on the scheduler clock.
pub fn debounce(
    scheduler: &Scheduler,
    ms: u64,
    f: impl Fn(Value) + 'static,
) -> impl Fn(Value) {
    let scheduler = scheduler.clone();
    let pending: Rc<RefCell<Option<TimerId>>> = Rc::new(RefCell::new(None));
    let f = Rc::new(f);
    move |payload: Value| {
        if let Some(timer) = pending.borrow_mut().take() {
            scheduler.cancel(timer);
        }
        let f = f.clone();
        let timer = scheduler.schedule(ms, move || f(payload));
        *pending.borrow_mut() = Some(timer);
    }
}

/// At most one invocation of `f` per `ms` window; calls inside the window
/// return the last computed result.
pub fn throttle(
    scheduler: &Scheduler,
    ms: u64,
    f: impl Fn(Value) -> Value + 'static,
) -> impl Fn(Value) -> Value {
    let scheduler = scheduler.clone();
    let last_run: Cell<Option<u64>> = Cell::new(None);
    let last_result: RefCell<Value> = RefCell::new(Value::Null);
    move |payload: Value| {
        let now = scheduler.now();
        let due = match last_run.get() {
            None => true,
            Some(at) => now.saturating_sub(at) > ms,
        };
        if due {
            last_run.set(Some(now));
            *last_result.borrow_mut() = f(payload);
        }
        last_result.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debounce_runs_once_after_the_quiet_period() {
        let sched = Scheduler::new();
        let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let burst = debounce(&sched, 5, move |v| sink.borrow_mut().push(v));

        burst(json!(1));
        burst(json!(2));
        burst(json!(3));

        sched.advance(4);
        assert!(seen.borrow().is_empty());
        sched.advance(1);
        assert_eq!(*seen.borrow(), vec![json!(3)]);
    }

    #[test]
    fn throttle_limits_to_one_call_per_window() {
        let sched = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let limited = throttle(&sched, 5, move |v| {
            c.set(c.get() + 1);
            v
        });

        assert_eq!(limited(json!("a")), json!("a"));
        assert_eq!(limited(json!("b")), json!("a"));
        assert_eq!(count.get(), 1);

        sched.advance(6);
        assert_eq!(limited(json!("c")), json!("c"));
        assert_eq!(count.get(), 2);
    }
}
