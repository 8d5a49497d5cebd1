//! Cooperative scheduler: a virtual millisecond clock over an ordered
//! timer queue.
//!
//! Combinators arm timers here instead of on ambient wall-clock timers,
//! which keeps every timed behavior deterministic: tests advance the clock
//! explicitly, and real-time callers pump the queue through a driver.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::trace;

type TimerFn = Box<dyn FnOnce()>;

/// Handle for one armed timer. `cancel` disarms it; cancelling a timer
/// that already fired is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId {
    deadline: u64,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    now: u64,
    next_seq: u64,
    timers: BTreeMap<(u64, u64), TimerFn>,
}

/// Shared handle to the timer queue. Cloning is cheap; all clones view the
/// same clock.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Arm `f` to fire `delay_ms` from now. Timers with equal deadlines
    /// fire in arming order.
    pub fn schedule(&self, delay_ms: u64, f: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.now + delay_ms;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.timers.insert((deadline, seq), Box::new(f));
        trace!(deadline, seq, "timer armed");
        TimerId { deadline, seq }
    }

    pub fn cancel(&self, id: TimerId) {
        if self
            .inner
            .borrow_mut()
            .timers
            .remove(&(id.deadline, id.seq))
            .is_some()
        {
            trace!(deadline = id.deadline, seq = id.seq, "timer disarmed");
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.inner
            .borrow()
            .timers
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Advance the clock by `ms`, firing due timers in deadline order.
    pub fn advance(&self, ms: u64) {
        let target = self.now() + ms;
        self.advance_to(target);
    }

    /// Advance the clock to `target`, firing due timers in deadline order.
    ///
    /// The clock is set to each timer's deadline before its callback runs,
    /// so a callback that re-arms schedules relative to its own fire time.
    /// Callbacks run with the queue borrow released and may schedule or
    /// cancel freely; a timer armed during the sweep fires in the same
    /// sweep when its deadline is within `target`.
    pub fn advance_to(&self, target: u64) {
        loop {
            let due = {
                let mut inner = self.inner.borrow_mut();
                match inner.timers.keys().next().copied() {
                    Some((deadline, seq)) if deadline <= target => {
                        inner.now = deadline;
                        inner.timers.remove(&(deadline, seq))
                    }
                    _ => None,
                }
            };
            match due {
                Some(f) => f(),
                None => break,
            }
        }
        let mut inner = self.inner.borrow_mut();
        if target > inner.now {
            inner.now = target;
        }
    }

    /// Drain every pending timer, advancing the clock as far as needed.
    pub fn run_until_idle(&self) {
        while let Some(deadline) = self.next_deadline() {
            self.advance_to(deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn timers_fire_in_deadline_order() {
        let sched = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (ms, tag) in [(5u64, "b"), (1, "a"), (9, "c")] {
            let o = order.clone();
            sched.schedule(ms, move || o.borrow_mut().push(tag));
        }

        sched.advance(10);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_deadlines_fire_in_arming_order() {
        let sched = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let o = order.clone();
            sched.schedule(5, move || o.borrow_mut().push(tag));
        }

        sched.advance(5);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn advancing_short_of_the_deadline_fires_nothing() {
        let sched = Scheduler::new();
        let o = Rc::new(RefCell::new(Vec::new()));
        let o2 = o.clone();
        sched.schedule(5, move || o2.borrow_mut().push(()));

        sched.advance(4);
        assert!(o.borrow().is_empty());
        assert_eq!(sched.now(), 4);

        sched.advance(1);
        assert_eq!(o.borrow().len(), 1);
    }

    #[test]
    fn cancel_disarms_a_pending_timer() {
        let sched = Scheduler::new();
        let o = Rc::new(RefCell::new(Vec::new()));
        let o2 = o.clone();
        let id = sched.schedule(5, move || o2.borrow_mut().push(()));

        sched.cancel(id);
        sched.advance(10);
        assert!(o.borrow().is_empty());
    }

    #[test]
    fn cancel_after_fire_is_a_no_op() {
        let sched = Scheduler::new();
        let id = sched.schedule(1, || {});
        sched.advance(1);
        sched.cancel(id);
    }

    #[test]
    fn rearming_is_relative_to_the_callback_deadline() {
        let sched = Scheduler::new();
        let fired_at = Rc::new(RefCell::new(Vec::new()));

        let f = fired_at.clone();
        let s = sched.clone();
        sched.schedule(3, move || {
            f.borrow_mut().push(s.now());
            let f2 = f.clone();
            let s2 = s.clone();
            s.schedule(4, move || f2.borrow_mut().push(s2.now()));
        });

        sched.advance(10);
        assert_eq!(*fired_at.borrow(), vec![3, 7]);
    }

    #[test]
    fn run_until_idle_drains_chained_timers() {
        let sched = Scheduler::new();
        let count = Rc::new(RefCell::new(0));

        let c = count.clone();
        let s = sched.clone();
        sched.schedule(2, move || {
            *c.borrow_mut() += 1;
            let c2 = c.clone();
            s.schedule(2, move || *c2.borrow_mut() += 1);
        });

        sched.run_until_idle();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(sched.now(), 4);
        assert_eq!(sched.pending(), 0);
    }
}
