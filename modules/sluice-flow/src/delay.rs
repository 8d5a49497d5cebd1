use serde_json::Value;

use sluice_core::CancelToken;

use crate::flow::{Flow, FlowKind};

/// Flow that completes with its input after `ms` on the scheduler clock.
pub fn delay(ms: u64) -> Flow {
    delay_impl(ms, None)
}

/// Like [`delay`], but completes with `value` when invoked with a null
/// input (the usual case for a racer armed directly by `when`).
pub fn delay_value(ms: u64, value: Value) -> Flow {
    delay_impl(ms, Some(value))
}

fn delay_impl(ms: u64, preset: Option<Value>) -> Flow {
    Flow::new(FlowKind::Delay, move |prev, options| {
        let payload = if prev.is_null() {
            preset.clone().unwrap_or(Value::Null)
        } else {
            prev
        };

        // No parent link: a race that arms this delay cancels it through
        // the recorded child token instead.
        let token = CancelToken::new();
        let done = options.done();
        let fire_token = token.clone();
        let timer = options.ctx.scheduler.schedule(ms, move || {
            if fire_token.cancelled() {
                return;
            }
            fire_token.dispose();
            done(payload);
        });

        let scheduler = options.ctx.scheduler.clone();
        token.on_dispose(move || scheduler.cancel(timer));
        token
    })
}
