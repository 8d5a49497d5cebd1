use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use sluice_core::CancelToken;

use crate::flow::{Flow, FlowKind};
use crate::options::{DoneFn, FlowCtx, FlowOptions};

struct PipeRun {
    steps: Vec<Flow>,
    token: CancelToken,
    ctx: FlowCtx,
    on_done: DoneFn,
    cursor: Cell<usize>,
}

/// Sequential composition. Each step's completion advances the cursor;
/// past the last step the pipeline completes with the final value. A
/// single token spans the whole pipeline: cancelling it stops the advance
/// at the next completion, so a timer pending inside a cancelled pipeline
/// fires into the guard and goes no further.
///
/// Plain functions and action names enter a pipeline wrapped with
/// [`crate::call`].
pub fn pipe(steps: Vec<Flow>) -> Flow {
    Flow::new(FlowKind::Pipe, move |prev, options| {
        let token = CancelToken::child_of(options.cancel.as_ref());
        let run = Rc::new(PipeRun {
            steps: steps.clone(),
            token: token.clone(),
            ctx: options.ctx.clone(),
            on_done: options.done(),
            cursor: Cell::new(0),
        });
        advance(&run, prev);
        token
    })
}

fn advance(run: &Rc<PipeRun>, value: Value) {
    if run.token.cancelled() {
        return;
    }
    let index = run.cursor.get();
    if index >= run.steps.len() {
        (run.on_done)(value);
        return;
    }
    run.cursor.set(index + 1);

    let step = run.steps[index].clone();
    let next = Rc::clone(run);
    // Steps are deliberately not linked to the pipeline token; the
    // cancellation check at the top of `advance` is the only guard.
    step.invoke(
        value,
        FlowOptions {
            ctx: run.ctx.clone(),
            on_done: Some(Rc::new(move |v| advance(&next, v))),
            cancel: None,
        },
    );
}
