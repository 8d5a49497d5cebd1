//! A debounced, latest-wins search box over the store, driven on the
//! virtual clock. Run with `RUST_LOG=debug` to watch the engine work.

use serde_json::{json, Value};

use sluice_core::AsyncOp;
use sluice_flow::{debounce, latest, when, CallTarget, StepOutcome};
use sluice_store::{ActionReducers, AsyncNaming, Logic, LoadState, Loadable, Store};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Store::builder()
        .async_mode("*", AsyncNaming::Dynamic)
        .build()?;

    store.use_logic(
        Logic::new()
            .state(json!({ "query": "", "results": null }))
            .reducer(
                "type",
                ActionReducers::new().prop("query", |_, args| args.payload.clone()),
            )
            .prop_reducer("results", "search.*", |value, args| {
                match Loadable::from_value(&args.payload) {
                    Some(loadable) if loadable.state == LoadState::HasValue && !loadable.outdated => {
                        loadable.value_or(Value::Null)
                    }
                    _ => value,
                }
            }),
    )?;

    // Every keystroke restarts the quiet period; only the last query in a
    // burst actually searches.
    let search_store = store.clone();
    store.use_logic(Logic::new().flow(
        when(
            "type",
            latest(CallTarget::Flow(debounce(
                300,
                CallTarget::func(move |record| {
                    let query = record
                        .get("payload")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let op = AsyncOp::delayed(
                        &search_store.scheduler(),
                        100,
                        json!([format!("{query}-result")]),
                    );
                    search_store.dispatch_async("search", op);
                    StepOutcome::Value(Value::Null)
                }),
            ))),
        )?,
    ))?;

    for query in ["r", "ru", "rus", "rust"] {
        store.call("type", json!(query));
        store.scheduler().advance(50);
    }
    store.scheduler().run_until_idle();

    println!("query:   {}", store.get_prop("query"));
    println!("results: {}", store.get_prop("results"));
    Ok(())
}
