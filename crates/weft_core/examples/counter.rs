//! Counter Demo
//!
//! Run with:
//! `RUST_LOG=weft_core=trace cargo run -p weft_core --example counter`

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use weft_core::{
    json, Behavior, Chain, Component, HookResult, Leaf, MemoryRegistry, Next, RenderContext,
    Runtime, Snapshot, UpdateDescriptor,
};

struct Counter;

impl Behavior for Counter {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn default_state(&self, below: Next<'_>) -> Snapshot {
        below.default_state().with([("count", json!(0))])
    }

    fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
        let count = cx.state.get_as::<i64>("count").unwrap_or(0);
        Ok(below.updates(cx)?.target(
            "value",
            UpdateDescriptor::new()
                .property("textContent", count.to_string())
                .class("negative", count < 0),
        ))
    }

    fn after_update(
        &self,
        host: &Component,
        cx: &RenderContext<'_>,
        below: Next<'_>,
    ) -> HookResult<()> {
        below.after_update(host, cx)?;
        tracing::info!(
            "count {} -> {}",
            cx.previous.get("count").cloned().unwrap_or_default(),
            cx.state.get("count").cloned().unwrap_or_default()
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut runtime = Runtime::new();
    let counter = runtime.create(Chain::new().with(Counter));
    counter.mount(MemoryRegistry::new().with_target("value"))?;
    runtime.run_until_idle();

    for step in [1, 1, -5] {
        let count = counter.get_field::<i64>("count").unwrap_or(0);
        counter.set_field("count", count + step)?;
        runtime.run_until_idle();
    }

    let text = counter.with_registry(|registry: &MemoryRegistry| {
        registry
            .get("value")
            .and_then(|target| target.get(&Leaf::property("textContent")).cloned())
    });
    println!("rendered: {:?}", text.flatten());
    Ok(())
}
