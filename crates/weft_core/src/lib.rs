//! Weft Core Runtime
//!
//! This crate provides the state-to-render pipeline shared by every Weft
//! component:
//!
//! - **State Snapshots**: immutable per-component state, replaced on every pass
//! - **Render Scheduling**: batched, re-entrancy-safe passes with ordered
//!   lifecycle hooks
//! - **Update Descriptors**: declarative, mergeable writes applied to named
//!   render targets with compare-before-write
//! - **Behavior Chains**: ordered composition of independent behaviors
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::descriptor::Leaf;
//! use weft_core::{Behavior, Chain, HookResult, MemoryRegistry, Next, RenderContext, Runtime,
//!     Snapshot, UpdateDescriptor};
//!
//! struct Counter;
//!
//! impl Behavior for Counter {
//!     fn name(&self) -> &'static str {
//!         "counter"
//!     }
//!
//!     fn default_state(&self, below: Next<'_>) -> Snapshot {
//!         below.default_state().with([("count", json!(0))])
//!     }
//!
//!     fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
//!         let count = cx.state.get("count").cloned().unwrap_or_default();
//!         Ok(below.updates(cx)?.property("textContent", count))
//!     }
//! }
//!
//! let mut runtime = Runtime::new();
//! let counter = runtime.create(Chain::new().with(Counter));
//! counter.mount(MemoryRegistry::new()).unwrap();
//!
//! // Both changes land in a single pass
//! counter.set_state([("count", json!(1))]);
//! counter.set_state([("count", json!(2))]);
//! runtime.run_until_idle();
//!
//! let text = counter.with_registry(|r: &MemoryRegistry| {
//!     r.host_target().get(&Leaf::property("textContent")).cloned()
//! });
//! assert_eq!(text, Some(Some(json!(2))));
//! ```

mod accessors;
pub mod behavior;
pub mod component;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod role;
pub mod runtime;
pub mod state;
pub mod target;

pub use behavior::{Behavior, Chain, Next, RenderContext};
pub use component::{Component, PassOutcome};
pub use config::RuntimeConfig;
pub use descriptor::{merge, merge_all, Leaf, UpdateDescriptor};
pub use error::{ConfigError, Hook, HookError, HookResult, RuntimeError};
pub use lifecycle::{Lifecycle, LifecycleEvent};
pub use role::RoleRegistry;
pub use runtime::{ComponentId, Runtime};
pub use state::{ChangeSet, PendingChanges, Snapshot};
pub use target::{
    apply, ApplyReport, Assignment, MemoryRegistry, MemoryTarget, Target, TargetRegistry,
};

/// Re-exported so behaviors can build values without a direct dependency
pub use serde_json::{json, Value};
