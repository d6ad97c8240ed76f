//! Behavior composition
//!
//! A component's behavior is an ordered [`Chain`] of [`Behavior`] layers.
//! The first layer added is the innermost. Every hook is dispatched to the
//! outermost layer, which receives the layers beneath it as a [`Next`] and
//! decides whether to call down before or after adding its own work.
//!
//! Because each layer builds on what the layers beneath return, the
//! outermost layer wins whenever two layers write the same default-state
//! key or the same update leaf.
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::{Behavior, Chain, HookResult, Next, RenderContext, Snapshot, UpdateDescriptor};
//!
//! struct Label;
//!
//! impl Behavior for Label {
//!     fn name(&self) -> &'static str {
//!         "label"
//!     }
//!
//!     fn default_state(&self, below: Next<'_>) -> Snapshot {
//!         below.default_state().with([("label", json!(""))])
//!     }
//!
//!     fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
//!         let own = UpdateDescriptor::new()
//!             .property("textContent", cx.state.get("label").cloned().unwrap_or_default());
//!         Ok(below.updates(cx)?.merge(own))
//!     }
//! }
//!
//! let chain = Chain::new().with(Label);
//! assert_eq!(chain.names().as_slice(), ["label"]);
//! ```

use std::fmt;

use serde_json::Value;
use smallvec::SmallVec;

use crate::component::Component;
use crate::descriptor::UpdateDescriptor;
use crate::error::HookResult;
use crate::state::{ChangeSet, Snapshot};

/// What a render pass exposes to `updates` and `after_update`
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Snapshot committed for this pass
    pub state: &'a Snapshot,
    /// Snapshot of the previous pass
    pub previous: &'a Snapshot,
    /// Keys whose value differs between the two
    pub changed: &'a ChangeSet,
}

impl fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("state", self.state)
            .field("changed", self.changed)
            .finish_non_exhaustive()
    }
}

/// One composable unit of component behavior.
///
/// Every method has a pass-through default, so a layer only implements the
/// hooks it cares about. A layer must not assume any particular layer sits
/// beneath it.
pub trait Behavior: 'static {
    /// Name used in logs and hook failures
    fn name(&self) -> &'static str;

    /// Contribute default state on top of the layers beneath
    fn default_state(&self, below: Next<'_>) -> Snapshot {
        below.default_state()
    }

    /// Derive additional state from a fold. Returned entries are folded in
    /// and effects run again until no layer returns anything.
    fn state_effects(
        &self,
        state: &Snapshot,
        changed: &ChangeSet,
        below: Next<'_>,
    ) -> Vec<(String, Value)> {
        below.state_effects(state, changed)
    }

    /// Decide whether a pass with `next` should render. The bottom of the
    /// chain always says yes.
    fn should_render(
        &self,
        next: &Snapshot,
        previous: &Snapshot,
        below: Next<'_>,
    ) -> HookResult<bool> {
        below.should_render(next, previous)
    }

    /// Contribute to the update descriptor of a pass
    fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
        below.updates(cx)
    }

    /// Runs once, synchronously, when the component is mounted
    fn after_mount(&self, host: &Component, below: Next<'_>) -> HookResult<()> {
        below.after_mount(host)
    }

    /// Runs after the update descriptor of a pass has been applied
    fn after_update(
        &self,
        host: &Component,
        cx: &RenderContext<'_>,
        below: Next<'_>,
    ) -> HookResult<()> {
        below.after_update(host, cx)
    }
}

/// The layers beneath the one currently dispatching
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Box<dyn Behavior>],
}

impl<'a> Next<'a> {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn split(self) -> Option<(&'a dyn Behavior, Next<'a>)> {
        self.layers
            .split_last()
            .map(|(top, rest)| (top.as_ref(), Next { layers: rest }))
    }

    pub fn default_state(self) -> Snapshot {
        match self.split() {
            Some((top, below)) => top.default_state(below),
            None => Snapshot::new(),
        }
    }

    pub fn state_effects(self, state: &Snapshot, changed: &ChangeSet) -> Vec<(String, Value)> {
        match self.split() {
            Some((top, below)) => top.state_effects(state, changed, below),
            None => Vec::new(),
        }
    }

    pub fn should_render(self, next: &Snapshot, previous: &Snapshot) -> HookResult<bool> {
        match self.split() {
            Some((top, below)) => top
                .should_render(next, previous, below)
                .map_err(|e| e.attribute(top.name())),
            None => Ok(true),
        }
    }

    pub fn updates(self, cx: &RenderContext<'_>) -> HookResult<UpdateDescriptor> {
        match self.split() {
            Some((top, below)) => top.updates(cx, below).map_err(|e| e.attribute(top.name())),
            None => Ok(UpdateDescriptor::new()),
        }
    }

    pub fn after_mount(self, host: &Component) -> HookResult<()> {
        match self.split() {
            Some((top, below)) => top
                .after_mount(host, below)
                .map_err(|e| e.attribute(top.name())),
            None => Ok(()),
        }
    }

    pub fn after_update(self, host: &Component, cx: &RenderContext<'_>) -> HookResult<()> {
        match self.split() {
            Some((top, below)) => top
                .after_update(host, cx, below)
                .map_err(|e| e.attribute(top.name())),
            None => Ok(()),
        }
    }
}

/// Ordered composition of behaviors, fixed once the component is built
#[derive(Default)]
pub struct Chain {
    layers: Vec<Box<dyn Behavior>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `behavior` on top of the layers already present
    pub fn with<B: Behavior>(mut self, behavior: B) -> Self {
        self.layers.push(Box::new(behavior));
        self
    }

    /// Add an already boxed behavior on top
    pub fn push(&mut self, behavior: Box<dyn Behavior>) {
        self.layers.push(behavior);
    }

    /// Layer names, innermost first
    pub fn names(&self) -> SmallVec<[&'static str; 8]> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Entry point for dispatching a hook through every layer
    pub fn top(&self) -> Next<'_> {
        Next {
            layers: &self.layers,
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
