//! Component instances and the render scheduler
//!
//! A [`Component`] owns one state snapshot, one lifecycle record, and, once
//! mounted, one target registry. State changes flow through a single path:
//!
//! 1. `set_state` merges into the pending-change set and queues one render
//!    task (unless one is already queued or a pass is running).
//! 2. The pass takes the pending set, folds it over the current snapshot,
//!    and runs state effects on the result.
//! 3. `should_render` decides whether to render. The folded snapshot is
//!    committed either way.
//! 4. `updates` derives an [`UpdateDescriptor`], which is applied to the
//!    registry, then `after_update` runs with the previous snapshot.
//! 5. Changes made while the pass ran mark the record dirty and queue one
//!    trailing pass once this one has finished.
//!
//! "Previous" is always the last snapshot that was actually rendered, so
//! changes committed by a skipped or failed pass still show up in the
//! change set of the next pass that renders.
//!
//! Hooks and targets are always called with no internal borrow held, so
//! they may call back into the component.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::behavior::{Chain, RenderContext};
use crate::config::RuntimeConfig;
use crate::descriptor::UpdateDescriptor;
use crate::error::{Hook, HookResult, RuntimeError};
use crate::lifecycle::{Lifecycle, LifecycleEvent, LifecycleRecord};
use crate::runtime::{ComponentId, SharedSink, Task, TaskQueue};
use crate::state::{ChangeSet, PendingChanges, Snapshot};
use crate::target::{apply, ApplyReport, TargetRegistry};

/// What a render pass did
#[derive(Clone, Debug, PartialEq)]
pub enum PassOutcome {
    /// The update descriptor was applied
    Rendered(ApplyReport),
    /// `should_render` declined; the new snapshot was still committed
    Skipped,
    /// Nothing was pending
    Clean,
    /// A pass is already running; the change will be picked up by a
    /// trailing pass
    Deferred,
    /// The component is not mounted or already unmounted
    Inactive,
}

/// Registry stored by a mounted component, kept downcastable for inspection
trait OwnedRegistry: TargetRegistry {
    fn as_any(&self) -> &dyn Any;
    fn as_registry(&mut self) -> &mut dyn TargetRegistry;
}

impl<R: TargetRegistry + 'static> OwnedRegistry for R {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_registry(&mut self) -> &mut dyn TargetRegistry {
        self
    }
}

struct Instance {
    lifecycle: LifecycleRecord,
    snapshot: Snapshot,
    /// Last snapshot whose updates reached the registry
    rendered: Snapshot,
    pending: Option<PendingChanges>,
    /// Set at mount when the first pass should render every key. Cleared
    /// once a pass has rendered.
    initial_pass: bool,
    render_queued: bool,
    trailing_passes: u32,
    passes: u64,
    registry: Option<Box<dyn OwnedRegistry>>,
}

pub(crate) struct ComponentCell {
    id: ComponentId,
    chain: Chain,
    config: Rc<RuntimeConfig>,
    queue: Rc<TaskQueue>,
    sink: SharedSink,
    instance: RefCell<Instance>,
}

/// Handle to a component instance. Clones share the same instance.
#[derive(Clone)]
pub struct Component {
    cell: Rc<ComponentCell>,
}

impl Component {
    pub(crate) fn new(
        id: ComponentId,
        chain: Chain,
        queue: Rc<TaskQueue>,
        sink: SharedSink,
        config: Rc<RuntimeConfig>,
    ) -> Self {
        let defaults = chain.top().default_state();
        let changed = ChangeSet::all(&defaults);
        let (snapshot, _) = run_effects(&chain, &config, defaults, changed);

        let instance = Instance {
            lifecycle: LifecycleRecord::new(),
            rendered: snapshot.clone(),
            snapshot,
            pending: None,
            initial_pass: false,
            render_queued: false,
            trailing_passes: 0,
            passes: 0,
            registry: None,
        };

        Self {
            cell: Rc::new(ComponentCell {
                id,
                chain,
                config,
                queue,
                sink,
                instance: RefCell::new(instance),
            }),
        }
    }

    pub(crate) fn from_cell(cell: Rc<ComponentCell>) -> Self {
        Self { cell }
    }

    pub(crate) fn downgrade(&self) -> Weak<ComponentCell> {
        Rc::downgrade(&self.cell)
    }

    pub fn id(&self) -> ComponentId {
        self.cell.id
    }

    pub fn chain(&self) -> &Chain {
        &self.cell.chain
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.instance().lifecycle.current()
    }

    /// Lifecycle transitions so far, oldest first
    pub fn lifecycle_history(&self) -> Vec<(Lifecycle, LifecycleEvent, Lifecycle)> {
        self.instance().lifecycle.history().to_vec()
    }

    /// Number of passes started, including skipped ones
    pub fn passes(&self) -> u64 {
        self.instance().passes
    }

    /// The most recently committed snapshot
    pub fn current_snapshot(&self) -> Snapshot {
        self.instance().snapshot.clone()
    }

    /// Changes waiting for the next pass
    pub fn pending(&self) -> Option<PendingChanges> {
        self.instance().pending.clone()
    }

    pub fn get_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.instance().snapshot.get_as(key)
    }

    /// Latest value of `key`: the pending value if one was set this turn,
    /// otherwise the committed one. State effects have not run on pending
    /// values yet.
    pub fn peek_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inst = self.instance();
        match inst.pending.as_ref().and_then(|pending| pending.get(key)) {
            Some(value) => serde_json::from_value(value.clone()).ok(),
            None => inst.snapshot.get_as(key),
        }
    }

    /// Merge `partial` into the pending-change set and request a pass.
    ///
    /// Calls made in the same turn are coalesced into one pass. After
    /// unmount this is a no-op.
    pub fn set_state<I, K>(&self, partial: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut partial = partial.into_iter().peekable();
        if partial.peek().is_none() {
            return;
        }

        let mut inst = self.cell.instance.borrow_mut();
        let state = inst.lifecycle.current();
        if state == Lifecycle::Unmounted {
            trace!("component {:?}: ignoring set_state after unmount", self.cell.id);
            return;
        }

        inst.pending
            .get_or_insert_with(PendingChanges::new)
            .merge(partial);

        match state {
            Lifecycle::Rendering => {
                if !inst.lifecycle.is_dirty() {
                    debug!("component {:?}: state changed during render", self.cell.id);
                }
                inst.lifecycle.mark_dirty();
            }
            Lifecycle::Mounted | Lifecycle::Idle => self.request_pass(&mut inst),
            Lifecycle::Constructed | Lifecycle::Unmounted => {}
        }
    }

    /// Serialize `value` and set it under `key`
    pub fn set_field<T: Serialize>(&self, key: &str, value: T) -> Result<(), RuntimeError> {
        let value = serde_json::to_value(value)?;
        self.set_state([(key, value)]);
        Ok(())
    }

    /// Attach to a target registry.
    ///
    /// Fires `after_mount` synchronously before any pass is considered, then
    /// queues the first pass. Mounting twice is an error and leaves the
    /// instance untouched.
    pub fn mount<R: TargetRegistry + 'static>(&self, registry: R) -> Result<(), RuntimeError> {
        {
            let mut inst = self.cell.instance.borrow_mut();
            inst.lifecycle.send(LifecycleEvent::Attach)?;
            inst.registry = Some(Box::new(registry));
            inst.initial_pass = self.cell.config.initial_render;
        }
        debug!("component {:?} mounted", self.cell.id);

        let mounted = self
            .cell
            .chain
            .top()
            .after_mount(self)
            .map_err(|e| RuntimeError::hook(Hook::AfterMount, e));

        let mut inst = self.cell.instance.borrow_mut();
        if inst.lifecycle.is_in(Lifecycle::Mounted) && (inst.initial_pass || inst.pending.is_some())
        {
            self.request_pass(&mut inst);
        }
        mounted
    }

    /// Detach from the registry. Terminal: later `set_state` calls are ignored.
    pub fn unmount(&self) -> Result<(), RuntimeError> {
        let mut inst = self.cell.instance.borrow_mut();
        inst.lifecycle.send(LifecycleEvent::Detach)?;
        inst.registry = None;
        inst.pending = None;
        inst.initial_pass = false;
        debug!("component {:?} unmounted", self.cell.id);
        Ok(())
    }

    /// Inspect the mounted registry as its concrete type.
    /// Returns `None` while the registry is being written by a pass.
    pub fn with_registry<R, T>(&self, f: impl FnOnce(&R) -> T) -> Option<T>
    where
        R: TargetRegistry + 'static,
    {
        let inst = self.instance();
        let registry = inst.registry.as_ref()?.as_any().downcast_ref::<R>()?;
        Some(f(registry))
    }

    /// Queue `f` on the runtime's task queue, after anything already queued.
    /// Its failure goes to the runtime's failure sink.
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce(&Component) -> HookResult<()> + 'static,
    {
        self.cell
            .queue
            .push(Task::Deferred(self.cell.id, Box::new(f)));
    }

    /// Run the pending pass now instead of waiting for the queue
    pub fn flush(&self) -> Result<PassOutcome, RuntimeError> {
        self.render_pass()
    }

    pub(crate) fn run_scheduled(&self) -> Result<PassOutcome, RuntimeError> {
        self.render_pass()
    }

    fn instance(&self) -> Ref<'_, Instance> {
        self.cell.instance.borrow()
    }

    fn request_pass(&self, inst: &mut Instance) {
        if inst.render_queued {
            return;
        }
        inst.render_queued = true;
        self.cell.queue.push(Task::Render(self.cell.id));
        trace!("component {:?}: pass queued", self.cell.id);
    }

    fn render_pass(&self) -> Result<PassOutcome, RuntimeError> {
        let (previous, next, folded, initial) = {
            let mut inst = self.cell.instance.borrow_mut();
            inst.render_queued = false;

            let state = inst.lifecycle.current();
            if state == Lifecycle::Rendering {
                inst.lifecycle.mark_dirty();
                return Ok(PassOutcome::Deferred);
            }
            if !state.can_render() {
                return Ok(PassOutcome::Inactive);
            }

            let initial = inst.initial_pass;
            let pending = inst.pending.take();
            if pending.is_none() && !initial {
                return Ok(PassOutcome::Clean);
            }

            inst.lifecycle.send(LifecycleEvent::BeginRender)?;
            inst.passes += 1;

            let (next, folded) = inst.snapshot.fold(pending.unwrap_or_default());
            (inst.rendered.clone(), next, folded, initial)
        };

        let folded = if initial { ChangeSet::all(&next) } else { folded };
        let (next, _) = run_effects(&self.cell.chain, &self.cell.config, next, folded);
        let changed = if initial {
            ChangeSet::all(&next)
        } else {
            next.changes_since(&previous)
        };
        trace!(
            "component {:?}: pass {} with {} changed keys",
            self.cell.id,
            self.passes(),
            changed.len()
        );

        let result = match self.cell.chain.top().should_render(&next, &previous) {
            Ok(true) => {
                self.commit(next.clone());
                let cx = RenderContext {
                    state: &next,
                    previous: &previous,
                    changed: &changed,
                };
                self.render_committed(&cx).map(PassOutcome::Rendered)
            }
            Ok(false) => {
                debug!("component {:?}: pass skipped by should_render", self.cell.id);
                self.commit(next);
                Ok(PassOutcome::Skipped)
            }
            Err(e) => {
                self.commit(next);
                Err(RuntimeError::hook(Hook::ShouldRender, e))
            }
        };

        let finished = self.finish_pass();
        let outcome = result?;
        finished?;
        Ok(outcome)
    }

    fn commit(&self, next: Snapshot) {
        self.cell.instance.borrow_mut().snapshot = next;
    }

    fn render_committed(&self, cx: &RenderContext<'_>) -> Result<ApplyReport, RuntimeError> {
        let chain = &self.cell.chain;
        let update: UpdateDescriptor = chain
            .top()
            .updates(cx)
            .map_err(|e| RuntimeError::hook(Hook::Updates, e))?;

        // Unmount is rejected while rendering, so the registry always returns
        let registry = self.cell.instance.borrow_mut().registry.take();
        let report = match registry {
            Some(mut registry) => {
                let report = apply(registry.as_registry(), &update);
                self.cell.instance.borrow_mut().registry = Some(registry);
                report
            }
            None => ApplyReport::default(),
        };
        trace!(
            "component {:?}: applied {} writes",
            self.cell.id,
            report.writes
        );

        {
            let mut inst = self.cell.instance.borrow_mut();
            inst.rendered = cx.state.clone();
            inst.initial_pass = false;
        }
        for name in &report.unresolved {
            let err = RuntimeError::UnresolvedTarget { name: name.clone() };
            self.cell.sink.report(self.cell.id, &err);
        }

        chain
            .top()
            .after_update(self, cx)
            .map_err(|e| RuntimeError::hook(Hook::AfterUpdate, e))?;
        Ok(report)
    }

    /// Return to idle and queue the trailing pass if state changed meanwhile
    fn finish_pass(&self) -> Result<(), RuntimeError> {
        let mut inst = self.cell.instance.borrow_mut();
        if inst.lifecycle.is_in(Lifecycle::Rendering) {
            inst.lifecycle.send(LifecycleEvent::FinishRender)?;
        }

        let dirty = inst.lifecycle.take_dirty();
        if !(dirty && inst.pending.is_some()) {
            inst.trailing_passes = 0;
            return Ok(());
        }

        inst.trailing_passes += 1;
        if inst.trailing_passes > self.cell.config.max_trailing_passes {
            let passes = std::mem::take(&mut inst.trailing_passes);
            warn!(
                "component {:?}: not scheduling pass after {} re-entrant passes",
                self.cell.id, passes
            );
            return Err(RuntimeError::RenderLoop { passes });
        }

        debug!("component {:?}: scheduling trailing pass", self.cell.id);
        self.request_pass(&mut inst);
        Ok(())
    }
}

/// Apply state effects until they settle or the round limit is hit
fn run_effects(
    chain: &Chain,
    config: &RuntimeConfig,
    mut state: Snapshot,
    changed: ChangeSet,
) -> (Snapshot, ChangeSet) {
    let mut all_changed = changed.clone();
    let mut round_changed = changed;

    for _ in 0..config.max_effect_rounds {
        let effects = chain.top().state_effects(&state, &round_changed);
        if effects.is_empty() {
            return (state, all_changed);
        }

        let mut pending = PendingChanges::new();
        pending.merge(effects);
        let (next, changed) = state.fold(pending);
        if changed.is_empty() {
            return (state, all_changed);
        }

        state = next;
        all_changed.extend(changed.clone());
        round_changed = changed;
    }

    warn!(
        "state effects still changing after {} rounds",
        config.max_effect_rounds
    );
    (state, all_changed)
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inst = self.instance();
        f.debug_struct("Component")
            .field("id", &self.cell.id)
            .field("chain", &self.cell.chain)
            .field("lifecycle", &inst.lifecycle.current())
            .field("snapshot", &inst.snapshot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Behavior, Next};
    use crate::error::HookError;
    use crate::runtime::Runtime;
    use crate::target::MemoryRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Log(Rc<RefCell<Vec<String>>>);

    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Behavior for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn default_state(&self, below: Next<'_>) -> Snapshot {
            below.default_state().with([("count", json!(0))])
        }

        fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
            self.log
                .borrow_mut()
                .push(format!("updates {}", cx.state.to_json()));
            Ok(below
                .updates(cx)?
                .property("count", cx.state.get("count").cloned().unwrap_or_default()))
        }

        fn after_mount(&self, host: &Component, below: Next<'_>) -> HookResult<()> {
            below.after_mount(host)?;
            self.log.borrow_mut().push("after_mount".into());
            Ok(())
        }

        fn after_update(
            &self,
            host: &Component,
            cx: &RenderContext<'_>,
            below: Next<'_>,
        ) -> HookResult<()> {
            below.after_update(host, cx)?;
            self.log
                .borrow_mut()
                .push(format!("after_update {}", cx.previous.to_json()));
            Ok(())
        }
    }

    fn setup() -> (Runtime, Component, Log) {
        let mut runtime = Runtime::new();
        let log = Log::default();
        let component = runtime.create(Chain::new().with(Recorder {
            log: Rc::clone(&log.0),
        }));
        (runtime, component, log)
    }

    #[test]
    fn test_default_state_is_current_before_mount() {
        let (_runtime, component, _log) = setup();
        assert_eq!(component.lifecycle(), Lifecycle::Constructed);
        assert_eq!(component.current_snapshot().to_json(), json!({ "count": 0 }));
    }

    #[test]
    fn test_after_mount_fires_before_first_pass() {
        let (mut runtime, component, log) = setup();
        component.mount(MemoryRegistry::new()).unwrap();
        assert_eq!(*log.0.borrow(), ["after_mount"]);

        runtime.run_until_idle();
        assert_eq!(
            *log.0.borrow(),
            [
                "after_mount",
                r#"updates {"count":0}"#,
                r#"after_update {"count":0}"#
            ]
        );
        let written = component.with_registry(|r: &MemoryRegistry| {
            r.host_target()
                .get(&crate::descriptor::Leaf::property("count"))
                .cloned()
        });
        assert_eq!(written, Some(Some(json!(0))));
    }

    #[test]
    fn test_set_state_before_mount_waits() {
        let (mut runtime, component, log) = setup();
        component.set_state([("count", json!(5))]);
        assert_eq!(runtime.run_until_idle(), 0);
        assert!(log.0.borrow().is_empty());

        component.mount(MemoryRegistry::new()).unwrap();
        runtime.run_until_idle();
        assert_eq!(component.get_field::<i64>("count"), Some(5));
        assert_eq!(component.passes(), 1);
    }

    #[test]
    fn test_double_mount_keeps_snapshot() {
        let (mut runtime, component, _log) = setup();
        component.mount(MemoryRegistry::new()).unwrap();
        runtime.run_until_idle();

        let err = component.mount(MemoryRegistry::new()).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidStateTransition { .. }));
        assert_eq!(component.current_snapshot().to_json(), json!({ "count": 0 }));
        assert_eq!(component.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    fn test_set_state_after_unmount_is_noop() {
        let (mut runtime, component, _log) = setup();
        component.mount(MemoryRegistry::new()).unwrap();
        runtime.run_until_idle();
        component.unmount().unwrap();

        component.set_state([("count", json!(9))]);
        assert!(component.pending().is_none());
        assert_eq!(runtime.run_until_idle(), 0);
        assert_eq!(component.get_field::<i64>("count"), Some(0));
        assert!(component.unmount().is_err());
    }

    #[test]
    fn test_flush_runs_synchronously() {
        let (_runtime, component, log) = setup();
        component.mount(MemoryRegistry::new()).unwrap();
        component.set_state([("count", json!(2))]);

        let outcome = component.flush().unwrap();
        assert!(matches!(outcome, PassOutcome::Rendered(ref r) if r.writes == 1));
        assert_eq!(log.0.borrow().len(), 3);
        assert_eq!(component.flush().unwrap(), PassOutcome::Clean);
    }

    #[test]
    fn test_empty_partial_does_not_schedule() {
        let (mut runtime, component, _log) = setup();
        component.mount(MemoryRegistry::new()).unwrap();
        runtime.run_until_idle();

        component.set_state(Vec::<(String, Value)>::new());
        assert!(!runtime.has_pending_tasks());
    }

    struct BrokenUpdates;

    impl Behavior for BrokenUpdates {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn updates(&self, cx: &RenderContext<'_>, _: Next<'_>) -> HookResult<UpdateDescriptor> {
            if cx.state.get("fail") == Some(&json!(true)) {
                return Err(HookError::new("cannot render"));
            }
            Ok(UpdateDescriptor::new())
        }
    }

    #[test]
    fn test_hook_failure_returns_to_idle_and_keeps_state() {
        let mut runtime = Runtime::new();
        let component = runtime.create(Chain::new().with(BrokenUpdates));
        component.mount(MemoryRegistry::new()).unwrap();
        runtime.run_until_idle();

        component.set_state([("fail", json!(true))]);
        let err = component.flush().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::HookFailure {
                hook: Hook::Updates,
                ..
            }
        ));
        assert_eq!(component.lifecycle(), Lifecycle::Idle);
        assert_eq!(component.get_field::<bool>("fail"), Some(true));

        component.set_state([("fail", json!(false))]);
        assert!(matches!(component.flush(), Ok(PassOutcome::Rendered(_))));
    }

    /// Host target that looks at its component whenever it is written
    struct Inspecting {
        host: Rc<RefCell<Option<Component>>>,
        seen: Vec<(Value, bool)>,
    }

    impl crate::target::Target for Inspecting {
        fn read(&self, _: &crate::descriptor::Leaf) -> Option<Value> {
            None
        }

        fn accept(&mut self, _: &[crate::target::Assignment]) {
            if let Some(host) = self.host.borrow().as_ref() {
                let count = host.current_snapshot().get("count").cloned();
                let inspectable = host.with_registry(|_: &InspectingRegistry| ()).is_some();
                self.seen.push((count.unwrap_or_default(), inspectable));
            }
        }
    }

    struct InspectingRegistry(Inspecting);

    impl TargetRegistry for InspectingRegistry {
        fn host(&mut self) -> &mut dyn crate::target::Target {
            &mut self.0
        }

        fn resolve(&mut self, _: &str) -> Option<&mut dyn crate::target::Target> {
            None
        }
    }

    #[test]
    fn test_target_may_read_component_during_apply() {
        let (mut runtime, component, _log) = setup();
        let slot = Rc::new(RefCell::new(Some(component.clone())));
        component
            .mount(InspectingRegistry(Inspecting {
                host: Rc::clone(&slot),
                seen: Vec::new(),
            }))
            .unwrap();
        component.set_state([("count", json!(4))]);
        runtime.run_until_idle();

        let seen = component.with_registry(|r: &InspectingRegistry| r.0.seen.clone());
        assert_eq!(seen, Some(vec![(json!(4), false)]));
        slot.borrow_mut().take();
    }
}
