//! Runtime and microtask queue
//!
//! All components created by one [`Runtime`] share a single-threaded task
//! queue. `set_state` only records changes and queues one render task per
//! component; [`Runtime::run_until_idle`] is the end of the synchronous turn
//! and drains the queue, so every burst of `set_state` calls in one turn is
//! observed by exactly one pass.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, error};

use crate::behavior::Chain;
use crate::component::{Component, ComponentCell};
use crate::config::RuntimeConfig;
use crate::error::{Hook, HookResult, RuntimeError};

new_key_type! {
    /// Unique identifier for a component instance
    pub struct ComponentId;
}

/// Continuation queued by [`Component::defer`]
pub(crate) type DeferredFn = Box<dyn FnOnce(&Component) -> HookResult<()>>;

pub(crate) enum Task {
    Render(ComponentId),
    Deferred(ComponentId, DeferredFn),
}

/// FIFO of pending tasks, shared between the runtime and its components
#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub(crate) fn push(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn pop(&self) -> Option<Task> {
        self.tasks.borrow_mut().pop_front()
    }

    fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}

/// Receives failures of queued tasks and unresolved render targets
pub type FailureSink = Rc<dyn Fn(ComponentId, &RuntimeError)>;

/// Failure sink shared by a runtime and its components. Replacing it on the
/// runtime takes effect for every component.
#[derive(Clone)]
pub(crate) struct SharedSink(Rc<RefCell<FailureSink>>);

impl SharedSink {
    fn new(sink: FailureSink) -> Self {
        Self(Rc::new(RefCell::new(sink)))
    }

    fn replace(&self, sink: FailureSink) {
        *self.0.borrow_mut() = sink;
    }

    /// Hand `err` to the current sink. The sink may itself replace the sink.
    pub(crate) fn report(&self, id: ComponentId, err: &RuntimeError) {
        let sink = Rc::clone(&self.0.borrow());
        sink(id, err);
    }
}

/// Owner of the task queue and registry of live components
pub struct Runtime {
    config: Rc<RuntimeConfig>,
    queue: Rc<TaskQueue>,
    components: SlotMap<ComponentId, Weak<ComponentCell>>,
    failure_sink: SharedSink,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config: Rc::new(config),
            queue: Rc::new(TaskQueue::default()),
            components: SlotMap::with_key(),
            failure_sink: SharedSink::new(Rc::new(|id, err| {
                error!("component {:?}: {}", id, err);
            })),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Replace the sink receiving failures of queued passes and deferred
    /// tasks, plus every target name a rendered pass could not resolve
    pub fn on_failure<F>(&mut self, sink: F)
    where
        F: Fn(ComponentId, &RuntimeError) + 'static,
    {
        self.failure_sink.replace(Rc::new(sink));
    }

    /// Build a component from `chain`. Default state is computed here, once.
    pub fn create(&mut self, chain: Chain) -> Component {
        let id = self.components.insert(Weak::new());
        let component = Component::new(
            id,
            chain,
            Rc::clone(&self.queue),
            self.failure_sink.clone(),
            Rc::clone(&self.config),
        );
        self.components[id] = component.downgrade();
        debug!("created component {:?}", id);
        component
    }

    /// Look up a live component
    pub fn get(&self, id: ComponentId) -> Option<Component> {
        self.components
            .get(id)
            .and_then(Weak::upgrade)
            .map(Component::from_cell)
    }

    /// Number of live components
    pub fn len(&self) -> usize {
        self.components
            .values()
            .filter(|cell| cell.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget components that have been dropped
    pub fn prune(&mut self) {
        self.components.retain(|_, cell| cell.strong_count() > 0);
    }

    /// Number of queued tasks
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.pending_tasks() > 0
    }

    /// Drain the task queue, including tasks queued while draining.
    /// Returns the number of tasks run.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.queue.pop() {
            ran += 1;
            match task {
                Task::Render(id) => {
                    let Some(component) = self.get(id) else {
                        continue;
                    };
                    if let Err(err) = component.run_scheduled() {
                        self.failure_sink.report(id, &err);
                    }
                }
                Task::Deferred(id, run) => {
                    let Some(component) = self.get(id) else {
                        continue;
                    };
                    if let Err(err) = run(&component) {
                        self.failure_sink
                            .report(id, &RuntimeError::hook(Hook::Deferred, err));
                    }
                }
            }
        }
        ran
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("components", &self.len())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::target::MemoryRegistry;
    use serde_json::json;
    use std::cell::RefCell;

    #[test]
    fn test_create_and_drop() {
        let mut runtime = Runtime::new();
        let a = runtime.create(Chain::new());
        let b = runtime.create(Chain::new());
        assert_eq!(runtime.len(), 2);
        assert!(runtime.get(a.id()).is_some());

        drop(b);
        assert_eq!(runtime.len(), 1);
        runtime.prune();
        assert_eq!(runtime.len(), 1);
    }

    #[test]
    fn test_tasks_for_dropped_components_are_skipped() {
        let mut runtime = Runtime::new();
        let component = runtime.create(Chain::new());
        component.mount(MemoryRegistry::new()).unwrap();
        component.set_state([("a", json!(1))]);
        assert_eq!(runtime.pending_tasks(), 1);

        drop(component);
        assert_eq!(runtime.run_until_idle(), 1);
        assert!(!runtime.has_pending_tasks());
    }

    #[test]
    fn test_deferred_failure_reaches_sink() {
        let mut runtime = Runtime::new();
        let failures = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&failures);
        runtime.on_failure(move |id, err| sink.borrow_mut().push((id, err.to_string())));

        let component = runtime.create(Chain::new());
        component.defer(|_| Err(HookError::new("late")));
        runtime.run_until_idle();

        let failures = failures.borrow();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, component.id());
        assert_eq!(failures[0].1, "deferred hook failed: late");
    }

    #[test]
    fn test_sink_replaced_after_create_reaches_component() {
        use crate::descriptor::UpdateDescriptor;
        use crate::error::{HookResult, RuntimeError};
        use crate::{Behavior, Next, RenderContext};

        struct Dangling;

        impl Behavior for Dangling {
            fn name(&self) -> &'static str {
                "dangling"
            }

            fn updates(
                &self,
                cx: &RenderContext<'_>,
                below: Next<'_>,
            ) -> HookResult<UpdateDescriptor> {
                Ok(below
                    .updates(cx)?
                    .target("gone", UpdateDescriptor::new().property("x", 1)))
            }
        }

        let mut runtime = Runtime::new();
        let component = runtime.create(Chain::new().with(Dangling));

        let failures = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&failures);
        runtime.on_failure(move |_, err| {
            if let RuntimeError::UnresolvedTarget { name } = err {
                sink.borrow_mut().push(name.clone());
            }
        });

        component.mount(MemoryRegistry::new()).unwrap();
        runtime.run_until_idle();
        assert_eq!(*failures.borrow(), ["gone".to_string()]);
    }
}
