//! Component lifecycle state machine
//!
//! Flat state machine over [`Lifecycle`] states driven by
//! [`LifecycleEvent`]s. Only the scheduler sends events; any event without a
//! matching transition is an [`RuntimeError::InvalidStateTransition`] and
//! leaves the current state untouched.
//!
//! ```text
//! Constructed --Attach--> Mounted --BeginRender--> Rendering --FinishRender--> Idle
//!                                                      ^                         |
//!                                                      +-------BeginRender-------+
//! Constructed | Mounted | Idle --Detach--> Unmounted
//! ```

use smallvec::SmallVec;
use tracing::trace;

use crate::error::RuntimeError;

/// Lifecycle state of a component instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Constructed,
    Mounted,
    Rendering,
    Idle,
    Unmounted,
}

impl Lifecycle {
    /// Whether a render pass may start from this state
    pub fn can_render(self) -> bool {
        matches!(self, Lifecycle::Mounted | Lifecycle::Idle)
    }
}

/// Event driving a lifecycle transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Attach,
    BeginRender,
    FinishRender,
    Detach,
}

/// A transition in the lifecycle table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Lifecycle,
    pub event: LifecycleEvent,
    pub to: Lifecycle,
}

impl Transition {
    pub const fn new(from: Lifecycle, event: LifecycleEvent, to: Lifecycle) -> Self {
        Self { from, event, to }
    }
}

/// Number of transitions kept in a record's history
pub const HISTORY_LIMIT: usize = 16;

const TRANSITIONS: [Transition; 7] = [
    Transition::new(Lifecycle::Constructed, LifecycleEvent::Attach, Lifecycle::Mounted),
    Transition::new(Lifecycle::Mounted, LifecycleEvent::BeginRender, Lifecycle::Rendering),
    Transition::new(Lifecycle::Idle, LifecycleEvent::BeginRender, Lifecycle::Rendering),
    Transition::new(Lifecycle::Rendering, LifecycleEvent::FinishRender, Lifecycle::Idle),
    Transition::new(Lifecycle::Constructed, LifecycleEvent::Detach, Lifecycle::Unmounted),
    Transition::new(Lifecycle::Mounted, LifecycleEvent::Detach, Lifecycle::Unmounted),
    Transition::new(Lifecycle::Idle, LifecycleEvent::Detach, Lifecycle::Unmounted),
];

/// Lifecycle state plus the dirty flag of one component instance
#[derive(Clone, Debug)]
pub struct LifecycleRecord {
    current: Lifecycle,
    dirty: bool,
    /// Most recent transitions, at most [`HISTORY_LIMIT`] (for debugging)
    history: SmallVec<[(Lifecycle, LifecycleEvent, Lifecycle); HISTORY_LIMIT]>,
}

impl LifecycleRecord {
    pub fn new() -> Self {
        Self {
            current: Lifecycle::Constructed,
            dirty: false,
            history: SmallVec::new(),
        }
    }

    pub fn current(&self) -> Lifecycle {
        self.current
    }

    pub fn is_in(&self, state: Lifecycle) -> bool {
        self.current == state
    }

    /// Whether state changed while a pass was running
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn can_send(&self, event: LifecycleEvent) -> bool {
        self.find(event).is_some()
    }

    /// Send an event, returning the new state
    pub fn send(&mut self, event: LifecycleEvent) -> Result<Lifecycle, RuntimeError> {
        let from = self.current;
        let Some(transition) = self.find(event) else {
            return Err(RuntimeError::InvalidStateTransition { from, event });
        };

        self.current = transition.to;
        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push((from, event, transition.to));
        trace!("lifecycle {:?} --{:?}--> {:?}", from, event, transition.to);
        Ok(transition.to)
    }

    /// Recent transitions, oldest first
    pub fn history(&self) -> &[(Lifecycle, LifecycleEvent, Lifecycle)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn find(&self, event: LifecycleEvent) -> Option<Transition> {
        TRANSITIONS
            .iter()
            .copied()
            .find(|t| t.from == self.current && t.event == event)
    }
}

impl Default for LifecycleRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Lifecycle::*;
    use LifecycleEvent::*;

    #[test]
    fn test_full_lifecycle() {
        let mut record = LifecycleRecord::new();
        assert!(record.is_in(Constructed));

        assert_eq!(record.send(Attach).unwrap(), Mounted);
        assert_eq!(record.send(BeginRender).unwrap(), Rendering);
        assert_eq!(record.send(FinishRender).unwrap(), Idle);
        assert_eq!(record.send(BeginRender).unwrap(), Rendering);
        assert_eq!(record.send(FinishRender).unwrap(), Idle);
        assert_eq!(record.send(Detach).unwrap(), Unmounted);

        assert_eq!(record.history().len(), 6);
        assert_eq!(record.history()[0], (Constructed, Attach, Mounted));
    }

    #[test]
    fn test_double_mount_is_rejected() {
        let mut record = LifecycleRecord::new();
        record.send(Attach).unwrap();

        let err = record.send(Attach).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::InvalidStateTransition {
                from: Mounted,
                event: Attach
            }
        ));
        assert!(record.is_in(Mounted));
    }

    #[test]
    fn test_unmounted_is_terminal() {
        let mut record = LifecycleRecord::new();
        record.send(Detach).unwrap();

        for event in [Attach, BeginRender, FinishRender, Detach] {
            assert!(!record.can_send(event));
        }
    }

    #[test]
    fn test_detach_while_rendering_is_rejected() {
        let mut record = LifecycleRecord::new();
        record.send(Attach).unwrap();
        record.send(BeginRender).unwrap();

        assert!(record.send(Detach).is_err());
        assert!(record.is_in(Rendering));
    }

    #[test]
    fn test_history_keeps_most_recent_transitions() {
        let mut record = LifecycleRecord::new();
        record.send(Attach).unwrap();
        for _ in 0..1000 {
            record.send(BeginRender).unwrap();
            record.send(FinishRender).unwrap();
        }

        assert_eq!(record.history().len(), HISTORY_LIMIT);
        assert_eq!(
            record.history().last(),
            Some(&(Rendering, FinishRender, Idle))
        );

        record.clear_history();
        assert!(record.history().is_empty());
        assert!(record.is_in(Idle));
    }

    #[test]
    fn test_dirty_flag() {
        let mut record = LifecycleRecord::new();
        assert!(!record.is_dirty());
        record.mark_dirty();
        assert!(record.take_dirty());
        assert!(!record.is_dirty());
    }
}
