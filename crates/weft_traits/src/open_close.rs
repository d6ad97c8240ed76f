//! Open/close state with asynchronous close notification
//!
//! Closing records a result in `closeResult`. Callers waiting on
//! [`OpenCloseSignal::when_closed`] are notified after the closing pass has
//! rendered, from a deferred task rather than from inside the pass.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use weft_core::{
    json, Behavior, Component, HookResult, Next, RenderContext, RuntimeError, Snapshot,
    UpdateDescriptor, Value,
};

const OPENED: &str = "opened";
const CLOSE_RESULT: &str = "closeResult";

type CloseWaiter = Box<dyn FnOnce(&Value)>;

/// Completion signal of an [`OpenClose`] behavior.
///
/// Waiters registered with [`OpenCloseSignal::when_closed`] run once, on the
/// task queue, after the pass that rendered the component closed.
#[derive(Clone, Default)]
pub struct OpenCloseSignal {
    waiters: Rc<RefCell<Vec<CloseWaiter>>>,
}

impl OpenCloseSignal {
    pub fn when_closed<F>(&self, waiter: F)
    where
        F: FnOnce(&Value) + 'static,
    {
        self.waiters.borrow_mut().push(Box::new(waiter));
    }

    /// Number of waiters not yet notified
    pub fn waiting(&self) -> usize {
        self.waiters.borrow().len()
    }

    fn notify(&self, result: &Value) {
        // Take the list first so a waiter may register the next one
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waiter in waiters {
            waiter(result);
        }
    }
}

/// Tracks an `opened` flag and the result the component was closed with
pub struct OpenClose {
    signal: OpenCloseSignal,
}

impl OpenClose {
    /// Create the behavior together with its completion signal
    pub fn new() -> (Self, OpenCloseSignal) {
        let signal = OpenCloseSignal::default();
        (
            Self {
                signal: signal.clone(),
            },
            signal,
        )
    }
}

impl Behavior for OpenClose {
    fn name(&self) -> &'static str {
        "open_close"
    }

    fn default_state(&self, below: Next<'_>) -> Snapshot {
        below
            .default_state()
            .with([(OPENED, json!(false)), (CLOSE_RESULT, Value::Null)])
    }

    fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
        let opened = cx.state.get_as::<bool>(OPENED).unwrap_or(false);
        Ok(below
            .updates(cx)?
            .class(OPENED, opened)
            .class("closed", !opened))
    }

    fn after_update(
        &self,
        host: &Component,
        cx: &RenderContext<'_>,
        below: Next<'_>,
    ) -> HookResult<()> {
        below.after_update(host, cx)?;

        let was_opened = cx.previous.get_as::<bool>(OPENED).unwrap_or(false);
        let opened = cx.state.get_as::<bool>(OPENED).unwrap_or(false);
        if was_opened && !opened {
            let result = cx.state.get(CLOSE_RESULT).cloned().unwrap_or_default();
            let signal = self.signal.clone();
            debug!("closed with {}, notifying {} waiters", result, signal.waiting());
            host.defer(move |_| {
                signal.notify(&result);
                Ok(())
            });
        }
        Ok(())
    }
}

/// Open/close operations for components carrying [`OpenClose`]
pub trait OpenCloseExt {
    fn open(&self);
    fn close(&self, result: Value);
    fn toggle(&self);
    fn is_opened(&self) -> bool;
    fn set_opened(&self, opened: bool) -> Result<(), RuntimeError>;
}

impl OpenCloseExt for Component {
    fn open(&self) {
        self.set_state([(OPENED, json!(true)), (CLOSE_RESULT, Value::Null)]);
    }

    fn close(&self, result: Value) {
        self.set_state([(OPENED, json!(false)), (CLOSE_RESULT, result)]);
    }

    fn toggle(&self) {
        if self.peek_field::<bool>(OPENED).unwrap_or(false) {
            self.close(Value::Null);
        } else {
            self.open();
        }
    }

    fn is_opened(&self) -> bool {
        self.get_field::<bool>(OPENED).unwrap_or(false)
    }

    fn set_opened(&self, opened: bool) -> Result<(), RuntimeError> {
        self.set_field(OPENED, opened)
    }
}
