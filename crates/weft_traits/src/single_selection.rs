//! Single selection among indexed items
//!
//! Items are rendered by registry targets named with [`item_target`]; the
//! selected one carries the `selected` class.

use weft_core::{
    json, Behavior, ChangeSet, Component, HookResult, Next, RenderContext, Snapshot,
    UpdateDescriptor, Value,
};

const SELECTED_INDEX: &str = "selectedIndex";
const ITEM_COUNT: &str = "itemCount";
const SELECTION_REQUIRED: &str = "selectionRequired";
const SELECTION_WRAPS: &str = "selectionWraps";

/// Name of the registry target rendering item `index`
pub fn item_target(index: i64) -> String {
    format!("item{index}")
}

/// Tracks a single selected index among `itemCount` items.
///
/// `-1` means nothing is selected. A state effect keeps the index in range
/// whenever the index, the item count, or `selectionRequired` change.
pub struct SingleSelection;

impl SingleSelection {
    fn clamp(state: &Snapshot) -> i64 {
        let count = state.get_as::<i64>(ITEM_COUNT).unwrap_or(0);
        let index = state.get_as::<i64>(SELECTED_INDEX).unwrap_or(-1);
        let required = state.get_as::<bool>(SELECTION_REQUIRED).unwrap_or(false);

        if count <= 0 {
            -1
        } else if index >= count {
            count - 1
        } else if index < 0 && required {
            0
        } else {
            index.max(-1)
        }
    }
}

impl Behavior for SingleSelection {
    fn name(&self) -> &'static str {
        "single_selection"
    }

    fn default_state(&self, below: Next<'_>) -> Snapshot {
        below.default_state().with([
            (SELECTED_INDEX, json!(-1)),
            (ITEM_COUNT, json!(0)),
            (SELECTION_REQUIRED, json!(false)),
            (SELECTION_WRAPS, json!(false)),
        ])
    }

    fn state_effects(
        &self,
        state: &Snapshot,
        changed: &ChangeSet,
        below: Next<'_>,
    ) -> Vec<(String, Value)> {
        let mut effects = below.state_effects(state, changed);
        if changed.any(&[SELECTED_INDEX, ITEM_COUNT, SELECTION_REQUIRED]) {
            let clamped = Self::clamp(state);
            if state.get_as::<i64>(SELECTED_INDEX) != Some(clamped) {
                effects.push((SELECTED_INDEX.to_string(), json!(clamped)));
            }
        }
        effects
    }

    fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
        let mut update = below.updates(cx)?;
        if !cx.changed.contains(SELECTED_INDEX) {
            return Ok(update);
        }

        let index = cx.state.get_as::<i64>(SELECTED_INDEX).unwrap_or(-1);
        let previous = cx.previous.get_as::<i64>(SELECTED_INDEX).unwrap_or(-1);
        if previous >= 0 && previous != index {
            update = update.target(
                item_target(previous),
                UpdateDescriptor::new().class("selected", false),
            );
        }
        if index >= 0 {
            update = update.target(
                item_target(index),
                UpdateDescriptor::new().class("selected", true),
            );
        }
        Ok(update.property(SELECTED_INDEX, index))
    }
}

/// Selection navigation for components carrying [`SingleSelection`].
///
/// Each method reads the latest requested index, so several calls in one
/// turn accumulate.
pub trait SelectionExt {
    fn selected_index(&self) -> i64;
    fn select(&self, index: i64);
    fn select_first(&self) -> bool;
    fn select_last(&self) -> bool;
    fn select_next(&self) -> bool;
    fn select_previous(&self) -> bool;
    fn set_item_count(&self, count: i64);
}

impl SelectionExt for Component {
    fn selected_index(&self) -> i64 {
        self.get_field::<i64>(SELECTED_INDEX).unwrap_or(-1)
    }

    fn select(&self, index: i64) {
        self.set_state([(SELECTED_INDEX, json!(index))]);
    }

    fn select_first(&self) -> bool {
        move_to(self, |_, count| (count > 0).then_some(0))
    }

    fn select_last(&self) -> bool {
        move_to(self, |_, count| (count > 0).then_some(count - 1))
    }

    fn select_next(&self) -> bool {
        let wraps = self.peek_field::<bool>(SELECTION_WRAPS).unwrap_or(false);
        move_to(self, |index, count| match index.saturating_add(1) {
            next if next < count => Some(next),
            _ if wraps && count > 0 => Some(0),
            _ => None,
        })
    }

    fn select_previous(&self) -> bool {
        let wraps = self.peek_field::<bool>(SELECTION_WRAPS).unwrap_or(false);
        move_to(self, |index, count| match index {
            // Nothing selected yet: start from the end
            -1 if count > 0 => Some(count - 1),
            i if i > 0 => Some(i - 1),
            _ if wraps && count > 0 => Some(count - 1),
            _ => None,
        })
    }

    fn set_item_count(&self, count: i64) {
        self.set_state([(ITEM_COUNT, json!(count))]);
    }
}

/// Select the index picked by `pick`, returning whether it changed
fn move_to(component: &Component, pick: impl FnOnce(i64, i64) -> Option<i64>) -> bool {
    let index = component.peek_field::<i64>(SELECTED_INDEX).unwrap_or(-1);
    let count = component.peek_field::<i64>(ITEM_COUNT).unwrap_or(0);
    match pick(index, count) {
        Some(next) if next != index => {
            component.select(next);
            true
        }
        _ => false,
    }
}
