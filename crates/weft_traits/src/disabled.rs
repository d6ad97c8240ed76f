//! Disabled flag reflected as an attribute and class

use weft_core::{
    json, state_accessors, Behavior, HookResult, Next, RenderContext, Snapshot, UpdateDescriptor,
    Value,
};

pub(crate) const DISABLED: &str = "disabled";

state_accessors! {
    /// Typed access to the `disabled` flag
    pub trait DisabledState {
        "disabled" => disabled / set_disabled: bool,
    }
}

/// Tracks whether the component is disabled
pub struct Disabled;

impl Behavior for Disabled {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn default_state(&self, below: Next<'_>) -> Snapshot {
        below.default_state().with([(DISABLED, json!(false))])
    }

    fn updates(&self, cx: &RenderContext<'_>, below: Next<'_>) -> HookResult<UpdateDescriptor> {
        let update = below.updates(cx)?;
        if !cx.changed.contains(DISABLED) {
            return Ok(update);
        }

        let disabled = cx.state.get_as::<bool>(DISABLED).unwrap_or(false);
        let attribute = if disabled { json!("") } else { Value::Null };
        Ok(update
            .attribute(DISABLED, attribute)
            .class(DISABLED, disabled))
    }
}
