//! Weft behaviors
//!
//! Reusable behavior units that layer onto any [`Chain`](weft_core::Chain):
//!
//! - [`Disabled`]: a `disabled` flag reflected as an attribute and class
//! - [`OpenClose`]: an `opened` flag with a close result and a completion
//!   signal delivered after the closing pass
//! - [`SingleSelection`]: a selected index kept within the item count
//!
//! Each behavior relies only on the generic behavior contract, so they can
//! be composed in any order.

mod disabled;
mod open_close;
mod single_selection;

pub use disabled::{Disabled, DisabledState};
pub use open_close::{OpenClose, OpenCloseExt, OpenCloseSignal};
pub use single_selection::{item_target, SelectionExt, SingleSelection};
