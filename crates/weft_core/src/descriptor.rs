//! Update descriptors
//!
//! An [`UpdateDescriptor`] is a declarative description of the writes a
//! render pass wants to see on its targets. It holds:
//!
//! - **Leaves**: property, attribute, class, and style assignments on the
//!   target the descriptor is applied to. A `null` value means "unset".
//! - **Sub-targets**: nested descriptors keyed by the symbolic name of a
//!   target in the [`TargetRegistry`](crate::target::TargetRegistry).
//!
//! Descriptors compose with [`merge`]: later descriptors win per leaf,
//! while sub-target maps merge recursively.
//!
//! # JSON form
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::descriptor::{Leaf, UpdateDescriptor};
//!
//! let update = UpdateDescriptor::from_json(&json!({
//!     "textContent": "3",
//!     "style": { "color": "red" },
//!     "$": { "label": { "attributes": { "aria-hidden": true } } }
//! }))
//! .unwrap();
//!
//! assert_eq!(update.get(&Leaf::style("color")), Some(&json!("red")));
//! assert!(update.sub_target("label").is_some());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::RuntimeError;

/// Reserved JSON key holding the sub-target map
pub const TARGETS_KEY: &str = "$";
/// Reserved JSON key holding style leaves
pub const STYLE_KEY: &str = "style";
/// Reserved JSON key holding attribute leaves
pub const ATTRIBUTES_KEY: &str = "attributes";
/// Reserved JSON key holding class toggles
pub const CLASSES_KEY: &str = "classes";

/// Address of a single assignment on a target
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Leaf {
    Property(String),
    Attribute(String),
    Class(String),
    Style(String),
}

impl Leaf {
    pub fn property(name: impl Into<String>) -> Self {
        Leaf::Property(name.into())
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Leaf::Attribute(name.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        Leaf::Class(name.into())
    }

    pub fn style(name: impl Into<String>) -> Self {
        Leaf::Style(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Leaf::Property(n) | Leaf::Attribute(n) | Leaf::Class(n) | Leaf::Style(n) => n,
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Property(n) => write!(f, "{n}"),
            Leaf::Attribute(n) => write!(f, "[{n}]"),
            Leaf::Class(n) => write!(f, ".{n}"),
            Leaf::Style(n) => write!(f, "style.{n}"),
        }
    }
}

/// Declarative tree of assignments for one target and its named sub-targets
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateDescriptor {
    leaves: BTreeMap<Leaf, Value>,
    targets: BTreeMap<String, UpdateDescriptor>,
}

impl UpdateDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a leaf. `Value::Null` records an explicit unset.
    pub fn set(mut self, leaf: Leaf, value: impl Into<Value>) -> Self {
        self.leaves.insert(leaf, value.into());
        self
    }

    pub fn property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(Leaf::property(name), value)
    }

    pub fn attribute(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(Leaf::attribute(name), value)
    }

    pub fn class(self, name: impl Into<String>, on: bool) -> Self {
        self.set(Leaf::class(name), on)
    }

    pub fn style(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(Leaf::style(name), value)
    }

    /// Record an explicit unset of `leaf`
    pub fn unset(self, leaf: Leaf) -> Self {
        self.set(leaf, Value::Null)
    }

    /// Add a nested descriptor for the named sub-target, merging with any
    /// descriptor already present under that name.
    pub fn target(mut self, name: impl Into<String>, update: UpdateDescriptor) -> Self {
        let name = name.into();
        let merged = match self.targets.remove(&name) {
            Some(existing) => existing.merge(update),
            None => update,
        };
        self.targets.insert(name, merged);
        self
    }

    /// Value assigned to `leaf`. Unset leaves read as `None`.
    pub fn get(&self, leaf: &Leaf) -> Option<&Value> {
        self.leaves.get(leaf).filter(|v| !v.is_null())
    }

    /// Whether the descriptor explicitly unsets `leaf`
    pub fn is_unset(&self, leaf: &Leaf) -> bool {
        matches!(self.leaves.get(leaf), Some(Value::Null))
    }

    /// Whether the descriptor mentions `leaf` at all
    pub fn addresses(&self, leaf: &Leaf) -> bool {
        self.leaves.contains_key(leaf)
    }

    pub fn sub_target(&self, name: &str) -> Option<&UpdateDescriptor> {
        self.targets.get(name)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (&Leaf, &Value)> {
        self.leaves.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = (&str, &UpdateDescriptor)> {
        self.targets.iter().map(|(name, update)| (name.as_str(), update))
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.targets.values().all(UpdateDescriptor::is_empty)
    }

    /// Number of leaves in this descriptor and all nested descriptors
    pub fn leaf_count(&self) -> usize {
        self.leaves.len() + self.targets.values().map(Self::leaf_count).sum::<usize>()
    }

    /// Merge `other` over `self` (see [`merge`])
    pub fn merge(mut self, other: UpdateDescriptor) -> Self {
        self.leaves.extend(other.leaves);
        for (name, nested) in other.targets {
            let merged = match self.targets.remove(&name) {
                Some(existing) => existing.merge(nested),
                None => nested,
            };
            self.targets.insert(name, merged);
        }
        self
    }

    /// Parse the JSON form.
    ///
    /// `$` holds sub-targets, `style`, `attributes`, and `classes` hold leaves
    /// of their kind, and every other key is a property. Property values are
    /// taken as-is, nested objects included.
    pub fn from_json(value: &Value) -> Result<Self, RuntimeError> {
        let object = as_object(value, "descriptor")?;
        let mut update = UpdateDescriptor::new();

        for (key, value) in object {
            match key.as_str() {
                TARGETS_KEY => {
                    for (name, nested) in as_object(value, TARGETS_KEY)? {
                        update = update.target(name.clone(), Self::from_json(nested)?);
                    }
                }
                STYLE_KEY => update.extend_kind(value, STYLE_KEY, Leaf::Style)?,
                ATTRIBUTES_KEY => update.extend_kind(value, ATTRIBUTES_KEY, Leaf::Attribute)?,
                CLASSES_KEY => update.extend_kind(value, CLASSES_KEY, Leaf::Class)?,
                _ => {
                    update.leaves.insert(Leaf::property(key.clone()), value.clone());
                }
            }
        }

        Ok(update)
    }

    /// Render the JSON form accepted by [`UpdateDescriptor::from_json`]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        let mut style = Map::new();
        let mut attributes = Map::new();
        let mut classes = Map::new();

        for (leaf, value) in &self.leaves {
            let bucket = match leaf {
                Leaf::Property(_) => &mut object,
                Leaf::Attribute(_) => &mut attributes,
                Leaf::Class(_) => &mut classes,
                Leaf::Style(_) => &mut style,
            };
            bucket.insert(leaf.name().to_string(), value.clone());
        }

        for (key, bucket) in [
            (STYLE_KEY, style),
            (ATTRIBUTES_KEY, attributes),
            (CLASSES_KEY, classes),
        ] {
            if !bucket.is_empty() {
                object.insert(key.to_string(), Value::Object(bucket));
            }
        }

        if !self.targets.is_empty() {
            let targets: Map<String, Value> = self
                .targets
                .iter()
                .map(|(name, nested)| (name.clone(), nested.to_json()))
                .collect();
            object.insert(TARGETS_KEY.to_string(), Value::Object(targets));
        }

        Value::Object(object)
    }

    fn extend_kind(
        &mut self,
        value: &Value,
        key: &str,
        leaf: fn(String) -> Leaf,
    ) -> Result<(), RuntimeError> {
        for (name, value) in as_object(value, key)? {
            self.leaves.insert(leaf(name.clone()), value.clone());
        }
        Ok(())
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, RuntimeError> {
    value
        .as_object()
        .ok_or_else(|| RuntimeError::MalformedDescriptor(format!("`{what}` must be an object")))
}

/// Merge two descriptors, right-biased per leaf.
///
/// Leaves of `over` replace leaves of `base`; a `null` leaf in `over`
/// replaces the base assignment with an explicit unset rather than falling
/// back to the base value. Sub-target maps merge recursively. Property values
/// are opaque, so nested objects inside them are replaced wholesale.
pub fn merge(base: &UpdateDescriptor, over: &UpdateDescriptor) -> UpdateDescriptor {
    base.clone().merge(over.clone())
}

/// Merge a sequence of descriptors left to right
pub fn merge_all<I>(updates: I) -> UpdateDescriptor
where
    I: IntoIterator<Item = UpdateDescriptor>,
{
    updates
        .into_iter()
        .fold(UpdateDescriptor::new(), UpdateDescriptor::merge)
}
