//! Render targets and descriptor application
//!
//! The runtime never builds a render tree. It only needs something that
//! can report a leaf's current value and accept a batch of writes
//! ([`Target`]), and a lookup from symbolic names to such targets
//! ([`TargetRegistry`]).
//!
//! [`apply`] walks an [`UpdateDescriptor`] against a registry. It compares
//! before writing, so applying the same descriptor twice performs no writes
//! the second time. A sub-target name the registry cannot resolve skips that
//! branch only.
//!
//! [`MemoryRegistry`] is a headless implementation that records leaves and
//! counts writes.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::descriptor::{Leaf, UpdateDescriptor};

/// One write handed to a [`Target`]. `None` unsets the leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub leaf: Leaf,
    pub value: Option<Value>,
}

/// An addressable node that accepts leaf assignments.
///
/// Targets may read their owning component while a pass writes to them,
/// but the component's registry is not inspectable until the writes finish.
pub trait Target {
    /// Current value of `leaf`, or `None` if it is unset
    fn read(&self, leaf: &Leaf) -> Option<Value>;

    /// Perform a batch of writes. Only called with a non-empty batch.
    fn accept(&mut self, assignments: &[Assignment]);
}

/// Lookup from symbolic names to targets, owned by one component
pub trait TargetRegistry {
    /// The component's own target, receiving top-level leaves
    fn host(&mut self) -> &mut dyn Target;

    /// Resolve a named sub-target
    fn resolve(&mut self, name: &str) -> Option<&mut dyn Target>;
}

/// Outcome of [`apply`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// Leaves actually written
    pub writes: usize,
    /// Sub-target names that could not be resolved
    pub unresolved: SmallVec<[String; 2]>,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.writes == 0
    }
}

/// Apply `update` to the registry's host target and its named sub-targets
pub fn apply(registry: &mut dyn TargetRegistry, update: &UpdateDescriptor) -> ApplyReport {
    let mut report = ApplyReport::default();
    report.writes += write_leaves(registry.host(), update);
    apply_targets(registry, update, &mut report);
    report
}

fn apply_targets(
    registry: &mut dyn TargetRegistry,
    update: &UpdateDescriptor,
    report: &mut ApplyReport,
) {
    for (name, nested) in update.targets() {
        let Some(target) = registry.resolve(name) else {
            warn!("skipping update for unresolved target `{}`", name);
            report.unresolved.push(name.to_string());
            continue;
        };
        report.writes += write_leaves(target, nested);
        apply_targets(registry, nested, report);
    }
}

/// Write the leaves of `update` that differ from the target's current values
fn write_leaves(target: &mut dyn Target, update: &UpdateDescriptor) -> usize {
    let assignments: SmallVec<[Assignment; 8]> = update
        .leaves()
        .filter_map(|(leaf, value)| {
            let current = target.read(leaf);
            let wanted = (!value.is_null()).then_some(value);
            if current.as_ref() == wanted {
                return None;
            }
            Some(Assignment {
                leaf: leaf.clone(),
                value: wanted.cloned(),
            })
        })
        .collect();

    if !assignments.is_empty() {
        trace!("writing {} leaves", assignments.len());
        target.accept(&assignments);
    }
    assignments.len()
}

/// Headless target recording its leaves
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryTarget {
    values: BTreeMap<Leaf, Value>,
    writes: usize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, leaf: &Leaf) -> Option<&Value> {
        self.values.get(leaf)
    }

    /// Total number of leaf writes accepted so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn values(&self) -> impl Iterator<Item = (&Leaf, &Value)> {
        self.values.iter()
    }
}

impl Target for MemoryTarget {
    fn read(&self, leaf: &Leaf) -> Option<Value> {
        self.values.get(leaf).cloned()
    }

    fn accept(&mut self, assignments: &[Assignment]) {
        for assignment in assignments {
            match &assignment.value {
                Some(value) => {
                    self.values.insert(assignment.leaf.clone(), value.clone());
                }
                None => {
                    self.values.remove(&assignment.leaf);
                }
            }
        }
        self.writes += assignments.len();
    }
}

/// Headless registry: a host target plus named [`MemoryTarget`]s
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    host: MemoryTarget,
    targets: FxHashMap<String, MemoryTarget>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of an empty named target
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.insert(name);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.targets.entry(name.into()).or_default();
    }

    pub fn host_target(&self) -> &MemoryTarget {
        &self.host
    }

    pub fn get(&self, name: &str) -> Option<&MemoryTarget> {
        self.targets.get(name)
    }

    /// Writes accepted by the host and every named target
    pub fn total_writes(&self) -> usize {
        self.host.writes + self.targets.values().map(|t| t.writes).sum::<usize>()
    }
}

impl TargetRegistry for MemoryRegistry {
    fn host(&mut self) -> &mut dyn Target {
        &mut self.host
    }

    fn resolve(&mut self, name: &str) -> Option<&mut dyn Target> {
        self.targets
            .get_mut(name)
            .map(|target| target as &mut dyn Target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> UpdateDescriptor {
        UpdateDescriptor::from_json(&json!({
            "textContent": "hello",
            "attributes": { "role": "button" },
            "$": {
                "icon": { "style": { "opacity": 0.5 } },
                "label": { "classes": { "bold": true } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_apply_writes_host_and_sub_targets() {
        let mut registry = MemoryRegistry::new().with_target("icon").with_target("label");
        let report = apply(&mut registry, &sample());

        assert_eq!(report.writes, 4);
        assert!(report.unresolved.is_empty());
        assert_eq!(
            registry.host_target().get(&Leaf::property("textContent")),
            Some(&json!("hello"))
        );
        assert_eq!(
            registry.get("icon").unwrap().get(&Leaf::style("opacity")),
            Some(&json!(0.5))
        );
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let mut registry = MemoryRegistry::new().with_target("icon").with_target("label");
        let update = sample();

        apply(&mut registry, &update);
        let after_first = registry.clone();
        let second = apply(&mut registry, &update);

        assert!(second.is_noop());
        assert_eq!(registry.total_writes(), after_first.total_writes());
        assert_eq!(registry.host_target(), after_first.host_target());
        assert_eq!(registry.get("icon"), after_first.get("icon"));
    }

    #[test]
    fn test_unresolved_branch_is_isolated() {
        let mut registry = MemoryRegistry::new().with_target("label");
        let report = apply(&mut registry, &sample());

        assert_eq!(report.unresolved.as_slice(), ["icon".to_string()]);
        assert_eq!(report.writes, 3);
        assert_eq!(
            registry.get("label").unwrap().get(&Leaf::class("bold")),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_unset_removes_and_then_noops() {
        let mut registry = MemoryRegistry::new();
        apply(
            &mut registry,
            &UpdateDescriptor::new().attribute("disabled", ""),
        );

        let unset = UpdateDescriptor::new().unset(Leaf::attribute("disabled"));
        assert_eq!(apply(&mut registry, &unset).writes, 1);
        assert_eq!(registry.host_target().get(&Leaf::attribute("disabled")), None);
        assert_eq!(apply(&mut registry, &unset).writes, 0);
    }

    #[test]
    fn test_values_pass_through_uncoerced() {
        let mut registry = MemoryRegistry::new();
        apply(
            &mut registry,
            &UpdateDescriptor::new()
                .property("tabIndex", 0)
                .property("title", "0"),
        );

        let host = registry.host_target();
        assert_eq!(host.get(&Leaf::property("tabIndex")), Some(&json!(0)));
        assert_eq!(host.get(&Leaf::property("title")), Some(&json!("0")));
    }

    #[test]
    fn test_nested_sub_targets_resolve_from_same_registry() {
        let mut registry = MemoryRegistry::new().with_target("outer").with_target("inner");
        let update = UpdateDescriptor::new().target(
            "outer",
            UpdateDescriptor::new()
                .property("a", 1)
                .target("inner", UpdateDescriptor::new().property("b", 2)),
        );

        let report = apply(&mut registry, &update);
        assert_eq!(report.writes, 2);
        assert_eq!(
            registry.get("inner").unwrap().get(&Leaf::property("b")),
            Some(&json!(2))
        );
    }
}
