//! State snapshots and pending changes
//!
//! A [`Snapshot`] is an immutable keyed mapping shared cheaply between the
//! component and the hooks reading it. It is replaced, never mutated, when
//! a render pass folds the [`PendingChanges`] accumulated by `set_state`.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Immutable state of one component at a point in time
#[derive(Clone, Default)]
pub struct Snapshot {
    entries: Rc<FxHashMap<String, Value>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Deserialize the value under `key`, `None` if absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// New snapshot with `partial` merged over this one
    pub fn with<I, K>(&self, partial: I) -> Snapshot
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut entries = (*self.entries).clone();
        entries.extend(partial.into_iter().map(|(k, v)| (k.into(), v)));
        Snapshot {
            entries: Rc::new(entries),
        }
    }

    /// Fold pending changes over this snapshot, returning the new snapshot
    /// and the keys whose value actually changed.
    pub(crate) fn fold(&self, pending: PendingChanges) -> (Snapshot, ChangeSet) {
        let mut changed = ChangeSet::default();
        if pending.is_empty() {
            return (self.clone(), changed);
        }

        let mut entries = (*self.entries).clone();
        for (key, value) in pending.entries {
            if entries.get(&key) != Some(&value) {
                changed.insert(key.clone());
            }
            entries.insert(key, value);
        }

        let next = Snapshot {
            entries: Rc::new(entries),
        };
        (next, changed)
    }

    /// Keys whose value differs between `earlier` and this snapshot,
    /// including keys present in only one of them
    pub fn changes_since(&self, earlier: &Snapshot) -> ChangeSet {
        let mut changed = ChangeSet::default();
        if self.ptr_eq(earlier) {
            return changed;
        }

        for (key, value) in self.iter() {
            if earlier.get(key) != Some(value) {
                changed.insert(key.to_string());
            }
        }
        for key in earlier.keys().filter(|key| !self.contains(key)) {
            changed.insert(key.to_string());
        }
        changed
    }

    /// Whether both snapshots share the same allocation
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub fn to_json(&self) -> Value {
        let sorted: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(sorted)
    }

    fn sorted(&self) -> BTreeMap<&str, &Value> {
        self.iter().collect()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.entries == other.entries
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.sorted()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Snapshot::new().with(iter)
    }
}

/// Changes submitted since the last completed render pass.
/// Later writes to the same key replace earlier ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PendingChanges {
    entries: FxHashMap<String, Value>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge<I, K>(&mut self, partial: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.entries
            .extend(partial.into_iter().map(|(k, v)| (k.into(), v)));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keys whose value changed in a fold
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    keys: FxHashSet<String>,
}

impl ChangeSet {
    /// Every key of `snapshot`, used for the initial pass
    pub fn all(snapshot: &Snapshot) -> Self {
        Self {
            keys: snapshot.keys().map(str::to_string).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Whether any of `keys` changed
    pub fn any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.contains(key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, key: String) {
        self.keys.insert(key);
    }

    pub(crate) fn extend(&mut self, other: ChangeSet) {
        self.keys.extend(other.keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_with_does_not_touch_original() {
        let base: Snapshot = [("count", json!(0))].into_iter().collect();
        let next = base.with([("count", json!(1))]);

        assert_eq!(base.get("count"), Some(&json!(0)));
        assert_eq!(next.get("count"), Some(&json!(1)));
    }

    #[test]
    fn test_pending_last_writer_wins() {
        let mut pending = PendingChanges::new();
        pending.merge([("a", json!(1)), ("b", json!(1))]);
        pending.merge([("a", json!(2))]);

        assert_eq!(pending.len(), 2);
        assert_eq!(pending.get("a"), Some(&json!(2)));
    }

    #[test]
    fn test_fold_reports_changed_keys_only() {
        let base: Snapshot = [("a", json!(1)), ("b", json!(2))].into_iter().collect();
        let mut pending = PendingChanges::new();
        pending.merge([("a", json!(1)), ("b", json!(3)), ("c", json!(4))]);

        let (next, changed) = base.fold(pending);
        assert_eq!(next.to_json(), json!({ "a": 1, "b": 3, "c": 4 }));
        assert!(!changed.contains("a"));
        assert!(changed.any(&["b", "z"]));
        assert_eq!(changed.len(), 2);
    }

    #[test]
    fn test_fold_empty_keeps_allocation() {
        let base: Snapshot = [("a", json!(1))].into_iter().collect();
        let (next, changed) = base.fold(PendingChanges::new());
        assert!(next.ptr_eq(&base));
        assert!(changed.is_empty());
    }

    #[test]
    fn test_changes_since_spans_several_folds() {
        let rendered: Snapshot = [("a", json!(1)), ("b", json!(1))].into_iter().collect();
        let skipped = rendered.with([("a", json!(2)), ("b", json!(2))]);
        let next = skipped.with([("b", json!(1)), ("c", json!(true))]);

        let changed = next.changes_since(&rendered);
        assert!(changed.contains("a"));
        assert!(changed.contains("c"));
        // Changed and changed back before it was ever rendered
        assert!(!changed.contains("b"));
        assert!(next.changes_since(&next).is_empty());
    }

    #[test]
    fn test_get_as() {
        let snapshot: Snapshot = [("index", json!(3)), ("label", json!("x"))]
            .into_iter()
            .collect();

        assert_eq!(snapshot.get_as::<i64>("index"), Some(3));
        assert_eq!(snapshot.get_as::<i64>("label"), None);
        assert_eq!(snapshot.get_as::<String>("missing"), None);
    }
}
