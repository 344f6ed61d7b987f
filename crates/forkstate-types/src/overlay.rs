//! The ordered slot bindings local to one state.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::SlotId;
use crate::provenance::Position;
use crate::value::{Binding, Resolution};

/// The writes made while one state was current.
///
/// An overlay holds only slots explicitly written into it; any other slot
/// defers to the parent state. Entries are kept ordered by [`SlotId`] so
/// that every traversal, and therefore every merge, is deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay<V> {
    bindings: BTreeMap<SlotId, Binding<V>>,
}

impl<V> Overlay<V> {
    /// Create an empty overlay.
    pub fn new() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Returns `true` if this overlay itself binds `slot` (inherited
    /// bindings do not count).
    pub fn contains(&self, slot: SlotId) -> bool {
        self.bindings.contains_key(&slot)
    }

    pub fn get(&self, slot: SlotId) -> Option<&Binding<V>> {
        self.bindings.get(&slot)
    }

    /// Bind `slot`, replacing any earlier binding in this overlay.
    pub fn insert(&mut self, slot: SlotId, binding: Binding<V>) -> Option<Binding<V>> {
        self.bindings.insert(slot, binding)
    }

    /// Shorthand for inserting a value together with its position.
    pub fn write(&mut self, slot: SlotId, value: Resolution<V>, position: Option<Position>) {
        self.bindings.insert(slot, Binding::new(value, position));
    }

    pub fn remove(&mut self, slot: SlotId) -> Option<Binding<V>> {
        self.bindings.remove(&slot)
    }

    /// Bound slots in ascending id order.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SlotId, Binding<V>> {
        self.bindings.iter()
    }
}

impl<V> Default for Overlay<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, V> IntoIterator for &'a Overlay<V> {
    type Item = (&'a SlotId, &'a Binding<V>);
    type IntoIter = btree_map::Iter<'a, SlotId, Binding<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

impl<V> FromIterator<(SlotId, Binding<V>)> for Overlay<V> {
    fn from_iter<I: IntoIterator<Item = (SlotId, Binding<V>)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}
