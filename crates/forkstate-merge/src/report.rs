//! Merge outcomes, per slot and per merge.

use std::collections::BTreeMap;

use forkstate_types::{Binding, MergeConflict, Overlay, Position, Resolution, SlotId};
use serde::{Deserialize, Serialize};

/// What a merge decided for one slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SlotMerge<V> {
    /// Every informative contribution supplied the same value.
    Agreed { value: V, position: Option<Position> },
    /// No contribution carried information.
    Unknown { position: Option<Position> },
    /// Contributions disagreed.
    Conflicted { conflict: MergeConflict<V> },
}

impl<V> SlotMerge<V> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }

    /// The overlay binding this outcome writes into the target.
    pub fn into_binding(self) -> Binding<V> {
        match self {
            Self::Agreed { value, position } => Binding::known(value, position),
            Self::Unknown { position } => Binding::unknown(position),
            Self::Conflicted { conflict } => Binding::new(Resolution::Conflict(conflict), None),
        }
    }
}

/// The result of merging a list of sibling overlays.
///
/// Only slots touched by at least one child appear; every other slot keeps
/// whatever binding the target already had.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport<V> {
    /// Number of children that took part.
    pub children: usize,
    /// Whether "not known" contributions were treated as no information.
    pub or_none: bool,
    outcomes: BTreeMap<SlotId, SlotMerge<V>>,
}

impl<V> MergeReport<V> {
    pub(crate) fn new(children: usize, or_none: bool) -> Self {
        Self {
            children,
            or_none,
            outcomes: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, slot: SlotId, outcome: SlotMerge<V>) {
        self.outcomes.insert(slot, outcome);
    }

    /// Number of slots touched by the merge.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, slot: SlotId) -> Option<&SlotMerge<V>> {
        self.outcomes.get(&slot)
    }

    /// Touched slots with their outcomes, in slot order.
    pub fn outcomes(&self) -> impl Iterator<Item = (SlotId, &SlotMerge<V>)> {
        self.outcomes.iter().map(|(slot, outcome)| (*slot, outcome))
    }

    /// Slots that ended up in conflict, in slot order.
    pub fn conflicts(&self) -> impl Iterator<Item = (SlotId, &MergeConflict<V>)> {
        self.outcomes.iter().filter_map(|(slot, outcome)| match outcome {
            SlotMerge::Conflicted { conflict } => Some((*slot, conflict)),
            _ => None,
        })
    }

    /// Number of slots whose contributions agreed on a value.
    pub fn agreed(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, SlotMerge::Agreed { .. }))
            .count()
    }

    /// Number of slots that merged to "not known".
    pub fn unknown(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, SlotMerge::Unknown { .. }))
            .count()
    }

    /// Returns `true` if no slot ended up in conflict.
    pub fn is_clean(&self) -> bool {
        !self.outcomes.values().any(SlotMerge::is_conflict)
    }
}

impl<V: Clone> MergeReport<V> {
    /// Write every outcome into `target`, superseding its existing
    /// bindings for the touched slots.
    pub fn apply_to(&self, target: &mut Overlay<V>) {
        for (slot, outcome) in &self.outcomes {
            target.insert(*slot, outcome.clone().into_binding());
        }
    }
}
