//! Sibling reconciliation.
//!
//! # Rule
//!
//! For each slot explicitly bound by at least one child overlay:
//!
//! 1. Collect the contributions of the touching children in child order. A
//!    child whose own binding is already a conflict contributes each of its
//!    possibilities (and its "not known" candidate, if any).
//! 2. Deduplicate concrete values by first occurrence. Positions ride along
//!    with the first occurrence and never take part in equality.
//! 3. In lenient mode (`or_none`), "not known" carries no information and
//!    drops out of the agreement check. Otherwise it is one more candidate.
//! 4. No candidate, or "not known" alone: the slot merges to unknown. One
//!    concrete value alone: agreed. Anything more: a conflict.
//!
//! The result depends only on the children, their order, and `or_none`.

use std::collections::BTreeSet;

use forkstate_types::{MergeConflict, Overlay, Position, Resolution, SlotId};
use tracing::debug;

use crate::report::{MergeReport, SlotMerge};

/// Reconcile sibling overlays.
///
/// `children` are the overlays of states that branched from a common
/// target. The returned report covers every slot touched by any child;
/// apply it to the target with [`MergeReport::apply_to`]. The engine never
/// fails: disagreement is encoded as [`SlotMerge::Conflicted`] and left for
/// whoever reads the slot later.
pub fn merge_overlays<V>(children: &[&Overlay<V>], or_none: bool) -> MergeReport<V>
where
    V: Clone + PartialEq,
{
    let touched: BTreeSet<SlotId> = children.iter().flat_map(|child| child.slots()).collect();

    let mut report = MergeReport::new(children.len(), or_none);
    for slot in touched {
        let outcome = merge_slot(children, slot, or_none);
        if let SlotMerge::Conflicted { conflict } = &outcome {
            debug!(
                slot = %slot,
                candidates = conflict.len(),
                includes_unknown = conflict.includes_unknown,
                "merge recorded conflict"
            );
        }
        report.record(slot, outcome);
    }

    debug!(
        children = children.len(),
        or_none,
        touched = report.len(),
        conflicts = report.conflicts().count(),
        "merged sibling overlays"
    );
    report
}

/// Distinct contributions for one slot, in supply order.
struct Candidates<V> {
    values: Vec<V>,
    positions: Vec<Option<Position>>,
    saw_unknown: bool,
    unknown_position: Option<Position>,
}

impl<V: Clone + PartialEq> Candidates<V> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            positions: Vec::new(),
            saw_unknown: false,
            unknown_position: None,
        }
    }

    fn offer_value(&mut self, value: &V, position: Option<&Position>) {
        if !self.values.contains(value) {
            self.values.push(value.clone());
            self.positions.push(position.cloned());
        }
    }

    fn offer_unknown(&mut self, position: Option<&Position>) {
        if !self.saw_unknown {
            self.saw_unknown = true;
            self.unknown_position = position.cloned();
        }
    }

    fn offer(&mut self, resolution: &Resolution<V>, position: Option<&Position>) {
        match resolution {
            Resolution::Unknown => self.offer_unknown(position),
            Resolution::Value(v) => self.offer_value(v, position),
            Resolution::Conflict(conflict) => {
                for (i, v) in conflict.possibilities.iter().enumerate() {
                    let inner = conflict.positions.get(i).and_then(Option::as_ref);
                    self.offer_value(v, inner);
                }
                if conflict.includes_unknown {
                    self.offer_unknown(None);
                }
            }
        }
    }

    fn decide(mut self, or_none: bool) -> SlotMerge<V> {
        let unknown_candidate = self.saw_unknown && !or_none;
        match (self.values.len(), unknown_candidate) {
            (0, _) => SlotMerge::Unknown {
                position: self.unknown_position,
            },
            (1, false) => SlotMerge::Agreed {
                value: self.values.remove(0),
                position: self.positions.remove(0),
            },
            _ => SlotMerge::Conflicted {
                conflict: MergeConflict::new(self.values, self.positions, unknown_candidate),
            },
        }
    }
}

fn merge_slot<V>(children: &[&Overlay<V>], slot: SlotId, or_none: bool) -> SlotMerge<V>
where
    V: Clone + PartialEq,
{
    let mut candidates = Candidates::new();
    for binding in children.iter().filter_map(|child| child.get(slot)) {
        candidates.offer(&binding.value, binding.position.as_ref());
    }
    candidates.decide(or_none)
}
