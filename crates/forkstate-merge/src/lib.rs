//! Merge engine for forkstate.
//!
//! Reconciles the overlays of sibling branches into their common parent.
//! Per slot, contributions from the children that explicitly wrote it are
//! deduplicated in supply order; agreement yields the value, silence yields
//! "not known", and genuine disagreement is recorded as a
//! [`MergeConflict`](forkstate_types::MergeConflict) rather than raised.
//!
//! The engine is a pure function over overlays: [`merge_overlays`] produces
//! a [`MergeReport`], and [`MergeReport::apply_to`] writes it into the
//! target overlay.

pub mod engine;
pub mod report;

pub use engine::merge_overlays;
pub use report::{MergeReport, SlotMerge};
