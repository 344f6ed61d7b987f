//! Foundation types for forkstate.
//!
//! This crate provides the identifiers, provenance tokens, and value domain
//! shared by the merge engine and the branch tree. Every other forkstate
//! crate depends on `forkstate-types`.
//!
//! # Key Types
//!
//! - [`RootId`] — Process-unique identity of one branch tree
//! - [`StateId`] / [`SlotId`] — Identities of overlays and versioned variables within a root
//! - [`Owner`] — Opaque tag naming whoever opened a state or allocated a slot
//! - [`Position`] — Opaque provenance token attached to a write
//! - [`Resolution`] — `Unknown | Value | Conflict`, the result of resolving a slot
//! - [`MergeConflict`] — Disagreeing contributions recorded by a merge
//! - [`Overlay`] — The ordered slot bindings local to one state

pub mod identity;
pub mod overlay;
pub mod provenance;
pub mod value;

pub use identity::{Owner, RootId, SlotId, StateId};
pub use overlay::Overlay;
pub use provenance::Position;
pub use value::{Binding, MergeConflict, Resolution};
