//! Error types for branch tree operations.

use forkstate_types::{MergeConflict, RootId, SlotId, StateId};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by roots, scopes, and slots.
///
/// Every variant is raised at the offending call and is recoverable by the
/// caller. The merge engine itself never produces `ValueAmbiguous`; it
/// records a conflict and the error appears only when the slot is read.
#[derive(Debug, Error)]
pub enum ForkError<V = Value> {
    /// No binding for the slot was found anywhere in the overlay chain, or
    /// the binding found was an explicit "not known".
    #[error("value of {slot} is not known")]
    ValueNotKnown { slot: SlotId },

    /// The slot resolved to an unresolved merge conflict.
    #[error("value of {slot} is ambiguous between {} candidates", .conflict.len())]
    ValueAmbiguous {
        slot: SlotId,
        conflict: MergeConflict<V>,
    },

    /// A write was attempted after the slot's root froze it.
    #[error("cannot write {slot}: it was frozen when its root was torn down")]
    FinalizedWrite { slot: SlotId },

    /// The operation needs an open scope (or a live root) and there is none.
    #[error("no active scope")]
    NoActiveScope,

    /// Opening another scope would exceed the configured nesting limit.
    #[error("scope depth limit of {limit} reached")]
    ScopeDepthExceeded { limit: usize },

    /// A state detached from one root was handed to another root's merge.
    #[error("{state} belongs to {found}, not {expected}")]
    ForeignState {
        state: StateId,
        expected: RootId,
        found: RootId,
    },

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<V> ForkError<V> {
    /// The slot the error is about, when there is one.
    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Self::ValueNotKnown { slot }
            | Self::ValueAmbiguous { slot, .. }
            | Self::FinalizedWrite { slot } => Some(*slot),
            _ => None,
        }
    }

    /// The recorded conflict of a `ValueAmbiguous` error.
    pub fn conflict(&self) -> Option<&MergeConflict<V>> {
        match self {
            Self::ValueAmbiguous { conflict, .. } => Some(conflict),
            _ => None,
        }
    }

    /// Returns `true` for the two read failures: not known and ambiguous.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::ValueNotKnown { .. } | Self::ValueAmbiguous { .. })
    }
}

/// Convenience type alias for branch tree operations.
pub type ForkResult<T, V = Value> = std::result::Result<T, ForkError<V>>;

/// Errors produced while loading a [`RootConfig`](crate::RootConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
