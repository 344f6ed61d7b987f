use serde::{Deserialize, Serialize};

use crate::provenance::Position;

/// The result of resolving a slot through a chain of overlays.
///
/// `Unknown` is an explicit variant rather than a sentinel value, so it
/// survives cloning and serialization without aliasing a real value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Resolution<V> {
    /// No binding was found, or the binding was an explicit "not known".
    Unknown,
    /// A concrete value.
    Value(V),
    /// Sibling branches disagreed and the disagreement has not been
    /// superseded by a later write.
    Conflict(MergeConflict<V>),
}

impl<V> Resolution<V> {
    /// Returns `true` if reading this resolution yields a concrete value.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// The concrete value, if any.
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The recorded conflict, if any.
    pub fn as_conflict(&self) -> Option<&MergeConflict<V>> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<V> Default for Resolution<V> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<V> From<Option<V>> for Resolution<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Unknown,
        }
    }
}

/// One overlay entry: a resolution plus the provenance of the write that
/// produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding<V> {
    pub value: Resolution<V>,
    pub position: Option<Position>,
}

impl<V> Binding<V> {
    pub fn new(value: Resolution<V>, position: Option<Position>) -> Self {
        Self { value, position }
    }

    /// A binding to a concrete value.
    pub fn known(value: V, position: Option<Position>) -> Self {
        Self::new(Resolution::Value(value), position)
    }

    /// An explicit "not known" binding.
    pub fn unknown(position: Option<Position>) -> Self {
        Self::new(Resolution::Unknown, position)
    }
}

/// A disagreement recorded by a merge.
///
/// `possibilities` holds the distinct concrete values in the order the
/// children supplied them, each listed once at its first occurrence.
/// `positions[i]` is the position that accompanied the first supply of
/// `possibilities[i]`. `includes_unknown` is set when an explicit "not
/// known" took part in a strict (non-lenient) disagreement; in that case
/// `possibilities` may hold a single value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict<V> {
    pub possibilities: Vec<V>,
    pub positions: Vec<Option<Position>>,
    #[serde(default)]
    pub includes_unknown: bool,
}

impl<V> MergeConflict<V> {
    pub fn new(possibilities: Vec<V>, positions: Vec<Option<Position>>, includes_unknown: bool) -> Self {
        Self {
            possibilities,
            positions,
            includes_unknown,
        }
    }

    /// The competing values in supply order.
    pub fn possibilities(&self) -> &[V] {
        &self.possibilities
    }

    /// Number of competing candidates, counting "not known" as one.
    pub fn len(&self) -> usize {
        self.possibilities.len() + usize::from(self.includes_unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
