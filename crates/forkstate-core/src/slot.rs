//! Versioned variables.

use std::fmt;

use forkstate_types::{Binding, Owner, Position, Resolution, RootId, SlotId};
use serde_json::Value;
use tracing::trace;

use crate::error::{ForkError, ForkResult};
use crate::tree::{resolution_of, SharedCell, SharedTree, SlotCell};

/// A single versioned variable bound to one [`Root`](crate::Root).
///
/// Until its root tears down, a slot resolves lazily: a read walks from the
/// root's current state up through its ancestors and takes the first
/// binding it finds; a write lands in the current state only. Teardown
/// freezes the slot, after which reads return the frozen snapshot and
/// writes fail with [`ForkError::FinalizedWrite`].
///
/// Clones share the same variable.
pub struct Slot<V = Value> {
    id: SlotId,
    root: RootId,
    owner: Option<Owner>,
    cell: SharedCell<V>,
}

impl<V> Slot<V> {
    pub(crate) fn new(id: SlotId, root: RootId, owner: Option<Owner>, cell: SharedCell<V>) -> Self {
        Self {
            id,
            root,
            owner,
            cell,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The root this slot was allocated from.
    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    /// Returns `true` once the slot's root has torn down.
    pub fn is_frozen(&self) -> bool {
        self.cell
            .read()
            .map(|cell| matches!(*cell, SlotCell::Frozen(_)))
            .unwrap_or(false)
    }

    /// The live tree, or `None` when the slot is frozen.
    fn live_tree(&self) -> ForkResult<Option<SharedTree<V>>, V> {
        let cell = self.cell.read()?;
        let tree = match &*cell {
            SlotCell::Frozen(_) => None,
            SlotCell::Live(tree) => Some(tree.upgrade().ok_or(ForkError::<V>::NoActiveScope)?),
        };
        Ok(tree)
    }

    /// Write `binding` into the root's current state.
    fn write(&self, binding: Binding<V>) -> ForkResult<(), V> {
        let tree = self
            .live_tree()?
            .ok_or(ForkError::<V>::FinalizedWrite { slot: self.id })?;
        let mut tree = tree.write()?;
        trace!(slot = %self.id, state = %tree.current(), known = binding.value.is_known(), "slot write");
        tree.write(self.id, binding)
    }

    /// Bind the slot to `value` in the current state.
    pub fn set_value(&self, value: V, position: Option<Position>) -> ForkResult<(), V> {
        self.write(Binding::known(value, position))
    }

    /// Shorthand for `set_value(value, None)`.
    pub fn set(&self, value: V) -> ForkResult<(), V> {
        self.set_value(value, None)
    }

    /// Bind the slot to an explicit "not known" in the current state.
    ///
    /// Reads treat this exactly like a slot that was never written; only
    /// [`binding`](Self::binding) can tell the two apart.
    pub fn set_value_not_known(&self, position: Option<Position>) -> ForkResult<(), V> {
        self.write(Binding::unknown(position))
    }
}

impl<V: Clone> Slot<V> {
    /// The binding a read would see: `None` if the slot was never written
    /// anywhere in the chain, `Some` with an `Unknown` value if it was
    /// explicitly written as not known.
    pub fn binding(&self) -> ForkResult<Option<Binding<V>>, V> {
        let cell = self.cell.read()?;
        let tree = match &*cell {
            SlotCell::Frozen(binding) => return Ok(binding.clone()),
            SlotCell::Live(tree) => tree.upgrade().ok_or(ForkError::<V>::NoActiveScope)?,
        };
        drop(cell);
        let tree = tree.read()?;
        Ok(tree.lookup(self.id).cloned())
    }

    /// The raw resolution, without turning "not known" or a conflict into
    /// an error.
    pub fn resolve(&self) -> ForkResult<Resolution<V>, V> {
        Ok(resolution_of(self.binding()?.as_ref()))
    }

    /// The position attached to the binding a read would see.
    pub fn position(&self) -> ForkResult<Option<Position>, V> {
        Ok(self.binding()?.and_then(|b| b.position))
    }

    /// Read the slot.
    ///
    /// Fails with [`ForkError::ValueNotKnown`] if no binding is found or
    /// the binding is an explicit "not known", and with
    /// [`ForkError::ValueAmbiguous`] if it is an unresolved merge conflict.
    pub fn value(&self) -> ForkResult<V, V> {
        match self.resolve()? {
            Resolution::Value(v) => Ok(v),
            Resolution::Unknown => Err(ForkError::ValueNotKnown { slot: self.id }),
            Resolution::Conflict(conflict) => Err(ForkError::ValueAmbiguous {
                slot: self.id,
                conflict,
            }),
        }
    }

    /// Returns `true` if [`value`](Self::value) would succeed.
    pub fn value_is_known(&self) -> bool {
        matches!(self.resolve(), Ok(Resolution::Value(_)))
    }
}

impl<V> Clone for Slot<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            root: self.root,
            owner: self.owner.clone(),
            cell: self.cell.clone(),
        }
    }
}

impl<V> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("owner", &self.owner)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl<V> fmt::Display for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}({})", self.id, owner),
            None => write!(f, "{}", self.id),
        }
    }
}
