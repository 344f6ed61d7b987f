//! Shared internals of a root: the state arena, the scope stack, and the
//! slot registry.
//!
//! # Invariants
//!
//! - `current` is the root state or a descendant of it.
//! - `open` lists open scopes innermost last; closing a scope restores the
//!   `previous` state recorded when it was opened.
//! - Every state in `states` other than the root state belongs to an open
//!   scope.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use forkstate_merge::{merge_overlays, MergeReport};
use forkstate_types::{Binding, Overlay, Owner, Resolution, RootId, SlotId, StateId};
use tracing::{debug, warn};

use crate::config::RootConfig;
use crate::error::{ForkError, ForkResult};
use crate::root::FreezeSummary;
use crate::state::State;

/// Strong handle to a root's tree. Only the root holds one.
pub(crate) struct SharedTree<V>(Arc<RwLock<StateTree<V>>>);

impl<V> SharedTree<V> {
    pub(crate) fn new(tree: StateTree<V>) -> Self {
        Self(Arc::new(RwLock::new(tree)))
    }

    pub(crate) fn read(&self) -> ForkResult<RwLockReadGuard<'_, StateTree<V>>, V> {
        self.0
            .read()
            .map_err(|e| ForkError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn write(&self) -> ForkResult<RwLockWriteGuard<'_, StateTree<V>>, V> {
        self.0
            .write()
            .map_err(|e| ForkError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn downgrade(&self) -> WeakTree<V> {
        WeakTree(Arc::downgrade(&self.0))
    }
}

/// Weak handle held by live slots, so slots never keep a tree alive.
pub(crate) struct WeakTree<V>(Weak<RwLock<StateTree<V>>>);

impl<V> WeakTree<V> {
    pub(crate) fn upgrade(&self) -> Option<SharedTree<V>> {
        self.0.upgrade().map(SharedTree)
    }
}

impl<V> Clone for WeakTree<V> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

/// What a slot resolves through: the live tree, or its frozen snapshot.
pub(crate) enum SlotCell<V> {
    Live(WeakTree<V>),
    Frozen(Option<Binding<V>>),
}

/// A slot's cell, shared between the slot and its root's registry.
pub(crate) struct SharedCell<V>(Arc<RwLock<SlotCell<V>>>);

impl<V> SharedCell<V> {
    pub(crate) fn live(tree: WeakTree<V>) -> Self {
        Self(Arc::new(RwLock::new(SlotCell::Live(tree))))
    }

    pub(crate) fn read(&self) -> ForkResult<RwLockReadGuard<'_, SlotCell<V>>, V> {
        self.0
            .read()
            .map_err(|e| ForkError::LockPoisoned(e.to_string()))
    }

    /// Replace the cell with a frozen snapshot, severing the tree link.
    pub(crate) fn freeze(&self, binding: Option<Binding<V>>) -> ForkResult<(), V> {
        let mut cell = self
            .0
            .write()
            .map_err(|e| ForkError::LockPoisoned(e.to_string()))?;
        *cell = SlotCell::Frozen(binding);
        Ok(())
    }
}

impl<V> Clone for SharedCell<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

struct OpenScope {
    state: StateId,
    previous: StateId,
}

pub(crate) struct StateTree<V> {
    root: RootId,
    config: RootConfig,
    states: HashMap<StateId, State<V>>,
    current: StateId,
    open: Vec<OpenScope>,
    next_state: StateId,
    next_slot: SlotId,
    slots: Vec<(SlotId, SharedCell<V>)>,
    torn_down: bool,
}

impl<V> StateTree<V> {
    pub(crate) fn new(root: RootId, config: RootConfig, owner: Option<Owner>) -> Self {
        let mut states = HashMap::new();
        states.insert(StateId::ROOT, State::root_state(root, owner));
        Self {
            root,
            config,
            states,
            current: StateId::ROOT,
            open: Vec::new(),
            next_state: StateId::ROOT.successor(),
            next_slot: SlotId::from_raw(0),
            slots: Vec::new(),
            torn_down: false,
        }
    }

    pub(crate) fn config(&self) -> &RootConfig {
        &self.config
    }

    pub(crate) fn current(&self) -> StateId {
        self.current
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub(crate) fn current_owner(&self) -> Option<Owner> {
        self.states
            .get(&self.current)
            .and_then(|state| state.owner.clone())
    }

    fn ensure_live(&self) -> ForkResult<(), V> {
        if self.torn_down {
            return Err(ForkError::NoActiveScope);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Scopes
    // ---------------------------------------------------------------

    /// Push a new child of the current state and make it current.
    pub(crate) fn open_child(&mut self, owner: Option<Owner>) -> ForkResult<StateId, V> {
        self.ensure_live()?;
        if let Some(limit) = self.config.max_scope_depth {
            if self.open.len() >= limit {
                return Err(ForkError::ScopeDepthExceeded { limit });
            }
        }

        let id = self.next_state;
        self.next_state = id.successor();
        let previous = self.current;
        self.states
            .insert(id, State::child_of(id, self.root, previous, owner));
        self.open.push(OpenScope { state: id, previous });
        self.current = id;

        debug!(root = %self.root, state = %id, parent = %previous, depth = self.open.len(), "opened scope");
        Ok(id)
    }

    /// Close the scope that opened `state`, restoring the state that was
    /// current before it. Scopes opened inside it are closed (and their
    /// states dropped) first. Returns the closed state and the restored
    /// state's id.
    pub(crate) fn close(&mut self, state: StateId) -> ForkResult<(State<V>, StateId), V> {
        let index = self
            .open
            .iter()
            .rposition(|scope| scope.state == state)
            .ok_or(ForkError::<V>::NoActiveScope)?;

        while self.open.len() > index + 1 {
            if let Some(inner) = self.open.pop() {
                self.states.remove(&inner.state);
                warn!(
                    root = %self.root,
                    state = %inner.state,
                    closing = %state,
                    "discarded scope still open inside a closing scope"
                );
            }
        }

        let scope = self.open.pop().ok_or(ForkError::<V>::NoActiveScope)?;
        self.current = scope.previous;
        let child = self
            .states
            .remove(&scope.state)
            .ok_or(ForkError::<V>::NoActiveScope)?;

        debug!(root = %self.root, state = %scope.state, restored = %scope.previous, "closed scope");
        Ok((child, scope.previous))
    }

    // ---------------------------------------------------------------
    // Slots
    // ---------------------------------------------------------------

    pub(crate) fn allocate_slot(&mut self) -> ForkResult<SlotId, V> {
        self.ensure_live()?;
        let id = self.next_slot;
        self.next_slot = id.successor();
        Ok(id)
    }

    pub(crate) fn register(&mut self, slot: SlotId, cell: SharedCell<V>) {
        self.slots.push((slot, cell));
    }

    /// The first binding for `slot` walking up from the current state.
    pub(crate) fn lookup(&self, slot: SlotId) -> Option<&Binding<V>> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            let state = self.states.get(&id)?;
            if let Some(binding) = state.overlay.get(slot) {
                return Some(binding);
            }
            cursor = state.parent;
        }
        None
    }

    /// Bind `slot` in the current state's overlay.
    pub(crate) fn write(&mut self, slot: SlotId, binding: Binding<V>) -> ForkResult<(), V> {
        self.ensure_live()?;
        let state = self
            .states
            .get_mut(&self.current)
            .ok_or(ForkError::<V>::NoActiveScope)?;
        state.overlay.insert(slot, binding);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------

    /// Resolve every registered slot against the root state's final
    /// overlay and freeze it. Idempotent: a second call freezes nothing.
    pub(crate) fn freeze_all(&mut self) -> ForkResult<FreezeSummary, V> {
        let mut summary = FreezeSummary::default();
        if self.torn_down {
            return Ok(summary);
        }
        self.torn_down = true;

        if !self.open.is_empty() {
            warn!(root = %self.root, open = self.open.len(), "tearing down with scopes still open");
        }
        self.open.clear();
        self.current = StateId::ROOT;

        let mut overlay = self
            .states
            .remove(&StateId::ROOT)
            .map(|state| state.overlay)
            .unwrap_or_default();
        self.states.clear();

        for (slot, cell) in self.slots.drain(..) {
            let binding = overlay.remove(slot);
            summary.record(binding.as_ref().map(|b| &b.value));
            cell.freeze(binding)?;
        }

        debug!(root = %self.root, frozen = summary.frozen, "froze slots");
        Ok(summary)
    }
}

impl<V: Clone + PartialEq> StateTree<V> {
    /// Merge detached sibling states into `target`'s overlay.
    pub(crate) fn merge_into(
        &mut self,
        target: StateId,
        children: &[State<V>],
        or_none: bool,
    ) -> ForkResult<MergeReport<V>, V> {
        self.ensure_live()?;
        for child in children {
            if child.root != self.root {
                return Err(ForkError::ForeignState {
                    state: child.id,
                    expected: self.root,
                    found: child.root,
                });
            }
            if child.parent != Some(target) {
                debug!(
                    root = %self.root,
                    state = %child.id,
                    target = %target,
                    "merging a state that did not branch from the target"
                );
            }
        }

        let overlays: Vec<&Overlay<V>> = children.iter().map(|child| &child.overlay).collect();
        let report = merge_overlays(&overlays, or_none);

        let target_state = self
            .states
            .get_mut(&target)
            .ok_or(ForkError::<V>::NoActiveScope)?;
        report.apply_to(&mut target_state.overlay);

        debug!(
            root = %self.root,
            target = %target,
            children = children.len(),
            or_none,
            touched = report.len(),
            "merged children"
        );
        Ok(report)
    }

    /// Close `state`'s scope and merge it into the restored state.
    pub(crate) fn close_and_merge(&mut self, state: StateId) -> ForkResult<MergeReport<V>, V> {
        let (child, previous) = self.close(state)?;
        self.merge_into(previous, std::slice::from_ref(&child), false)
    }
}

/// Resolution of an optional binding, "never written" reading as unknown.
pub(crate) fn resolution_of<V: Clone>(binding: Option<&Binding<V>>) -> Resolution<V> {
    binding
        .map(|b| b.value.clone())
        .unwrap_or(Resolution::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> StateTree<i32> {
        StateTree::new(RootId::next(), RootConfig::default(), None)
    }

    #[test]
    fn lookup_walks_to_ancestors() {
        let mut t = tree();
        let slot = t.allocate_slot().unwrap();
        t.write(slot, Binding::known(1, None)).unwrap();
        t.open_child(None).unwrap();
        t.open_child(None).unwrap();
        assert_eq!(t.lookup(slot), Some(&Binding::known(1, None)));
    }

    #[test]
    fn writes_land_in_innermost_state() {
        let mut t = tree();
        let slot = t.allocate_slot().unwrap();
        let child = t.open_child(None).unwrap();
        t.write(slot, Binding::known(2, None)).unwrap();
        assert!(t.states[&child].overlay.contains(slot));
        assert!(!t.states[&StateId::ROOT].overlay.contains(slot));
    }

    #[test]
    fn close_restores_previous_state() {
        let mut t = tree();
        let outer = t.open_child(None).unwrap();
        let inner = t.open_child(None).unwrap();
        assert_eq!(t.current(), inner);
        let (closed, restored) = t.close(inner).unwrap();
        assert_eq!(closed.id(), inner);
        assert_eq!(restored, outer);
        assert_eq!(t.current(), outer);
        assert_eq!(t.depth(), 1);
    }

    #[test]
    fn closing_outer_scope_closes_inner_ones() {
        let mut t = tree();
        let outer = t.open_child(None).unwrap();
        let inner = t.open_child(None).unwrap();
        t.close(outer).unwrap();
        assert_eq!(t.current(), StateId::ROOT);
        assert_eq!(t.depth(), 0);
        assert!(!t.states.contains_key(&inner));
        assert!(matches!(t.close(inner), Err(ForkError::NoActiveScope)));
    }

    #[test]
    fn close_without_scope_fails() {
        let mut t = tree();
        assert!(matches!(t.close(StateId::ROOT), Err(ForkError::NoActiveScope)));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut t: StateTree<i32> = StateTree::new(
            RootId::next(),
            RootConfig::default().with_max_scope_depth(1),
            None,
        );
        t.open_child(None).unwrap();
        assert!(matches!(
            t.open_child(None),
            Err(ForkError::ScopeDepthExceeded { limit: 1 })
        ));
    }

    #[test]
    fn close_and_merge_writes_into_parent() {
        let mut t = tree();
        let slot = t.allocate_slot().unwrap();
        let child = t.open_child(None).unwrap();
        t.write(slot, Binding::known(5, None)).unwrap();
        let report = t.close_and_merge(child).unwrap();
        assert_eq!(report.agreed(), 1);
        assert_eq!(t.lookup(slot), Some(&Binding::known(5, None)));
    }

    #[test]
    fn freeze_is_idempotent_and_ends_the_tree() {
        let mut t = tree();
        let first = t.freeze_all().unwrap();
        assert_eq!(first, FreezeSummary::default());
        assert!(t.is_torn_down());
        assert!(matches!(t.open_child(None), Err(ForkError::NoActiveScope)));
        assert!(matches!(t.allocate_slot(), Err(ForkError::NoActiveScope)));
        assert_eq!(t.freeze_all().unwrap(), FreezeSummary::default());
    }

    #[test]
    fn foreign_states_are_rejected() {
        let mut t = tree();
        let mut other = tree();
        let stray = other.open_child(None).unwrap();
        let (state, _) = other.close(stray).unwrap();
        let err = t.merge_into(StateId::ROOT, &[state], false).unwrap_err();
        assert!(matches!(err, ForkError::ForeignState { .. }));
    }
}
