//! Roots: owners of one branch tree each.

use std::fmt;

use forkstate_merge::MergeReport;
use forkstate_types::{Binding, Owner, Position, Resolution, RootId, StateId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RootConfig;
use crate::error::{ForkError, ForkResult};
use crate::scope::{Scope, ScopeKind};
use crate::slot::Slot;
use crate::state::State;
use crate::tree::{SharedCell, SharedTree, StateTree};

/// Counts reported when a root tears down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeSummary {
    /// Slots frozen.
    pub frozen: usize,
    /// Frozen with a concrete value.
    pub known: usize,
    /// Frozen without one (never written, or explicitly not known).
    pub unknown: usize,
    /// Frozen holding an unresolved conflict.
    pub conflicted: usize,
}

impl FreezeSummary {
    pub(crate) fn record<V>(&mut self, resolution: Option<&Resolution<V>>) {
        self.frozen += 1;
        match resolution {
            Some(Resolution::Value(_)) => self.known += 1,
            Some(Resolution::Conflict(_)) => self.conflicted += 1,
            Some(Resolution::Unknown) | None => self.unknown += 1,
        }
    }
}

/// Owner of one independent branch tree.
///
/// A root tracks the single current state for its logical thread of
/// control and registers every slot created under it. Tearing the root
/// down, explicitly with [`finish`](Self::finish) or implicitly on drop,
/// resolves every registered slot against the final root overlay and
/// freezes it.
///
/// Scopes borrow the root, so a root cannot be finished while one of its
/// scopes is still open.
pub struct Root<V = Value> {
    id: RootId,
    tree: SharedTree<V>,
}

/// Create a root whose root state carries `owner`.
pub fn root<V>(owner: Option<Owner>) -> Root<V> {
    Root::new(owner)
}

impl<V> Root<V> {
    /// Create a root with the default configuration.
    pub fn new(owner: Option<Owner>) -> Self {
        Self::with_config(RootConfig::default(), owner)
    }

    /// Create a root with `config`. Without an explicit `owner`, the root
    /// state takes `config.initial_owner`.
    pub fn with_config(config: RootConfig, owner: Option<Owner>) -> Self {
        let id = RootId::next();
        let owner = owner.or_else(|| config.initial_owner.clone());
        debug!(root = %id, owner = ?owner, "created root");
        Self {
            id,
            tree: SharedTree::new(StateTree::new(id, config, owner)),
        }
    }

    pub fn id(&self) -> RootId {
        self.id
    }

    pub fn config(&self) -> ForkResult<RootConfig, V> {
        Ok(self.tree.read()?.config().clone())
    }

    /// Number of scopes currently open.
    pub fn depth(&self) -> ForkResult<usize, V> {
        Ok(self.tree.read()?.depth())
    }

    /// The id of the current state.
    pub fn current_state(&self) -> ForkResult<StateId, V> {
        Ok(self.tree.read()?.current())
    }

    /// Owner tag of the current state.
    pub fn current_owner(&self) -> ForkResult<Option<Owner>, V> {
        Ok(self.tree.read()?.current_owner())
    }

    /// Number of slots registered for freezing.
    pub fn slot_count(&self) -> ForkResult<usize, V> {
        Ok(self.tree.read()?.slot_count())
    }

    /// Open a fork scope: a child of the current state becomes current and
    /// is discarded when the scope ends.
    pub fn begin_fork(&self, owner: Option<Owner>) -> ForkResult<Scope<'_, V>, V> {
        self.begin(ScopeKind::Fork, owner)
    }

    /// Open a transaction scope: like a fork, but ending it normally merges
    /// the child back into the state that was current before.
    pub fn begin_transaction(&self, owner: Option<Owner>) -> ForkResult<Scope<'_, V>, V> {
        self.begin(ScopeKind::Transaction, owner)
    }

    fn begin(&self, kind: ScopeKind, owner: Option<Owner>) -> ForkResult<Scope<'_, V>, V> {
        let state = self.tree.write()?.open_child(owner)?;
        Ok(Scope::new(self, state, kind))
    }

    /// Close `state`'s scope without merging and hand the state back.
    pub(crate) fn close_scope(&self, state: StateId) -> ForkResult<State<V>, V> {
        let (child, _) = self.tree.write()?.close(state)?;
        Ok(child)
    }

    /// Allocate a slot bound to this root.
    ///
    /// With an `initial_value`, the slot is bound in the current state. An
    /// `initial_position` without a value binds an explicit "not known" at
    /// that position. With neither, nothing is written and the slot reads
    /// as never written.
    pub fn slot(
        &self,
        owner: Option<Owner>,
        initial_value: Option<V>,
        initial_position: Option<Position>,
    ) -> ForkResult<Slot<V>, V> {
        let cell = SharedCell::live(self.tree.downgrade());
        let mut tree = self.tree.write()?;
        let id = tree.allocate_slot()?;

        let initial = match (initial_value, initial_position) {
            (Some(value), position) => Some(Binding::known(value, position)),
            (None, Some(position)) => Some(Binding::unknown(Some(position))),
            (None, None) => None,
        };
        if let Some(binding) = initial {
            tree.write(id, binding)?;
        }
        tree.register(id, cell.clone());

        debug!(root = %self.id, slot = %id, owner = ?owner, "allocated slot");
        Ok(Slot::new(id, self.id, owner, cell))
    }

    /// Tear the root down, freezing every registered slot.
    pub fn finish(self) -> ForkResult<FreezeSummary, V> {
        self.teardown()
    }

    fn teardown(&self) -> ForkResult<FreezeSummary, V> {
        let mut tree = self.tree.write()?;
        if tree.is_torn_down() {
            return Ok(FreezeSummary::default());
        }
        let summary = tree.freeze_all()?;
        info!(
            root = %self.id,
            frozen = summary.frozen,
            known = summary.known,
            unknown = summary.unknown,
            conflicted = summary.conflicted,
            "root torn down"
        );
        Ok(summary)
    }
}

impl<V: Clone + PartialEq> Root<V> {
    /// Run `body` inside a fork scope.
    ///
    /// Whatever `body` writes is discarded when it returns, whether it
    /// returns `Ok`, returns `Err`, or panics.
    pub fn fork<T, E, F>(&self, owner: Option<Owner>, body: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<ForkError<V>>,
    {
        let scope = self.begin_fork(owner)?;
        let out = body(self)?;
        scope.end()?;
        Ok(out)
    }

    /// Run `body` inside a transaction scope.
    ///
    /// If `body` returns `Ok`, its writes are merged into the state that
    /// was current before the call. If it returns `Err` or panics, they
    /// are discarded exactly as in [`fork`](Self::fork).
    pub fn transaction<T, E, F>(&self, owner: Option<Owner>, body: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<ForkError<V>>,
    {
        let scope = self.begin_transaction(owner)?;
        let out = body(self)?;
        scope.end()?;
        Ok(out)
    }

    /// Reconcile detached sibling states into the root state.
    pub fn merge_children(&self, children: &[State<V>], or_none: bool) -> ForkResult<MergeReport<V>, V> {
        self.merge_into(StateId::ROOT, children, or_none)
    }

    pub(crate) fn merge_into(
        &self,
        target: StateId,
        children: &[State<V>],
        or_none: bool,
    ) -> ForkResult<MergeReport<V>, V> {
        self.tree.write()?.merge_into(target, children, or_none)
    }

    pub(crate) fn close_and_merge(&self, state: StateId) -> ForkResult<MergeReport<V>, V> {
        self.tree.write()?.close_and_merge(state)
    }
}

impl<V> Drop for Root<V> {
    fn drop(&mut self) {
        if self.teardown().is_err() {
            warn!(root = %self.id, "root teardown failed");
        }
    }
}

impl<V> fmt::Debug for Root<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root").field("id", &self.id).finish_non_exhaustive()
    }
}
