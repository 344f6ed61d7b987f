//! Scope guards: the begin/end pair behind `fork` and `transaction`.

use std::fmt;

use forkstate_merge::MergeReport;
use forkstate_types::StateId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ForkResult;
use crate::root::Root;
use crate::state::State;

/// How a scope treats its child state on normal exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Discard the child.
    Fork,
    /// Merge the child into the state that was current before.
    Transaction,
}

/// An open scope on a [`Root`].
///
/// While the guard is alive its state is current (unless a scope nested
/// inside it is open). Ending the guard with [`end`](Self::end) applies
/// the normal-exit rule of its [`ScopeKind`]; [`abort`](Self::abort) and
/// dropping the guard discard the child whatever the kind.
///
/// Closing a scope closes every scope opened inside it first, discarding
/// their states, so the current state always follows strict LIFO order.
#[must_use = "dropping a scope discards everything written inside it"]
pub struct Scope<'r, V = Value> {
    root: &'r Root<V>,
    state: StateId,
    kind: ScopeKind,
    open: bool,
}

impl<'r, V> Scope<'r, V> {
    pub(crate) fn new(root: &'r Root<V>, state: StateId, kind: ScopeKind) -> Self {
        Self {
            root,
            state,
            kind,
            open: true,
        }
    }

    /// The id of the child state this scope made current.
    pub fn state_id(&self) -> StateId {
        self.state
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Abnormal exit: discard the child state.
    pub fn abort(mut self) -> ForkResult<(), V> {
        self.open = false;
        self.root.close_scope(self.state)?;
        debug!(state = %self.state, kind = ?self.kind, "aborted scope");
        Ok(())
    }

    /// Close the scope without merging and hand back its state, for a
    /// later [`Root::merge_children`] or [`Scope::merge_children`] over
    /// several siblings.
    pub fn detach(mut self) -> ForkResult<State<V>, V> {
        self.open = false;
        self.root.close_scope(self.state)
    }
}

impl<'r, V: Clone + PartialEq> Scope<'r, V> {
    /// Normal exit. A fork discards its child and returns `None`; a
    /// transaction merges it into the previously current state and returns
    /// the merge report.
    pub fn end(mut self) -> ForkResult<Option<MergeReport<V>>, V> {
        self.open = false;
        match self.kind {
            ScopeKind::Fork => {
                self.root.close_scope(self.state)?;
                Ok(None)
            }
            ScopeKind::Transaction => self.root.close_and_merge(self.state).map(Some),
        }
    }

    /// Reconcile detached sibling states into this scope's state.
    pub fn merge_children(&self, children: &[State<V>], or_none: bool) -> ForkResult<MergeReport<V>, V> {
        self.root.merge_into(self.state, children, or_none)
    }
}

impl<'r, V> Drop for Scope<'r, V> {
    fn drop(&mut self) {
        if self.open && self.root.close_scope(self.state).is_err() {
            debug!(state = %self.state, "scope already closed by an enclosing scope");
        }
    }
}

impl<'r, V> fmt::Debug for Scope<'r, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("open", &self.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::error::ForkError;
    use crate::test_support::init_tracing;
    use forkstate_types::{Owner, Position, Resolution};

    type TestResult = Result<(), ForkError<i32>>;

    #[test]
    fn fork_discards_on_normal_exit() {
        init_tracing();
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        root.fork(None, |_| -> TestResult {
            slot.set(2)?;
            assert_eq!(slot.value()?, 2);
            Ok(())
        })
        .unwrap();
        assert_eq!(slot.value().unwrap(), 1);
        assert_eq!(root.depth().unwrap(), 0);
    }

    #[test]
    fn fork_discards_on_error() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        let result = root.fork(None, |_| -> TestResult {
            slot.set(2)?;
            Err(ForkError::NoActiveScope)
        });
        assert!(result.is_err());
        assert_eq!(slot.value().unwrap(), 1);
    }

    #[test]
    fn fork_discards_on_panic() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            root.fork(None, |_| -> TestResult {
                slot.set(2)?;
                panic!("search blew up");
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(slot.value().unwrap(), 1);
        assert_eq!(root.depth().unwrap(), 0);
    }

    #[test]
    fn transaction_merges_uncontested_write() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        root.transaction(None, |_| -> TestResult {
            slot.set_value(7, Some(Position::from("tx")))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(slot.value().unwrap(), 7);
        assert_eq!(slot.position().unwrap(), Some(Position::from("tx")));
    }

    #[test]
    fn transaction_leaves_untouched_slots_alone() {
        let root: Root<i32> = Root::new(None);
        let touched = root.slot(None, Some(1), None).unwrap();
        let untouched = root.slot(None, Some(2), None).unwrap();
        let scope = root.begin_transaction(None).unwrap();
        touched.set(10).unwrap();
        let report = scope.end().unwrap().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(touched.value().unwrap(), 10);
        assert_eq!(untouched.value().unwrap(), 2);
    }

    #[test]
    fn transaction_discards_on_error() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        let result: TestResult = root.transaction(None, |_| {
            slot.set(2)?;
            Err(ForkError::ScopeDepthExceeded { limit: 0 })
        });
        assert!(matches!(result, Err(ForkError::ScopeDepthExceeded { .. })));
        assert_eq!(slot.value().unwrap(), 1);
    }

    #[test]
    fn transaction_discards_on_panic() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            root.transaction(None, |_| -> TestResult {
                slot.set(3)?;
                panic!("abandon");
            })
        }));
        assert!(outcome.is_err());
        assert!(!slot.value_is_known());
    }

    #[test]
    fn transaction_carries_explicit_unknown() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        root.transaction(None, |_| -> TestResult {
            slot.set_value_not_known(None)?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(slot.value(), Err(ForkError::ValueNotKnown { .. })));
    }

    #[test]
    fn nested_fork_inside_transaction_is_independent() {
        let root: Root<&str> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        root.transaction(None, |r| -> Result<(), ForkError<&'static str>> {
            slot.set("x")?;
            r.fork(None, |_| -> Result<(), ForkError<&'static str>> {
                slot.set("y")?;
                assert_eq!(slot.value()?, "y");
                Ok(())
            })?;
            assert_eq!(slot.value()?, "x");
            Ok(())
        })
        .unwrap();
        assert_eq!(slot.value().unwrap(), "x");
    }

    #[test]
    fn nested_transactions_merge_outward() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        root.transaction(None, |r| -> TestResult {
            r.transaction(None, |_| -> TestResult {
                slot.set(5)?;
                Ok(())
            })?;
            assert_eq!(slot.value()?, 5);
            Ok(())
        })
        .unwrap();
        assert_eq!(slot.value().unwrap(), 5);
    }

    #[test]
    fn inner_transaction_is_lost_when_outer_fork_exits() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(0), None).unwrap();
        root.fork(None, |r| -> TestResult {
            r.transaction(None, |_| -> TestResult {
                slot.set(1)?;
                Ok(())
            })?;
            assert_eq!(slot.value()?, 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(slot.value().unwrap(), 0);
    }

    #[test]
    fn guards_expose_state_and_owner() {
        let root: Root<i32> = Root::new(Some(Owner::from("top")));
        assert_eq!(root.current_owner().unwrap(), Some(Owner::from("top")));
        let scope = root.begin_fork(Some(Owner::from("branch"))).unwrap();
        assert_eq!(scope.kind(), ScopeKind::Fork);
        assert_eq!(root.current_state().unwrap(), scope.state_id());
        assert_eq!(root.current_owner().unwrap(), Some(Owner::from("branch")));
        assert_eq!(scope.end().unwrap(), None);
        assert_eq!(root.current_owner().unwrap(), Some(Owner::from("top")));
    }

    #[test]
    fn dropping_a_guard_discards() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        {
            let _scope = root.begin_transaction(None).unwrap();
            slot.set(2).unwrap();
        }
        assert_eq!(slot.value().unwrap(), 1);
        assert_eq!(root.depth().unwrap(), 0);
    }

    #[test]
    fn closing_outer_guard_first_closes_inner() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, Some(1), None).unwrap();
        let outer = root.begin_transaction(None).unwrap();
        slot.set(2).unwrap();
        let inner = root.begin_transaction(None).unwrap();
        slot.set(3).unwrap();

        let report = outer.end().unwrap().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(slot.value().unwrap(), 2);
        assert_eq!(root.depth().unwrap(), 0);
        assert!(matches!(inner.end(), Err(ForkError::NoActiveScope)));
    }

    #[test]
    fn depth_limit_applies_to_scopes() {
        let root: Root<i32> = Root::with_config(crate::RootConfig::default().with_max_scope_depth(2), None);
        let a = root.begin_fork(None).unwrap();
        let b = root.begin_fork(None).unwrap();
        assert!(matches!(
            root.begin_fork(None),
            Err(ForkError::ScopeDepthExceeded { limit: 2 })
        ));
        b.abort().unwrap();
        let c = root.begin_fork(None).unwrap();
        c.abort().unwrap();
        a.abort().unwrap();
    }

    fn explore(root: &Root<&'static str>, slot: &crate::Slot<&'static str>, value: Option<&'static str>) -> State<&'static str> {
        let scope = root.begin_fork(None).unwrap();
        match value {
            Some(v) => slot.set(v).unwrap(),
            None => slot.set_value_not_known(None).unwrap(),
        }
        scope.detach().unwrap()
    }

    #[test]
    fn sibling_disagreement_is_ambiguous_in_supply_order() {
        let root: Root<&str> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        let a = explore(&root, &slot, Some("int"));
        let b = explore(&root, &slot, Some("str"));

        assert!(!slot.value_is_known());
        let report = root.merge_children(&[a, b], false).unwrap();
        assert!(!report.is_clean());

        let err = slot.value().unwrap_err();
        let conflict = err.conflict().unwrap();
        assert_eq!(conflict.possibilities(), &["int", "str"]);
        assert!(!slot.value_is_known());
    }

    #[test]
    fn later_write_supersedes_conflict() {
        let root: Root<&str> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        let a = explore(&root, &slot, Some("a"));
        let b = explore(&root, &slot, Some("b"));
        root.merge_children(&[a, b], false).unwrap();
        assert!(slot.resolve().unwrap().is_conflict());
        slot.set("c").unwrap();
        assert_eq!(slot.value().unwrap(), "c");
    }

    #[test]
    fn lenient_merge_ignores_not_known_sibling() {
        let root: Root<&str> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        let a = explore(&root, &slot, Some("int"));
        let b = explore(&root, &slot, None);
        root.merge_children(&[a, b], true).unwrap();
        assert_eq!(slot.value().unwrap(), "int");
    }

    #[test]
    fn strict_merge_flags_not_known_sibling() {
        let root: Root<&str> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        let a = explore(&root, &slot, Some("int"));
        let b = explore(&root, &slot, None);
        root.merge_children(&[a, b], false).unwrap();
        let err = slot.value().unwrap_err();
        let conflict = err.conflict().unwrap();
        assert_eq!(conflict.possibilities(), &["int"]);
        assert!(conflict.includes_unknown);
    }

    #[test]
    fn repeated_merges_are_deterministic() {
        let root: Root<&str> = Root::new(None);
        let x = root.slot(None, None, None).unwrap();
        let children = vec![
            explore(&root, &x, Some("p")),
            explore(&root, &x, Some("q")),
            explore(&root, &x, Some("p")),
        ];
        let first = root.merge_children(&children, false).unwrap();
        let first_read = x.resolve().unwrap();
        for _ in 0..5 {
            assert_eq!(root.merge_children(&children, false).unwrap(), first);
            assert_eq!(x.resolve().unwrap(), first_read);
        }
        match first_read {
            Resolution::Conflict(c) => assert_eq!(c.possibilities(), &["p", "q"]),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn scope_merge_targets_its_own_state() {
        let root: Root<&str> = Root::new(None);
        let slot = root.slot(None, Some("base"), None).unwrap();
        let outer = root.begin_fork(None).unwrap();
        let a = explore(&root, &slot, Some("v"));
        let b = explore(&root, &slot, Some("v"));
        let report = outer.merge_children(&[a, b], false).unwrap();
        assert!(report.is_clean());
        assert_eq!(slot.value().unwrap(), "v");
        outer.abort().unwrap();
        assert_eq!(slot.value().unwrap(), "base");
    }

    #[test]
    fn detached_state_records_lineage() {
        let root: Root<i32> = Root::new(None);
        let slot = root.slot(None, None, None).unwrap();
        let scope = root.begin_fork(Some(Owner::from("probe"))).unwrap();
        slot.set(1).unwrap();
        let state = scope.detach().unwrap();
        assert_eq!(state.root(), root.id());
        assert_eq!(state.parent(), Some(StateId::ROOT));
        assert_eq!(state.owner(), Some(&Owner::from("probe")));
        assert!(state.binding(slot.id()).is_some());
        assert!(!state.is_root());
        assert!(!slot.value_is_known());
    }

    #[test]
    fn merging_another_roots_state_is_rejected() {
        let first: Root<i32> = Root::new(None);
        let second: Root<i32> = Root::new(None);
        let stray = second.begin_fork(None).unwrap().detach().unwrap();
        let err = first.merge_children(&[stray], false).unwrap_err();
        assert!(matches!(err, ForkError::ForeignState { expected, found, .. } if expected == first.id() && found == second.id()));
    }
}
