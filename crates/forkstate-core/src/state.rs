//! Overlay nodes of the branch tree.

use forkstate_types::{Binding, Overlay, Owner, RootId, SlotId, StateId};

/// One node of a root's branch tree: the writes made while it was current,
/// a link to the state it branched from, and an opaque owner tag.
///
/// States live inside their root while their scope is open. A scope closed
/// with [`Scope::detach`](crate::Scope::detach) hands its state back to the
/// caller, who can then reconcile several siblings at once with
/// [`Root::merge_children`](crate::Root::merge_children).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State<V> {
    pub(crate) id: StateId,
    pub(crate) root: RootId,
    pub(crate) parent: Option<StateId>,
    pub(crate) owner: Option<Owner>,
    pub(crate) overlay: Overlay<V>,
}

impl<V> State<V> {
    pub(crate) fn root_state(root: RootId, owner: Option<Owner>) -> Self {
        Self {
            id: StateId::ROOT,
            root,
            parent: None,
            owner,
            overlay: Overlay::new(),
        }
    }

    pub(crate) fn child_of(id: StateId, root: RootId, parent: StateId, owner: Option<Owner>) -> Self {
        Self {
            id,
            root,
            parent: Some(parent),
            owner,
            overlay: Overlay::new(),
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    /// The root this state was created under.
    pub fn root(&self) -> RootId {
        self.root
    }

    /// The state this one branched from; `None` only for a root state.
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    /// The writes made while this state was current.
    pub fn overlay(&self) -> &Overlay<V> {
        &self.overlay
    }

    /// This state's own binding for `slot`, ignoring ancestors.
    pub fn binding(&self, slot: SlotId) -> Option<&Binding<V>> {
        self.overlay.get(slot)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
