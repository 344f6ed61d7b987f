//! Versioned value store with speculative branching.
//!
//! A [`Root`] owns a tree of copy-on-write [`State`] overlays and tracks
//! which one is current. [`Slot`]s are versioned variables resolved lazily
//! through the chain of overlays from the current state upward. Scopes push
//! a child state as current and, on exit, either discard it
//! ([`Root::fork`]) or merge it back into its parent
//! ([`Root::transaction`]). Sibling branches that disagree produce a
//! recorded [`MergeConflict`] that surfaces when the slot is read.
//!
//! When a root is torn down every slot it allocated is resolved against
//! the final root overlay and frozen; the tree itself is then dropped.
//!
//! ```
//! use forkstate_core::{Root, ForkError};
//!
//! let root: Root<i32> = Root::new(None);
//! let slot = root.slot(None, Some(1), None)?;
//!
//! root.fork(None, |_| {
//!     slot.set(2)?;
//!     Ok::<_, ForkError<i32>>(())
//! })?;
//! assert_eq!(slot.value()?, 1);
//!
//! root.transaction(None, |_| {
//!     slot.set(3)?;
//!     Ok::<_, ForkError<i32>>(())
//! })?;
//! assert_eq!(slot.value()?, 3);
//!
//! root.finish()?;
//! assert!(slot.set(4).is_err());
//! # Ok::<(), ForkError<i32>>(())
//! ```
//!
//! # Modules
//!
//! - [`root`] — [`Root`], teardown and [`FreezeSummary`]
//! - [`scope`] — [`Scope`] guards behind `fork` and `transaction`
//! - [`slot`] — [`Slot`] resolution, writes, and freezing
//! - [`state`] — [`State`] overlay nodes
//! - [`config`] — [`RootConfig`]
//! - [`error`] — [`ForkError`] and [`ConfigError`]

pub mod config;
pub mod error;
pub mod root;
pub mod scope;
pub mod slot;
pub mod state;
mod tree;

pub use config::RootConfig;
pub use error::{ConfigError, ForkError, ForkResult};
pub use root::{root, FreezeSummary, Root};
pub use scope::{Scope, ScopeKind};
pub use slot::Slot;
pub use state::State;

pub use forkstate_merge::{MergeReport, SlotMerge};
pub use forkstate_types::{Binding, MergeConflict, Owner, Position, Resolution, RootId, SlotId, StateId};
