//! Space record and lifecycle state machine.
//!
//! A space is a node in a tree of speculative execution contexts, each
//! owning a local store, a set of threads and at most one distributor.

use crate::distributor::Distributor;
use crate::store::Store;
use crate::types::{SpaceId, ThreadId, VarId};

/// The lifecycle state of a space.
///
/// State machine:
/// ```text
/// Runnable ⇄ Stable          (stability detection / commit reopens)
///     │         │
///     ▼         ▼
///   Failed   Merged | Killed
/// ```
///
/// `Failed`, `Merged` and `Killed` are absorbing. `Merged` and `Killed`
/// count as *disposed*: any further cross-space operation on the handle is
/// a usage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceState {
    /// Has (or may acquire) schedulable threads.
    Runnable,
    /// The whole subtree is quiescent; outcome observable via `ask`.
    Stable,
    /// The local store became inconsistent.
    Failed,
    /// Absorbed into the parent by `merge`.
    Merged,
    /// Discarded by `kill` (or collaterally by an ancestor's failure).
    Killed,
}

impl SpaceState {
    /// Returns true once the space has been merged or killed away.
    #[must_use]
    pub const fn is_disposed(self) -> bool {
        matches!(self, Self::Merged | Self::Killed)
    }

    /// Returns true if the state can never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Merged | Self::Killed)
    }

    /// Returns true if an observer blocked on stability may proceed.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Runnable)
    }
}

/// Internal record for one computation space.
#[derive(Debug)]
pub struct SpaceRecord {
    /// Unique identifier (the reification handle).
    pub id: SpaceId,
    /// Parent space; `None` only for the top-level space. Set at creation,
    /// never reassigned.
    pub parent: Option<SpaceId>,
    /// Current lifecycle state.
    pub state: SpaceState,
    /// Local binding store.
    pub store: Store,
    /// Threads owned by this space (live and terminated).
    pub threads: Vec<ThreadId>,
    /// Child spaces, in creation order. Disposed children stay listed so
    /// that grandchildren remain reachable for subtree traversal.
    pub children: Vec<SpaceId>,
    /// The active distributor, if `choose` installed one.
    pub distributor: Option<Box<dyn Distributor>>,
    /// The root variable handed to the space's root thread.
    pub root_var: VarId,
    /// Monotonic creation number, for debugging and reification.
    pub serial: u64,
    /// Cached result of the last quiescence computation.
    pub(crate) quiescent: bool,
    /// Set by the thread-transition hook; forces a recomputation.
    pub(crate) dirty: bool,
}

impl SpaceRecord {
    /// Creates a new runnable space record.
    #[must_use]
    pub fn new(id: SpaceId, parent: Option<SpaceId>, root_var: VarId, serial: u64) -> Self {
        Self {
            id,
            parent,
            state: SpaceState::Runnable,
            store: Store::new(),
            threads: Vec::new(),
            children: Vec::new(),
            distributor: None,
            root_var,
            serial,
            quiescent: false,
            dirty: true,
        }
    }

    /// Returns true for the top-level space.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Adds a child space.
    pub fn add_child(&mut self, child: SpaceId) {
        self.children.push(child);
    }

    /// Adds an owned thread.
    pub fn add_thread(&mut self, thread: ThreadId) {
        self.threads.push(thread);
    }

    /// Runnable → Stable. Returns true if the state changed.
    pub fn mark_stable(&mut self) -> bool {
        if self.state == SpaceState::Runnable {
            self.state = SpaceState::Stable;
            true
        } else {
            false
        }
    }

    /// Stable → Runnable, after `commit` or after an ancestor binding
    /// woke one of the space's threads. Returns true if the state changed.
    pub fn reopen(&mut self) -> bool {
        if self.state == SpaceState::Stable {
            self.state = SpaceState::Runnable;
            self.quiescent = false;
            self.dirty = true;
            true
        } else {
            false
        }
    }

    /// Transition to Failed. Returns true if the state changed.
    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            false
        } else {
            self.state = SpaceState::Failed;
            self.distributor = None;
            self.store.clear();
            true
        }
    }

    /// Stable → Merged. Returns true if the state changed.
    pub fn dispose_merged(&mut self) -> bool {
        if self.state == SpaceState::Stable {
            self.state = SpaceState::Merged;
            self.distributor = None;
            true
        } else {
            false
        }
    }

    /// Any live state → Killed. Returns true if the state changed.
    pub fn dispose_killed(&mut self) -> bool {
        if self.state.is_disposed() {
            false
        } else {
            self.state = SpaceState::Killed;
            self.distributor = None;
            self.store.clear();
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SpaceRecord {
        SpaceRecord::new(
            SpaceId::new_for_test(1, 0),
            Some(SpaceId::new_for_test(0, 0)),
            VarId::new_for_test(0, 0),
            1,
        )
    }

    #[test]
    fn state_predicates() {
        assert!(!SpaceState::Runnable.is_resolved());
        assert!(SpaceState::Stable.is_resolved());
        assert!(SpaceState::Failed.is_resolved());

        assert!(SpaceState::Merged.is_disposed());
        assert!(SpaceState::Killed.is_disposed());
        assert!(!SpaceState::Failed.is_disposed());

        assert!(SpaceState::Failed.is_terminal());
        assert!(!SpaceState::Stable.is_terminal());
    }

    #[test]
    fn stability_cycle() {
        let mut space = record();
        assert!(space.mark_stable());
        assert_eq!(space.state, SpaceState::Stable);

        // commit reopens the space
        assert!(space.reopen());
        assert_eq!(space.state, SpaceState::Runnable);
        assert!(space.dirty);

        // can't reopen a runnable space
        assert!(!space.reopen());
    }

    #[test]
    fn failed_absorbs_everything_but_kill() {
        let mut space = record();
        assert!(space.fail());
        assert!(!space.fail());
        assert!(!space.mark_stable());
        assert!(!space.dispose_merged());

        // a failed space can still be discarded
        assert!(space.dispose_killed());
        assert_eq!(space.state, SpaceState::Killed);
    }

    #[test]
    fn merge_requires_stable() {
        let mut space = record();
        assert!(!space.dispose_merged());
        space.mark_stable();
        assert!(space.dispose_merged());
        assert!(space.state.is_disposed());
    }

    #[test]
    fn kill_from_any_live_state() {
        let mut space = record();
        assert!(space.dispose_killed());
        assert!(!space.dispose_killed());
        assert_eq!(space.state, SpaceState::Killed);
    }

    #[test]
    fn top_level_has_no_parent() {
        let top = SpaceRecord::new(
            SpaceId::new_for_test(0, 0),
            None,
            VarId::new_for_test(0, 0),
            0,
        );
        assert!(top.is_top_level());
        assert!(!record().is_top_level());
    }
}
