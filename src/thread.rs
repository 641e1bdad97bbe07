//! Thread records and the pluggable thread-body contract.
//!
//! The engine does not interpret bytecode; a thread's computation is a
//! resumable state machine implementing [`ThreadBody`]. Bodies never hold
//! raw [`VarId`]s or [`SpaceId`]s; they address variables and child
//! spaces through per-thread register files ([`Reg`], [`SpaceReg`]) kept
//! in the [`ThreadRecord`]. That indirection is what lets `clone` remap a
//! copied thread's references without inspecting the body.

use core::fmt;

use smallvec::SmallVec;

use crate::engine::ThreadCx;
use crate::types::{SpaceId, ThreadId, VarId};

/// Index into a thread's variable register file.
pub type Reg = usize;

/// Index into a thread's space-handle register file.
pub type SpaceReg = usize;

/// What a thread waits for while blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Blocked until the variable becomes resolvable from the thread's
    /// space view.
    Var(VarId),
    /// Blocked until the space reaches a resolved state (stable, failed,
    /// or disposed).
    SpaceResolved(SpaceId),
}

/// The scheduling state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Schedulable; in or headed for the run queue.
    Runnable,
    /// Suspended on a wait condition.
    Blocked(WaitCondition),
    /// Ran to completion.
    Terminated,
    /// Forcibly terminated by `kill` or a space failure.
    Killed,
}

impl ThreadState {
    /// Returns true if the thread can still make progress.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Runnable | Self::Blocked(_))
    }

    /// Returns true if the thread counts toward quiescence.
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        !matches!(self, Self::Runnable)
    }
}

/// The result of resuming a thread body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Cooperative yield; reschedule at the back of the run queue.
    Yield,
    /// Block until the variable in this register is resolvable.
    Wait(Reg),
    /// Block until the space in this register is resolved.
    WaitSpace(SpaceReg),
    /// The computation is finished.
    Done,
}

/// A resumable computation run by the scheduler.
///
/// Implementations are plain data state machines: each `resume` performs
/// some work through the capability context and reports how to proceed.
/// `clone_box` supports the deep-copy `clone` operation: a body must
/// duplicate into an independent machine in the same phase.
pub trait ThreadBody: fmt::Debug {
    /// Resumes the computation.
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step;

    /// Clones the body into an independent boxed copy.
    fn clone_box(&self) -> Box<dyn ThreadBody>;
}

impl Clone for Box<dyn ThreadBody> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Internal record for one thread.
#[derive(Debug)]
pub struct ThreadRecord {
    /// Unique identifier.
    pub id: ThreadId,
    /// The space that owns this thread. Threads never migrate.
    pub owner: SpaceId,
    /// Current scheduling state.
    pub state: ThreadState,
    /// Variable register file. Register 0 of a root thread holds the
    /// space's root variable.
    pub regs: SmallVec<[VarId; 4]>,
    /// Space-handle register file for child spaces created by this thread.
    pub space_regs: SmallVec<[SpaceId; 2]>,
    /// The body, absent while the scheduler has it checked out for a
    /// resume, and permanently absent once the thread is terminated.
    pub body: Option<Box<dyn ThreadBody>>,
}

impl ThreadRecord {
    /// Creates a runnable thread record.
    #[must_use]
    pub fn new(id: ThreadId, owner: SpaceId, body: Box<dyn ThreadBody>) -> Self {
        Self {
            id,
            owner,
            state: ThreadState::Runnable,
            regs: SmallVec::new(),
            space_regs: SmallVec::new(),
            body: Some(body),
        }
    }

    /// Marks the thread terminated and drops its body.
    pub fn terminate(&mut self) {
        self.state = ThreadState::Terminated;
        self.body = None;
    }

    /// Marks the thread killed and drops its body.
    pub fn kill(&mut self) {
        self.state = ThreadState::Killed;
        self.body = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Noop;

    impl ThreadBody for Noop {
        fn resume(&mut self, _cx: &mut ThreadCx<'_>) -> Step {
            Step::Done
        }

        fn clone_box(&self) -> Box<dyn ThreadBody> {
            Box::new(self.clone())
        }
    }

    fn record() -> ThreadRecord {
        ThreadRecord::new(
            ThreadId::new_for_test(0, 0),
            SpaceId::new_for_test(0, 0),
            Box::new(Noop),
        )
    }

    #[test]
    fn new_thread_is_runnable_with_empty_registers() {
        let t = record();
        assert_eq!(t.state, ThreadState::Runnable);
        assert!(t.regs.is_empty());
        assert!(t.space_regs.is_empty());
        assert!(t.body.is_some());
    }

    #[test]
    fn state_predicates() {
        let blocked = ThreadState::Blocked(WaitCondition::Var(VarId::new_for_test(1, 0)));
        assert!(blocked.is_live());
        assert!(blocked.is_quiet());

        assert!(ThreadState::Runnable.is_live());
        assert!(!ThreadState::Runnable.is_quiet());

        assert!(!ThreadState::Terminated.is_live());
        assert!(ThreadState::Killed.is_quiet());
    }

    #[test]
    fn terminate_drops_body() {
        let mut t = record();
        t.terminate();
        assert_eq!(t.state, ThreadState::Terminated);
        assert!(t.body.is_none());
    }

    #[test]
    fn kill_drops_body() {
        let mut t = record();
        t.kill();
        assert_eq!(t.state, ThreadState::Killed);
        assert!(t.body.is_none());
    }
}
