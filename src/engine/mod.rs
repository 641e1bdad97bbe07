//! The space engine: arenas, scheduler, stability protocol and the
//! cross-space operation surface.
//!
//! The engine owns every space, thread and variable in one computation.
//! Threads are multiplexed cooperatively over a FIFO run queue and the
//! whole engine is deterministic: the same program produces the same
//! schedule, the same trace and the same outcomes on every run.
//!
//! Cross-space operations that the language defines as *blocking the
//! calling thread until stability* (`ask`, `askVerbose`, `merge`,
//! `commit`, `kill`, `clone`) are realized here by driving the scheduler
//! until the target subtree is quiescent, then applying the operation.
//! Code running *inside* a space uses the non-driving variants through
//! [`ThreadCx`] and suspends itself with [`Step::WaitSpace`] instead.

mod clone;

use std::collections::{HashMap, VecDeque};

use smallvec::SmallVec;

use crate::distributor::ChooseDistributor;
use crate::error::{ContextError, Result, SpaceError, UsageError};
use crate::space::{SpaceRecord, SpaceState};
use crate::store::Value;
use crate::thread::{Reg, SpaceReg, Step, ThreadBody, ThreadRecord, ThreadState, WaitCondition};
use crate::trace::{TraceBuffer, TraceData, TraceEvent, TraceEventKind};
use crate::types::{AskOutcome, SpaceId, ThreadId, VarId, VerboseOutcome};
use crate::util::Arena;

/// Tunables for one engine instance.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Total scheduler step budget. Exceeding it turns a livelocked
    /// program into a [`SpaceError::Stalled`] instead of a hang.
    pub max_steps: u64,
    /// Capacity of the trace ring buffer.
    pub trace_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            trace_capacity: 1024,
        }
    }
}

/// Record for one store variable: who owns it.
///
/// Ownership decides the clone boundary: variables owned by a cloned
/// subtree are duplicated, all others are aliased.
#[derive(Debug)]
pub(crate) struct VarRecord {
    pub(crate) owner: SpaceId,
}

/// The computation-space engine.
#[derive(Debug)]
pub struct SpaceEngine {
    pub(crate) spaces: Arena<SpaceRecord>,
    pub(crate) threads: Arena<ThreadRecord>,
    pub(crate) vars: Arena<VarRecord>,
    run_queue: VecDeque<ThreadId>,
    var_waiters: HashMap<VarId, SmallVec<[ThreadId; 2]>>,
    space_waiters: HashMap<SpaceId, SmallVec<[ThreadId; 2]>>,
    top: SpaceId,
    trace: TraceBuffer,
    seq: u64,
    steps: u64,
    pub(crate) next_serial: u64,
    config: EngineConfig,
}

impl Default for SpaceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceEngine {
    /// Creates an engine with a fresh top-level space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let mut spaces = Arena::new();
        let mut vars = Arena::new();

        // The space record and its root variable point at each other;
        // seed the record with a stand-in id and patch it right after.
        let top_idx = spaces.insert_with(|idx| {
            SpaceRecord::new(SpaceId::from_arena(idx), None, VarId::from_arena(idx), 0)
        });
        let top = SpaceId::from_arena(top_idx);
        let root_var = VarId::from_arena(vars.insert(VarRecord { owner: top }));
        spaces
            .get_mut(top_idx)
            .expect("top-level space just inserted")
            .root_var = root_var;

        Self {
            spaces,
            threads: Arena::new(),
            vars,
            run_queue: VecDeque::new(),
            var_waiters: HashMap::new(),
            space_waiters: HashMap::new(),
            top,
            trace: TraceBuffer::new(config.trace_capacity),
            seq: 0,
            steps: 0,
            next_serial: 1,
            config,
        }
    }

    /// The top-level space. Never a legal target of the cross-space
    /// operations.
    #[must_use]
    pub const fn top(&self) -> SpaceId {
        self.top
    }

    /// Total scheduler steps executed so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// The trace of lifecycle events.
    #[must_use]
    pub const fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    /// Returns true if `id` names a space known to this engine, live or
    /// already disposed. This is the `Space.is` test of the host surface.
    #[must_use]
    pub fn is_space(&self, id: SpaceId) -> bool {
        self.spaces.contains(id.0)
    }

    /// The lifecycle state of a space, if the handle is known.
    #[must_use]
    pub fn state_of(&self, id: SpaceId) -> Option<SpaceState> {
        self.spaces.get(id.0).map(|rec| rec.state)
    }

    /// The arity of the installed distributor, if any.
    #[must_use]
    pub fn distributor_arity(&self, id: SpaceId) -> Option<u32> {
        self.spaces
            .get(id.0)?
            .distributor
            .as_ref()
            .map(|d| d.arity())
    }

    /// The root variable handed to a space's root thread.
    pub fn root_var(&self, id: SpaceId) -> Result<VarId> {
        Ok(self.space(id)?.root_var)
    }

    /// The scheduling state of a thread, if known.
    #[must_use]
    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        self.threads.get(id.0).map(|rec| rec.state)
    }

    /// Resolves `var` from `space`'s view: local store first, then the
    /// ancestor chain, following variable links. Returns `None` while the
    /// variable is unbound from that view.
    #[must_use]
    pub fn read_value(&self, space: SpaceId, var: VarId) -> Option<Value> {
        let target = self.deref(space, var);
        self.lookup(space, target).cloned()
    }

    // ------------------------------------------------------------------
    // Space creation and thread spawning
    // ------------------------------------------------------------------

    /// `new`: creates a child space of `parent` whose root thread runs
    /// `body` with the fresh root variable in register 0.
    ///
    /// The child starts executing concurrently; nothing is observable
    /// until it stabilizes and is asked.
    pub fn new_space(&mut self, parent: SpaceId, body: Box<dyn ThreadBody>) -> Result<SpaceId> {
        self.live_space(parent)?;

        let serial = self.next_serial;
        self.next_serial += 1;
        // Allocate the root variable first, then reassign its owner to
        // the space created around it.
        let root_var = self.alloc_var(parent);
        let idx = self.spaces.insert_with(|idx| {
            SpaceRecord::new(SpaceId::from_arena(idx), Some(parent), root_var, serial)
        });
        let id = SpaceId::from_arena(idx);
        if let Some(var) = self.vars.get_mut(root_var.0) {
            var.owner = id;
        }
        if let Some(parent_rec) = self.spaces.get_mut(parent.0) {
            parent_rec.add_child(id);
        }

        self.push_event(
            TraceEventKind::SpaceCreated,
            TraceData::Space {
                space: id,
                parent: Some(parent),
            },
        );
        tracing::debug!(space = %id, parent = %parent, "created space");

        let mut regs = SmallVec::new();
        regs.push(root_var);
        self.insert_thread(id, body, regs);
        Ok(id)
    }

    /// Spawns a thread into a live space with an empty register file.
    pub fn spawn_thread(&mut self, space: SpaceId, body: Box<dyn ThreadBody>) -> Result<ThreadId> {
        let rec = self.live_space(space)?;
        if rec.state == SpaceState::Failed {
            return Err(UsageError::SpaceFailed.into());
        }
        Ok(self.insert_thread(space, body, SmallVec::new()))
    }

    fn insert_thread(
        &mut self,
        space: SpaceId,
        body: Box<dyn ThreadBody>,
        regs: SmallVec<[VarId; 4]>,
    ) -> ThreadId {
        let idx = self.threads.insert_with(|idx| {
            let mut rec = ThreadRecord::new(ThreadId::from_arena(idx), space, body);
            rec.regs = regs;
            rec
        });
        let id = ThreadId::from_arena(idx);
        if let Some(rec) = self.spaces.get_mut(space.0) {
            rec.add_thread(id);
        }
        self.run_queue.push_back(id);
        self.unsettle_up(space);
        self.push_event(
            TraceEventKind::ThreadSpawned,
            TraceData::Thread { thread: id, space },
        );
        id
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Executes one scheduler step. Returns false when the run queue is
    /// empty.
    pub fn step(&mut self) -> bool {
        let Some(tid) = self.run_queue.pop_front() else {
            return false;
        };

        // Queue entries can go stale: the thread may have been woken and
        // re-blocked, or its space killed, since it was enqueued.
        let (space, body) = {
            let Some(rec) = self.threads.get_mut(tid.0) else {
                return true;
            };
            if rec.state != ThreadState::Runnable {
                return true;
            }
            let Some(body) = rec.body.take() else {
                return true;
            };
            (rec.owner, body)
        };

        let alive = self
            .spaces
            .get(space.0)
            .is_some_and(|s| matches!(s.state, SpaceState::Runnable | SpaceState::Stable));
        if !alive {
            if let Some(rec) = self.threads.get_mut(tid.0) {
                rec.kill();
            }
            self.note_quiet_up(space);
            return true;
        }

        self.steps += 1;
        let mut body = body;
        let step = body.resume(&mut ThreadCx {
            engine: self,
            space,
            thread: tid,
        });
        self.settle_thread(tid, space, body, step);
        true
    }

    /// Applies the step result of a resumed body.
    fn settle_thread(
        &mut self,
        tid: ThreadId,
        space: SpaceId,
        body: Box<dyn ThreadBody>,
        step: Step,
    ) {
        let (state, wait_var, wait_space) = {
            let Some(rec) = self.threads.get_mut(tid.0) else {
                return;
            };
            // The resume itself may have terminated the thread (a space
            // failure kills all owned threads). The body stays dropped.
            if matches!(rec.state, ThreadState::Killed | ThreadState::Terminated) {
                return;
            }
            match step {
                Step::Yield => {
                    rec.body = Some(body);
                    (ThreadState::Runnable, None, None)
                }
                Step::Done => {
                    rec.terminate();
                    (ThreadState::Terminated, None, None)
                }
                Step::Wait(reg) => match rec.regs.get(reg).copied() {
                    Some(var) => {
                        rec.body = Some(body);
                        (ThreadState::Runnable, Some(var), None)
                    }
                    // Waiting on a register that was never written: the
                    // body is defective, retire it.
                    None => {
                        rec.terminate();
                        (ThreadState::Terminated, None, None)
                    }
                },
                Step::WaitSpace(sreg) => match rec.space_regs.get(sreg).copied() {
                    Some(child) => {
                        rec.body = Some(body);
                        (ThreadState::Runnable, None, Some(child))
                    }
                    None => {
                        rec.terminate();
                        (ThreadState::Terminated, None, None)
                    }
                },
            }
        };

        if state == ThreadState::Terminated {
            self.push_event(
                TraceEventKind::ThreadTerminated,
                TraceData::Thread { thread: tid, space },
            );
            self.note_quiet_up(space);
            return;
        }

        if let Some(var) = wait_var {
            let target = self.deref(space, var);
            if self.lookup(space, target).is_some() {
                // Already decided; spurious wait, reschedule.
                self.run_queue.push_back(tid);
            } else {
                self.block_thread(tid, space, WaitCondition::Var(target));
            }
            return;
        }

        if let Some(child) = wait_space {
            let resolved = self
                .spaces
                .get(child.0)
                .is_none_or(|c| c.state.is_resolved());
            if resolved {
                self.run_queue.push_back(tid);
            } else {
                self.block_thread(tid, space, WaitCondition::SpaceResolved(child));
            }
            return;
        }

        // Cooperative yield.
        self.run_queue.push_back(tid);
    }

    fn block_thread(&mut self, tid: ThreadId, space: SpaceId, condition: WaitCondition) {
        if let Some(rec) = self.threads.get_mut(tid.0) {
            rec.state = ThreadState::Blocked(condition);
        }
        match condition {
            WaitCondition::Var(var) => self.var_waiters.entry(var).or_default().push(tid),
            WaitCondition::SpaceResolved(target) => {
                self.space_waiters.entry(target).or_default().push(tid);
            }
        }
        self.push_event(
            TraceEventKind::ThreadBlocked,
            TraceData::Thread { thread: tid, space },
        );
        self.note_quiet_up(space);
    }

    /// Runs until the run queue drains and no further space stabilizes.
    /// Returns the number of steps executed. This is how a host drives
    /// top-level threads that are not under any `ask`.
    pub fn run(&mut self) -> u64 {
        let start = self.steps;
        loop {
            while self.step() {}
            let children: Vec<SpaceId> = self
                .spaces
                .get(self.top.0)
                .map(|rec| rec.children.clone())
                .unwrap_or_default();
            for child in children {
                self.refresh_stability(child);
            }
            if self.run_queue.is_empty() {
                return self.steps - start;
            }
        }
    }

    /// Drives the scheduler until `target` is resolved (stable, failed or
    /// disposed), the embedding of the blocking cross-space calls.
    fn run_until_stable(&mut self, target: SpaceId) -> Result<()> {
        loop {
            self.refresh_stability(target);
            if self.space(target)?.state.is_resolved() {
                return Ok(());
            }
            if self.steps >= self.config.max_steps || !self.step() {
                return Err(SpaceError::Stalled { steps: self.steps });
            }
        }
    }

    // ------------------------------------------------------------------
    // Stability protocol
    // ------------------------------------------------------------------

    /// Recomputes quiescence for the subtree rooted at `sid`, promoting
    /// Runnable-but-quiescent spaces to Stable and waking their stability
    /// observers. Returns true if the subtree is quiescent.
    ///
    /// A space is stable exactly when every thread it transitively owns
    /// is blocked or terminated; a blocked thread can only be released
    /// by a binding that, from where it sits, must come from an ancestor.
    pub(crate) fn refresh_stability(&mut self, sid: SpaceId) -> bool {
        let Some(rec) = self.spaces.get(sid.0) else {
            return true;
        };
        match rec.state {
            SpaceState::Failed
            | SpaceState::Merged
            | SpaceState::Killed
            | SpaceState::Stable => return true,
            SpaceState::Runnable => {}
        }
        if !rec.dirty {
            return rec.quiescent;
        }

        let children = rec.children.clone();
        let mut quiet = true;
        for child in children {
            quiet &= self.refresh_stability(child);
        }

        // Children first: a child stabilizing wakes any of our threads
        // blocked on it, and that must count against our own quiescence.
        if let Some(rec) = self.spaces.get(sid.0) {
            let own_quiet = rec.threads.iter().all(|tid| {
                self.threads
                    .get(tid.0)
                    .is_none_or(|t| t.state.is_quiet())
            });
            quiet &= own_quiet;
        }

        let became_stable = {
            let Some(rec) = self.spaces.get_mut(sid.0) else {
                return true;
            };
            rec.quiescent = quiet;
            rec.dirty = false;
            quiet && rec.mark_stable()
        };

        if became_stable {
            self.push_event(
                TraceEventKind::SpaceStable,
                TraceData::Space {
                    space: sid,
                    parent: self.spaces.get(sid.0).and_then(|r| r.parent),
                },
            );
            tracing::debug!(space = %sid, "space became stable");
            self.wake_space_waiters(sid);
        }
        quiet
    }

    /// Hook run when a thread of `space` blocks or terminates: the
    /// subtree may now be quiescent, so cached stability is invalidated
    /// up the ancestor chain.
    fn note_quiet_up(&mut self, space: SpaceId) {
        let mut cursor = Some(space);
        while let Some(id) = cursor {
            let Some(rec) = self.spaces.get_mut(id.0) else {
                break;
            };
            rec.dirty = true;
            cursor = rec.parent;
        }
    }

    /// Hook run when a thread of `space` becomes runnable: every stable
    /// ancestor reopens, since its subtree is active again.
    fn unsettle_up(&mut self, space: SpaceId) {
        let mut cursor = Some(space);
        while let Some(id) = cursor {
            let Some(rec) = self.spaces.get_mut(id.0) else {
                break;
            };
            rec.reopen();
            rec.dirty = true;
            rec.quiescent = false;
            cursor = rec.parent;
        }
    }

    fn wake_thread(&mut self, tid: ThreadId) {
        let owner = {
            let Some(rec) = self.threads.get_mut(tid.0) else {
                return;
            };
            if !matches!(rec.state, ThreadState::Blocked(_)) {
                return;
            }
            rec.state = ThreadState::Runnable;
            rec.owner
        };
        self.run_queue.push_back(tid);
        self.unsettle_up(owner);
    }

    fn wake_var_waiters(&mut self, var: VarId) {
        let Some(waiters) = self.var_waiters.remove(&var) else {
            return;
        };
        for tid in waiters {
            self.wake_thread(tid);
        }
    }

    fn wake_space_waiters(&mut self, space: SpaceId) {
        let Some(waiters) = self.space_waiters.remove(&space) else {
            return;
        };
        for tid in waiters {
            self.wake_thread(tid);
        }
    }

    // ------------------------------------------------------------------
    // Store access
    // ------------------------------------------------------------------

    pub(crate) fn alloc_var(&mut self, owner: SpaceId) -> VarId {
        VarId::from_arena(self.vars.insert(VarRecord { owner }))
    }

    /// Looks up the binding of `var` along the ancestor chain of `space`.
    fn lookup(&self, space: SpaceId, var: VarId) -> Option<&Value> {
        let mut cursor = Some(space);
        while let Some(id) = cursor {
            let rec = self.spaces.get(id.0)?;
            if let Some(value) = rec.store.get(var) {
                return Some(value);
            }
            cursor = rec.parent;
        }
        None
    }

    /// Follows variable links to the representative variable of `var`
    /// from `space`'s view.
    fn deref(&self, space: SpaceId, var: VarId) -> VarId {
        let mut current = var;
        loop {
            match self.lookup(space, current) {
                Some(Value::Var(next)) => current = *next,
                _ => return current,
            }
        }
    }

    /// Resolves one level: variables become their bound value or their
    /// representative; other values pass through.
    fn shallow_resolve(&self, space: SpaceId, value: &Value) -> Value {
        if let Value::Var(var) = value {
            let target = self.deref(space, *var);
            match self.lookup(space, target) {
                Some(bound) => bound.clone(),
                None => Value::Var(target),
            }
        } else {
            value.clone()
        }
    }

    /// Structural equality under resolution from `space`'s view.
    ///
    /// Two unbound variables are equal only if they are the same
    /// variable; an unbound variable never equals a bound value. This is
    /// single-assignment telling, not full unification.
    fn values_equal(&self, space: SpaceId, a: &Value, b: &Value) -> bool {
        match (self.shallow_resolve(space, a), self.shallow_resolve(space, b)) {
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Atom(x), Value::Atom(y)) => x == y,
            (Value::Var(x), Value::Var(y)) => x == y,
            (Value::Tuple(la, fa), Value::Tuple(lb, fb)) => {
                la == lb
                    && fa.len() == fb.len()
                    && fa
                        .iter()
                        .zip(fb.iter())
                        .all(|(x, y)| self.values_equal(space, x, y))
            }
            _ => false,
        }
    }

    /// Tells `var = value` in `space`'s local store.
    ///
    /// Returns true on success or when the binding was already entailed.
    /// On conflict the space fails and false is returned; the conflict is
    /// an outcome, not an error.
    pub(crate) fn bind_in_space(&mut self, space: SpaceId, var: VarId, value: Value) -> bool {
        let target = self.deref(space, var);
        let value = match value {
            Value::Var(other) => {
                let other = self.deref(space, other);
                if other == target {
                    return true;
                }
                Value::Var(other)
            }
            other => other,
        };

        if let Some(existing) = self.lookup(space, target).cloned() {
            if self.values_equal(space, &existing, &value) {
                true
            } else {
                tracing::debug!(space = %space, var = %target, "binding conflict");
                self.fail_space(space);
                false
            }
        } else {
            if let Some(rec) = self.spaces.get_mut(space.0) {
                rec.store.insert(target, value);
            }
            self.wake_var_waiters(target);
            true
        }
    }

    /// Fails `space`: its store is inconsistent. Every thread it
    /// transitively owns is discarded and its descendants are killed.
    fn fail_space(&mut self, space: SpaceId) {
        let subtree = self.collect_subtree(space);
        for &sid in &subtree {
            let threads = {
                let Some(rec) = self.spaces.get_mut(sid.0) else {
                    continue;
                };
                if sid == space {
                    rec.fail();
                } else {
                    rec.dispose_killed();
                }
                rec.threads.clone()
            };
            for tid in threads {
                if let Some(t) = self.threads.get_mut(tid.0) {
                    if t.state.is_live() {
                        t.kill();
                    }
                }
            }
        }
        self.push_event(
            TraceEventKind::SpaceFailed,
            TraceData::Space {
                space,
                parent: self.spaces.get(space.0).and_then(|r| r.parent),
            },
        );
        tracing::debug!(space = %space, "space failed");
        for sid in subtree {
            self.wake_space_waiters(sid);
        }
        self.note_quiet_up(space);
    }

    /// All non-disposed spaces in the subtree rooted at `root`,
    /// traversing through disposed records so grandchildren stay
    /// reachable.
    pub(crate) fn collect_subtree(&self, root: SpaceId) -> Vec<SpaceId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(rec) = self.spaces.get(id.0) else {
                continue;
            };
            stack.extend(rec.children.iter().copied());
            if !rec.state.is_disposed() {
                out.push(id);
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Cross-space operations
    // ------------------------------------------------------------------

    fn space(&self, id: SpaceId) -> Result<&SpaceRecord> {
        self.spaces
            .get(id.0)
            .ok_or_else(|| UsageError::UnknownSpace.into())
    }

    fn live_space(&self, id: SpaceId) -> Result<&SpaceRecord> {
        let rec = self.space(id)?;
        if rec.state.is_disposed() {
            Err(UsageError::Disposed.into())
        } else {
            Ok(rec)
        }
    }

    /// Guards a cross-space operation: known handle, not the top-level
    /// space, not already disposed.
    fn check_target(&self, id: SpaceId) -> Result<()> {
        let rec = self.space(id)?;
        if rec.is_top_level() {
            return Err(UsageError::TopLevel.into());
        }
        if rec.state.is_disposed() {
            return Err(UsageError::Disposed.into());
        }
        Ok(())
    }

    /// `ask`: blocks until the space is stable, then reports its outcome.
    /// Idempotent while nothing commits into the space.
    pub fn ask(&mut self, space: SpaceId) -> Result<AskOutcome> {
        self.check_target(space)?;
        self.run_until_stable(space)?;
        self.outcome_of(space)
    }

    /// `askVerbose`: `ask` plus the list of variables the space newly
    /// entailed relative to the parent's view, in binding order.
    pub fn ask_verbose(&mut self, space: SpaceId) -> Result<VerboseOutcome> {
        self.check_target(space)?;
        self.run_until_stable(space)?;
        let outcome = self.outcome_of(space)?;
        let entailed = if outcome.is_failed() {
            Vec::new()
        } else {
            self.space(space)?.store.entailed().to_vec()
        };
        Ok(VerboseOutcome { outcome, entailed })
    }

    /// Classifies a resolved space.
    pub(crate) fn outcome_of(&self, space: SpaceId) -> Result<AskOutcome> {
        let rec = self.space(space)?;
        match rec.state {
            SpaceState::Failed => Ok(AskOutcome::Failed),
            SpaceState::Stable => Ok(match rec.distributor.as_ref() {
                Some(d) => AskOutcome::Alternatives(d.arity()),
                None => AskOutcome::Succeeded,
            }),
            SpaceState::Runnable => Err(UsageError::NotStable.into()),
            SpaceState::Merged | SpaceState::Killed => Err(UsageError::Disposed.into()),
        }
    }

    /// `merge`: blocks until stable, then atomically propagates every
    /// local binding into the parent store and disposes the space.
    ///
    /// Only a `Succeeded` space may be merged. A binding that contradicts
    /// the parent store fails the *parent*, since it is the parent's store
    /// that became inconsistent.
    pub fn merge(&mut self, space: SpaceId) -> Result<()> {
        self.check_target(space)?;
        self.run_until_stable(space)?;
        self.merge_stable(space)
    }

    pub(crate) fn merge_stable(&mut self, space: SpaceId) -> Result<()> {
        match self.outcome_of(space)? {
            AskOutcome::Failed => Err(UsageError::MergeFailed.into()),
            AskOutcome::Alternatives(_) => Err(UsageError::MergeAlternatives.into()),
            AskOutcome::Succeeded => {
                let parent = self
                    .space(space)?
                    .parent
                    .ok_or(UsageError::TopLevel)?;
                let bindings = {
                    let Some(rec) = self.spaces.get_mut(space.0) else {
                        return Err(UsageError::UnknownSpace.into());
                    };
                    let bindings = rec.store.drain_in_order();
                    rec.dispose_merged();
                    bindings
                };
                self.push_event(
                    TraceEventKind::Merged,
                    TraceData::Space {
                        space,
                        parent: Some(parent),
                    },
                );
                tracing::debug!(space = %space, parent = %parent, "merged space");
                for (var, value) in bindings {
                    if !self.bind_in_space(parent, var, value) {
                        break;
                    }
                }
                self.wake_space_waiters(space);
                Ok(())
            }
        }
    }

    /// `commit`: blocks until stable, then applies alternative `selector`
    /// (1-based) of the installed distributor and resumes the space.
    pub fn commit(&mut self, space: SpaceId, selector: u32) -> Result<()> {
        self.check_target(space)?;
        self.run_until_stable(space)?;
        self.commit_stable(space, selector)
    }

    pub(crate) fn commit_stable(&mut self, space: SpaceId, selector: u32) -> Result<()> {
        {
            let rec = self.space(space)?;
            match rec.state {
                SpaceState::Stable => {}
                SpaceState::Runnable => return Err(UsageError::NotStable.into()),
                SpaceState::Failed => return Err(UsageError::NotAlternatives.into()),
                SpaceState::Merged | SpaceState::Killed => {
                    return Err(UsageError::Disposed.into());
                }
            }
            let Some(d) = rec.distributor.as_ref() else {
                return Err(UsageError::NotAlternatives.into());
            };
            let arity = d.arity();
            if selector == 0 || selector > arity {
                return Err(UsageError::SelectorOutOfRange { selector, arity }.into());
            }
        }

        let Some(distributor) = self
            .spaces
            .get_mut(space.0)
            .and_then(|rec| rec.distributor.take())
        else {
            return Err(UsageError::NotAlternatives.into());
        };

        self.push_event(
            TraceEventKind::Committed,
            TraceData::Commit { space, selector },
        );
        tracing::debug!(space = %space, selector, "committed alternative");

        // The bindings land before any thread of the space runs again:
        // the space reopens only after the whole effect is applied.
        for (var, value) in distributor.commit(selector) {
            if !self.bind_in_space(space, var, value) {
                return Ok(());
            }
        }
        if let Some(rec) = self.spaces.get_mut(space.0) {
            rec.reopen();
        }
        self.unsettle_up(space);
        Ok(())
    }

    /// `kill`: blocks until stable, then forcibly terminates every thread
    /// the space transitively owns, discards its store and distributor,
    /// and disposes the subtree. Nothing propagates to the parent.
    ///
    /// Killing an already-disposed handle is a usage error, not a no-op.
    pub fn kill(&mut self, space: SpaceId) -> Result<()> {
        self.check_target(space)?;
        self.run_until_stable(space)?;
        self.kill_resolved(space)
    }

    pub(crate) fn kill_resolved(&mut self, space: SpaceId) -> Result<()> {
        let subtree = self.collect_subtree(space);
        for &sid in &subtree {
            let threads = {
                let Some(rec) = self.spaces.get_mut(sid.0) else {
                    continue;
                };
                rec.dispose_killed();
                rec.threads.clone()
            };
            for tid in threads {
                if let Some(t) = self.threads.get_mut(tid.0) {
                    if t.state.is_live() {
                        t.kill();
                    }
                }
            }
        }
        self.push_event(
            TraceEventKind::Killed,
            TraceData::Space {
                space,
                parent: self.spaces.get(space.0).and_then(|r| r.parent),
            },
        );
        tracing::debug!(space = %space, "killed space");
        for sid in subtree {
            self.wake_space_waiters(sid);
        }
        self.note_quiet_up(space);
        Ok(())
    }

    /// `clone`: blocks until stable, then deep-copies the subtree. The
    /// copy algorithm lives in `engine/clone.rs`.
    pub fn clone_space(&mut self, space: SpaceId) -> Result<SpaceId> {
        self.check_target(space)?;
        self.run_until_stable(space)?;
        self.clone_stable(space)
    }

    /// Installs a distributor created by `choose(n)` on `space`.
    ///
    /// At top level this degrades to a fresh placeholder variable that no
    /// commit can ever bind, since no ancestor exists to resolve the
    /// choice.
    pub(crate) fn install_choose(&mut self, space: SpaceId, n: u32) -> Result<VarId> {
        if n == 0 {
            return Err(UsageError::NoAlternatives.into());
        }
        let rec = self.space(space)?;
        if rec.is_top_level() {
            return Ok(self.alloc_var(space));
        }
        // A choice made after the space resolved can never be committed.
        if rec.state.is_terminal() {
            return Err(ContextError::NoResolvingAncestor.into());
        }
        if rec.distributor.is_some() {
            return Err(UsageError::DistributorInstalled.into());
        }
        let var = self.alloc_var(space);
        if let Some(rec) = self.spaces.get_mut(space.0) {
            rec.distributor = Some(Box::new(ChooseDistributor::new(var, n)));
        }
        self.push_event(
            TraceEventKind::DistributorInstalled,
            TraceData::Distributor { space, arity: n },
        );
        tracing::debug!(space = %space, arity = n, "installed distributor");
        Ok(var)
    }

    pub(crate) fn push_event(&mut self, kind: TraceEventKind, data: TraceData) {
        let seq = self.seq;
        self.seq += 1;
        self.trace.push(TraceEvent::new(seq, kind, data));
    }
}

/// Capability context handed to a thread body while it is resumed.
///
/// All effects of a body flow through this context: telling bindings,
/// allocating variables, creating child spaces, installing distributors.
/// Variables and child spaces are addressed by register; the registers
/// live in the thread record so that `clone` can remap them.
pub struct ThreadCx<'a> {
    engine: &'a mut SpaceEngine,
    space: SpaceId,
    thread: ThreadId,
}

impl ThreadCx<'_> {
    /// The space this thread runs in.
    #[must_use]
    pub const fn space(&self) -> SpaceId {
        self.space
    }

    fn reg(&self, reg: Reg) -> Option<VarId> {
        self.engine.threads.get(self.thread.0)?.regs.get(reg).copied()
    }

    fn space_reg(&self, sreg: SpaceReg) -> Option<SpaceId> {
        self.engine
            .threads
            .get(self.thread.0)?
            .space_regs
            .get(sreg)
            .copied()
    }

    fn push_reg(&mut self, var: VarId) -> Reg {
        let rec = self
            .engine
            .threads
            .get_mut(self.thread.0)
            .expect("resuming thread exists");
        rec.regs.push(var);
        rec.regs.len() - 1
    }

    /// Allocates a fresh unbound variable owned by this space.
    pub fn fresh(&mut self) -> Reg {
        let var = self.engine.alloc_var(self.space);
        self.push_reg(var)
    }

    /// Tells `reg = value`. Returns false on conflict, after which the
    /// space has failed and the body should finish with [`Step::Done`].
    pub fn bind_value(&mut self, reg: Reg, value: Value) -> bool {
        let Some(var) = self.reg(reg) else {
            return false;
        };
        self.engine.bind_in_space(self.space, var, value)
    }

    /// Tells `reg = value` for an integer.
    pub fn bind_int(&mut self, reg: Reg, value: i64) -> bool {
        self.bind_value(reg, Value::Int(value))
    }

    /// Tells `reg = name` for an atom.
    pub fn bind_atom(&mut self, reg: Reg, name: &str) -> bool {
        self.bind_value(reg, Value::atom(name))
    }

    /// Links two registers' variables together.
    pub fn bind_reg(&mut self, reg: Reg, other: Reg) -> bool {
        let Some(var) = self.reg(other) else {
            return false;
        };
        self.bind_value(reg, Value::Var(var))
    }

    /// Reads the resolved value of `reg`, or `None` while unbound.
    #[must_use]
    pub fn read(&self, reg: Reg) -> Option<Value> {
        let var = self.reg(reg)?;
        self.engine.read_value(self.space, var)
    }

    /// Reads `reg` as an integer.
    #[must_use]
    pub fn read_int(&self, reg: Reg) -> Option<i64> {
        self.read(reg)?.as_int()
    }

    /// `choose(n)`: installs a distributor with `n` alternatives and
    /// returns the register of its decision variable. The body typically
    /// returns [`Step::Wait`] on it next.
    pub fn choose(&mut self, n: u32) -> Result<Reg> {
        let var = self.engine.install_choose(self.space, n)?;
        Ok(self.push_reg(var))
    }

    /// Spawns a sibling thread in this space. The new thread's register
    /// file starts with copies of the listed registers.
    ///
    /// Fails if a conflict already failed the space earlier in this
    /// resume.
    pub fn spawn(&mut self, body: Box<dyn ThreadBody>, regs: &[Reg]) -> Result<()> {
        if self.engine.space(self.space)?.state == SpaceState::Failed {
            return Err(UsageError::SpaceFailed.into());
        }
        let mut vars: SmallVec<[VarId; 4]> = SmallVec::new();
        for &reg in regs {
            let Some(var) = self.reg(reg) else {
                return Err(UsageError::BadRegister.into());
            };
            vars.push(var);
        }
        self.engine.insert_thread(self.space, body, vars);
        Ok(())
    }

    /// `new`: creates a child space of this space; its handle lands in a
    /// space register.
    pub fn new_space(&mut self, body: Box<dyn ThreadBody>) -> Result<SpaceReg> {
        let id = self.engine.new_space(self.space, body)?;
        let rec = self
            .engine
            .threads
            .get_mut(self.thread.0)
            .expect("resuming thread exists");
        rec.space_regs.push(id);
        Ok(rec.space_regs.len() - 1)
    }

    /// Pushes a child space's root variable into a fresh register, so
    /// the body can observe or link against the child's result.
    pub fn root_of(&mut self, sreg: SpaceReg) -> Result<Reg> {
        let id = self.space_reg(sreg).ok_or(UsageError::BadRegister)?;
        let var = self.engine.root_var(id)?;
        Ok(self.push_reg(var))
    }

    /// Non-driving `ask`: classifies the child if it is already resolved.
    /// While it is still runnable this returns `NotStable`; block with
    /// [`Step::WaitSpace`] first.
    pub fn outcome(&mut self, sreg: SpaceReg) -> Result<AskOutcome> {
        let id = self.target(sreg)?;
        self.engine.refresh_stability(id);
        self.engine.outcome_of(id)
    }

    /// Non-driving `merge` of an already-stable child into this space.
    pub fn merge_space(&mut self, sreg: SpaceReg) -> Result<()> {
        let id = self.target(sreg)?;
        self.engine.refresh_stability(id);
        self.engine.merge_stable(id)
    }

    /// Non-driving `commit` on an already-stable child.
    pub fn commit_space(&mut self, sreg: SpaceReg, selector: u32) -> Result<()> {
        let id = self.target(sreg)?;
        self.engine.refresh_stability(id);
        self.engine.commit_stable(id, selector)
    }

    /// Non-driving `kill` of an already-resolved child.
    pub fn kill_space(&mut self, sreg: SpaceReg) -> Result<()> {
        let id = self.target(sreg)?;
        self.engine.refresh_stability(id);
        if !self
            .engine
            .space(id)?
            .state
            .is_resolved()
        {
            return Err(UsageError::NotStable.into());
        }
        self.engine.kill_resolved(id)
    }

    /// Non-driving `clone` of an already-stable child; the copy's handle
    /// lands in a new space register.
    pub fn clone_space(&mut self, sreg: SpaceReg) -> Result<SpaceReg> {
        let id = self.target(sreg)?;
        self.engine.refresh_stability(id);
        let copy = self.engine.clone_stable(id)?;
        let rec = self
            .engine
            .threads
            .get_mut(self.thread.0)
            .expect("resuming thread exists");
        rec.space_regs.push(copy);
        Ok(rec.space_regs.len() - 1)
    }

    fn target(&self, sreg: SpaceReg) -> Result<SpaceId> {
        let id = self
            .space_reg(sreg)
            .ok_or(UsageError::UnknownSpace)?;
        self.engine.check_target(id)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        init_test_logging, BindInt, BindTwice, ChooseBind, MergePoison, NestAndMerge, SpawnRelay,
    };

    fn engine() -> SpaceEngine {
        init_test_logging();
        SpaceEngine::new()
    }

    fn read_int(engine: &SpaceEngine, space: SpaceId, var: VarId) -> Option<i64> {
        engine.read_value(space, var).and_then(|v| v.as_int())
    }

    /// Always yields; used to exhaust the step budget.
    #[derive(Debug, Clone)]
    struct Spinner;

    impl ThreadBody for Spinner {
        fn resume(&mut self, _cx: &mut ThreadCx<'_>) -> Step {
            Step::Yield
        }

        fn clone_box(&self) -> Box<dyn ThreadBody> {
            Box::new(self.clone())
        }
    }

    /// Blocks forever on a fresh local variable.
    #[derive(Debug, Clone, Default)]
    struct WaitForever {
        reg: Option<Reg>,
    }

    impl ThreadBody for WaitForever {
        fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
            let reg = *self.reg.get_or_insert_with(|| cx.fresh());
            Step::Wait(reg)
        }

        fn clone_box(&self) -> Box<dyn ThreadBody> {
            Box::new(self.clone())
        }
    }

    /// Calls `choose` twice in a row and records the second result.
    #[derive(Debug, Clone, Default)]
    struct DoubleChoose;

    impl ThreadBody for DoubleChoose {
        fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
            let _ = cx.choose(2);
            if cx.choose(2).is_err() {
                cx.bind_atom(0, "second_choose_rejected");
            }
            Step::Done
        }

        fn clone_box(&self) -> Box<dyn ThreadBody> {
            Box::new(self.clone())
        }
    }

    /// Creates a child and immediately constrains its root variable, so
    /// the child's own tell conflicts with the ancestor constraint.
    #[derive(Debug, Clone, Default)]
    struct ConstrainChild {
        child: Option<SpaceReg>,
    }

    impl ThreadBody for ConstrainChild {
        fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
            match self.child {
                None => {
                    let Ok(child) = cx.new_space(Box::new(BindInt(5))) else {
                        return Step::Done;
                    };
                    let Ok(root) = cx.root_of(child) else {
                        return Step::Done;
                    };
                    cx.bind_int(root, 6);
                    self.child = Some(child);
                    Step::WaitSpace(child)
                }
                Some(child) => {
                    if cx.outcome(child).is_ok_and(|o| o.is_failed()) {
                        cx.bind_atom(0, "child_failed");
                    }
                    Step::Done
                }
            }
        }

        fn clone_box(&self) -> Box<dyn ThreadBody> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn top_space_exists_but_rejects_operations() {
        let mut engine = engine();
        let top = engine.top();
        assert!(engine.is_space(top));
        assert_eq!(engine.state_of(top), Some(SpaceState::Runnable));
        assert_eq!(
            engine.ask(top),
            Err(SpaceError::Usage(UsageError::TopLevel))
        );
        assert_eq!(
            engine.merge(top),
            Err(SpaceError::Usage(UsageError::TopLevel))
        );
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let mut engine = engine();
        let bogus = SpaceId::new_for_test(999, 0);
        assert!(!engine.is_space(bogus));
        assert_eq!(
            engine.ask(bogus),
            Err(SpaceError::Usage(UsageError::UnknownSpace))
        );
    }

    #[test]
    fn ask_reports_success_and_is_idempotent() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(BindInt(7))).unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));
        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));

        // The binding is visible inside the space but not from the top.
        let root = engine.root_var(space).unwrap();
        assert_eq!(read_int(&engine, space, root), Some(7));
        assert_eq!(read_int(&engine, top, root), None);
    }

    #[test]
    fn conflict_fails_the_space_not_the_engine() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(BindTwice(1, 2))).unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Failed));
        assert_eq!(engine.ask(space), Ok(AskOutcome::Failed));
        assert_eq!(engine.state_of(top), Some(SpaceState::Runnable));
    }

    #[test]
    fn sibling_thread_wakes_on_local_bind() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine
            .new_space(top, Box::new(SpawnRelay::new(41)))
            .unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));
        let root = engine.root_var(space).unwrap();
        assert_eq!(read_int(&engine, space, root), Some(42));
    }

    #[test]
    fn thread_blocked_on_local_var_counts_as_stable() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine
            .new_space(top, Box::new(WaitForever::default()))
            .unwrap();
        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));
    }

    #[test]
    fn choose_surfaces_as_alternatives() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(ChooseBind::new(3))).unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Alternatives(3)));
        assert_eq!(engine.distributor_arity(space), Some(3));
    }

    #[test]
    fn second_choose_is_rejected_while_distributor_pending() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(DoubleChoose)).unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Alternatives(2)));
        let root = engine.root_var(space).unwrap();
        assert_eq!(
            engine.read_value(space, root),
            Some(Value::atom("second_choose_rejected"))
        );
    }

    #[test]
    fn commit_resolves_the_choice() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(ChooseBind::new(2))).unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Alternatives(2)));
        engine.commit(space, 2).unwrap();
        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));

        let root = engine.root_var(space).unwrap();
        assert_eq!(read_int(&engine, space, root), Some(2));
    }

    #[test]
    fn commit_validates_selector_and_distributor() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(ChooseBind::new(2))).unwrap();
        engine.ask(space).unwrap();

        assert_eq!(
            engine.commit(space, 0),
            Err(SpaceError::Usage(UsageError::SelectorOutOfRange {
                selector: 0,
                arity: 2,
            }))
        );
        assert_eq!(
            engine.commit(space, 3),
            Err(SpaceError::Usage(UsageError::SelectorOutOfRange {
                selector: 3,
                arity: 2,
            }))
        );

        let plain = engine.new_space(top, Box::new(BindInt(1))).unwrap();
        assert_eq!(
            engine.commit(plain, 1),
            Err(SpaceError::Usage(UsageError::NotAlternatives))
        );
    }

    #[test]
    fn choose_in_a_resolved_space_has_no_resolving_ancestor() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(BindTwice(1, 2))).unwrap();
        engine.ask(space).unwrap();

        assert_eq!(
            engine.install_choose(space, 2),
            Err(SpaceError::Context(ContextError::NoResolvingAncestor))
        );
    }

    #[test]
    fn top_level_choose_degrades_to_placeholder() {
        let mut engine = engine();
        let top = engine.top();
        let tid = engine.spawn_thread(top, Box::new(ChooseBind::new(2))).unwrap();
        engine.run();

        // No distributor lands on the top-level space and the chooser
        // blocks forever on a variable nothing can bind.
        assert_eq!(engine.distributor_arity(top), None);
        assert!(matches!(
            engine.thread_state(tid),
            Some(ThreadState::Blocked(WaitCondition::Var(_)))
        ));
        assert_eq!(engine.state_of(top), Some(SpaceState::Runnable));
    }

    #[test]
    fn merge_propagates_bindings_in_order() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(BindInt(42))).unwrap();
        let root = engine.root_var(space).unwrap();

        engine.merge(space).unwrap();
        assert_eq!(engine.state_of(space), Some(SpaceState::Merged));
        assert_eq!(read_int(&engine, top, root), Some(42));

        // The handle is disposed; every further operation errors.
        assert_eq!(
            engine.ask(space),
            Err(SpaceError::Usage(UsageError::Disposed))
        );
        assert_eq!(
            engine.merge(space),
            Err(SpaceError::Usage(UsageError::Disposed))
        );
    }

    #[test]
    fn merge_rejects_failed_and_undecided_spaces() {
        let mut engine = engine();
        let top = engine.top();

        let failed = engine.new_space(top, Box::new(BindTwice(1, 2))).unwrap();
        assert_eq!(
            engine.merge(failed),
            Err(SpaceError::Usage(UsageError::MergeFailed))
        );

        let choosing = engine.new_space(top, Box::new(ChooseBind::new(2))).unwrap();
        assert_eq!(
            engine.merge(choosing),
            Err(SpaceError::Usage(UsageError::MergeAlternatives))
        );
    }

    #[test]
    fn nested_space_merges_into_its_parent() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(NestAndMerge::new(9))).unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));
        let root = engine.root_var(space).unwrap();
        engine.merge(space).unwrap();
        assert_eq!(read_int(&engine, top, root), Some(9));
    }

    #[test]
    fn conflicting_merge_fails_the_merging_space() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine
            .new_space(top, Box::new(MergePoison::default()))
            .unwrap();
        assert_eq!(engine.ask(space), Ok(AskOutcome::Failed));
        assert_eq!(engine.state_of(top), Some(SpaceState::Runnable));
    }

    #[test]
    fn ancestor_constraint_fails_the_child() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine
            .new_space(top, Box::new(ConstrainChild::default()))
            .unwrap();

        assert_eq!(engine.ask(space), Ok(AskOutcome::Succeeded));
        let root = engine.root_var(space).unwrap();
        assert_eq!(
            engine.read_value(space, root),
            Some(Value::atom("child_failed"))
        );
    }

    #[test]
    fn kill_disposes_the_subtree_once() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(ChooseBind::new(2))).unwrap();

        engine.kill(space).unwrap();
        assert_eq!(engine.state_of(space), Some(SpaceState::Killed));
        assert!(engine.is_space(space));

        assert_eq!(
            engine.kill(space),
            Err(SpaceError::Usage(UsageError::Disposed))
        );
        assert_eq!(
            engine.ask(space),
            Err(SpaceError::Usage(UsageError::Disposed))
        );
    }

    #[test]
    fn step_budget_turns_livelock_into_stalled() {
        let mut engine = SpaceEngine::with_config(EngineConfig {
            max_steps: 64,
            trace_capacity: 16,
        });
        let top = engine.top();
        let space = engine.new_space(top, Box::new(Spinner)).unwrap();
        assert!(matches!(engine.ask(space), Err(SpaceError::Stalled { .. })));
    }

    #[test]
    fn ask_verbose_lists_newly_entailed_variables() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(BindInt(3))).unwrap();
        let root = engine.root_var(space).unwrap();

        let verbose = engine.ask_verbose(space).unwrap();
        assert_eq!(verbose.outcome, AskOutcome::Succeeded);
        assert_eq!(verbose.entailed, vec![root]);

        let failed = engine.new_space(top, Box::new(BindTwice(1, 2))).unwrap();
        let verbose = engine.ask_verbose(failed).unwrap();
        assert_eq!(verbose.outcome, AskOutcome::Failed);
        assert!(verbose.entailed.is_empty());
    }

    #[test]
    fn trace_records_the_lifecycle() {
        let mut engine = engine();
        let top = engine.top();
        let space = engine.new_space(top, Box::new(BindInt(1))).unwrap();
        engine.ask(space).unwrap();
        engine.merge(space).unwrap();

        let kinds: Vec<TraceEventKind> = engine.trace().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&TraceEventKind::SpaceCreated));
        assert!(kinds.contains(&TraceEventKind::ThreadSpawned));
        assert!(kinds.contains(&TraceEventKind::SpaceStable));
        assert!(kinds.contains(&TraceEventKind::Merged));
        let json = engine.trace().to_json().unwrap();
        assert!(json.contains("SpaceCreated"));
    }
}
