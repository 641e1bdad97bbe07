//! Deep copy of a stable subtree, the `clone` operation.
//!
//! The ownership boundary decides what is duplicated: every space in the
//! source subtree and every variable owned by one of those spaces gets a
//! fresh identity in the copy, while references that cross the boundary
//! (ancestor variables, handles of killed children) alias the originals.
//! The copy runs in three passes over a total remapping table:
//!
//! 1. allocate space skeletons, preserving the tree shape,
//! 2. duplicate every variable the copied spaces own,
//! 3. fill stores, distributors and threads through the tables.
//!
//! Building the variable table up front, before any contents are copied,
//! is what keeps mutual references between sibling stores consistent.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::error::{Result, UsageError};
use crate::space::{SpaceRecord, SpaceState};
use crate::store::Value;
use crate::thread::{ThreadRecord, ThreadState, WaitCondition};
use crate::trace::{TraceData, TraceEventKind};
use crate::types::{SpaceId, ThreadId, VarId};

use super::SpaceEngine;

impl SpaceEngine {
    /// Clones an already-stable space into a fresh sibling under the same
    /// parent. The copy is itself stable with the same outcome.
    pub(crate) fn clone_stable(&mut self, source: SpaceId) -> Result<SpaceId> {
        let (state, parent) = {
            let rec = self.space(source)?;
            (rec.state, rec.parent)
        };
        if state != SpaceState::Stable {
            return Err(match state {
                SpaceState::Merged | SpaceState::Killed => UsageError::Disposed,
                _ => UsageError::NotStable,
            }
            .into());
        }
        let parent = parent.ok_or(UsageError::TopLevel)?;

        let mut space_map = HashMap::new();
        let copy = self.copy_skeleton(source, parent, &mut space_map);

        // Pass 2: total variable table. Scanning the variable arena once
        // catches variables no store has bound yet, which remapped
        // registers and distributors still need.
        let owned: Vec<(VarId, SpaceId)> = self
            .vars
            .iter()
            .filter_map(|(idx, rec)| {
                space_map
                    .get(&rec.owner)
                    .map(|owner| (VarId::from_arena(idx), *owner))
            })
            .collect();
        let mut var_map = HashMap::with_capacity(owned.len());
        for (old, owner) in owned {
            let fresh = self.alloc_var(owner);
            var_map.insert(old, fresh);
        }

        let pairs: Vec<(SpaceId, SpaceId)> =
            space_map.iter().map(|(&old, &new)| (old, new)).collect();
        for (old, new) in pairs {
            self.copy_contents(old, new, &space_map, &var_map);
        }

        if let Some(rec) = self.spaces.get_mut(parent.0) {
            rec.add_child(copy);
            rec.dirty = true;
        }
        self.push_event(TraceEventKind::Cloned, TraceData::Clone { source, copy });
        tracing::debug!(source = %source, copy = %copy, "cloned space");
        Ok(copy)
    }

    /// Pass 1: allocates state-preserving skeletons for the subtree.
    /// Killed children are not copied; merged and failed children become
    /// inert placeholders so the tree shape survives.
    fn copy_skeleton(
        &mut self,
        old: SpaceId,
        new_parent: SpaceId,
        map: &mut HashMap<SpaceId, SpaceId>,
    ) -> SpaceId {
        let (state, root_var, children) = {
            let rec = self.spaces.get(old.0).expect("cloned subtree space exists");
            (rec.state, rec.root_var, rec.children.clone())
        };
        let serial = self.next_serial;
        self.next_serial += 1;
        let idx = self.spaces.insert_with(|idx| {
            let mut rec =
                SpaceRecord::new(SpaceId::from_arena(idx), Some(new_parent), root_var, serial);
            rec.state = state;
            rec.quiescent = state == SpaceState::Stable;
            rec.dirty = false;
            rec
        });
        let new = SpaceId::from_arena(idx);
        map.insert(old, new);

        for child in children {
            let skip = self
                .spaces
                .get(child.0)
                .is_none_or(|c| c.state == SpaceState::Killed);
            if skip {
                continue;
            }
            let copied = self.copy_skeleton(child, new, map);
            if let Some(rec) = self.spaces.get_mut(new.0) {
                rec.add_child(copied);
            }
        }
        new
    }

    /// Pass 3: fills one copied space from its source through the tables.
    fn copy_contents(
        &mut self,
        old: SpaceId,
        new: SpaceId,
        space_map: &HashMap<SpaceId, SpaceId>,
        var_map: &HashMap<VarId, VarId>,
    ) {
        let (root_var, bindings, distributor, threads) = {
            let Some(rec) = self.spaces.get(old.0) else {
                return;
            };
            let bindings: Vec<(VarId, Value)> = rec
                .store
                .entailed()
                .iter()
                .filter_map(|var| rec.store.get(*var).map(|value| (*var, value.clone())))
                .collect();
            let distributor = rec.distributor.as_ref().map(|d| d.clone_remapped(var_map));
            (rec.root_var, bindings, distributor, rec.threads.clone())
        };

        if let Some(rec) = self.spaces.get_mut(new.0) {
            rec.root_var = remap_var(root_var, var_map);
            rec.distributor = distributor;
            for (var, value) in bindings {
                rec.store
                    .insert(remap_var(var, var_map), remap_value(&value, var_map));
            }
        }

        // Only blocked threads survive in a stable subtree; terminated
        // and killed ones carry no state worth copying.
        for tid in threads {
            let (cond, regs, space_regs, body) = {
                let Some(t) = self.threads.get(tid.0) else {
                    continue;
                };
                let ThreadState::Blocked(cond) = t.state else {
                    continue;
                };
                let cond = match cond {
                    WaitCondition::Var(var) => WaitCondition::Var(remap_var(var, var_map)),
                    WaitCondition::SpaceResolved(space) => WaitCondition::SpaceResolved(
                        space_map.get(&space).copied().unwrap_or(space),
                    ),
                };
                let regs: SmallVec<[VarId; 4]> =
                    t.regs.iter().map(|var| remap_var(*var, var_map)).collect();
                let space_regs: SmallVec<[SpaceId; 2]> = t
                    .space_regs
                    .iter()
                    .map(|space| space_map.get(space).copied().unwrap_or(*space))
                    .collect();
                (cond, regs, space_regs, t.body.clone())
            };
            let idx = self.threads.insert_with(|idx| ThreadRecord {
                id: ThreadId::from_arena(idx),
                owner: new,
                state: ThreadState::Blocked(cond),
                regs,
                space_regs,
                body,
            });
            let new_tid = ThreadId::from_arena(idx);
            if let Some(rec) = self.spaces.get_mut(new.0) {
                rec.add_thread(new_tid);
            }
            self.register_waiter(new_tid, cond);
        }
    }

    fn register_waiter(&mut self, tid: ThreadId, cond: WaitCondition) {
        match cond {
            WaitCondition::Var(var) => {
                self.var_waiters.entry(var).or_default().push(tid);
            }
            WaitCondition::SpaceResolved(space) => {
                self.space_waiters.entry(space).or_default().push(tid);
            }
        }
    }
}

fn remap_var(var: VarId, map: &HashMap<VarId, VarId>) -> VarId {
    map.get(&var).copied().unwrap_or(var)
}

fn remap_value(value: &Value, map: &HashMap<VarId, VarId>) -> Value {
    match value {
        Value::Var(var) => Value::Var(remap_var(*var, map)),
        Value::Tuple(label, fields) => Value::Tuple(
            label.clone(),
            fields.iter().map(|field| remap_value(field, map)).collect(),
        ),
        other => other.clone(),
    }
}
