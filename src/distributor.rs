//! Distributor strategies.
//!
//! A distributor is installed on a space by `choose` and offers N ≥ 1
//! mutually exclusive alternatives once the space is stable. The contract
//! is deliberately minimal (an arity and a commit effect) plus the
//! remapping hook `clone` needs to duplicate a distributor into a cloned
//! subtree. `ChooseDistributor` is the one concrete strategy here; other
//! kinds only have to implement the same small surface.

use core::fmt;
use std::collections::HashMap;

use crate::store::Value;
use crate::types::VarId;

/// A choice-point strategy owned by a space.
pub trait Distributor: fmt::Debug {
    /// Number of mutually exclusive alternatives (N ≥ 1).
    fn arity(&self) -> u32;

    /// The variable an ancestor's `commit` will decide.
    fn decision_var(&self) -> VarId;

    /// The bindings to apply when alternative `selector` (1-based, already
    /// range-checked by the engine) is chosen.
    fn commit(&self, selector: u32) -> Vec<(VarId, Value)>;

    /// A structurally identical copy with variables remapped through
    /// `map`. Variables absent from the map alias the originals; they
    /// lie outside the cloned subtree's ownership boundary.
    fn clone_remapped(&self, map: &HashMap<VarId, VarId>) -> Box<dyn Distributor>;
}

/// The distributor created by `choose(n)`: committing alternative `k`
/// binds the decision variable to the integer `k`.
#[derive(Debug, Clone)]
pub struct ChooseDistributor {
    var: VarId,
    arity: u32,
}

impl ChooseDistributor {
    /// Creates a distributor over `arity` alternatives deciding `var`.
    #[must_use]
    pub const fn new(var: VarId, arity: u32) -> Self {
        Self { var, arity }
    }
}

impl Distributor for ChooseDistributor {
    fn arity(&self) -> u32 {
        self.arity
    }

    fn decision_var(&self) -> VarId {
        self.var
    }

    fn commit(&self, selector: u32) -> Vec<(VarId, Value)> {
        vec![(self.var, Value::Int(i64::from(selector)))]
    }

    fn clone_remapped(&self, map: &HashMap<VarId, VarId>) -> Box<dyn Distributor> {
        let var = map.get(&self.var).copied().unwrap_or(self.var);
        Box::new(Self {
            var,
            arity: self.arity,
        })
    }
}
