//! Per-space constraint store.
//!
//! Each space owns a local single-assignment store. A binding made inside
//! a space lives in that space's store only; it becomes visible to the
//! parent exclusively through `merge`. Reads resolve through the ancestor
//! chain (an inner space sees outer bindings), which is what makes
//! speculative execution safe to discard via `kill`.
//!
//! The store itself is deliberately dumb: it records bindings and the
//! order they were made in. Resolution across the space tree and conflict
//! detection live in the engine, which knows the ancestor chain.

use std::collections::HashMap;

use crate::types::VarId;

/// A value in the store.
///
/// A small structural term language: enough to express decision variables,
/// symbolic results and compound terms without pulling in a full
/// unification engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// An interned-by-name symbolic constant.
    Atom(String),
    /// A reference to another variable.
    Var(VarId),
    /// A labelled tuple of values.
    Tuple(String, Vec<Value>),
}

impl Value {
    /// Convenience constructor for an atom.
    #[must_use]
    pub fn atom(name: &str) -> Self {
        Self::Atom(name.to_owned())
    }

    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns true if this value is a variable reference.
    #[must_use]
    pub const fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }
}

/// The local binding store of one space.
#[derive(Debug, Clone, Default)]
pub struct Store {
    bindings: HashMap<VarId, Value>,
    /// Binding order, reported by `askVerbose` as the entailment list.
    log: Vec<VarId>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a binding. The caller (the engine) has already verified the
    /// variable is unbound from this space's view.
    pub fn insert(&mut self, var: VarId, value: Value) {
        let previous = self.bindings.insert(var, value);
        debug_assert!(previous.is_none(), "store rebinding {var}");
        self.log.push(var);
    }

    /// Returns the local binding of `var`, if any.
    #[must_use]
    pub fn get(&self, var: VarId) -> Option<&Value> {
        self.bindings.get(&var)
    }

    /// Returns true if `var` is bound locally.
    #[must_use]
    pub fn contains(&self, var: VarId) -> bool {
        self.bindings.contains_key(&var)
    }

    /// Variables bound in this store, oldest first.
    #[must_use]
    pub fn entailed(&self) -> &[VarId] {
        &self.log
    }

    /// Number of local bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if the store holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drains all bindings in binding order, leaving the store empty.
    ///
    /// Used by `merge` to propagate the bindings into the parent store.
    pub fn drain_in_order(&mut self) -> Vec<(VarId, Value)> {
        let log = core::mem::take(&mut self.log);
        let mut bindings = core::mem::take(&mut self.bindings);
        log.into_iter()
            .filter_map(|var| bindings.remove(&var).map(|value| (var, value)))
            .collect()
    }

    /// Discards every binding. Used by `kill` and on failure.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.log.clear();
    }
}
