//! Identifier types for engine entities.
//!
//! Spaces, threads and store variables are arena-allocated records; these
//! newtypes wrap the arena index with type safety. A `SpaceId` doubles as
//! the reification handle handed to host code: it either names a live
//! space or the engine reports it as already disposed.

use crate::util::ArenaIndex;
use core::fmt;

use serde::Serialize;

/// Identifies a computation space.
///
/// Spaces form a strict tree rooted at the top-level space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpaceId(pub(crate) ArenaIndex);

impl SpaceId {
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    #[allow(dead_code)]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a space ID from raw parts for unit tests.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0.index())
    }
}

/// Identifies a thread owned by a space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadId(pub(crate) ArenaIndex);

impl ThreadId {
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    #[allow(dead_code)]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a thread ID from raw parts for unit tests.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0.index())
    }
}

/// Identifies a store variable.
///
/// A variable is owned by the space that allocated it; inner spaces may
/// read outer variables, never the other way around.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub(crate) ArenaIndex);

impl VarId {
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    #[allow(dead_code)]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a variable ID from raw parts for unit tests.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact() {
        assert_eq!(SpaceId::new_for_test(3, 0).to_string(), "S3");
        assert_eq!(ThreadId::new_for_test(7, 1).to_string(), "T7");
        assert_eq!(VarId::new_for_test(9, 2).to_string(), "V9");
    }

    #[test]
    fn debug_includes_generation() {
        assert_eq!(
            format!("{:?}", SpaceId::new_for_test(3, 4)),
            "SpaceId(3:4)"
        );
    }
}
