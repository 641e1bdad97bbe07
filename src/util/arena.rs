//! Arena allocator for engine records.
//!
//! Spaces, threads and variables are heap objects with identity; the arena
//! gives each of them a stable index that can be handed out as an opaque
//! identifier. Generation counters detect use of an identifier after its
//! slot has been freed and reused.
//!
//! No unsafe code; relies on bounds checking and generation validation.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::Serialize;

/// An index into an arena, paired with a generation counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Creates an arena index from raw parts (primarily for tests).
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the raw slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation counter.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

impl Hash for ArenaIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64((u64::from(self.index) << 32) | u64::from(self.generation));
    }
}

#[derive(Debug)]
enum Entry<T> {
    Full { value: T, generation: u32 },
    Empty { next_free: Option<u32>, generation: u32 },
}

/// A generational arena.
///
/// Freed slots go on a free list and are reused with a bumped generation,
/// so a stale [`ArenaIndex`] can never alias a newer occupant.
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    first_free: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            first_free: None,
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value and returns its index.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        self.insert_with(|_| value)
    }

    /// Inserts the value produced by `f`, which receives the index being
    /// assigned. This lets records embed their own identifier without a
    /// placeholder-then-patch dance.
    pub fn insert_with<F>(&mut self, f: F) -> ArenaIndex
    where
        F: FnOnce(ArenaIndex) -> T,
    {
        self.len += 1;

        if let Some(slot) = self.first_free {
            let entry = &mut self.entries[slot as usize];
            let Entry::Empty {
                next_free,
                generation,
            } = entry
            else {
                unreachable!("free list pointed at an occupied slot");
            };
            let generation = *generation;
            self.first_free = *next_free;
            let idx = ArenaIndex {
                index: slot,
                generation,
            };
            *entry = Entry::Full {
                value: f(idx),
                generation,
            };
            idx
        } else {
            let index = u32::try_from(self.entries.len()).expect("arena overflow");
            let idx = ArenaIndex {
                index,
                generation: 0,
            };
            self.entries.push(Entry::Full {
                value: f(idx),
                generation: 0,
            });
            idx
        }
    }

    /// Removes and returns the value at `index`, or `None` if the index is
    /// stale or the slot is empty.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let entry = self.entries.get_mut(index.index as usize)?;
        match entry {
            Entry::Full { generation, .. } if *generation == index.generation => {
                let next_generation = generation.wrapping_add(1);
                let old = core::mem::replace(
                    entry,
                    Entry::Empty {
                        next_free: self.first_free,
                        generation: next_generation,
                    },
                );
                self.first_free = Some(index.index);
                self.len -= 1;
                match old {
                    Entry::Full { value, .. } => Some(value),
                    Entry::Empty { .. } => unreachable!(),
                }
            }
            _ => None,
        }
    }

    /// Returns a reference to the value at `index`.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        match self.entries.get(index.index as usize)? {
            Entry::Full { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value at `index`.
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        match self.entries.get_mut(index.index as usize)? {
            Entry::Full { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Returns true if `index` names an occupied slot.
    #[must_use]
    pub fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }

    /// Iterates over occupied slots, oldest index first.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match entry {
                Entry::Full { value, generation } => Some((
                    ArenaIndex {
                        index: i as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Entry::Empty { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut arena = Arena::new();
        let idx = arena.insert("space");
        assert_eq!(arena.get(idx), Some(&"space"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn removed_slot_is_reused_with_new_generation() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);

        assert_eq!(arena.remove(a), Some(1));
        assert_eq!(arena.get(a), None);

        let c = arena.insert(3);
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());

        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.get(c), Some(&3));
    }

    #[test]
    fn stale_index_does_not_alias() {
        let mut arena = Arena::new();
        let old = arena.insert(10);
        arena.remove(old);
        let new = arena.insert(20);

        assert_eq!(old.index(), new.index());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&20));
    }

    #[test]
    fn insert_with_sees_final_index() {
        let mut arena = Arena::new();
        let idx = arena.insert_with(|idx| idx.index());
        assert_eq!(arena.get(idx), Some(&idx.index()));
    }
}
