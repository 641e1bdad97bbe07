//! Trace events for space-engine executions.
//!
//! Every lifecycle transition pushes an event into a fixed-size ring
//! buffer, giving tests and debugging sessions an ordered record of what
//! the engine did without unbounded memory growth. Events serialize to
//! JSON for offline inspection.

use serde::Serialize;

use crate::types::{SpaceId, ThreadId};

/// The kind of trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceEventKind {
    /// A space was created by `new`.
    SpaceCreated,
    /// A thread was spawned into a space.
    ThreadSpawned,
    /// A thread blocked on a wait condition.
    ThreadBlocked,
    /// A thread terminated normally.
    ThreadTerminated,
    /// A space's subtree became quiescent.
    SpaceStable,
    /// A space's store became inconsistent.
    SpaceFailed,
    /// `choose` installed a distributor.
    DistributorInstalled,
    /// `commit` applied an alternative.
    Committed,
    /// `merge` absorbed a space into its parent.
    Merged,
    /// `clone` duplicated a subtree.
    Cloned,
    /// `kill` discarded a subtree.
    Killed,
}

/// Additional data carried by a trace event.
#[derive(Debug, Clone, Serialize)]
pub enum TraceData {
    /// No additional data.
    None,
    /// Space-related data.
    Space {
        /// The space involved.
        space: SpaceId,
        /// Its parent, if any.
        parent: Option<SpaceId>,
    },
    /// Thread-related data.
    Thread {
        /// The thread involved.
        thread: ThreadId,
        /// The owning space.
        space: SpaceId,
    },
    /// Distributor data.
    Distributor {
        /// The space holding the distributor.
        space: SpaceId,
        /// The distributor arity.
        arity: u32,
    },
    /// A committed alternative.
    Commit {
        /// The committed space.
        space: SpaceId,
        /// The chosen alternative (1-based).
        selector: u32,
    },
    /// A subtree duplication.
    Clone {
        /// The source space.
        source: SpaceId,
        /// The root of the copy.
        copy: SpaceId,
    },
}

/// One event in the engine trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of event.
    pub kind: TraceEventKind,
    /// Additional data.
    pub data: TraceData,
}

impl TraceEvent {
    /// Creates a new trace event.
    #[must_use]
    pub const fn new(seq: u64, kind: TraceEventKind, data: TraceData) -> Self {
        Self { seq, kind, data }
    }
}

/// A ring buffer of recent trace events.
///
/// When full, the oldest event is overwritten.
#[derive(Debug)]
pub struct TraceBuffer {
    events: Vec<Option<TraceEvent>>,
    head: usize,
    len: usize,
}

impl TraceBuffer {
    /// Creates a buffer holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Returns the buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no events are buffered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pushes an event, overwriting the oldest if full.
    pub fn push(&mut self, event: TraceEvent) {
        let idx = (self.head + self.len) % self.events.len();
        self.events[idx] = Some(event);
        if self.len < self.events.len() {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % self.events.len();
        }
    }

    /// Iterates over events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        (0..self.len).filter_map(move |i| {
            let idx = (self.head + i) % self.events.len();
            self.events[idx].as_ref()
        })
    }

    /// Returns the most recent event.
    #[must_use]
    pub fn last(&self) -> Option<&TraceEvent> {
        if self.len == 0 {
            None
        } else {
            self.events[(self.head + self.len - 1) % self.events.len()].as_ref()
        }
    }

    /// Serializes the buffered events (oldest first) to a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let events: Vec<&TraceEvent> = self.iter().collect();
        serde_json::to_string(&events)
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(seq: u64) -> TraceEvent {
        TraceEvent::new(seq, TraceEventKind::SpaceCreated, TraceData::None)
    }

    #[test]
    fn push_and_iterate_in_order() {
        let mut buffer = TraceBuffer::new(8);
        for seq in 0..3 {
            buffer.push(event(seq));
        }
        let seqs: Vec<u64> = buffer.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(buffer.last().map(|e| e.seq), Some(2));
    }

    #[test]
    fn wrap_around_discards_oldest() {
        let mut buffer = TraceBuffer::new(2);
        for seq in 0..5 {
            buffer.push(event(seq));
        }
        let seqs: Vec<u64> = buffer.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buffer = TraceBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn json_export_contains_kinds() {
        let mut buffer = TraceBuffer::new(4);
        buffer.push(TraceEvent::new(
            0,
            TraceEventKind::Committed,
            TraceData::Commit {
                space: SpaceId::new_for_test(1, 0),
                selector: 2,
            },
        ));
        let json = buffer.to_json().expect("serializable");
        assert!(json.contains("Committed"));
        assert!(json.contains("\"selector\":2"));
    }
}
