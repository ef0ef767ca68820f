//! Bounded undo history.
//!
//! [`UndoHistory`] is a fixed-capacity stack of [`Delta`]s. Pushing onto a
//! full history evicts the oldest entry, so undo availability is bounded.

use std::collections::VecDeque;

use crate::delta::Delta;

/// Default number of steps that can be undone.
pub const DEFAULT_UNDO_CAPACITY: usize = 256;

/// A fixed-capacity ring buffer of step deltas, newest last.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    entries: VecDeque<Delta>,
    capacity: usize,
    /// Total deltas ever pushed (including evicted ones).
    total_pushed: u64,
}

impl UndoHistory {
    /// Create an empty history holding at most `capacity` deltas.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "UndoHistory capacity must be > 0");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    /// Push a committed delta. If the history is full, the oldest delta is
    /// dropped.
    pub fn push(&mut self, delta: Delta) {
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
            tracing::debug!(
                capacity = self.capacity,
                total_pushed = self.total_pushed,
                "undo history full -- evicted oldest delta"
            );
        }
        self.entries.push_back(delta);
        self.total_pushed += 1;
    }

    /// Pop the most recent delta, if any.
    pub fn pop(&mut self) -> Option<Delta> {
        self.entries.pop_back()
    }

    /// The most recent delta, if any.
    pub fn peek(&self) -> Option<&Delta> {
        self.entries.back()
    }

    /// Drop every stored delta.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Maximum number of stored deltas.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored deltas.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing can be undone.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total deltas ever pushed, including evicted and popped ones.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
