//! Undo/redo history of full-collection snapshots
//!
//! One snapshot is recorded per user-initiated destructive operation, never
//! per field edit. The undo stack is capped: when full, the oldest snapshot
//! is dropped, so `undo_len() + redo_len()` never exceeds the capacity nor
//! the number of operations recorded since the last [`MutationLog::clear`].

use std::collections::VecDeque;

/// Bounded linear undo/redo history
#[derive(Debug, Clone)]
pub struct MutationLog<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    capacity: usize,
}

impl<T: Clone> MutationLog<T> {
    /// Create a history keeping at most `capacity` undo steps (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot `current` before a destructive operation; clears redo
    pub fn record_before_mutation(&mut self, current: &T) {
        self.redo.clear();
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(current.clone());
    }

    /// Step back: returns the state to restore, or None when there is nothing to undo
    pub fn undo(&mut self, current: &T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(previous)
    }

    /// Step forward: returns the state to restore, or None when there is nothing to redo
    pub fn redo(&mut self, current: &T) -> Option<T> {
        let next = self.redo.pop()?;
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(current.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop both stacks
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
