//! Bounded undo/redo over model snapshots.
//!
//! `past` holds the snapshots taken after each terminal mutation, newest at
//! the back. When it is full the oldest entry is evicted. `future` collects
//! entries popped by `undo` and is cleared by every fresh snapshot, so
//! `past + future` never exceeds the capacity.

use std::collections::VecDeque;

use tracing::debug;

use crate::model::ModelSnapshot;

/// Default number of snapshots kept on each stack.
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Clone, Debug)]
pub struct HistoryManager {
    past: VecDeque<ModelSnapshot>,
    future: Vec<ModelSnapshot>,
    capacity: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl HistoryManager {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            past: VecDeque::with_capacity(capacity),
            future: Vec::new(),
            capacity,
        }
    }

    #[inline] pub fn capacity(&self) -> usize { self.capacity }
    #[inline] pub fn can_undo(&self) -> bool { !self.past.is_empty() }
    #[inline] pub fn can_redo(&self) -> bool { !self.future.is_empty() }
    #[inline] pub fn past_len(&self) -> usize { self.past.len() }
    #[inline] pub fn future_len(&self) -> usize { self.future.len() }

    /// Entries on `past`, oldest first.
    pub fn past(&self) -> impl Iterator<Item = &ModelSnapshot> {
        self.past.iter()
    }

    /// Record the state after a terminal mutation. Clears `future`.
    pub fn snapshot(&mut self, snap: ModelSnapshot) {
        if self.past.len() == self.capacity {
            self.past.pop_front();
        }
        self.past.push_back(snap);
        self.future.clear();
        debug!(depth = self.past.len(), "history snapshot");
    }

    /// Step back. `None` (no-op) when there is nothing to undo; otherwise the
    /// state to display, which is the empty model once `past` runs out.
    pub fn undo(&mut self) -> Option<ModelSnapshot> {
        let top = self.past.pop_back()?;
        self.future.push(top);
        Some(self.past.back().cloned().unwrap_or_default())
    }

    /// Step forward. `None` (no-op) when there is nothing to redo.
    pub fn redo(&mut self) -> Option<ModelSnapshot> {
        let next = self.future.pop()?;
        self.past.push_back(next.clone());
        Some(next)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
