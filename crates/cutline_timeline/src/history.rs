// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot-based undo history backing the in-memory host.
//!
//! An undo chunk records the serialized scene before and after the chunk,
//! so undoing a chunk restores every edit it contained at once.

use crate::error::{Result, TimelineError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Maximum undo history depth
const MAX_HISTORY: usize = 100;

/// Unique undo entry ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    /// Create a new random entry ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized scene state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Serialized state
    pub data: Vec<u8>,
}

impl Snapshot {
    /// Create from serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            data: bincode::serialize(value)?,
        })
    }

    /// Deserialize to value
    pub fn to_value<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One committed undo chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoEntry {
    /// Unique entry ID
    pub id: EntryId,
    /// Label given when the chunk was opened
    pub label: String,
    /// State before the chunk
    pub before: Snapshot,
    /// State after the chunk
    pub after: Snapshot,
}

impl UndoEntry {
    /// Memory used by both snapshots
    pub fn memory_size(&self) -> usize {
        self.before.size() + self.after.size()
    }
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct UndoHistory {
    undo_stack: VecDeque<UndoEntry>,
    redo_stack: VecDeque<UndoEntry>,
    max_depth: usize,
    memory_used: usize,
}

impl UndoHistory {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            memory_used: 0,
        }
    }

    /// Commit a chunk; chunks that changed nothing are dropped
    pub fn commit(&mut self, label: impl Into<String>, before: Snapshot, after: Snapshot) {
        if before.data == after.data {
            return;
        }

        self.redo_stack.clear();

        let entry = UndoEntry {
            id: EntryId::new(),
            label: label.into(),
            before,
            after,
        };
        self.memory_used += entry.memory_size();
        self.undo_stack.push_back(entry);

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }
    }

    /// Pop the last chunk, returning the state to restore
    pub fn undo(&mut self) -> Result<Snapshot> {
        let entry = self
            .undo_stack
            .pop_back()
            .ok_or_else(|| TimelineError::NotFound("nothing to undo".to_string()))?;

        self.memory_used = self.memory_used.saturating_sub(entry.memory_size());
        let state = entry.before.clone();
        self.redo_stack.push_back(entry);
        Ok(state)
    }

    /// Re-apply the last undone chunk, returning the state to restore
    pub fn redo(&mut self) -> Result<Snapshot> {
        let entry = self
            .redo_stack
            .pop_back()
            .ok_or_else(|| TimelineError::NotFound("nothing to redo".to_string()))?;

        self.memory_used += entry.memory_size();
        let state = entry.after.clone();
        self.undo_stack.push_back(entry);
        Ok(state)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get description of next undo operation
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    /// Total memory used by history (bytes)
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(value: u32) -> Snapshot {
        Snapshot::from_value(&value).unwrap()
    }

    #[test]
    fn test_commit_and_undo_redo() {
        let mut history = UndoHistory::new();
        history.commit("edit", snap(1), snap(2));
        assert!(history.can_undo());
        assert_eq!(history.undo_label(), Some("edit"));

        let restored: u32 = history.undo().unwrap().to_value().unwrap();
        assert_eq!(restored, 1);
        assert!(history.can_redo());

        let restored: u32 = history.redo().unwrap().to_value().unwrap();
        assert_eq!(restored, 2);
    }

    #[test]
    fn test_unchanged_chunk_is_dropped() {
        let mut history = UndoHistory::new();
        history.commit("noop", snap(3), snap(3));
        assert!(!history.can_undo());
        assert!(history.undo().is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut history = UndoHistory::with_max_depth(2);
        history.commit("a", snap(0), snap(1));
        history.commit("b", snap(1), snap(2));
        history.commit("c", snap(2), snap(3));
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo_label(), Some("c"));
    }
}
