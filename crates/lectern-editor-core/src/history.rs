//! Linear undo over immutable document snapshots.
//!
//! Every applied command records one snapshot. Undo and redo are pointer
//! moves between the two stacks; a new edit clears the redo tail. The depth
//! is bounded, evicting the oldest entries first.

use lectern_dom::Document;

use crate::types::Selection;

/// One history entry: the document and the selection it was taken with.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub doc: Document,
    pub selection: Selection,
}

/// Bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Record the pre-edit state. Clears any redo tail.
    pub fn record(&mut self, snapshot: Snapshot) {
        self.redo_stack.clear();
        self.undo_stack.push(snapshot);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Step back, exchanging the current state for the previous snapshot.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let snapshot = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(snapshot)
    }

    /// Step forward, exchanging the current state for the next snapshot.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let snapshot = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(snapshot)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(n: usize) -> Snapshot {
        // Distinguish snapshots by selection position.
        Snapshot { doc: Document::empty(), selection: Selection::collapsed(n) }
    }

    #[test]
    fn test_fresh_history_cannot_undo() {
        let history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut history = History::default();
        history.record(snap(0));

        let restored = history.undo(snap(1)).unwrap();
        assert_eq!(restored.selection.head, 0);
        assert!(history.can_redo());

        let forward = history.redo(restored).unwrap();
        assert_eq!(forward.selection.head, 1);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::default();
        history.record(snap(0));
        let _ = history.undo(snap(1));
        assert!(history.can_redo());

        history.record(snap(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_depth_evicts_oldest() {
        let mut history = History::new(3);
        for n in 0..5 {
            history.record(snap(n));
        }

        // Only the three newest survive: 4, 3, 2.
        let mut current = snap(99);
        for expected in [4, 3, 2] {
            current = history.undo(current).unwrap();
            assert_eq!(current.selection.head, expected);
        }
        assert!(!history.can_undo());
    }
}
