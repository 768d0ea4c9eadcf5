//! Undo/redo history management.
//!
//! ## Snapshots, not commands
//!
//! Each commit stores a whole snapshot rather than an invertible edit. With
//! [`BlockList`](crate::BlockList) snapshots share their blocks, so the cost
//! of a commit is one pointer vector, not a copy of the document.
//!
//! The timeline is strictly linear: committing after an undo throws the
//! redo branch away.

use std::collections::VecDeque;

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Linear undo/redo over snapshots of `T`.
///
/// ## Learning: VecDeque
///
/// `past` drops its oldest entries when the limit is reached, and `future`
/// is popped from the front, so both ends of both stacks need to be cheap.
#[derive(Debug, Clone)]
pub struct History<T> {
    /// Older snapshots, most recent last
    past: VecDeque<T>,
    /// The live snapshot
    present: T,
    /// Undone snapshots, most recently undone first
    future: VecDeque<T>,
    /// Maximum number of past entries (0 = unlimited)
    limit: usize,
    /// Entry pushed out of `past` by the latest commit, kept for `retract`
    evicted: Option<T>,
}

impl<T> History<T> {
    /// Creates a history whose live snapshot is `initial`.
    pub fn new(initial: T) -> Self {
        Self::with_limit(initial, DEFAULT_HISTORY_LIMIT)
    }

    /// Creates a history with a custom depth limit.
    pub fn with_limit(initial: T, limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: initial,
            future: VecDeque::new(),
            limit,
            evicted: None,
        }
    }

    /// Returns the live snapshot.
    pub fn present(&self) -> &T {
        &self.present
    }

    /// Makes `next` live and records the previous snapshot as an undo point.
    ///
    /// Clears the redo stack.
    pub fn commit(&mut self, next: T) {
        let previous = std::mem::replace(&mut self.present, next);
        self.past.push_back(previous);
        self.future.clear();

        self.evicted = None;
        while self.limit > 0 && self.past.len() > self.limit {
            self.evicted = self.past.pop_front();
        }
    }

    /// Steps back one commit. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        self.evicted = None;
        true
    }

    /// Steps forward one undone commit. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        self.evicted = None;
        true
    }

    /// Drops the most recent commit as if it never happened.
    ///
    /// Unlike `undo`, nothing is pushed onto the redo stack, and an undo
    /// point the commit pushed past the limit is put back. Only valid while
    /// the redo stack is empty (i.e. right after a commit).
    pub fn retract(&mut self) -> bool {
        if !self.future.is_empty() {
            return false;
        }
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        self.present = previous;
        if let Some(oldest) = self.evicted.take() {
            self.past.push_front(oldest);
        }
        true
    }

    /// Replaces the live snapshot without recording an undo point.
    pub fn amend(&mut self, present: T) {
        self.present = present;
    }

    /// Returns true if there are commits to undo.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Returns true if there are commits to redo.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Returns the number of undo steps available.
    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    /// Returns the number of redo steps available.
    pub fn redo_count(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_history_undo_redo() {
        let mut history = History::new("a");
        history.commit("b");
        history.commit("c");

        assert!(history.undo());
        assert_eq!(*history.present(), "b");
        assert!(history.can_redo());

        assert!(history.redo());
        assert_eq!(*history.present(), "c");
        assert!(!history.redo());
    }

    #[test]
    fn test_empty_history_is_noop() {
        let mut history = History::new(1);
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(*history.present(), 1);
    }

    #[test]
    fn test_commit_after_undo_discards_redo_branch() {
        let mut history = History::new(0);
        history.commit(1);
        history.commit(2);
        history.undo();
        history.commit(3);

        assert!(!history.can_redo());
        assert_eq!(history.undo_count(), 2);
        history.undo();
        assert_eq!(*history.present(), 1);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::with_limit(0, 2);
        for i in 1..=5 {
            history.commit(i);
        }
        assert_eq!(history.undo_count(), 2);
        history.undo();
        history.undo();
        assert_eq!(*history.present(), 3);
    }

    #[test]
    fn test_retract_leaves_no_redo() {
        let mut history = History::new("before");
        history.commit("after");
        assert!(history.retract());
        assert_eq!(*history.present(), "before");
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_retract_refused_after_undo() {
        let mut history = History::new(0);
        history.commit(1);
        history.commit(2);
        history.undo();
        assert!(!history.retract());
        assert_eq!(*history.present(), 1);
    }

    #[test]
    fn test_retract_at_limit_restores_oldest() {
        let mut history = History::with_limit(0, 2);
        history.commit(1);
        history.commit(2);
        history.commit(3);
        assert_eq!(history.undo_count(), 2);

        assert!(history.retract());
        assert_eq!(*history.present(), 2);
        assert_eq!(history.undo_count(), 2);
        history.undo();
        history.undo();
        assert_eq!(*history.present(), 0);
    }

    #[test]
    fn test_evicted_entry_is_not_restored_after_undo() {
        let mut history = History::with_limit(0, 1);
        history.commit(1);
        history.commit(2);
        history.undo();
        history.redo();

        assert!(history.retract());
        assert_eq!(*history.present(), 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_amend_keeps_stacks() {
        let mut history = History::new(0);
        history.commit(1);
        history.amend(5);
        assert_eq!(*history.present(), 5);
        assert_eq!(history.undo_count(), 1);
        history.undo();
        assert_eq!(*history.present(), 0);
    }

    proptest! {
        #[test]
        fn prop_undo_then_redo_restores_live(
            commits in proptest::collection::vec(any::<i32>(), 1..30),
            undos in 0usize..30,
        ) {
            let mut history = History::with_limit(0, 0);
            for c in commits {
                history.commit(c);
            }
            for _ in 0..undos {
                history.undo();
            }

            let before = *history.present();
            let past = history.undo_count();
            if history.undo() {
                prop_assert!(history.redo());
            }
            prop_assert_eq!(*history.present(), before);
            prop_assert_eq!(history.undo_count(), past);
        }
    }
}
