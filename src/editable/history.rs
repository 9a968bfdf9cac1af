//! Edit history (undo/redo) for manuscript documents.

use std::time::{Duration, Instant};

use super::messages::EditKind;
use super::selection::Selection;

/// One buffer mutation that can be undone/redone.
///
/// Owns copies of the text it touched so it stays valid after later edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoCommand {
    /// Character offset where the edit occurred
    pub offset: usize,
    /// Text that was removed (empty for pure inserts)
    pub deleted: String,
    /// Text that was inserted (empty for pure deletes)
    pub inserted: String,
    pub kind: EditKind,
    /// Caret and anchor before the edit
    pub before: Selection,
    /// Caret and anchor after the edit
    pub after: Selection,
    pub recorded_at: Instant,
}

impl UndoCommand {
    pub fn new(
        kind: EditKind,
        offset: usize,
        deleted: String,
        inserted: String,
        before: Selection,
        after: Selection,
    ) -> Self {
        Self {
            offset,
            deleted,
            inserted,
            kind,
            before,
            after,
            recorded_at: Instant::now(),
        }
    }

    /// Override the timestamp (for replaying recorded input)
    pub fn at(mut self, recorded_at: Instant) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    pub fn deleted_len(&self) -> usize {
        self.deleted.chars().count()
    }

    pub fn inserted_len(&self) -> usize {
        self.inserted.chars().count()
    }

    /// Get the inverse command
    pub fn inverse(&self) -> Self {
        Self {
            offset: self.offset,
            deleted: self.inserted.clone(),
            inserted: self.deleted.clone(),
            kind: self.kind,
            before: self.after,
            after: self.before,
            recorded_at: self.recorded_at,
        }
    }

    /// True when `next` continues this command's typing run
    fn absorbs(&self, next: &UndoCommand, window: Duration) -> bool {
        self.kind == EditKind::Typing
            && next.kind == EditKind::Typing
            && next.deleted.is_empty()
            && next.inserted_len() == 1
            && next.offset == self.offset + self.inserted_len()
            && next.before == self.after
            && next
                .recorded_at
                .checked_duration_since(self.recorded_at)
                .is_some_and(|gap| gap <= window)
    }
}

/// Undo/redo stacks with typing coalescing.
#[derive(Debug, Clone)]
pub struct UndoEngine {
    undo_stack: Vec<UndoCommand>,
    redo_stack: Vec<UndoCommand>,
    limit: Option<usize>,
    coalesce_window: Duration,
    /// Set after undo/redo so the next keystroke starts a fresh step
    sealed: bool,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new(None, super::options::DEFAULT_COALESCE_WINDOW)
    }
}

impl UndoEngine {
    pub fn new(limit: Option<usize>, coalesce_window: Duration) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit,
            coalesce_window,
            sealed: false,
        }
    }

    /// Record an executed command (clears redo stack).
    ///
    /// Returns true when the command was merged into the previous one.
    pub fn push(&mut self, cmd: UndoCommand) -> bool {
        self.redo_stack.clear();

        if !self.sealed {
            if let Some(last) = self.undo_stack.last_mut() {
                if last.absorbs(&cmd, self.coalesce_window) {
                    last.inserted.push_str(&cmd.inserted);
                    last.after = cmd.after;
                    last.recorded_at = cmd.recorded_at;
                    return true;
                }
            }
        }
        self.sealed = false;
        self.undo_stack.push(cmd);

        if let Some(limit) = self.limit {
            while self.undo_stack.len() > limit {
                self.undo_stack.remove(0);
            }
        }
        false
    }

    /// Close the current typing run
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Pop the command to undo (moves it to the redo stack)
    pub fn pop_undo(&mut self) -> Option<UndoCommand> {
        let cmd = self.undo_stack.pop()?;
        self.redo_stack.push(cmd.clone());
        self.sealed = true;
        Some(cmd)
    }

    /// Pop the command to redo (moves it back to the undo stack)
    pub fn pop_redo(&mut self) -> Option<UndoCommand> {
        let cmd = self.redo_stack.pop()?;
        self.undo_stack.push(cmd.clone());
        self.sealed = true;
        Some(cmd)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.sealed = false;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(offset: usize, ch: char, at: Instant) -> UndoCommand {
        UndoCommand::new(
            EditKind::Typing,
            offset,
            String::new(),
            ch.to_string(),
            Selection::collapsed(offset),
            Selection::collapsed(offset + 1),
        )
        .at(at)
    }

    #[test]
    fn test_command_inverse() {
        let cmd = UndoCommand::new(
            EditKind::Replace,
            5,
            "旧".to_string(),
            "新しい".to_string(),
            Selection::new(5, 6),
            Selection::collapsed(8),
        );
        let inv = cmd.inverse();
        assert_eq!(inv.deleted, "新しい");
        assert_eq!(inv.inserted, "旧");
        assert_eq!(inv.before, cmd.after);
        assert_eq!(inv.after, cmd.before);
        assert_eq!(inv.inverse(), cmd);
    }

    #[test]
    fn test_typing_coalesces_within_window() {
        let t0 = Instant::now();
        let mut history = UndoEngine::default();
        assert!(!history.push(typed(0, 'あ', t0)));
        assert!(history.push(typed(1, 'い', t0 + Duration::from_millis(300))));
        assert!(history.push(typed(2, 'う', t0 + Duration::from_millis(900))));
        assert_eq!(history.undo_count(), 1);

        let cmd = history.pop_undo().unwrap();
        assert_eq!(cmd.inserted, "あいう");
        assert_eq!(cmd.before, Selection::collapsed(0));
        assert_eq!(cmd.after, Selection::collapsed(3));
    }

    #[test]
    fn test_typing_gap_starts_new_step() {
        let t0 = Instant::now();
        let mut history = UndoEngine::default();
        history.push(typed(0, 'あ', t0));
        assert!(!history.push(typed(1, 'い', t0 + Duration::from_millis(1500))));
        assert_eq!(history.undo_count(), 2);
    }

    #[test]
    fn test_non_typing_breaks_run() {
        let t0 = Instant::now();
        let mut history = UndoEngine::default();
        history.push(typed(0, 'あ', t0));
        history.push(
            UndoCommand::new(
                EditKind::Paste,
                1,
                String::new(),
                "x".to_string(),
                Selection::collapsed(1),
                Selection::collapsed(2),
            )
            .at(t0),
        );
        assert!(!history.push(typed(2, 'い', t0)));
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn test_undo_seals_typing_run() {
        let t0 = Instant::now();
        let mut history = UndoEngine::default();
        history.push(typed(0, 'あ', t0));
        history.push(typed(1, 'い', t0));
        history.pop_undo();
        history.pop_redo();
        assert!(!history.push(typed(2, 'う', t0)));
        assert_eq!(history.undo_count(), 2);
    }

    #[test]
    fn test_push_clears_redo() {
        let t0 = Instant::now();
        let mut history = UndoEngine::default();
        history.push(typed(0, 'a', t0));
        history.pop_undo();
        assert!(history.can_redo());

        history.push(typed(0, 'b', t0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_limit() {
        let t0 = Instant::now();
        let mut history = UndoEngine::new(Some(3), Duration::ZERO);
        for i in 0..5 {
            history.push(typed(i, 'x', t0 + Duration::from_secs(i as u64)));
        }
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn test_unbounded_by_default() {
        let t0 = Instant::now();
        let mut history = UndoEngine::new(None, Duration::ZERO);
        for i in 0..2000 {
            history.push(typed(i, 'x', t0 + Duration::from_secs(i as u64)));
        }
        assert_eq!(history.undo_count(), 2000);
    }
}
