//! Message types for document editing.

/// Direction of a caret move in grid space.
///
/// Columns run right to left, so `Left` goes to the following column and
/// `Right` to the preceding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    /// Toward the top of the column (earlier text)
    Up,
    /// Toward the bottom of the column (later text)
    Down,
    /// Next column
    Left,
    /// Previous column
    Right,
    LineStart,
    LineEnd,
    DocStart,
    DocEnd,
}

/// Granularity of a caret move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MoveUnit {
    #[default]
    Cell,
    Word,
}

/// What produced an undo command; only `Typing` coalesces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Typing,
    /// Programmatic insert at an offset
    Insert,
    Newline,
    Delete,
    Cut,
    Paste,
    Replace,
}

/// Unified message type for document editing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EditMsg {
    // === Movement ===
    /// Move caret and collapse the selection
    Move(MoveDirection, MoveUnit),
    /// Move caret and extend the selection
    Extend(MoveDirection, MoveUnit),

    // === Insertion ===
    /// Committed character from the keyboard or IME
    Type(char),
    /// Committed text from the IME
    InsertText(String),
    Newline,
    /// Ideographic space
    Tab,

    // === Deletion ===
    DeleteBackward,
    DeleteForward,

    // === Selection ===
    SelectAll,
    CollapseSelection,

    // === Clipboard ===
    Cut,
    Paste(String),

    // === Undo/Redo ===
    Undo,
    Redo,
}

impl EditMsg {
    /// Check if this message may modify the buffer
    pub fn is_editing(&self) -> bool {
        matches!(
            self,
            EditMsg::Type(_)
                | EditMsg::InsertText(_)
                | EditMsg::Newline
                | EditMsg::Tab
                | EditMsg::DeleteBackward
                | EditMsg::DeleteForward
                | EditMsg::Cut
                | EditMsg::Paste(_)
                | EditMsg::Undo
                | EditMsg::Redo
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_classification() {
        assert!(EditMsg::Type('あ').is_editing());
        assert!(EditMsg::Undo.is_editing());
        assert!(!EditMsg::SelectAll.is_editing());
        assert!(!EditMsg::Move(MoveDirection::Left, MoveUnit::Cell).is_editing());
        assert!(!EditMsg::Extend(MoveDirection::Up, MoveUnit::Word).is_editing());
    }
}
