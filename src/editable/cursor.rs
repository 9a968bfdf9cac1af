//! Caret position for a manuscript document.

use crate::layout::{CellPos, GridLayout};

/// The primary caret: a buffer offset plus its grid cell.
///
/// The cell is derived from the layout and cached; any buffer mutation or
/// re-flow invalidates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub offset: usize,
    /// Desired row for column-to-column movement.
    /// Moving across a short column keeps the row the caret came from so the
    /// next move lands back on it.
    pub desired_row: Option<usize>,
    cell: Option<CellPos>,
}

impl Cursor {
    pub const fn new(offset: usize) -> Self {
        Self {
            offset,
            desired_row: None,
            cell: None,
        }
    }

    /// Move to `offset`, dropping the cached cell
    pub fn set_offset(&mut self, offset: usize) {
        if self.offset != offset {
            self.offset = offset;
            self.cell = None;
        }
    }

    /// Clear desired row (call after moves along the column)
    pub fn clear_desired_row(&mut self) {
        self.desired_row = None;
    }

    /// Set desired row to `row` unless one is already remembered
    pub fn set_desired_row(&mut self, row: usize) {
        if self.desired_row.is_none() {
            self.desired_row = Some(row);
        }
    }

    /// Row to aim for when moving between columns
    pub fn effective_row(&self, current_row: usize) -> usize {
        self.desired_row.unwrap_or(current_row)
    }

    /// Forget the cached cell (after a re-flow)
    pub fn invalidate(&mut self) {
        self.cell = None;
    }

    /// Cached cell, if still valid
    pub fn cached_cell(&self) -> Option<CellPos> {
        self.cell
    }

    /// Clamp into `[0, len]` and resolve the cell against `layout`
    pub fn resolve(&mut self, layout: &GridLayout, len: usize) -> CellPos {
        if self.offset > len {
            self.offset = len;
            self.cell = None;
        }
        if let Some(cell) = self.cell {
            return cell;
        }
        let cell = layout.cell_of(self.offset).unwrap_or_default();
        self.cell = Some(cell);
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editable::TextBuffer;
    use crate::layout::GridSize;

    #[test]
    fn test_cursor_desired_row() {
        let mut cursor = Cursor::new(5);
        assert_eq!(cursor.effective_row(3), 3);

        cursor.set_desired_row(3);
        cursor.set_desired_row(0); // already remembered
        assert_eq!(cursor.effective_row(1), 3);

        cursor.clear_desired_row();
        assert_eq!(cursor.effective_row(1), 1);
    }

    #[test]
    fn test_cursor_resolve_clamps_and_caches() {
        let buffer = TextBuffer::from_text("あいうえ");
        let layout = GridLayout::new(&buffer, GridSize::new(2, 4).unwrap(), true);
        let mut cursor = Cursor::new(10);
        let cell = cursor.resolve(&layout, buffer.len());
        assert_eq!(cursor.offset, 4);
        assert_eq!(cell, CellPos::new(0, 2, 0));
        assert_eq!(cursor.cached_cell(), Some(cell));

        cursor.set_offset(1);
        assert_eq!(cursor.cached_cell(), None);
        assert_eq!(cursor.resolve(&layout, buffer.len()), CellPos::new(0, 0, 1));
    }
}
