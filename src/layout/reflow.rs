//! Column filling with kinsoku fix-up.
//!
//! Units are placed top to bottom in a column; a full column is only closed
//! once the unit that would start the next column is known, so the break can
//! be moved back (oidashi) when it would leave an opening bracket at the end
//! of the column or a closing mark at the head of the next one.

use super::tokenize::Unit;
use super::GridPoint;

/// Maximum number of cells a column break may move back
pub const MAX_CASCADE: usize = 3;

/// A unit with its global cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedUnit {
    pub unit: Unit,
    pub at: GridPoint,
}

pub struct Placer {
    rows: usize,
    gcol: usize,
    column: Vec<Unit>,
    placed: Vec<PlacedUnit>,
}

impl Placer {
    /// Start placing at the top of global column `gcol`, appending to `placed`
    pub fn new(rows: usize, gcol: usize, placed: Vec<PlacedUnit>) -> Self {
        Self {
            rows,
            gcol,
            column: Vec::with_capacity(rows),
            placed,
        }
    }

    pub fn gcol(&self) -> usize {
        self.gcol
    }

    /// Nothing placed or carried in the current column yet
    pub fn at_column_start(&self) -> bool {
        self.column.is_empty()
    }

    /// Close the current column if it is full, using `next` as lookahead
    pub fn make_room(&mut self, next: &Unit) {
        if self.column.len() < self.rows {
            return;
        }
        let keep = self.break_point(next);
        if keep < self.rows {
            tracing::trace!(
                "kinsoku: column {} breaks after {} of {} cells",
                self.gcol,
                keep,
                self.rows
            );
        }
        let carried: Vec<Unit> = self.column.drain(keep..).collect();
        self.flush_column();
        self.column = carried;
    }

    /// Place a unit. The caller must call `make_room` first.
    pub fn place(&mut self, unit: Unit) {
        debug_assert!(self.column.len() < self.rows);
        let is_break = unit.is_break();
        self.column.push(unit);
        if is_break {
            self.flush_column();
        }
    }

    /// Finish placement; returns placed units and the end-of-document cell
    pub fn finish(mut self) -> (Vec<PlacedUnit>, GridPoint) {
        let end = if self.column.is_empty() {
            GridPoint::new(self.gcol, 0)
        } else if self.column.len() == self.rows {
            self.flush_column();
            GridPoint::new(self.gcol, 0)
        } else {
            let row = self.column.len();
            let gcol = self.gcol;
            self.emit_column();
            GridPoint::new(gcol, row)
        };
        (self.placed, end)
    }

    /// Hand back the units placed so far, dropping the open column
    pub fn into_placed(self) -> Vec<PlacedUnit> {
        self.placed
    }

    /// Number of units to keep in the full column when `next` follows it.
    ///
    /// Line-end prohibition is checked before line-head prohibition; the
    /// largest break point satisfying both wins. If none exists within
    /// `MAX_CASCADE` cells the column is kept full.
    fn break_point(&self, next: &Unit) -> usize {
        let rows = self.rows;
        let min_keep = rows.saturating_sub(MAX_CASCADE).max(1);
        let mut keep = rows;
        loop {
            let last = &self.column[keep - 1];
            let head = self.column.get(keep).unwrap_or(next);
            if !last.is_line_end_prohibited() && !head.is_line_head_prohibited() {
                return keep;
            }
            if keep == min_keep {
                return rows;
            }
            keep -= 1;
        }
    }

    fn emit_column(&mut self) {
        let gcol = self.gcol;
        self.placed.extend(
            self.column
                .drain(..)
                .enumerate()
                .map(|(row, unit)| PlacedUnit {
                    unit,
                    at: GridPoint::new(gcol, row),
                }),
        );
    }

    fn flush_column(&mut self) {
        self.emit_column();
        self.gcol += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tokenize::Tokenizer;
    use ropey::Rope;

    fn place(text: &str, rows: usize) -> (Vec<PlacedUnit>, GridPoint) {
        let rope = Rope::from_str(text);
        let mut placer = Placer::new(rows, 0, Vec::new());
        for unit in Tokenizer::new(&rope, 0, true) {
            placer.make_room(&unit);
            placer.place(unit);
        }
        placer.finish()
    }

    fn column_text(placed: &[PlacedUnit], gcol: usize) -> String {
        placed
            .iter()
            .filter(|p| p.at.gcol == gcol)
            .map(|p| p.unit.first_char())
            .collect()
    }

    #[test]
    fn test_fills_columns_top_to_bottom() {
        let (placed, end) = place("あいうえお", 2);
        assert_eq!(column_text(&placed, 0), "あい");
        assert_eq!(column_text(&placed, 1), "うえ");
        assert_eq!(column_text(&placed, 2), "お");
        assert_eq!(end, GridPoint::new(2, 1));
    }

    #[test]
    fn test_line_break_occupies_cell_and_ends_column() {
        let (placed, end) = place("あ\nい", 3);
        assert_eq!(placed[1].at, GridPoint::new(0, 1));
        assert_eq!(placed[2].at, GridPoint::new(1, 0));
        assert_eq!(end, GridPoint::new(1, 1));
    }

    #[test]
    fn test_full_column_at_end_moves_end_to_next_column() {
        let (_, end) = place("あい", 2);
        assert_eq!(end, GridPoint::new(1, 0));
    }

    #[test]
    fn test_closing_bracket_pushes_previous_char_forward() {
        let (placed, _) = place("あいう」え", 3);
        assert_eq!(column_text(&placed, 0), "あい");
        assert_eq!(column_text(&placed, 1), "う」え");
    }

    #[test]
    fn test_opening_bracket_never_ends_column() {
        let (placed, _) = place("あい「うえ", 3);
        assert_eq!(column_text(&placed, 0), "あい");
        assert_eq!(column_text(&placed, 1), "「うえ");
    }

    #[test]
    fn test_unsatisfiable_run_keeps_column_full() {
        let (placed, _) = place("」」」」」」", 3);
        assert_eq!(column_text(&placed, 0), "」」」");
        assert_eq!(column_text(&placed, 1), "」」」");
    }
}
