//! Manuscript grid layout.
//!
//! Projects a [`TextBuffer`] onto pages of `rows x cols` cells. Columns run
//! right to left inside a page (column 0 is the rightmost), rows top to
//! bottom. Internally every cell is addressed by a global column index
//! (counting across pages) and a row, which keeps the offset -> cell mapping
//! a monotonic walk.
//!
//! Each layout unit (a character, a tate-chu-yoko pair or a line break)
//! occupies one cell. The cell after the last unit is the end-of-document
//! caret cell.

mod reflow;
mod tokenize;

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::editable::{DirtyRange, TextBuffer};
use crate::error::{EngineError, Result};
use crate::glyph::{self, RenderHint};

use reflow::{PlacedUnit, Placer};
use tokenize::{is_clean_boundary, Tokenizer, Unit, UnitKind};

/// Grid dimensions of one manuscript page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: usize,
    pub cols: usize,
}

impl GridSize {
    /// Standard 400-character manuscript sheet doubled (40 x 40)
    pub const DEFAULT: GridSize = GridSize { rows: 40, cols: 40 };
    /// Classic 20 x 20 genko yoshi
    pub const CLASSIC: GridSize = GridSize { rows: 20, cols: 20 };

    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(EngineError::InvalidGrid { rows, cols });
        }
        Ok(Self { rows, cols })
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Global cell address: column index across all pages, row within the column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridPoint {
    pub gcol: usize,
    pub row: usize,
}

impl GridPoint {
    pub const fn new(gcol: usize, row: usize) -> Self {
        Self { gcol, row }
    }
}

/// Page-relative cell address. `col` counts right to left.
///
/// Ordering follows reading order: page, then column, then row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub page: usize,
    pub col: usize,
    pub row: usize,
}

impl CellPos {
    pub const fn new(page: usize, col: usize, row: usize) -> Self {
        Self { page, col, row }
    }
}

/// One occupied cell of an exported page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub col: usize,
    pub row: usize,
    /// Buffer range covered by the cell
    pub offset: usize,
    pub len: usize,
    /// Stored characters
    pub text: String,
    /// Characters to draw (vertical forms substituted)
    pub glyph: String,
    pub hint: RenderHint,
}

/// One exported manuscript page; `cells` holds occupied cells in reading order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub index: usize,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
}

impl Page {
    pub fn cell(&self, col: usize, row: usize) -> Option<&Cell> {
        self.cells
            .binary_search_by(|c| (c.col, c.row).cmp(&(col, row)))
            .ok()
            .map(|i| &self.cells[i])
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, col: usize) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(move |c| c.col == col)
    }
}

/// Outcome of a re-flow pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflowStats {
    /// First page whose content may have changed
    pub first_page: usize,
    /// Units placed by this pass
    pub placed: usize,
    /// True when the pass stopped early because the old layout took over
    pub converged: bool,
}

/// Offset <-> cell mapping for one document.
#[derive(Debug, Clone)]
pub struct GridLayout {
    size: GridSize,
    tate_chu_yoko: bool,
    units: Vec<PlacedUnit>,
    end: GridPoint,
    text_len: usize,
}

impl GridLayout {
    /// Lay out a buffer from scratch
    pub fn new(buffer: &TextBuffer, size: GridSize, tate_chu_yoko: bool) -> Self {
        let mut layout = Self {
            size,
            tate_chu_yoko,
            units: Vec::new(),
            end: GridPoint::default(),
            text_len: 0,
        };
        layout.reflow(buffer, None);
        layout
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn tate_chu_yoko(&self) -> bool {
        self.tate_chu_yoko
    }

    /// Number of pages, including the page holding the end-of-document cell
    pub fn page_count(&self) -> usize {
        self.end.gcol / self.size.cols + 1
    }

    /// Cell where the caret sits at the end of the document
    pub fn end_cell(&self) -> CellPos {
        self.to_cell(self.end)
    }

    /// Change the grid. Fails without touching the layout when either
    /// dimension is zero.
    pub fn resize(&mut self, buffer: &TextBuffer, rows: usize, cols: usize) -> Result<ReflowStats> {
        let size = GridSize::new(rows, cols)?;
        self.size = size;
        tracing::debug!("layout resized to {}x{}", rows, cols);
        Ok(self.reflow(buffer, None))
    }

    pub fn set_tate_chu_yoko(&mut self, buffer: &TextBuffer, enabled: bool) -> ReflowStats {
        self.tate_chu_yoko = enabled;
        self.reflow(buffer, None)
    }

    /// Re-flow after a buffer mutation.
    ///
    /// With a dirty range, placement restarts at the page holding the column
    /// before the edit and stops as soon as a column start lines up with the
    /// previous layout past the edit. Without one the whole buffer is laid
    /// out again.
    pub fn reflow(&mut self, buffer: &TextBuffer, dirty: Option<DirtyRange>) -> ReflowStats {
        let rope = buffer.rope();
        let (restart_idx, restart_gcol) = match dirty {
            Some(d) if !self.units.is_empty() && d.start > 0 => self.restart_point(buffer, d),
            _ => (0, 0),
        };

        let old_tail = self.units.split_off(restart_idx);
        let mut kept = std::mem::take(&mut self.units);
        kept.reserve(old_tail.len());
        let restart = old_tail.first().map_or(self.text_len, |p| p.unit.start);
        let first_page = restart_gcol / self.size.cols;

        let mut placer = Placer::new(self.size.rows, restart_gcol, kept);
        let mut placed = 0;
        for unit in Tokenizer::new(rope, restart, self.tate_chu_yoko) {
            placer.make_room(&unit);
            if let Some(d) = dirty {
                if placer.at_column_start() {
                    if let Some(j) = Self::converges(rope, &old_tail, &unit, d) {
                        // Placement from a column head depends only on the
                        // units that follow, so the old tail moves as a block
                        let delta = d.delta();
                        let shift = placer.gcol() as isize - old_tail[j].at.gcol as isize;
                        let mut units = placer.into_placed();
                        units.extend(old_tail[j..].iter().map(|p| PlacedUnit {
                            unit: p.unit.shifted(delta),
                            at: GridPoint::new((p.at.gcol as isize + shift) as usize, p.at.row),
                        }));
                        self.units = units;
                        self.end.gcol = (self.end.gcol as isize + shift) as usize;
                        self.text_len = buffer.len();
                        tracing::debug!(
                            "reflow from page {} converged after {} units",
                            first_page,
                            placed
                        );
                        return ReflowStats {
                            first_page,
                            placed,
                            converged: true,
                        };
                    }
                }
            }
            placer.place(unit);
            placed += 1;
        }

        let (units, end) = placer.finish();
        self.units = units;
        self.end = end;
        self.text_len = buffer.len();
        tracing::debug!(
            "reflow from page {} placed {} units, {} pages",
            first_page,
            placed,
            self.page_count()
        );
        ReflowStats {
            first_page,
            placed,
            converged: false,
        }
    }

    /// Index into `units` and global column where an incremental pass starts
    fn restart_point(&self, buffer: &TextBuffer, dirty: DirtyRange) -> (usize, usize) {
        let cols = self.size.cols;
        let before = self.unit_index(dirty.start - 1).min(self.units.len() - 1);
        let mut page = self.units[before].at.gcol.saturating_sub(1) / cols;
        loop {
            let idx = self.units.partition_point(|p| p.at.gcol < page * cols);
            let start = self.units[idx].unit.start;
            if page == 0 || is_clean_boundary(buffer.rope(), start) {
                return if page == 0 { (0, 0) } else { (idx, page * cols) };
            }
            page -= 1;
        }
    }

    /// Index of the old unit where the new pass can hand over, if any: the
    /// same unit past the edit, heading a column in the old layout too.
    fn converges(
        rope: &ropey::Rope,
        old_tail: &[PlacedUnit],
        next: &Unit,
        dirty: DirtyRange,
    ) -> Option<usize> {
        // The character before `next` must be unchanged text and must not
        // join `next` into a run
        if next.start <= dirty.end_new || !is_clean_boundary(rope, next.start) {
            return None;
        }
        let old_start = (next.start as isize - dirty.delta()) as usize;
        let j = old_tail
            .binary_search_by(|p| p.unit.start.cmp(&old_start))
            .ok()?;
        let old = &old_tail[j];
        (old.at.row == 0 && old.unit.shifted(dirty.delta()) == *next).then_some(j)
    }

    fn unit_index(&self, offset: usize) -> usize {
        self.units.partition_point(|p| p.unit.end <= offset)
    }

    fn to_cell(&self, at: GridPoint) -> CellPos {
        CellPos::new(at.gcol / self.size.cols, at.gcol % self.size.cols, at.row)
    }

    fn to_point(&self, cell: CellPos) -> GridPoint {
        let col = cell.col.min(self.size.cols - 1);
        let row = cell.row.min(self.size.rows - 1);
        GridPoint::new(cell.page * self.size.cols + col, row)
    }

    fn point_of(&self, offset: usize) -> Option<GridPoint> {
        if offset > self.text_len {
            return None;
        }
        if offset == self.text_len {
            return Some(self.end);
        }
        self.units.get(self.unit_index(offset)).map(|p| p.at)
    }

    /// Cell holding the character at `offset`; `len` maps to the
    /// end-of-document cell. Both characters of a tate-chu-yoko pair map to
    /// the pair's cell.
    pub fn cell_of(&self, offset: usize) -> Option<CellPos> {
        self.point_of(offset).map(|at| self.to_cell(at))
    }

    /// First buffer offset held by an occupied cell; the end-of-document cell
    /// maps to the buffer length. Empty cells map to nothing.
    pub fn offset_of(&self, cell: CellPos) -> Option<usize> {
        if cell.col >= self.size.cols || cell.row >= self.size.rows {
            return None;
        }
        let at = self.to_point(cell);
        if at == self.end {
            return Some(self.text_len);
        }
        self.units
            .binary_search_by(|p| p.at.cmp(&at))
            .ok()
            .map(|i| self.units[i].unit.start)
    }

    /// Caret offset closest to an arbitrary cell (used for clicks and
    /// column moves). Empty cells below a column's content resolve to the
    /// end of that column.
    pub fn nearest_offset(&self, cell: CellPos) -> usize {
        let at = self.to_point(cell);
        if at >= self.end {
            return self.text_len;
        }
        match self.units.binary_search_by(|p| p.at.cmp(&at)) {
            Ok(i) => self.units[i].unit.start,
            Err(i) => {
                // units[i - 1] is the last unit before `at` in reading order
                match i.checked_sub(1).map(|k| &self.units[k]) {
                    Some(prev) if prev.at.gcol == at.gcol => {
                        if prev.unit.is_break() {
                            prev.unit.start
                        } else {
                            prev.unit.end
                        }
                    }
                    _ => self
                        .units
                        .get(i)
                        .map_or(self.text_len, |p| p.unit.start),
                }
            }
        }
    }

    /// Next caret stop after `offset` (skips over tate-chu-yoko pairs)
    pub fn next_stop(&self, offset: usize) -> usize {
        if offset >= self.text_len {
            return self.text_len;
        }
        self.units[self.unit_index(offset)].unit.end
    }

    /// Previous caret stop before `offset`
    pub fn prev_stop(&self, offset: usize) -> usize {
        if offset == 0 {
            return 0;
        }
        let offset = offset.min(self.text_len);
        self.units[self.unit_index(offset - 1)].unit.start
    }

    /// Snap an offset inside a tate-chu-yoko pair to the pair's start
    pub fn snap(&self, offset: usize) -> usize {
        if offset >= self.text_len {
            return self.text_len;
        }
        self.units[self.unit_index(offset)].unit.start
    }

    /// Offset range `[first, caret_end]` of the column holding `offset`.
    /// The end is the caret position after the column's last character,
    /// or before its line break.
    pub fn column_bounds(&self, offset: usize) -> Option<(usize, usize)> {
        let at = self.point_of(offset)?;
        let first = self.units.partition_point(|p| p.at.gcol < at.gcol);
        let last = self.units.partition_point(|p| p.at.gcol <= at.gcol);
        if first == last {
            return Some((self.text_len, self.text_len));
        }
        let head = self.units[first].unit.start;
        let tail = &self.units[last - 1].unit;
        let end = if tail.is_break() { tail.start } else { tail.end };
        Some((head, end))
    }

    /// Cells covered by a buffer range (for match and selection highlighting)
    pub fn cells_for_range(&self, range: Range<usize>) -> Vec<CellPos> {
        let first = self.unit_index(range.start);
        self.units[first..]
            .iter()
            .take_while(|p| p.unit.start < range.end)
            .map(|p| self.to_cell(p.at))
            .collect()
    }

    /// All pages as styled cells, for an external renderer.
    pub fn export(&self) -> Vec<Page> {
        let cols = self.size.cols;
        let mut pages: Vec<Page> = (0..self.page_count())
            .map(|index| Page {
                index,
                rows: self.size.rows,
                cols,
                cells: Vec::new(),
            })
            .collect();

        for placed in &self.units {
            let unit = &placed.unit;
            let (text, glyph, hint) = match unit.kind {
                UnitKind::Char(c) => {
                    let hint = glyph::classify(c);
                    let drawn = match hint {
                        RenderHint::Substituted { glyph } => glyph,
                        _ => c,
                    };
                    (c.to_string(), drawn.to_string(), hint)
                }
                UnitKind::Group(pair) => {
                    let text: String = pair.iter().collect();
                    (
                        text.clone(),
                        text,
                        RenderHint::TateChuYoko { group: unit.start },
                    )
                }
                UnitKind::Break => (String::from("\n"), String::new(), RenderHint::LineBreak),
            };
            let cell = self.to_cell(placed.at);
            pages[cell.page].cells.push(Cell {
                col: cell.col,
                row: cell.row,
                offset: unit.start,
                len: unit.end - unit.start,
                text,
                glyph,
                hint,
            });
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(text: &str, rows: usize, cols: usize) -> (TextBuffer, GridLayout) {
        let buffer = TextBuffer::from_text(text);
        let layout = GridLayout::new(&buffer, GridSize::new(rows, cols).unwrap(), true);
        (buffer, layout)
    }

    #[test]
    fn test_grid_size_rejects_zero() {
        assert!(matches!(
            GridSize::new(0, 40),
            Err(EngineError::InvalidGrid { rows: 0, cols: 40 })
        ));
        assert!(GridSize::new(20, 0).is_err());
    }

    #[test]
    fn test_columns_run_right_to_left_then_pages() {
        let (_, layout) = layout("あいうえおかきく", 2, 2);
        assert_eq!(layout.cell_of(0), Some(CellPos::new(0, 0, 0)));
        assert_eq!(layout.cell_of(1), Some(CellPos::new(0, 0, 1)));
        assert_eq!(layout.cell_of(2), Some(CellPos::new(0, 1, 0)));
        assert_eq!(layout.cell_of(4), Some(CellPos::new(1, 0, 0)));
        assert_eq!(layout.cell_of(8), Some(CellPos::new(2, 0, 0)));
        assert_eq!(layout.page_count(), 3);
    }

    #[test]
    fn test_offset_of_round_trip() {
        let (buffer, layout) = layout("第12話「猫」\nです。", 3, 2);
        for offset in 0..=buffer.len() {
            let cell = layout.cell_of(offset).unwrap();
            let back = layout.offset_of(cell).unwrap();
            assert_eq!(back, layout.snap(offset), "offset {offset}");
        }
    }

    #[test]
    fn test_tate_chu_yoko_pair_shares_one_cell() {
        let (_, layout) = layout("第12話", 5, 1);
        assert_eq!(layout.cell_of(1), layout.cell_of(2));
        assert_eq!(layout.cell_of(3), Some(CellPos::new(0, 0, 2)));
        assert_eq!(layout.next_stop(1), 3);
        assert_eq!(layout.prev_stop(3), 1);
    }

    #[test]
    fn test_offset_of_empty_cell_is_none() {
        let (_, layout) = layout("あ\nい", 3, 3);
        assert_eq!(layout.offset_of(CellPos::new(0, 0, 2)), None);
        assert_eq!(layout.offset_of(CellPos::new(0, 1, 1)), Some(3));
    }

    #[test]
    fn test_nearest_offset_below_line_break() {
        let (_, layout) = layout("あい\nう", 4, 3);
        // below the break in column 0 -> before the break
        assert_eq!(layout.nearest_offset(CellPos::new(0, 0, 3)), 2);
        // below the end of the document
        assert_eq!(layout.nearest_offset(CellPos::new(0, 1, 3)), 4);
        assert_eq!(layout.nearest_offset(CellPos::new(0, 2, 0)), 4);
    }

    #[test]
    fn test_resize_zero_keeps_layout() {
        let (buffer, mut layout) = layout("あいうえお", 2, 2);
        let before = layout.export();
        assert!(layout.resize(&buffer, 0, 40).is_err());
        assert_eq!(layout.export(), before);
        assert_eq!(layout.size(), GridSize::new(2, 2).unwrap());
    }

    #[test]
    fn test_column_bounds() {
        let (_, layout) = layout("あいう\nえ", 5, 2);
        assert_eq!(layout.column_bounds(1), Some((0, 3)));
        assert_eq!(layout.column_bounds(4), Some((4, 5)));
    }

    #[test]
    fn test_export_hints() {
        let (_, layout) = layout("「A12」\n", 10, 1);
        let pages = layout.export();
        let cells = &pages[0].cells;
        assert_eq!(cells[0].glyph, "﹁");
        assert_eq!(cells[1].hint, RenderHint::Rotated);
        assert_eq!(cells[2].hint, RenderHint::TateChuYoko { group: 2 });
        assert_eq!(cells[2].text, "12");
        assert_eq!(cells[4].hint, RenderHint::LineBreak);
    }

    #[test]
    fn test_incremental_reflow_matches_full() {
        let mut buffer = TextBuffer::from_text(&"吾輩は猫である。名前はまだ無い。\n".repeat(20));
        let size = GridSize::new(4, 3).unwrap();
        let mut layout = GridLayout::new(&buffer, size, true);

        let dirty = buffer.insert(37, "「どこで生れたか」").unwrap();
        let stats = layout.reflow(&buffer, Some(dirty));
        assert!(stats.converged);
        let full = GridLayout::new(&buffer, size, true);
        assert_eq!(layout.export(), full.export());
        assert_eq!(layout.page_count(), full.page_count());
    }

    #[test]
    fn test_incremental_reflow_typing_sequence() {
        let mut buffer = TextBuffer::from_text("第1話\n「ここは」と彼は言った。\n\nAB12cd");
        let size = GridSize::new(3, 2).unwrap();
        let mut layout = GridLayout::new(&buffer, size, true);

        let edits: &[(usize, usize, &str)] = &[
            (2, 2, "2"),
            (6, 6, "」"),
            (0, 1, ""),
            (20, 22, "9"),
            (5, 5, "\n"),
            (3, 9, "、"),
        ];
        for &(start, end, text) in edits {
            let dirty = buffer.replace(start..end, text).unwrap();
            layout.reflow(&buffer, Some(dirty));
            let full = GridLayout::new(&buffer, size, true);
            assert_eq!(layout.export(), full.export(), "after {:?}", (start, end, text));
            assert_eq!(layout.cell_of(buffer.len()), full.cell_of(buffer.len()));
        }
    }

    #[test]
    fn test_reflow_is_idempotent() {
        let buffer = TextBuffer::from_text("「あ」い。う\n12え");
        let mut layout = GridLayout::new(&buffer, GridSize::new(3, 3).unwrap(), true);
        let first = layout.export();
        layout.reflow(&buffer, None);
        assert_eq!(layout.export(), first);
    }
}
