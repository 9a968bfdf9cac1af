//! Document - a manuscript buffer with its grid layout, caret, selection and history.
//!
//! Every mutation goes through one path: validate, apply to the buffer, record
//! an undo command, re-flow the dirty region, then re-resolve the caret. A
//! failed call returns before the buffer is touched.

use std::ops::Range;
use std::path::PathBuf;

use ropey::Rope;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::find::{CancelToken, FindEngine, FindMatch, FindQuery, SearchDirection};
use crate::layout::{CellPos, GridLayout, GridSize, Page, ReflowStats};
use crate::metadata::{NovelMetadata, ProgressReport};
use crate::util::{
    char_type, character_count, normalize_newlines, CharType, NewlineMode, IDEOGRAPHIC_SPACE,
};

use super::buffer::{DirtyRange, TextBuffer};
use super::cursor::Cursor;
use super::history::{UndoCommand, UndoEngine};
use super::messages::{EditKind, EditMsg, MoveDirection, MoveUnit};
use super::options::EditOptions;
use super::selection::Selection;

/// File-level facts about a document that the buffer does not hold.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    /// Stable id used to name autosave entries
    pub session_id: Uuid,
    pub path: Option<PathBuf>,
    /// Tab title
    pub display_name: String,
    /// Encoding label the file was decoded with
    pub encoding: String,
    /// Line break convention restored on save
    pub newline: NewlineMode,
    pub metadata_path: Option<PathBuf>,
    pub plot_path: Option<PathBuf>,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            path: None,
            display_name: String::new(),
            encoding: "utf-8".to_string(),
            newline: NewlineMode::Lf,
            metadata_path: None,
            plot_path: None,
        }
    }
}

/// Outcome of [`Document::replace_current`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceResult {
    /// The selection was a match and has been replaced
    pub replaced: bool,
    /// The following match, now selected
    pub next: Option<FindMatch>,
}

/// One open manuscript.
#[derive(Debug)]
pub struct Document {
    buffer: TextBuffer,
    layout: GridLayout,
    cursor: Cursor,
    selection: Selection,
    history: UndoEngine,
    find: FindEngine,
    options: EditOptions,
    /// Content at the last save, for the modified flag; `None` when the
    /// document holds unsaved work it did not produce itself
    saved: Option<Rope>,
    pub info: DocumentInfo,
    pub metadata: NovelMetadata,
}

impl Document {
    /// Create a document from text. Line breaks are normalised to `\n`.
    pub fn new(text: &str, size: GridSize, options: EditOptions) -> Self {
        let buffer = TextBuffer::from_text(&normalize_newlines(text));
        let layout = GridLayout::new(&buffer, size, options.tate_chu_yoko);
        let history = UndoEngine::new(options.history_limit, options.coalesce_window);
        let saved = Some(buffer.rope().clone());
        let mut document = Self {
            buffer,
            layout,
            cursor: Cursor::new(0),
            selection: Selection::collapsed(0),
            history,
            find: FindEngine::new(),
            options,
            saved,
            info: DocumentInfo {
                newline: NewlineMode::detect(text),
                ..DocumentInfo::default()
            },
            metadata: NovelMetadata::default(),
        };
        document.cursor.resolve(&document.layout, document.buffer.len());
        document
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    pub fn text(&self) -> String {
        self.buffer.content()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn cursor_offset(&self) -> usize {
        self.cursor.offset
    }

    /// Grid cell of the caret
    pub fn cursor_cell(&self) -> CellPos {
        self.cursor
            .cached_cell()
            .or_else(|| self.layout.cell_of(self.cursor.offset))
            .unwrap_or_default()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    pub fn selected_text(&self) -> String {
        self.buffer
            .slice(self.selection.range())
            .unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        self.options.enable_undo && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.options.enable_undo && self.history.can_redo()
    }

    pub fn history(&self) -> &UndoEngine {
        &self.history
    }

    /// Content differs from the last save
    pub fn is_modified(&self) -> bool {
        self.saved.as_ref() != Some(self.buffer.rope())
    }

    pub fn mark_saved(&mut self) {
        self.saved = Some(self.buffer.rope().clone());
    }

    /// Flag restored content as modified until the next save
    pub fn mark_unsaved(&mut self) {
        self.saved = None;
    }

    /// Content with the document's own line breaks, ready to write
    pub fn file_text(&self) -> String {
        self.info.newline.apply(&self.buffer.content())
    }

    /// Characters excluding line breaks
    pub fn character_count(&self) -> usize {
        self.buffer.rope().chunks().map(character_count).sum()
    }

    /// 1-based (page, column, row) of the caret for status display
    pub fn current_page_column_cell(&self) -> (usize, usize, usize) {
        let cell = self.cursor_cell();
        (cell.page + 1, cell.col + 1, cell.row + 1)
    }

    /// Progress of the manuscript against its daily goal
    pub fn progress(&self) -> ProgressReport {
        self.metadata
            .progress_goals
            .report(self.character_count())
    }

    // =========================================================================
    // Caret bookkeeping
    // =========================================================================

    fn place(&mut self, selection: Selection) {
        let len = self.buffer.len();
        self.selection = selection.clamped(len);
        self.cursor.set_offset(self.selection.active);
        self.cursor.resolve(&self.layout, len);
    }

    /// Re-flow after a mutation and re-resolve the caret
    fn relayout(&mut self, dirty: Option<DirtyRange>) -> ReflowStats {
        let stats = self.layout.reflow(&self.buffer, dirty);
        self.cursor.invalidate();
        self.place(self.selection);
        stats
    }

    /// Move the caret to `offset`, collapsing the selection
    pub fn set_cursor(&mut self, offset: usize) -> Result<()> {
        self.buffer.check_offset(offset)?;
        self.cursor.clear_desired_row();
        self.history.seal();
        self.place(Selection::collapsed(offset));
        Ok(())
    }

    /// Select from `anchor` to `active`, leaving the caret at `active`
    pub fn set_selection(&mut self, anchor: usize, active: usize) -> Result<()> {
        self.buffer.check_offset(anchor)?;
        self.buffer.check_offset(active)?;
        self.cursor.clear_desired_row();
        self.history.seal();
        self.place(Selection::new(anchor, active));
        Ok(())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Replace `range` with `text` as one undoable command.
    fn apply_edit(
        &mut self,
        kind: EditKind,
        range: Range<usize>,
        text: &str,
    ) -> Result<DirtyRange> {
        if self.options.read_only {
            return Err(EngineError::ReadOnly);
        }
        let text = normalize_newlines(text);
        let deleted = self.buffer.slice(range.clone())?;
        if deleted.is_empty() && text.is_empty() {
            return Ok(DirtyRange::new(range.start, range.start, range.start));
        }

        let before = self.selection;
        let dirty = self.buffer.replace(range.clone(), &text)?;
        let after = Selection::collapsed(dirty.end_new);
        if self.options.enable_undo {
            let merged = self.history.push(UndoCommand::new(
                kind,
                range.start,
                deleted,
                text,
                before,
                after,
            ));
            tracing::trace!("undo: {:?} at {} (merged: {})", kind, range.start, merged);
        }

        self.selection = after;
        self.cursor.clear_desired_row();
        let stats = self.relayout(Some(dirty));
        tracing::debug!(
            "edit {:?} {}..{} -> {}: reflow from page {}, {} units, converged {}",
            kind,
            dirty.start,
            dirty.end_old,
            dirty.end_new,
            stats.first_page,
            stats.placed,
            stats.converged
        );
        Ok(dirty)
    }

    /// Insert `text` at `offset`
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<()> {
        self.apply_edit(EditKind::Insert, offset..offset, text)
            .map(|_| ())
    }

    /// Delete `range`, returning the removed text
    pub fn delete(&mut self, range: Range<usize>) -> Result<String> {
        let removed = self.buffer.slice(range.clone())?;
        self.apply_edit(EditKind::Delete, range, "")?;
        Ok(removed)
    }

    pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<()> {
        self.apply_edit(EditKind::Replace, range, text).map(|_| ())
    }

    /// Type one committed character over the selection
    pub fn type_char(&mut self, ch: char) -> Result<()> {
        if ch == '\n' || ch == '\r' {
            return self.newline();
        }
        let mut buf = [0u8; 4];
        self.apply_edit(EditKind::Typing, self.selection.range(), ch.encode_utf8(&mut buf))
            .map(|_| ())
    }

    /// Insert committed IME text over the selection
    pub fn insert_text(&mut self, text: &str) -> Result<()> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(()),
            (Some(ch), None) => self.type_char(ch),
            _ => self
                .apply_edit(EditKind::Insert, self.selection.range(), text)
                .map(|_| ()),
        }
    }

    pub fn paste(&mut self, text: &str) -> Result<()> {
        self.apply_edit(EditKind::Paste, self.selection.range(), text)
            .map(|_| ())
    }

    pub fn newline(&mut self) -> Result<()> {
        self.apply_edit(EditKind::Newline, self.selection.range(), "\n")
            .map(|_| ())
    }

    /// Indent with an ideographic space
    pub fn tab(&mut self) -> Result<()> {
        self.type_char(IDEOGRAPHIC_SPACE)
    }

    /// Delete the selection, or the character before the caret.
    /// Returns whether anything was removed.
    pub fn delete_backward(&mut self) -> Result<bool> {
        let range = if self.has_selection() {
            self.selection.range()
        } else if self.cursor.offset == 0 {
            return Ok(false);
        } else {
            self.cursor.offset - 1..self.cursor.offset
        };
        self.apply_edit(EditKind::Delete, range, "")?;
        Ok(true)
    }

    /// Delete the selection, or the character after the caret
    pub fn delete_forward(&mut self) -> Result<bool> {
        let range = if self.has_selection() {
            self.selection.range()
        } else if self.cursor.offset >= self.buffer.len() {
            return Ok(false);
        } else {
            self.cursor.offset..self.cursor.offset + 1
        };
        self.apply_edit(EditKind::Delete, range, "")?;
        Ok(true)
    }

    /// Remove the selection and return it (for the clipboard)
    pub fn cut(&mut self) -> Result<String> {
        if !self.has_selection() {
            return Ok(String::new());
        }
        let text = self.selected_text();
        self.apply_edit(EditKind::Cut, self.selection.range(), "")?;
        Ok(text)
    }

    pub fn select_all(&mut self) {
        self.cursor.clear_desired_row();
        self.history.seal();
        self.place(Selection::new(0, self.buffer.len()));
    }

    pub fn collapse_selection(&mut self) {
        self.history.seal();
        self.place(Selection::collapsed(self.selection.active));
    }

    // =========================================================================
    // Undo / Redo
    // =========================================================================

    /// Undo the last command, restoring the caret and selection it started
    /// from. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.options.enable_undo || self.options.read_only {
            return Ok(false);
        }
        let Some(cmd) = self.history.pop_undo() else {
            return Ok(false);
        };
        let range = cmd.offset..cmd.offset + cmd.inserted_len();
        if let Err(e) = self.buffer.check_range(&range) {
            self.history.pop_redo();
            return Err(e);
        }
        let dirty = self.buffer.replace(range, &cmd.deleted)?;
        tracing::debug!("undo {:?} at {}", cmd.kind, cmd.offset);
        self.selection = cmd.before;
        self.cursor.clear_desired_row();
        self.relayout(Some(dirty));
        Ok(true)
    }

    /// Re-apply the last undone command
    pub fn redo(&mut self) -> Result<bool> {
        if !self.options.enable_undo || self.options.read_only {
            return Ok(false);
        }
        let Some(cmd) = self.history.pop_redo() else {
            return Ok(false);
        };
        let range = cmd.offset..cmd.offset + cmd.deleted_len();
        if let Err(e) = self.buffer.check_range(&range) {
            self.history.pop_undo();
            return Err(e);
        }
        let dirty = self.buffer.replace(range, &cmd.inserted)?;
        tracing::debug!("redo {:?} at {}", cmd.kind, cmd.offset);
        self.selection = cmd.after;
        self.cursor.clear_desired_row();
        self.relayout(Some(dirty));
        Ok(true)
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// Move the caret and collapse the selection
    pub fn move_by(&mut self, direction: MoveDirection, unit: MoveUnit) {
        self.motion(direction, unit, false);
    }

    /// Move the caret, keeping the selection anchor
    pub fn extend_selection(&mut self, direction: MoveDirection, unit: MoveUnit) {
        self.motion(direction, unit, true);
    }

    fn motion(&mut self, direction: MoveDirection, unit: MoveUnit, extend: bool) {
        let len = self.buffer.len();
        let caret = self.cursor.offset.min(len);
        let crosses_columns = matches!(direction, MoveDirection::Left | MoveDirection::Right);

        let target = if !extend && self.has_selection() && unit == MoveUnit::Cell {
            // A plain move out of a selection lands on its near edge
            match direction {
                MoveDirection::Up => Some(self.selection.start()),
                MoveDirection::Down => Some(self.selection.end()),
                _ => None,
            }
        } else {
            None
        };

        let target = target.unwrap_or_else(|| match direction {
            MoveDirection::Up => match unit {
                MoveUnit::Cell => self.layout.prev_stop(caret),
                MoveUnit::Word => self.layout.snap(self.word_start_before(caret)),
            },
            MoveDirection::Down => match unit {
                MoveUnit::Cell => self.layout.next_stop(caret),
                MoveUnit::Word => self.word_end_after(caret),
            },
            MoveDirection::Left => self.column_target(1, unit),
            MoveDirection::Right => self.column_target(-1, unit),
            MoveDirection::LineStart => self.layout.column_bounds(caret).map_or(caret, |(s, _)| s),
            MoveDirection::LineEnd => self.layout.column_bounds(caret).map_or(caret, |(_, e)| e),
            MoveDirection::DocStart => 0,
            MoveDirection::DocEnd => len,
        });

        if !crosses_columns {
            self.cursor.clear_desired_row();
        }
        let selection = if extend {
            Selection::new(self.selection.anchor, target)
        } else {
            Selection::collapsed(target)
        };
        self.history.seal();
        self.place(selection);
    }

    /// Offset in the column `step` columns after the caret's (reading
    /// order), on the remembered row. Word moves land on the column head.
    fn column_target(&mut self, step: isize, unit: MoveUnit) -> usize {
        let len = self.buffer.len();
        let cell = self.cursor.resolve(&self.layout, len);
        let cols = self.layout.size().cols;
        let gcol = cell.page * cols + cell.col;
        let end = self.layout.end_cell();
        let last_gcol = end.page * cols + end.col;

        let target_gcol = gcol as isize + step;
        if target_gcol < 0 {
            return 0;
        }
        let target_gcol = target_gcol as usize;
        if target_gcol > last_gcol {
            return len;
        }

        let row = match unit {
            MoveUnit::Cell => {
                self.cursor.set_desired_row(cell.row);
                self.cursor.effective_row(cell.row)
            }
            MoveUnit::Word => {
                self.cursor.clear_desired_row();
                0
            }
        };
        self.layout.nearest_offset(CellPos::new(
            target_gcol / cols,
            target_gcol % cols,
            row,
        ))
    }

    /// Start of the word before `offset`. Script changes count as word
    /// boundaries, so a kanji compound and its okurigana are separate words.
    fn word_start_before(&self, offset: usize) -> usize {
        let mut pos = offset.min(self.buffer.len());
        let type_at = |pos: usize| self.buffer.char_at(pos).map(char_type);

        while pos > 0
            && matches!(
                type_at(pos - 1),
                Some(CharType::Whitespace | CharType::Punctuation)
            )
        {
            pos -= 1;
        }
        let Some(word) = pos.checked_sub(1).and_then(type_at) else {
            return pos;
        };
        while pos > 0 && type_at(pos - 1) == Some(word) {
            pos -= 1;
        }
        pos
    }

    /// End of the word at `offset`, past any following whitespace
    fn word_end_after(&self, offset: usize) -> usize {
        let len = self.buffer.len();
        let mut pos = offset.min(len);
        let type_at = |pos: usize| self.buffer.char_at(pos).map(char_type);

        if let Some(start_type) = type_at(pos) {
            while pos < len && type_at(pos) == Some(start_type) {
                pos += 1;
            }
        }
        while pos < len && type_at(pos) == Some(CharType::Whitespace) {
            pos += 1;
        }
        pos
    }

    /// Place the caret at the text nearest to a grid cell (a click).
    /// Coordinates outside the grid are clamped to its edge.
    pub fn set_from_cell(&mut self, page: usize, col: usize, row: usize) -> usize {
        let offset = self.layout.nearest_offset(CellPos::new(page, col, row));
        self.cursor.clear_desired_row();
        self.history.seal();
        self.place(Selection::collapsed(offset));
        offset
    }

    /// Extend the selection to the text nearest to a grid cell (a drag)
    pub fn extend_to_cell(&mut self, page: usize, col: usize, row: usize) -> usize {
        let offset = self.layout.nearest_offset(CellPos::new(page, col, row));
        self.cursor.clear_desired_row();
        self.history.seal();
        self.place(Selection::new(self.selection.anchor, offset));
        offset
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Change the grid. On failure the layout and caret are unchanged.
    pub fn resize_grid(&mut self, rows: usize, cols: usize) -> Result<ReflowStats> {
        let stats = self.layout.resize(&self.buffer, rows, cols)?;
        self.cursor.invalidate();
        self.place(self.selection);
        Ok(stats)
    }

    pub fn set_tate_chu_yoko(&mut self, enabled: bool) -> ReflowStats {
        self.options.tate_chu_yoko = enabled;
        let stats = self.layout.set_tate_chu_yoko(&self.buffer, enabled);
        self.cursor.invalidate();
        self.place(self.selection);
        stats
    }

    pub fn export_layout(&self) -> Vec<Page> {
        self.layout.export()
    }

    /// Cells to highlight for a buffer range
    pub fn cells_for_range(&self, range: Range<usize>) -> Vec<CellPos> {
        self.layout.cells_for_range(range)
    }

    // =========================================================================
    // Find / Replace
    // =========================================================================

    /// Search from an explicit offset without touching the selection
    pub fn search(
        &mut self,
        query: &FindQuery,
        direction: SearchDirection,
        from: usize,
    ) -> Result<Option<FindMatch>> {
        self.find.search(&self.buffer, query, direction, from)
    }

    /// Find the next match after the selection (or before it, backward) and
    /// select it
    pub fn find(
        &mut self,
        query: &FindQuery,
        direction: SearchDirection,
    ) -> Result<Option<FindMatch>> {
        self.find_cancellable(query, direction, &CancelToken::new())
    }

    pub fn find_cancellable(
        &mut self,
        query: &FindQuery,
        direction: SearchDirection,
        cancel: &CancelToken,
    ) -> Result<Option<FindMatch>> {
        let from = match direction {
            SearchDirection::Forward => self.selection.end(),
            SearchDirection::Backward => self.selection.start(),
        };
        let found = self
            .find
            .search_cancellable(&self.buffer, query, direction, from, cancel)?;
        if let Some(m) = &found {
            self.cursor.clear_desired_row();
            self.history.seal();
            self.place(Selection::new(m.range.start, m.range.end));
        }
        Ok(found)
    }

    pub fn find_all(&mut self, query: &FindQuery) -> Result<Vec<Range<usize>>> {
        self.find.find_all(&self.buffer, query)
    }

    /// Cells of every match, grouped per match
    pub fn match_cells(&mut self, query: &FindQuery) -> Result<Vec<Vec<CellPos>>> {
        let matches = self.find_all(query)?;
        Ok(matches
            .into_iter()
            .map(|range| self.layout.cells_for_range(range))
            .collect())
    }

    /// Replace the selection if it is a match, then select the next match.
    pub fn replace_current(&mut self, query: &FindQuery, template: &str) -> Result<ReplaceResult> {
        let range = self.selection.range();
        let replaced = if self.find.is_match_at(&self.buffer, query, range.clone())? {
            let text = self
                .find
                .expand_replacement(&self.buffer, query, range.clone(), template)?;
            self.apply_edit(EditKind::Replace, range, &text)?;
            true
        } else {
            false
        };
        let next = self.find(query, SearchDirection::Forward)?;
        Ok(ReplaceResult { replaced, next })
    }

    /// Replace every match as a single undo step. Returns the match count.
    pub fn replace_all(&mut self, query: &FindQuery, template: &str) -> Result<usize> {
        if self.options.read_only {
            return Err(EngineError::ReadOnly);
        }
        let matches = self.find.find_all(&self.buffer, query)?;
        let (Some(first), Some(last)) = (matches.first(), matches.last()) else {
            return Ok(0);
        };
        let span = first.start..last.end;

        let mut replaced = String::new();
        let mut pos = span.start;
        for range in &matches {
            replaced.push_str(&self.buffer.slice(pos..range.start)?);
            replaced.push_str(
                &self
                    .find
                    .expand_replacement(&self.buffer, query, range.clone(), template)?,
            );
            pos = range.end;
        }
        self.apply_edit(EditKind::Replace, span, &replaced)?;
        tracing::debug!("replace all: {} matches", matches.len());
        Ok(matches.len())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Apply an editing message. Returns whether the buffer changed.
    pub fn apply(&mut self, msg: EditMsg) -> Result<bool> {
        let before = crate::tracing::CursorSnapshot::from_document(self);
        let revision = self.buffer.revision();

        match msg {
            EditMsg::Move(direction, unit) => self.move_by(direction, unit),
            EditMsg::Extend(direction, unit) => self.extend_selection(direction, unit),
            EditMsg::Type(ch) => self.type_char(ch)?,
            EditMsg::InsertText(text) => self.insert_text(&text)?,
            EditMsg::Newline => self.newline()?,
            EditMsg::Tab => self.tab()?,
            EditMsg::DeleteBackward => {
                self.delete_backward()?;
            }
            EditMsg::DeleteForward => {
                self.delete_forward()?;
            }
            EditMsg::SelectAll => self.select_all(),
            EditMsg::CollapseSelection => self.collapse_selection(),
            EditMsg::Cut => {
                self.cut()?;
            }
            EditMsg::Paste(text) => self.paste(&text)?,
            EditMsg::Undo => {
                self.undo()?;
            }
            EditMsg::Redo => {
                self.redo()?;
            }
        }

        let after = crate::tracing::CursorSnapshot::from_document(self);
        if let Some(diff) = before.diff(&after) {
            tracing::trace!("cursor: {}", diff);
        }
        Ok(self.buffer.revision() != revision)
    }
}
