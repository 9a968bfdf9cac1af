//! Text buffer for manuscript documents.
//!
//! Offsets are character indices into the document. Every mutation validates
//! its range before touching the rope, so a failed call leaves the buffer as it
//! was, and every successful one reports the region it changed.

use ropey::Rope;
use std::ops::Range;

use crate::error::{EngineError, Result};

/// Region touched by one buffer mutation.
///
/// `start..end_old` is the replaced range in the old text, `start..end_new`
/// the range it occupies in the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRange {
    pub start: usize,
    pub end_old: usize,
    pub end_new: usize,
}

impl DirtyRange {
    pub fn new(start: usize, end_old: usize, end_new: usize) -> Self {
        Self {
            start,
            end_old,
            end_new,
        }
    }

    /// Length change caused by the mutation
    pub fn delta(&self) -> isize {
        self.end_new as isize - self.end_old as isize
    }

    /// Smallest range covering both mutations, `later` applied after `self`
    pub fn merge(self, later: DirtyRange) -> DirtyRange {
        // Map self's new end through the later edit
        let self_end = if self.end_new <= later.start {
            self.end_new
        } else if self.end_new >= later.end_old {
            (self.end_new as isize + later.delta()) as usize
        } else {
            later.end_new
        };
        let start = self.start.min(later.start);
        let end_new = self_end.max(later.end_new);
        // end_old is expressed against the text before `self`
        let end_old = (end_new as isize - self.delta() - later.delta()) as usize;
        DirtyRange::new(start, end_old.max(start), end_new)
    }
}

/// Rope-backed text buffer owned by a single document.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    rope: Rope,
    revision: u64,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer from a string slice
    pub fn from_text(s: &str) -> Self {
        Self {
            rope: Rope::from_str(s),
            revision: 0,
        }
    }

    /// Access the underlying Rope for rope-specific operations
    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    /// Incremented by every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Total length in characters
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get character at offset, None if out of bounds
    pub fn char_at(&self, offset: usize) -> Option<char> {
        (offset < self.len()).then(|| self.rope.char(offset))
    }

    /// Full content as String (may be expensive for large buffers)
    pub fn content(&self) -> String {
        self.rope.to_string()
    }

    pub fn check_offset(&self, offset: usize) -> Result<()> {
        if offset > self.len() {
            return Err(EngineError::offset(offset, self.len()));
        }
        Ok(())
    }

    pub fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.len() {
            return Err(EngineError::range(range.clone(), self.len()));
        }
        Ok(())
    }

    /// Text in a character range
    pub fn slice(&self, range: Range<usize>) -> Result<String> {
        self.check_range(&range)?;
        Ok(self.rope.slice(range).to_string())
    }

    /// Insert text at a character offset
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<DirtyRange> {
        self.check_offset(offset)?;
        let inserted = text.chars().count();
        if inserted > 0 {
            self.rope.insert(offset, text);
            self.revision += 1;
        }
        Ok(DirtyRange::new(offset, offset, offset + inserted))
    }

    /// Remove the text in a character range
    pub fn delete(&mut self, range: Range<usize>) -> Result<DirtyRange> {
        self.check_range(&range)?;
        if range.start < range.end {
            self.rope.remove(range.clone());
            self.revision += 1;
        }
        Ok(DirtyRange::new(range.start, range.end, range.start))
    }

    /// Replace the text in a range (atomic: validated before either half runs)
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<DirtyRange> {
        self.check_range(&range)?;
        let inserted = text.chars().count();
        if range.start < range.end {
            self.rope.remove(range.clone());
        }
        if inserted > 0 {
            self.rope.insert(range.start, text);
        }
        if range.start < range.end || inserted > 0 {
            self.revision += 1;
        }
        Ok(DirtyRange::new(range.start, range.end, range.start + inserted))
    }

    /// Character offset -> byte offset in `content()`
    pub fn char_to_byte(&self, offset: usize) -> usize {
        self.rope.char_to_byte(offset.min(self.len()))
    }

    /// Byte offset in `content()` -> character offset
    pub fn byte_to_char(&self, byte: usize) -> usize {
        self.rope.byte_to_char(byte.min(self.rope.len_bytes()))
    }
}
