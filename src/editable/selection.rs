//! Selection as an ordered pair of buffer offsets.

use std::ops::Range;

/// A text selection with anchor (start point) and active end (caret).
/// The anchor stays fixed while the active end moves during extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Where the selection started (fixed point)
    pub anchor: usize,
    /// Where the caret is (moving point)
    pub active: usize,
}

impl Selection {
    pub const fn new(anchor: usize, active: usize) -> Self {
        Self { anchor, active }
    }

    /// Create a collapsed selection (caret with no selection)
    pub const fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            active: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.active
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.active)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.active)
    }

    /// Normalised `(min, max)` range
    pub fn range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Both ends clamped to `len`
    pub fn clamped(&self, len: usize) -> Self {
        Self::new(self.anchor.min(len), self.active.min(len))
    }
}
