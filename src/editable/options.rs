//! Per-document edit options.
//!
//! Options restrict what a document accepts; none of them change buffer
//! semantics.

use std::time::Duration;

/// Default window in which consecutive typed characters merge into one undo step
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOptions {
    /// Reject every buffer mutation
    pub read_only: bool,

    /// Enable undo/redo tracking
    pub enable_undo: bool,

    /// Maximum undo depth (None = unbounded)
    pub history_limit: Option<usize>,

    /// Typing within this window of the previous keystroke coalesces
    pub coalesce_window: Duration,

    /// Set two-character alphanumeric runs horizontally in one cell
    pub tate_chu_yoko: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            enable_undo: true,
            history_limit: None,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
            tate_chu_yoko: true,
        }
    }
}

impl EditOptions {
    /// Viewer for files opened without write access
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            enable_undo: false,
            ..Self::default()
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_tate_chu_yoko(mut self, enabled: bool) -> Self {
        self.tate_chu_yoko = enabled;
        self
    }
}
