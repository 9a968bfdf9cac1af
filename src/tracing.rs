//! Tracing setup and cursor diagnostics
//!
//! # Usage
//!
//! Configure via RUST_LOG environment variable:
//! - `RUST_LOG=debug` - all debug logs
//! - `RUST_LOG=narrative_edit::layout=debug` - re-flow decisions only
//! - `RUST_LOG=narrative_edit::editable=trace,narrative_edit::find=debug` - scoped filtering
//!
//! # Log Files
//!
//! Logs are written to `<config>/Narrative_Edit/logs/narrative.log` with daily rotation.
//! File logging uses debug level by default for more verbose troubleshooting.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::editable::Document;
use crate::layout::CellPos;

/// Initialize tracing subscriber with console and file logging
///
/// Console output respects RUST_LOG (default `warn`). The file layer always
/// records debug output.
pub fn init() {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_filter(console_filter);

    let file_layer = match crate::config_paths::ensure_logs_dir() {
        Ok(logs_dir) => {
            let file_appender = tracing_appender::rolling::daily(
                logs_dir,
                crate::config_paths::log_file_prefix(),
            );
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        Err(e) => {
            eprintln!("Warning: Could not initialize file logging: {}", e);
            None
        }
    };

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Lightweight snapshot of caret/selection state for diffing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub offset: usize,
    pub cell: CellPos,
    pub anchor: usize,
    pub selection_empty: bool,
}

impl CursorSnapshot {
    pub fn from_document(document: &Document) -> Self {
        let selection = document.selection();
        Self {
            offset: document.cursor_offset(),
            cell: document.cursor_cell(),
            anchor: selection.anchor,
            selection_empty: selection.is_empty(),
        }
    }

    /// Generate a diff description between two snapshots
    pub fn diff(&self, other: &CursorSnapshot) -> Option<String> {
        let mut changes = Vec::new();
        if self.offset != other.offset || self.cell != other.cell {
            changes.push(format!(
                "caret {} p{}c{}r{} → {} p{}c{}r{}",
                self.offset,
                self.cell.page,
                self.cell.col,
                self.cell.row,
                other.offset,
                other.cell.page,
                other.cell.col,
                other.cell.row
            ));
        }
        if self.selection_empty != other.selection_empty {
            let status = if other.selection_empty {
                "cleared".to_string()
            } else {
                format!("active from {}", other.anchor)
            };
            changes.push(format!("selection {}", status));
        } else if !other.selection_empty && self.anchor != other.anchor {
            changes.push(format!("anchor {} → {}", self.anchor, other.anchor));
        }

        if changes.is_empty() {
            None
        } else {
            Some(changes.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(offset: usize, row: usize, anchor: usize) -> CursorSnapshot {
        CursorSnapshot {
            offset,
            cell: CellPos::new(0, 0, row),
            anchor,
            selection_empty: anchor == offset,
        }
    }

    #[test]
    fn test_diff_unchanged_is_none() {
        let a = snapshot(3, 3, 3);
        assert_eq!(a.diff(&a), None);
    }

    #[test]
    fn test_diff_reports_caret_and_selection() {
        let before = snapshot(3, 3, 3);
        let after = snapshot(5, 5, 3);
        let diff = before.diff(&after).unwrap();
        assert!(diff.contains("caret 3 p0c0r3 → 5 p0c0r5"));
        assert!(diff.contains("selection active from 3"));

        let cleared = after.diff(&snapshot(5, 5, 5)).unwrap();
        assert!(cleared.contains("selection cleared"));
    }
}
