//! Engine error types.
//!
//! Every error here is recoverable: the failing operation leaves the document
//! in its last consistent state.

use std::ops::Range;

use thiserror::Error;

use crate::util::FileOpenError;

/// Top-level engine error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Buffer offset or range outside `[0, len]`.
    #[error("range {start}..{end} out of bounds for buffer of length {len}")]
    Range { start: usize, end: usize, len: usize },

    /// Grid resize with zero rows or columns.
    #[error("invalid grid {rows}x{cols}: rows and cols must be positive")]
    InvalidGrid { rows: usize, cols: usize },

    /// Malformed search pattern.
    #[error("invalid search pattern: {0}")]
    Pattern(String),

    /// Unrecognised session schema or application id.
    #[error("unsupported session (app: {app:?}, schema: {schema:?})")]
    Migration {
        app: Option<String>,
        schema: Option<u64>,
    },

    #[error("search cancelled")]
    Cancelled,

    #[error("document is read-only")]
    ReadOnly,

    #[error("unknown document {0}")]
    UnknownDocument(u64),

    #[error("cannot open file: {0}")]
    Open(#[from] FileOpenError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn range(range: Range<usize>, len: usize) -> Self {
        Self::Range {
            start: range.start,
            end: range.end,
            len,
        }
    }

    pub fn offset(offset: usize, len: usize) -> Self {
        Self::range(offset..offset, len)
    }

    /// True for errors that come from caller input rather than the environment
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Range { .. } | Self::InvalidGrid { .. } | Self::Pattern(_) | Self::ReadOnly
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_error_message() {
        let err = EngineError::range(3..9, 5);
        assert_eq!(err.to_string(), "range 3..9 out of bounds for buffer of length 5");
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_migration_error_is_not_caller_error() {
        let err = EngineError::Migration {
            app: Some("Other".to_string()),
            schema: Some(7),
        };
        assert!(!err.is_caller_error());
        assert!(err.to_string().contains("Other"));
    }
}
