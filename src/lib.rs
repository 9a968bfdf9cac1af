//! Narrative Edit - vertical Japanese manuscript engine
//!
//! Text lives in a rope buffer and is laid out on a genko yoshi grid: columns
//! read top to bottom and right to left, with kinsoku line breaking,
//! tate-chu-yoko and vertical glyph substitution. On top of that sit caret and
//! selection handling in grid terms, undo/redo, find and replace, novel
//! metadata and crash-recovery sessions.

pub mod cli;
pub mod config;
pub mod config_paths;
pub mod editable;
pub mod engine;
pub mod error;
pub mod find;
pub mod glyph;
pub mod layout;
pub mod metadata;
pub mod session;
pub mod tracing;
pub mod util;

// Re-export commonly used types
pub use config::AppConfig;
pub use editable::{Document, EditMsg, EditOptions, MoveDirection, MoveUnit};
pub use engine::{DocumentHandle, DocumentId, Engine};
pub use error::{EngineError, Result};
pub use find::{FindQuery, SearchDirection};
pub use layout::{CellPos, GridLayout, GridSize};
pub use metadata::NovelMetadata;
pub use session::{SessionState, SessionStore};
