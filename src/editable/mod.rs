//! Editable manuscript documents.
//!
//! # Architecture
//!
//! - [`TextBuffer`]: rope-backed text addressed by character offset; every
//!   mutation reports a [`DirtyRange`]
//! - [`Cursor`] / [`Selection`]: caret offset with its cached grid cell, and
//!   an anchor/active pair of offsets
//! - [`UndoEngine`]: undo/redo stacks of [`UndoCommand`]s with typing
//!   coalescing
//! - [`EditOptions`]: per-document restrictions (read-only, history limit)
//! - [`Document`]: ties the above to a [`GridLayout`](crate::layout::GridLayout)
//!   and a [`FindEngine`](crate::find::FindEngine)
//! - [`EditMsg`]: message form of every editing operation
//!
//! # Example
//!
//! ```
//! use narrative_edit::editable::{Document, EditOptions, MoveDirection, MoveUnit};
//! use narrative_edit::layout::GridSize;
//!
//! let mut doc = Document::new("吾輩は猫である。", GridSize::CLASSIC, EditOptions::default());
//! doc.move_by(MoveDirection::DocEnd, MoveUnit::Cell);
//! doc.type_char('名').unwrap();
//! assert_eq!(doc.text(), "吾輩は猫である。名");
//! doc.undo().unwrap();
//! assert_eq!(doc.text(), "吾輩は猫である。");
//! ```

mod buffer;
mod cursor;
mod document;
mod history;
mod messages;
mod options;
mod selection;

pub use buffer::{DirtyRange, TextBuffer};
pub use cursor::Cursor;
pub use document::{Document, DocumentInfo, ReplaceResult};
pub use history::{UndoCommand, UndoEngine};
pub use messages::{EditKind, EditMsg, MoveDirection, MoveUnit};
pub use options::{EditOptions, DEFAULT_COALESCE_WINDOW};
pub use selection::Selection;
