//! Multi-document engine: the entry point a front end talks to.
//!
//! Each open document is fully independent (its own buffer, layout, caret and
//! history). The engine hands out [`DocumentId`]s, names untitled documents,
//! reads and writes manuscript files with their metadata sidecars, and turns
//! its documents into autosave snapshots and back.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::config_paths::write_atomic;
use crate::editable::{Document, EditOptions};
use crate::error::{EngineError, Result};
use crate::layout::GridSize;
use crate::metadata::{
    filename_seed, load_plot, load_sidecar, plot_path_for, save_plot, save_sidecar,
};
use crate::session::{PanelState, SessionDocument, SessionState, SessionStore};
use crate::util::{encode_text, filename_for_display, read_text_file};

/// Encodings always tried after the configured ones
const BASE_ENCODINGS: [&str; 3] = ["utf-8", "utf-8-sig", "cp932"];

/// Unique identifier for an open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

/// Handle returned by [`Engine::open`]
pub type DocumentHandle = DocumentId;

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Open documents of one window, in tab order.
#[derive(Debug)]
pub struct Engine {
    pub config: AppConfig,
    /// Options given to newly opened documents
    pub options: EditOptions,
    documents: Vec<(DocumentId, Document)>,
    active: Option<DocumentId>,
    pub panel_state: PanelState,
    next_document_id: u64,
    next_untitled_number: u32,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl Engine {
    pub fn new(config: AppConfig) -> Self {
        let panel_state = PanelState {
            folded: !config.plot_panel_expanded,
            sections: config.plot_panel_sections,
        };
        Self {
            config,
            options: EditOptions::default(),
            documents: Vec::new(),
            active: None,
            panel_state,
            next_document_id: 1,
            next_untitled_number: 1,
        }
    }

    pub fn grid_size(&self) -> GridSize {
        self.config.grid_size()
    }

    fn next_document_id(&mut self) -> DocumentId {
        let id = DocumentId(self.next_document_id);
        self.next_document_id += 1;
        id
    }

    fn is_japanese(&self) -> bool {
        self.config.ui_language == "ja"
    }

    /// Next untitled name ("無題-1", "Untitled-2", ...) in the UI language
    pub fn next_untitled_name(&mut self) -> String {
        let n = self.next_untitled_number;
        self.next_untitled_number += 1;
        let label = if self.is_japanese() { "無題" } else { "Untitled" };
        format!("{}-{}", label, n)
    }

    fn filename_seed(&self, document: &Document) -> String {
        let untitled = if self.is_japanese() { "無題" } else { "untitled" };
        filename_seed(&document.metadata, &document.text(), untitled)
    }

    fn insert(&mut self, document: Document) -> DocumentId {
        let id = self.next_document_id();
        tracing::debug!(
            "opened document {} ({}, {} chars)",
            id,
            document.info.display_name,
            document.len()
        );
        self.documents.push((id, document));
        self.active = Some(id);
        id
    }

    /// Open an untitled document holding `text`
    pub fn open(&mut self, text: &str) -> DocumentHandle {
        let mut document = Document::new(text, self.grid_size(), self.options.clone());
        document.info.display_name = self.next_untitled_name();
        self.insert(document)
    }

    /// Find an open document by file path
    pub fn find_open_file(&self, path: &Path) -> Option<DocumentId> {
        let wanted = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.documents.iter().find_map(|(id, doc)| {
            let doc_path = doc.info.path.as_ref()?;
            let doc_path = doc_path.canonicalize().unwrap_or_else(|_| doc_path.clone());
            (doc_path == wanted).then_some(*id)
        })
    }

    fn encodings(&self) -> Vec<String> {
        let mut encodings = self.config.fallback_encodings.clone();
        for base in BASE_ENCODINGS {
            if !encodings.iter().any(|e| e.eq_ignore_ascii_case(base)) {
                encodings.push(base.to_string());
            }
        }
        encodings
    }

    /// Open a manuscript file with its metadata sidecar. A file that is
    /// already open is activated instead of being read again.
    pub fn open_file(&mut self, path: &Path) -> Result<DocumentId> {
        if let Some(id) = self.find_open_file(path) {
            self.active = Some(id);
            return Ok(id);
        }

        let decoded = read_text_file(path, &self.encodings())?;
        let mut document = Document::new(&decoded.text, self.grid_size(), self.options.clone());
        let (metadata, metadata_path) = load_sidecar(path);
        document.metadata = metadata;
        document.info.path = Some(path.to_path_buf());
        document.info.display_name = filename_for_display(path);
        document.info.encoding = decoded.encoding;
        document.info.metadata_path = Some(metadata_path);
        document.info.plot_path = Some(plot_path_for(path));

        tracing::info!("Opened {} ({})", path.display(), document.info.encoding);
        self.config.push_recent_file(path);
        Ok(self.insert(document))
    }

    /// Write a document to `path` (or its own path) together with its sidecar.
    pub fn save_file(&mut self, id: DocumentId, path: Option<&Path>) -> Result<PathBuf> {
        let document = self.get_mut(id)?;
        let target = match path.map(Path::to_path_buf).or_else(|| document.info.path.clone()) {
            Some(target) => target,
            None => {
                return Err(EngineError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "document has no file path",
                )))
            }
        };

        let body = document.file_text();
        let bytes = match encode_text(&body, &document.info.encoding) {
            Some(bytes) => bytes,
            None => {
                tracing::warn!(
                    "cannot encode {} as {}, saving as utf-8",
                    document.info.display_name,
                    document.info.encoding
                );
                document.info.encoding = "utf-8".to_string();
                body.into_bytes()
            }
        };
        write_atomic(&target, &bytes)?;
        let sidecar = save_sidecar(&target, &document.metadata)?;

        document.info.display_name = filename_for_display(&target);
        document.info.metadata_path = Some(sidecar);
        document.info.plot_path = Some(plot_path_for(&target));
        document.info.path = Some(target.clone());
        document.mark_saved();
        tracing::info!("Saved {} to {}", id, target.display());

        self.config.push_recent_file(&target);
        Ok(target)
    }

    /// Suggested target for saving the text: the document's own path, else a
    /// file in `dir` named after its title or first line.
    pub fn default_text_path(&self, id: DocumentId, dir: &Path) -> Result<PathBuf> {
        let document = self.get(id)?;
        Ok(match &document.info.path {
            Some(path) => path.clone(),
            None => dir.join(format!("{}.txt", self.filename_seed(document))),
        })
    }

    /// Suggested plot file: the last one used, else beside the text, else a
    /// seeded name in `dir`.
    pub fn default_plot_path(&self, id: DocumentId, dir: &Path) -> Result<PathBuf> {
        let document = self.get(id)?;
        Ok(match (&document.info.plot_path, &document.info.path) {
            (Some(plot), _) => plot.clone(),
            (None, Some(path)) => plot_path_for(path),
            (None, None) => dir.join(format!("{}.plot.json", self.filename_seed(document))),
        })
    }

    /// Write a document's metadata as a standalone plot file
    pub fn save_plot(&mut self, id: DocumentId, path: &Path) -> Result<PathBuf> {
        let document = self.get_mut(id)?;
        let written = save_plot(path, &document.metadata)?;
        document.info.plot_path = Some(written.clone());
        Ok(written)
    }

    /// Replace a document's metadata with a plot file. The document counts as
    /// modified until its sidecar is saved again.
    pub fn load_plot(&mut self, id: DocumentId, path: &Path) -> Result<()> {
        let metadata = load_plot(path)?;
        let document = self.get_mut(id)?;
        document.metadata = metadata;
        document.info.plot_path = Some(path.to_path_buf());
        document.mark_unsaved();
        tracing::info!("Loaded plot {} into {}", path.display(), id);
        Ok(())
    }

    /// Close a document and hand it back. The next tab becomes active.
    pub fn close(&mut self, id: DocumentId) -> Result<Document> {
        let index = self.index_of(id)?;
        let (_, document) = self.documents.remove(index);
        if self.active == Some(id) {
            self.active = self
                .documents
                .get(index)
                .or_else(|| self.documents.last())
                .map(|(id, _)| *id);
        }
        tracing::debug!("closed document {}", id);
        Ok(document)
    }

    fn index_of(&self, id: DocumentId) -> Result<usize> {
        self.documents
            .iter()
            .position(|(doc_id, _)| *doc_id == id)
            .ok_or(EngineError::UnknownDocument(id.0))
    }

    pub fn get(&self, id: DocumentId) -> Result<&Document> {
        self.documents
            .iter()
            .find(|(doc_id, _)| *doc_id == id)
            .map(|(_, doc)| doc)
            .ok_or(EngineError::UnknownDocument(id.0))
    }

    pub fn get_mut(&mut self, id: DocumentId) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|(doc_id, _)| *doc_id == id)
            .map(|(_, doc)| doc)
            .ok_or(EngineError::UnknownDocument(id.0))
    }

    /// Document ids in tab order
    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.documents.iter().map(|(id, _)| *id)
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocumentId, &Document)> {
        self.documents.iter().map(|(id, doc)| (*id, doc))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn active(&self) -> Option<DocumentId> {
        self.active
    }

    pub fn set_active(&mut self, id: DocumentId) -> Result<()> {
        self.index_of(id)?;
        self.active = Some(id);
        Ok(())
    }

    /// Any document with unsaved changes
    pub fn has_unsaved(&self) -> bool {
        self.documents.iter().any(|(_, doc)| doc.is_modified())
    }

    /// Change the grid of every document. Invalid sizes change nothing.
    pub fn resize_all(&mut self, rows: usize, cols: usize) -> Result<()> {
        GridSize::new(rows, cols)?;
        for (_, document) in &mut self.documents {
            document.resize_grid(rows, cols)?;
        }
        self.config.manuscript_grid_rows = rows;
        self.config.manuscript_grid_cols = cols;
        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Snapshot of every open document. Saved, unmodified files are stored as
    /// references; everything else carries its text.
    pub fn snapshot(&self) -> SessionState {
        let documents = self
            .documents
            .iter()
            .map(|(_, doc)| {
                let is_dirty = doc.is_modified();
                let needs_text = is_dirty || doc.info.path.is_none();
                SessionDocument {
                    session_id: doc.info.session_id,
                    path: doc.info.path.clone(),
                    display_name: Some(doc.info.display_name.clone()),
                    encoding: doc.info.encoding.clone(),
                    newline: doc.info.newline,
                    is_dirty,
                    text: needs_text.then(|| doc.text()),
                    metadata: doc.metadata.clone(),
                    metadata_path: doc.info.metadata_path.clone(),
                    plot_path: doc.info.plot_path.clone(),
                    cursor_offset: doc.cursor_offset(),
                    scroll_page: doc.cursor_cell().page,
                }
            })
            .collect();
        let active_tab = self
            .active
            .and_then(|id| self.index_of(id).ok())
            .unwrap_or(0);
        SessionState::new(documents, self.panel_state, active_tab)
    }

    /// Autosave tick: store a snapshot while any document is dirty, drop the
    /// window's session once everything is saved. Returns whether a snapshot
    /// was written.
    pub fn autosave(&self, store: &SessionStore, window_id: &str) -> Result<bool> {
        if !self.config.autosave_enabled {
            return Ok(false);
        }
        if !self.has_unsaved() {
            store.remove(window_id)?;
            return Ok(false);
        }
        store.save(window_id, &self.snapshot())?;
        Ok(true)
    }

    /// Reopen the documents of a snapshot. Documents whose file can no longer
    /// be read are skipped.
    pub fn restore(&mut self, state: SessionState) -> Vec<DocumentId> {
        let mut restored = Vec::new();
        let active_tab = state.active_tab;
        for saved in state.documents {
            let id = match &saved.text {
                Some(text) => {
                    let mut document =
                        Document::new(text, self.grid_size(), self.options.clone());
                    document.info.session_id = saved.session_id;
                    document.info.path = saved.path.clone();
                    document.info.encoding = saved.encoding.clone();
                    document.info.newline = saved.newline;
                    document.info.metadata_path = saved.metadata_path.clone();
                    document.info.plot_path = saved.plot_path.clone();
                    document.metadata = saved.metadata.clone();
                    document.info.display_name = match (&saved.display_name, &saved.path) {
                        (Some(name), _) if !name.is_empty() => name.clone(),
                        (_, Some(path)) => filename_for_display(path),
                        _ => self.next_untitled_name(),
                    };
                    if saved.is_dirty {
                        document.mark_unsaved();
                    }
                    self.insert(document)
                }
                None => {
                    let Some(path) = &saved.path else {
                        continue;
                    };
                    match self.open_file(path) {
                        Ok(id) => id,
                        Err(e) => {
                            tracing::warn!("Skipping session document {}: {}", path.display(), e);
                            continue;
                        }
                    }
                }
            };
            if let Ok(document) = self.get_mut(id) {
                let offset = saved.cursor_offset.min(document.len());
                // In range after the clamp
                let _ = document.set_cursor(offset);
            }
            restored.push(id);
        }

        if let Some(id) = restored.get(active_tab).or(restored.last()) {
            self.active = Some(*id);
        }
        self.panel_state = state.panel_state;
        tracing::info!("Restored {} documents", restored.len());
        restored
    }

    /// Restore every stored session. Unsupported session files are discarded
    /// by the store.
    pub fn restore_all(&mut self, store: &SessionStore) -> Result<Vec<DocumentId>> {
        let mut restored = Vec::new();
        for stored in store.load_all()? {
            restored.extend(self.restore(stored.state));
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english() -> Engine {
        Engine::new(AppConfig {
            ui_language: "en".to_string(),
            ..AppConfig::default()
        })
    }

    #[test]
    fn test_untitled_names_count_per_engine() {
        let mut engine = Engine::default();
        let a = engine.open("");
        let b = engine.open("");
        assert_eq!(engine.get(a).unwrap().info.display_name, "無題-1");
        assert_eq!(engine.get(b).unwrap().info.display_name, "無題-2");

        let mut other = english();
        let c = other.open("");
        assert_eq!(other.get(c).unwrap().info.display_name, "Untitled-1");
    }

    #[test]
    fn test_unknown_document() {
        let mut engine = Engine::default();
        let id = engine.open("あ");
        engine.close(id).unwrap();
        assert!(matches!(engine.get(id), Err(EngineError::UnknownDocument(n)) if n == id.0));
        assert!(engine.close(id).is_err());
    }

    #[test]
    fn test_close_activates_neighbour() {
        let mut engine = Engine::default();
        let a = engine.open("a");
        let b = engine.open("b");
        let c = engine.open("c");
        engine.set_active(b).unwrap();
        engine.close(b).unwrap();
        assert_eq!(engine.active(), Some(c));
        engine.close(c).unwrap();
        assert_eq!(engine.active(), Some(a));
        engine.close(a).unwrap();
        assert_eq!(engine.active(), None);
    }

    #[test]
    fn test_documents_are_independent() {
        let mut engine = Engine::default();
        let a = engine.open("");
        let b = engine.open("");
        engine.get_mut(a).unwrap().type_char('あ').unwrap();
        assert_eq!(engine.get(b).unwrap().text(), "");
        assert!(!engine.get(b).unwrap().can_undo());
    }

    #[test]
    fn test_resize_all_rejects_zero() {
        let mut engine = Engine::default();
        let id = engine.open("あいう");
        assert!(engine.resize_all(0, 10).is_err());
        assert_eq!(engine.get(id).unwrap().layout().size(), GridSize::DEFAULT);
        engine.resize_all(20, 20).unwrap();
        assert_eq!(engine.get(id).unwrap().layout().size(), GridSize::CLASSIC);
        assert_eq!(engine.config.manuscript_grid_rows, 20);
    }

    #[test]
    fn test_snapshot_carries_dirty_text_only() {
        let mut engine = Engine::default();
        let id = engine.open("吾輩");
        engine.get_mut(id).unwrap().set_cursor(1).unwrap();

        let state = engine.snapshot();
        assert_eq!(state.documents.len(), 1);
        let doc = &state.documents[0];
        assert!(!doc.is_dirty);
        // Untitled documents always carry their text
        assert_eq!(doc.text.as_deref(), Some("吾輩"));
        assert_eq!(doc.cursor_offset, 1);
        assert_eq!(doc.display_name.as_deref(), Some("無題-1"));
    }

    #[test]
    fn test_restore_round_trip() {
        let mut engine = Engine::default();
        let id = engine.open("吾輩は猫");
        {
            let doc = engine.get_mut(id).unwrap();
            doc.set_cursor(4).unwrap();
            doc.type_char('だ').unwrap();
            doc.metadata.work_title = "猫".to_string();
        }
        let state = engine.snapshot();

        let mut fresh = Engine::default();
        let ids = fresh.restore(state);
        assert_eq!(ids.len(), 1);
        let doc = fresh.get(ids[0]).unwrap();
        assert_eq!(doc.text(), "吾輩は猫だ");
        assert_eq!(doc.cursor_offset(), 5);
        assert!(doc.is_modified());
        assert_eq!(doc.info.display_name, "無題-1");
        assert_eq!(doc.metadata.work_title, "猫");
        assert_eq!(doc.info.session_id, engine.get(id).unwrap().info.session_id);
    }
}
