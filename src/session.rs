//! Session snapshots for autosave and restore.
//!
//! A session file holds one window: its open documents, the plot panel state
//! and the active tab. Files are written to `<config>/sessions/<id>.json` on
//! each autosave tick and consumed once at startup.
//!
//! Loading fails closed. A payload whose `meta.app` is not a known
//! application id, or whose `meta.schema` is not 1 or 2, is rejected with
//! [`EngineError::Migration`] instead of being partially restored. Older
//! autosave files that stored a single document at the top level are read as
//! a one-document session.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::PanelSections;
use crate::config_paths::{write_atomic, APP_ID, LEGACY_APP_ID};
use crate::error::{EngineError, Result};
use crate::metadata::NovelMetadata;
use crate::util::NewlineMode;

/// Schema written by this version
pub const SESSION_SCHEMA: u32 = 2;

/// Schemas accepted on load
pub const SUPPORTED_SCHEMAS: [u32; 2] = [1, 2];

/// Application ids accepted on load
pub const SUPPORTED_APPS: [&str; 2] = [APP_ID, LEGACY_APP_ID];

// ============================================================================
// Payload types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub app: String,
    pub schema: u32,
    /// Unix seconds
    #[serde(default)]
    pub saved_at: u64,
}

impl SessionMeta {
    pub fn now() -> Self {
        Self {
            app: APP_ID.to_string(),
            schema: SESSION_SCHEMA,
            saved_at: unix_now(),
        }
    }
}

/// Plot panel state. Schema 1 files carry none of these fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    #[serde(default)]
    pub folded: bool,
    #[serde(default)]
    pub sections: PanelSections,
}

/// One open document in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default = "Uuid::new_v4", deserialize_with = "lenient_uuid")]
    pub session_id: Uuid,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default, deserialize_with = "lenient_newline")]
    pub newline: NewlineMode,
    #[serde(default = "default_dirty")]
    pub is_dirty: bool,
    /// Unsaved buffer content; `None` means reload from `path`
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: NovelMetadata,
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
    #[serde(default)]
    pub plot_path: Option<PathBuf>,
    #[serde(default)]
    pub cursor_offset: usize,
    #[serde(default)]
    pub scroll_page: usize,
}

/// Snapshot of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub meta: SessionMeta,
    #[serde(default, alias = "open_documents")]
    pub documents: Vec<SessionDocument>,
    #[serde(default)]
    pub panel_state: PanelState,
    #[serde(default)]
    pub active_tab: usize,
}

impl SessionState {
    /// New snapshot stamped with the current time
    pub fn new(
        documents: Vec<SessionDocument>,
        panel_state: PanelState,
        active_tab: usize,
    ) -> Self {
        let active_tab = active_tab.min(documents.len().saturating_sub(1));
        Self {
            meta: SessionMeta::now(),
            documents,
            panel_state,
            active_tab,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.meta.schema
    }

    pub fn app_id(&self) -> &str {
        &self.meta.app
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Parse and migrate a session file.
    pub fn load(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = &value else {
            return Err(EngineError::Migration {
                app: None,
                schema: None,
            });
        };

        let meta = map.get("meta").and_then(Value::as_object);
        let app = meta
            .and_then(|m| m.get("app"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let schema = meta.and_then(|m| m.get("schema")).and_then(schema_number);

        let supported = app.as_deref().is_some_and(|a| SUPPORTED_APPS.contains(&a))
            && schema.is_some_and(|s| SUPPORTED_SCHEMAS.iter().any(|&v| u64::from(v) == s));
        if !supported {
            return Err(EngineError::Migration { app, schema });
        }

        let is_window = map.contains_key("documents") || map.contains_key("open_documents");
        let is_single_document = map.get("text").is_some_and(Value::is_string);

        let mut state = if is_window {
            serde_json::from_value::<SessionState>(value)?
        } else if is_single_document {
            let saved_at = meta
                .and_then(|m| m.get("saved_at"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let document = serde_json::from_value::<SessionDocument>(value)?;
            SessionState {
                meta: SessionMeta {
                    app: APP_ID.to_string(),
                    schema: SESSION_SCHEMA,
                    saved_at,
                },
                documents: vec![document],
                panel_state: PanelState::default(),
                active_tab: 0,
            }
        } else {
            return Err(EngineError::Migration { app, schema });
        };

        if state.meta.schema != SESSION_SCHEMA || state.meta.app != APP_ID {
            tracing::debug!(
                "migrating session from {} schema {}",
                state.meta.app,
                state.meta.schema
            );
            state.meta.app = APP_ID.to_string();
            state.meta.schema = SESSION_SCHEMA;
        }
        state.active_tab = state.active_tab.min(state.documents.len().saturating_sub(1));
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn schema_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_dirty() -> bool {
    true
}

fn lenient_uuid<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Uuid, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| Uuid::parse_str(&s).ok())
        .unwrap_or_else(Uuid::new_v4))
}

fn lenient_newline<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<NewlineMode, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

fn lenient_metadata<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<NovelMetadata, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(NovelMetadata::from_value(raw))
}

// ============================================================================
// Session directory
// ============================================================================

/// A session file read back from disk
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub id: String,
    pub path: PathBuf,
    pub state: SessionState,
}

/// Directory of session files, one per window
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform config dir
    pub fn open_default() -> std::result::Result<Self, String> {
        crate::config_paths::ensure_sessions_dir().map(Self::new)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn save(&self, id: &str, state: &SessionState) -> Result<PathBuf> {
        let path = self.file_for(id);
        write_atomic(&path, state.to_json()?.as_bytes())?;
        tracing::info!(
            "Saved session {} ({} documents) to {}",
            id,
            state.documents.len(),
            path.display()
        );
        Ok(path)
    }

    /// Delete one session file. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let path = self.file_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn json_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read every supported session in file name order.
    ///
    /// Files with an unsupported app id or schema are deleted. Files that are
    /// not valid JSON are left in place and skipped.
    pub fn load_all(&self) -> Result<Vec<StoredSession>> {
        let mut sessions = Vec::new();
        for path in self.json_files()? {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Failed to read session {}: {}", path.display(), e);
                    continue;
                }
            };
            let value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping unreadable session {}: {}", path.display(), e);
                    continue;
                }
            };
            match SessionState::from_value(value) {
                Ok(state) => {
                    let id = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    sessions.push(StoredSession { id, path, state });
                }
                Err(e) => {
                    tracing::info!("Discarding session {}: {}", path.display(), e);
                    if let Err(e) = fs::remove_file(&path) {
                        tracing::warn!("Failed to delete {}: {}", path.display(), e);
                    }
                }
            }
        }
        tracing::debug!("Loaded {} sessions from {}", sessions.len(), self.dir.display());
        Ok(sessions)
    }

    /// Delete every session file. Returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.json_files()? {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}
