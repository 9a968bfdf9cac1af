//! Application configuration persistence
//!
//! Stores user preferences in `<config>/config.json`. Older files are
//! migrated forward on load: keys missing from the file take their defaults,
//! schema upgrades run in order, and grid dimensions are clamped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config_paths::write_atomic;
use crate::error::Result;
use crate::layout::GridSize;

/// Current config file schema
pub const CONFIG_SCHEMA: u32 = 5;

/// Allowed range for rows and columns of the manuscript grid
pub const GRID_MIN: usize = 8;
pub const GRID_MAX: usize = 80;

/// Fold state of each section of the plot panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSections {
    pub progress: bool,
    pub overview: bool,
    pub characters: bool,
    pub chapters: bool,
    pub setting: bool,
}

impl PanelSections {
    const KEYS: [&'static str; 5] = ["progress", "overview", "characters", "chapters", "setting"];
}

impl Default for PanelSections {
    fn default() -> Self {
        Self {
            progress: true,
            overview: true,
            characters: true,
            chapters: true,
            setting: true,
        }
    }
}

/// Application configuration that persists across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub config_schema: u32,
    pub ui_language: String,
    pub ui_theme: String,
    pub font_size: u32,
    pub recent_files_limit: usize,
    pub recent_files: Vec<String>,
    pub autosave_enabled: bool,
    pub autosave_interval_sec: u64,
    /// Encodings tried in order when opening a file
    pub fallback_encodings: Vec<String>,
    pub manuscript_grid_rows: usize,
    pub manuscript_grid_cols: usize,
    pub show_manuscript_grid: bool,
    pub plot_panel_expanded: bool,
    pub plot_panel_sections: PanelSections,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_schema: CONFIG_SCHEMA,
            ui_language: "ja".to_string(),
            ui_theme: "soft_light".to_string(),
            font_size: 16,
            recent_files_limit: 10,
            recent_files: Vec::new(),
            autosave_enabled: true,
            autosave_interval_sec: 5,
            fallback_encodings: vec![
                "utf-8".to_string(),
                "utf-8-sig".to_string(),
                "cp932".to_string(),
            ],
            manuscript_grid_rows: 40,
            manuscript_grid_cols: 40,
            show_manuscript_grid: true,
            plot_panel_expanded: true,
            plot_panel_sections: PanelSections::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the platform config dir, or return defaults
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };
        if let Err(e) = crate::config_paths::migrate_default_legacy_store() {
            tracing::warn!("Failed to migrate legacy store: {}", e);
        }
        Self::load_from(&path)
    }

    /// Load config from `path`. Never fails: unreadable or malformed files
    /// yield defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(loaded)) => {
                    tracing::info!("Loaded config from {}", path.display());
                    Self::from_loaded(&loaded)
                }
                Ok(_) => {
                    tracing::warn!("Config at {} is not an object", path.display());
                    Self::default()
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Merge loaded keys over the defaults and migrate to the current schema
    pub fn from_loaded(loaded: &Map<String, Value>) -> Self {
        let Ok(Value::Object(mut data)) = serde_json::to_value(Self::default()) else {
            return Self::default();
        };
        for (key, value) in loaded {
            data.insert(key.clone(), value.clone());
        }

        let schema = loaded.get("config_schema").and_then(as_int).unwrap_or(1);
        if schema < 2 {
            // The old 20x20 default moves to 40x40; explicit sizes stay
            for key in ["manuscript_grid_rows", "manuscript_grid_cols"] {
                let value = loaded.get(key).map(|v| as_int(v).unwrap_or(20));
                if matches!(value, None | Some(20)) {
                    data.insert(key.to_string(), Value::from(40));
                }
            }
            if !loaded.contains_key("show_manuscript_grid") {
                data.insert("show_manuscript_grid".to_string(), Value::Bool(false));
            }
        }
        if schema < 3 {
            data.insert("show_manuscript_grid".to_string(), Value::Bool(true));
        }
        if schema < 4 && !loaded.contains_key("plot_panel_sections") {
            data.remove("plot_panel_sections");
        }
        if schema < 5 && !loaded.contains_key("plot_panel_expanded") {
            data.insert("plot_panel_expanded".to_string(), Value::Bool(true));
        }

        let defaults = Self::default();
        let rows = grid_value(data.get("manuscript_grid_rows"), defaults.manuscript_grid_rows);
        let cols = grid_value(data.get("manuscript_grid_cols"), defaults.manuscript_grid_cols);
        let show_grid = data.get("show_manuscript_grid").map_or(true, truthy);
        let expanded = data.get("plot_panel_expanded").map_or(true, truthy);
        let autosave = data.get("autosave_enabled").map_or(true, truthy);
        let sections = normalize_sections(data.get("plot_panel_sections"));

        data.insert("manuscript_grid_rows".to_string(), Value::from(rows));
        data.insert("manuscript_grid_cols".to_string(), Value::from(cols));
        data.insert("show_manuscript_grid".to_string(), Value::Bool(show_grid));
        data.insert("plot_panel_expanded".to_string(), Value::Bool(expanded));
        data.insert("autosave_enabled".to_string(), Value::Bool(autosave));
        data.insert("plot_panel_sections".to_string(), sections);
        data.insert("config_schema".to_string(), Value::from(CONFIG_SCHEMA));

        match serde_json::from_value::<AppConfig>(Value::Object(data)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Config has invalid values ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save config to the platform config dir
    pub fn save(&self) -> std::result::Result<(), String> {
        let path = crate::config_paths::config_file()
            .ok_or_else(|| "No config directory available".to_string())?;
        self.save_to(&path).map_err(|e| e.to_string())
    }

    /// Save config to `path`, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Grid dimensions the layout should use
    pub fn grid_size(&self) -> GridSize {
        GridSize::new(self.manuscript_grid_rows, self.manuscript_grid_cols).unwrap_or_default()
    }

    /// Move `path` to the front of the recent files list
    pub fn push_recent_file(&mut self, path: &Path) {
        let entry = path.to_string_lossy().into_owned();
        self.recent_files.retain(|p| *p != entry);
        self.recent_files.insert(0, entry);
        self.recent_files.truncate(self.recent_files_limit);
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn grid_value(value: Option<&Value>, default: usize) -> usize {
    let raw = value.and_then(as_int).unwrap_or(default as i64);
    raw.clamp(GRID_MIN as i64, GRID_MAX as i64) as usize
}

/// Booleans may be stored as strings like "yes" or "0"
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn normalize_sections(raw: Option<&Value>) -> Value {
    let raw = raw.and_then(Value::as_object);
    let mut out = Map::new();
    for key in PanelSections::KEYS {
        let enabled = raw.and_then(|m| m.get(key)).map_or(true, truthy);
        out.insert(key.to_string(), Value::Bool(enabled));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(value: Value) -> AppConfig {
        match value {
            Value::Object(map) => AppConfig::from_loaded(&map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_empty_file_gives_defaults_with_grid_shown() {
        let config = load(json!({}));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_schema1_moves_old_default_grid() {
        let config = load(json!({
            "config_schema": 1,
            "manuscript_grid_rows": 20,
            "manuscript_grid_cols": 30,
        }));
        assert_eq!(config.manuscript_grid_rows, 40);
        assert_eq!(config.manuscript_grid_cols, 30);
        assert!(config.show_manuscript_grid);
        assert_eq!(config.config_schema, CONFIG_SCHEMA);
    }

    #[test]
    fn test_grid_is_clamped() {
        let config = load(json!({
            "config_schema": 5,
            "manuscript_grid_rows": 3,
            "manuscript_grid_cols": "120",
        }));
        assert_eq!(config.manuscript_grid_rows, GRID_MIN);
        assert_eq!(config.manuscript_grid_cols, GRID_MAX);
    }

    #[test]
    fn test_string_booleans() {
        let config = load(json!({
            "config_schema": 5,
            "show_manuscript_grid": "off",
            "plot_panel_expanded": "Yes",
            "plot_panel_sections": {"characters": "0", "setting": false},
        }));
        assert!(!config.show_manuscript_grid);
        assert!(config.plot_panel_expanded);
        assert!(config.plot_panel_sections.progress);
        assert!(!config.plot_panel_sections.characters);
        assert!(!config.plot_panel_sections.setting);
    }

    #[test]
    fn test_current_schema_keeps_hidden_grid() {
        let config = load(json!({"config_schema": 4, "show_manuscript_grid": false}));
        assert!(!config.show_manuscript_grid);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = load(json!({"config_schema": 5, "font_size": "huge"}));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.font_size = 20;
        config.manuscript_grid_rows = 20;
        config.push_recent_file(Path::new("/tmp/a.txt"));
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
        std::fs::write(&path, "[1, 2]").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn test_recent_files_are_deduplicated_and_limited() {
        let mut config = AppConfig {
            recent_files_limit: 2,
            ..AppConfig::default()
        };
        config.push_recent_file(Path::new("a"));
        config.push_recent_file(Path::new("b"));
        config.push_recent_file(Path::new("a"));
        config.push_recent_file(Path::new("c"));
        assert_eq!(config.recent_files, vec!["c".to_string(), "a".to_string()]);
    }
}
