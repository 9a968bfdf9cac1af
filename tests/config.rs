//! Config tests - first run after upgrading from the legacy application

use std::fs;

use narrative_edit::config::AppConfig;
use narrative_edit::config_paths::migrate_legacy_store;
use narrative_edit::engine::Engine;
use narrative_edit::layout::GridSize;
use narrative_edit::session::SessionStore;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_legacy_store_is_adopted_on_first_run() {
    let temp = TempDir::new().unwrap();
    let legacy = temp.path().join("TagSumi");
    let current = temp.path().join("Narrative_Edit");
    fs::create_dir_all(legacy.join("sessions")).unwrap();
    fs::write(
        legacy.join("config.json"),
        json!({
            "config_schema": 1,
            "ui_language": "en",
            "manuscript_grid_rows": 20,
            "manuscript_grid_cols": 20,
            "autosave_enabled": "yes"
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        legacy.join("sessions").join("main.json"),
        json!({
            "meta": {"app": "TagSumi", "schema": 1},
            "documents": [{"text": "旧作"}]
        })
        .to_string(),
    )
    .unwrap();

    let report = migrate_legacy_store(&current, &legacy).unwrap();
    assert!(report.config_copied && report.sessions_copied);

    let config = AppConfig::load_from(&current.join("config.json"));
    // The old 20 x 20 default became 40 x 40
    assert_eq!(config.grid_size(), GridSize::DEFAULT);
    assert_eq!(config.ui_language, "en");

    let mut engine = Engine::new(config);
    let ids = engine
        .restore_all(&SessionStore::new(current.join("sessions")))
        .unwrap();
    assert_eq!(ids.len(), 1);
    let doc = engine.get(ids[0]).unwrap();
    assert_eq!(doc.text(), "旧作");
    assert_eq!(doc.layout().size(), GridSize::DEFAULT);
    assert_eq!(doc.info.display_name, "Untitled-1");
}

#[test]
fn test_saved_config_round_trips_through_engine() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");

    let mut engine = Engine::default();
    engine.resize_all(20, 20).unwrap();
    engine.config.save_to(&path).unwrap();

    let loaded = AppConfig::load_from(&path);
    assert_eq!(loaded.grid_size(), GridSize::CLASSIC);
    assert_eq!(loaded, engine.config);
}
