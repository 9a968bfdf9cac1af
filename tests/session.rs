//! Session tests - autosave snapshots, restore, schema migration on disk

use std::fs;

use narrative_edit::config::AppConfig;
use narrative_edit::engine::Engine;
use narrative_edit::session::{PanelState, SessionState, SessionStore, SESSION_SCHEMA};
use narrative_edit::EngineError;
use serde_json::json;
use tempfile::TempDir;

fn store() -> (TempDir, SessionStore) {
    let temp = TempDir::new().unwrap();
    let store = SessionStore::new(temp.path().join("sessions"));
    (temp, store)
}

#[test]
fn test_autosave_and_restore_round_trip() {
    let (temp, store) = store();
    let saved_path = temp.path().join("saved.txt");
    fs::write(&saved_path, "保存済みの原稿").unwrap();

    let mut engine = Engine::default();
    let saved = engine.open_file(&saved_path).unwrap();
    engine.get_mut(saved).unwrap().set_cursor(3).unwrap();
    let draft = engine.open("書きかけ");
    engine.get_mut(draft).unwrap().set_cursor(4).unwrap();
    engine.get_mut(draft).unwrap().type_char('。').unwrap();
    engine.panel_state = PanelState {
        folded: true,
        ..PanelState::default()
    };

    assert!(engine.autosave(&store, "window-1").unwrap());
    assert!(store.dir().join("window-1.json").exists());

    let mut restored = Engine::default();
    let ids = restored.restore_all(&store).unwrap();
    assert_eq!(ids.len(), 2);

    let file_doc = restored.get(ids[0]).unwrap();
    assert_eq!(file_doc.text(), "保存済みの原稿");
    assert!(!file_doc.is_modified());
    assert_eq!(file_doc.cursor_offset(), 3);

    let draft_doc = restored.get(ids[1]).unwrap();
    assert_eq!(draft_doc.text(), "書きかけ。");
    assert!(draft_doc.is_modified());
    assert_eq!(draft_doc.info.display_name, "無題-1");
    assert_eq!(restored.active(), Some(ids[1]));
    assert!(restored.panel_state.folded);
}

#[test]
fn test_autosave_removes_session_once_clean() {
    let (_temp, store) = store();
    let mut engine = Engine::default();
    let id = engine.open("");
    engine.get_mut(id).unwrap().type_char('あ').unwrap();
    assert!(engine.autosave(&store, "w").unwrap());

    engine.get_mut(id).unwrap().mark_saved();
    assert!(!engine.autosave(&store, "w").unwrap());
    assert!(!store.dir().join("w.json").exists());
}

#[test]
fn test_autosave_disabled_writes_nothing() {
    let (_temp, store) = store();
    let mut engine = Engine::new(AppConfig {
        autosave_enabled: false,
        ..AppConfig::default()
    });
    let id = engine.open("");
    engine.get_mut(id).unwrap().type_char('あ').unwrap();
    assert!(!engine.autosave(&store, "w").unwrap());
    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn test_missing_file_is_skipped_on_restore() {
    let (temp, store) = store();
    let state = json!({
        "meta": {"app": "Narrative_Edit", "schema": 2},
        "documents": [
            {"path": temp.path().join("gone.txt"), "is_dirty": false},
            {"text": "残った", "display_name": "メモ", "cursor_offset": 99}
        ],
        "active_tab": 1
    });
    fs::create_dir_all(store.dir()).unwrap();
    fs::write(store.dir().join("a.json"), state.to_string()).unwrap();

    let mut engine = Engine::default();
    let ids = engine.restore_all(&store).unwrap();
    assert_eq!(ids.len(), 1);
    let doc = engine.get(ids[0]).unwrap();
    assert_eq!(doc.info.display_name, "メモ");
    // Out-of-range caret clamps to the end
    assert_eq!(doc.cursor_offset(), 3);
}

#[test]
fn test_store_migrates_legacy_and_discards_unknown() {
    let (_temp, store) = store();
    fs::create_dir_all(store.dir()).unwrap();

    let legacy = json!({
        "meta": {"app": "TagSumi", "schema": 1},
        "open_documents": [{"text": "旧形式", "is_dirty": true}],
        "panel_state": {}
    });
    fs::write(store.dir().join("1-legacy.json"), legacy.to_string()).unwrap();
    let future = json!({"meta": {"app": "Narrative_Edit", "schema": 3}, "documents": []});
    fs::write(store.dir().join("2-future.json"), future.to_string()).unwrap();
    fs::write(store.dir().join("3-broken.json"), "{ not json").unwrap();

    let sessions = store.load_all().unwrap();
    assert_eq!(sessions.len(), 1);
    let state = &sessions[0].state;
    assert_eq!(sessions[0].id, "1-legacy");
    assert_eq!(state.schema_version(), SESSION_SCHEMA);
    assert_eq!(state.app_id(), "Narrative_Edit");
    assert!(!state.panel_state.folded);
    assert_eq!(state.documents[0].text.as_deref(), Some("旧形式"));

    // Unsupported files are removed, unreadable ones left for inspection
    assert!(!store.dir().join("2-future.json").exists());
    assert!(store.dir().join("3-broken.json").exists());
}

#[test]
fn test_unknown_app_is_a_migration_error() {
    let raw = json!({"meta": {"app": "SomethingElse", "schema": 2}, "documents": []});
    let err = SessionState::load(&raw.to_string()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Migration { app: Some(ref a), schema: Some(2) } if a == "SomethingElse"
    ));
}

#[test]
fn test_clear_removes_every_session() {
    let (_temp, store) = store();
    let state = SessionState::new(Vec::new(), PanelState::default(), 0);
    store.save("a", &state).unwrap();
    store.save("b", &state).unwrap();
    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn test_closed_tabs_leave_the_snapshot() {
    let mut engine = Engine::default();
    let first = engine.open("一");
    let second = engine.open("二");
    let third = engine.open("三");
    engine.set_active(first).unwrap();
    engine.close(second).unwrap();

    let state = engine.snapshot();
    assert_eq!(state.documents.len(), 2);
    assert_eq!(state.active_tab, 0);
    assert_eq!(state.documents[1].text.as_deref(), Some("三"));

    engine.close(first).unwrap();
    assert_eq!(engine.active(), Some(third));
    assert!(matches!(
        engine.set_active(second),
        Err(EngineError::UnknownDocument(_))
    ));
}
