use std::sync::Arc;

use panedeck_core::persist::{deserialize_layout, serialize_layout};
use panedeck_core::{
    FileStore, KvStore, LayoutKind, MemoryStore, PaneManager, PaneOptions, Size, SplitDirection,
};
use serde_json::json;

fn three_pane_manager() -> PaneManager {
    let mut mgr = PaneManager::default();
    let a = mgr.create_pane(PaneOptions::titled("editor")).id;
    let b = mgr
        .split_pane(a, SplitDirection::Horizontal)
        .expect("split a")
        .id;
    mgr.split_pane(b, SplitDirection::Vertical).expect("split b");
    mgr.bind_session(a, "sess-a");
    mgr.focus_pane(b);
    mgr
}

#[test]
fn layout_round_trips_through_store() {
    let store = MemoryStore::new();
    let original = three_pane_manager();
    assert!(original.save_layout(&store, "pane_layout_default"));

    let mut restored = PaneManager::default();
    assert!(restored.load_layout(&store, "pane_layout_default"));
    assert_eq!(restored.panes(), original.panes());
    assert_eq!(restored.layout(), original.layout());
    assert_eq!(restored.focused_pane_id(), original.focused_pane_id());
    assert_eq!(restored.layout().kind, LayoutKind::Grid);
    assert_eq!(
        restored.pane(original.pane_ids()[0]).and_then(|p| p.session_id.clone()),
        Some("sess-a".to_string())
    );
}

#[test]
fn layout_round_trips_through_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = three_pane_manager();
    {
        let store = FileStore::open(dir.path()).expect("open store");
        assert!(original.save_layout(&store, "pane_layout_default"));
    }
    let store = FileStore::open(dir.path()).expect("reopen store");
    let mut restored = PaneManager::default();
    assert!(restored.load_layout(&store, "pane_layout_default"));
    assert_eq!(restored.panes(), original.panes());
}

#[test]
fn corrupt_layout_leaves_manager_empty() {
    let mut mgr = PaneManager::default();
    assert!(!mgr.load_layout_from_str("invalid-json"));
    assert_eq!(mgr.pane_count(), 0);
    assert_eq!(mgr.focused_pane_id(), None);
}

#[test]
fn corrupt_layout_leaves_existing_panes_untouched() {
    let store = MemoryStore::new();
    store
        .set("pane_layout_default", "{\"layout\":")
        .expect("set");
    let mut mgr = three_pane_manager();
    let before = mgr.panes().to_vec();
    assert!(!mgr.load_layout(&store, "pane_layout_default"));
    assert!(!mgr.load_layout(&store, "missing"));
    assert_eq!(mgr.panes(), before.as_slice());
}

#[test]
fn restored_ids_do_not_collide_with_new_panes() {
    let raw = json!({
        "layout": { "type": "split", "direction": "vertical", "ratio": 30.0 },
        "panes": [
            { "id": 41, "title": "left", "position": { "row": 0, "col": 0 } },
            { "id": 7, "title": "right", "position": { "row": 0, "col": 1 }, "focused": true }
        ],
        "activePaneId": 7
    })
    .to_string();
    let mut mgr = PaneManager::default();
    assert!(mgr.load_layout_from_str(&raw));
    assert_eq!(mgr.layout().ratio, 30.0);
    let fresh = mgr.create_pane(PaneOptions::default());
    assert_eq!(fresh.id, 42);
    assert_eq!(mgr.layout().kind, LayoutKind::Grid);
}

#[test]
fn out_of_range_ratio_is_clamped_on_restore() {
    let raw = json!({
        "layout": { "type": "split", "direction": "vertical", "ratio": 99.0 },
        "panes": [{ "id": 1, "title": "a" }, { "id": 2, "title": "b" }],
        "activePaneId": 1
    })
    .to_string();
    let snapshot = deserialize_layout(&raw).expect("valid snapshot");
    assert_eq!(snapshot.layout.ratio, 99.0);

    let mut mgr = PaneManager::default();
    mgr.set_container_size(Size::new(1000.0, 500.0));
    assert!(mgr.load_layout_from_str(&raw));
    assert_eq!(mgr.layout().ratio, 90.0);
}

#[test]
fn serialized_form_is_stable_json() {
    let mgr = three_pane_manager();
    let raw = serialize_layout(&mgr).expect("non-empty manager");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["layout"]["type"], "grid");
    assert_eq!(value["panes"][0]["title"], "editor");
    assert_eq!(value["panes"][0]["sessionId"], "sess-a");
    assert!(value["panes"][1].get("sessionId").is_none());
    assert_eq!(value["activePaneId"], mgr.focused_pane_id().expect("focus"));
}

#[test]
fn store_can_be_shared_behind_arc() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let mgr = three_pane_manager();
    assert!(mgr.save_layout(store.as_ref(), "k"));
    assert_eq!(store.keys_with_prefix("k").expect("keys"), vec!["k"]);
}
