//! Integration tests: undo/redo through the state manager.
//!
//! Drives `StateManager` the way an editing tool would: compute a command,
//! commit it, and walk the history back and forth.

use pretty_assertions::assert_eq;
use serde_json::json;
use wb_state::{Command, ManagerConfig, MemoryStore, NoHooks, Patch, StateManager, Value};

fn make_manager() -> StateManager<MemoryStore> {
    StateManager::new(
        json!({
            "document": {
                "pages": { "page1": { "shapes": { "box": { "x": 0, "y": 0, "w": 100, "h": 50 } } } }
            },
            "appState": { "tool": "select" }
        }),
        ManagerConfig::default(),
        MemoryStore::new(),
        NoHooks,
    )
}

/// A command resizing `box`, computed from the manager's current state.
fn resize(manager: &StateManager<MemoryStore>, w: i64, h: i64) -> Command {
    let prev = manager.state().clone();
    let next = Patch::from_json(json!({
        "document": { "pages": { "page1": { "shapes": { "box": { "w": w, "h": h } } } } }
    }))
    .apply(&prev);
    Command::from_states(&prev, &next).with_id(format!("resize {w}x{h}"))
}

fn box_size(manager: &StateManager<MemoryStore>) -> (Value, Value) {
    let shape = &manager.state()["document"]["pages"]["page1"]["shapes"]["box"];
    (shape["w"].clone(), shape["h"].clone())
}

// ─── Basic undo/redo ────────────────────────────────────────────────────

#[test]
fn undo_restores_previous_state() {
    let mut manager = make_manager();
    let original = manager.state().clone();

    let cmd = resize(&manager, 200, 100);
    manager.set_state(cmd, None);
    assert_eq!(box_size(&manager), (json!(200), json!(100)));

    manager.undo();
    assert_eq!(manager.state(), &original);
}

#[test]
fn redo_reapplies_undone_action() {
    let mut manager = make_manager();
    let cmd = resize(&manager, 200, 100);
    manager.set_state(cmd, None);
    let after = manager.state().clone();

    manager.undo().redo();
    assert_eq!(manager.state(), &after);
}

// ─── Multiple operations ────────────────────────────────────────────────

#[test]
fn undo_multiple_operations_in_order() {
    let mut manager = make_manager();

    let first = resize(&manager, 200, 100);
    manager.set_state(first, None);
    let second = resize(&manager, 400, 200);
    manager.set_state(second, None);

    manager.undo();
    assert_eq!(box_size(&manager), (json!(200), json!(100)), "should be back to first resize");

    manager.undo();
    assert_eq!(box_size(&manager), (json!(100), json!(50)), "should be back to original");
}

// ─── Truncation ─────────────────────────────────────────────────────────

#[test]
fn new_command_after_undo_discards_redo() {
    let mut manager = make_manager();
    for n in 1..=5 {
        let cmd = resize(&manager, 100 + n, 50);
        manager.set_state(cmd, None);
    }

    manager.undo().undo();
    assert_eq!(box_size(&manager).0, json!(103));
    assert!(manager.can_redo());

    let c6 = resize(&manager, 999, 50);
    manager.set_state(c6, None);
    assert!(!manager.can_redo(), "redo entries should be gone after a new commit");

    let ids: Vec<_> = manager
        .history()
        .commands()
        .iter()
        .filter_map(|c| c.id.clone())
        .collect();
    assert_eq!(ids, vec!["resize 101x50", "resize 102x50", "resize 103x50", "resize 999x50"]);
}

// ─── Empty stack edge cases ─────────────────────────────────────────────

#[test]
fn undo_on_fresh_manager_is_noop() {
    let mut manager = make_manager();
    let before = manager.state().clone();
    manager.undo();
    assert_eq!(manager.state(), &before);
    assert!(!manager.can_undo());
}

#[test]
fn redo_at_top_is_noop() {
    let mut manager = make_manager();
    let cmd = resize(&manager, 10, 10);
    manager.set_state(cmd, None);
    let top = manager.state().clone();

    manager.redo();
    assert_eq!(manager.state(), &top);
    assert!(!manager.can_redo());
}

// ─── Patches and reset ──────────────────────────────────────────────────

#[test]
fn patch_state_survives_undo_of_unrelated_command() {
    let mut manager = make_manager();
    let cmd = resize(&manager, 300, 300);
    manager.set_state(cmd, None);

    manager.patch_state(Patch::from_json(json!({ "appState": { "tool": "draw" } })), None);
    manager.undo();

    assert_eq!(manager.state()["appState"]["tool"], json!("draw"));
    assert_eq!(box_size(&manager), (json!(100), json!(50)));
}

#[test]
fn reset_clears_history() {
    let mut manager = make_manager();
    let original = manager.state().clone();
    for n in 0..3 {
        let cmd = resize(&manager, n, n);
        manager.set_state(cmd, None);
    }

    manager.reset();
    assert!(!manager.can_undo());
    assert!(!manager.can_redo());
    assert_eq!(manager.state(), &original);
}
