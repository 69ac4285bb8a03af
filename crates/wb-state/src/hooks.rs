//! Lifecycle hooks.
//!
//! A concrete document type customises the manager by implementing `Hooks`.
//! Every method has a no-op default, so implementors only override what they
//! observe. The three transform hooks (`cleanup`, `migrate`, `upgrade`) return
//! the state the manager should adopt.

use crate::manager::ReadyOutcome;
use wb_core::{Command, Patch, Value};

pub trait Hooks {
    /// Persisted state (if any) has been reconciled into the live state.
    fn on_ready(&mut self, _outcome: ReadyOutcome) {}

    /// A patch was applied through `patch_state`. `patch` is the original
    /// patch, `state` the merged result.
    fn on_patch(&mut self, _state: &Value, _patch: &Patch, _id: Option<&str>) {}

    /// A command was committed through `set_state`.
    fn on_command(&mut self, _state: &Value, _command: &Command) {}

    /// The state is about to be written to the store.
    fn on_persist(&mut self, _state: &Value, _patch: &Patch, _id: Option<&str>) {}

    /// The history stack was force-replaced.
    fn on_replace(&mut self, _state: &Value) {}

    fn on_reset(&mut self, _state: &Value) {}

    fn on_reset_history(&mut self, _state: &Value) {}

    fn on_undo(&mut self, _state: &Value) {}

    fn on_redo(&mut self, _state: &Value) {}

    fn on_state_will_change(&mut self, _next: &Value, _id: Option<&str>) {}

    fn on_state_did_change(&mut self, _state: &Value, _id: Option<&str>) {}

    /// Final adjustment of a freshly merged state before it becomes live.
    fn cleanup(&mut self, next: Value, _prev: &Value, _patch: &Patch, _id: Option<&str>) -> Value {
        next
    }

    /// Structural fix-ups for a state loaded from the store.
    fn migrate(&mut self, next: Value) -> Value {
        next
    }

    /// Convert a document saved under an older schema version. The default
    /// discards the saved document in favour of the initial state.
    fn upgrade(&mut self, _saved: Value, initial: &Value, _saved_version: i64) -> Value {
        initial.clone()
    }
}

/// Hooks that observe nothing and transform nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}
