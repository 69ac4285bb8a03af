//! Reversible commands.
//!
//! A command pairs the patch that performs a change (`after`) with the patch
//! that reverts it (`before`). Producers are trusted to keep the two inverse
//! on the paths they touch; `is_reversible` can check that against a state.

use crate::patch::{Patch, Path, lookup};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub before: Patch,
    pub after: Patch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Command {
    pub fn new(before: Patch, after: Patch) -> Self {
        Self {
            before,
            after,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a command by diffing two complete states.
    pub fn from_states(prev: &Value, next: &Value) -> Self {
        Self::new(Patch::diff(next, prev), Patch::diff(prev, next))
    }

    /// Union of the leaf paths written by `before` and `after`.
    pub fn touched_paths(&self) -> Vec<Path> {
        let mut paths = self.after.paths();
        for path in self.before.paths() {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Whether applying `after` then `before` to `state` leaves every
    /// touched path as it was.
    pub fn is_reversible(&self, state: &Value) -> bool {
        let restored = self.before.apply(&self.after.apply(state));
        self.touched_paths()
            .iter()
            .all(|path| lookup(state, path) == lookup(&restored, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn from_states_is_reversible() {
        let prev = json!({ "shapes": { "a": { "x": 0 } }, "title": "t" });
        let next = json!({ "shapes": { "a": { "x": 4 }, "b": { "x": 1 } }, "title": "t" });
        let cmd = Command::from_states(&prev, &next);

        assert_eq!(cmd.after.apply(&prev), next);
        assert_eq!(cmd.before.apply(&next), prev);
        assert!(cmd.is_reversible(&prev));
    }

    #[test]
    fn detects_non_inverse_command() {
        let state = json!({ "count": 1 });
        let cmd = Command::new(
            Patch::from_json(json!({ "count": 5 })),
            Patch::from_json(json!({ "count": 2 })),
        );
        assert!(!cmd.is_reversible(&state));
    }

    #[test]
    fn added_key_reverts_to_missing() {
        let state = json!({});
        let cmd = Command::new(
            Patch::from_json(json!({ "title": null })),
            Patch::from_json(json!({ "title": "hello" })),
        );
        assert!(cmd.is_reversible(&state));
    }

    #[test]
    fn envelope_named_key_survives_serde() {
        let prev = json!({ "meta": {} });
        let next = json!({ "meta": { "$set": 1 } });
        let cmd = Command::from_states(&prev, &next);

        let text = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cmd);
        assert_eq!(back.after.apply(&prev), next);
        assert_eq!(back.before.apply(&next), prev);
    }

    #[test]
    fn serde_omits_missing_id() {
        let cmd = Command::new(
            Patch::from_json(json!({ "a": 0 })),
            Patch::from_json(json!({ "a": 1 })),
        );
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({ "before": { "a": 0 }, "after": { "a": 1 } })
        );

        let tagged = cmd.with_id("nudge");
        let back: Command = serde_json::from_value(serde_json::to_value(&tagged).unwrap()).unwrap();
        assert_eq!(back.id.as_deref(), Some("nudge"));
    }
}
