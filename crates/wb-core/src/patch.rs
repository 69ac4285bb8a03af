//! Deep-merge patches over a keyed state tree.
//!
//! A `Patch` is a recursively partial view of the document state. `Merge`
//! nodes recurse into keyed objects, `Set` replaces whatever sits at that
//! position, and `Unset` removes the key. Fields a patch does not mention are
//! left untouched, so a patch never has to restate unrelated parts of the tree.
//!
//! Arrays are leaves: a patch replaces them wholesale, it never merges
//! element-wise.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Envelope key marking an object-valued `Set` in the JSON form of a patch.
pub const SET_KEY: &str = "$set";

/// Envelope key wrapping a `Merge` whose only key is itself an envelope key.
pub const MERGE_KEY: &str = "$merge";

/// A sequence of object keys from the root of the state tree.
pub type Path = SmallVec<[String; 4]>;

/// A structural patch over a `serde_json::Value` tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Recurse into a keyed node, patching each named child.
    Merge(BTreeMap<String, Patch>),
    /// Replace the value at this position.
    Set(Value),
    /// Remove the key holding this position.
    Unset,
}

impl Default for Patch {
    fn default() -> Self {
        Self::empty()
    }
}

impl Patch {
    /// A patch that changes nothing.
    pub fn empty() -> Self {
        Patch::Merge(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Patch::Merge(entries) if entries.is_empty())
    }

    /// Add (or replace) a child entry, turning `self` into a `Merge` node
    /// if it was not one already.
    pub fn with(mut self, key: impl Into<String>, child: Patch) -> Self {
        if !matches!(self, Patch::Merge(_)) {
            self = Patch::empty();
        }
        if let Patch::Merge(entries) = &mut self {
            entries.insert(key.into(), child);
        }
        self
    }

    // ─── Merge ───────────────────────────────────────────────────────────

    /// Return a copy of `state` with this patch deep-merged into it.
    pub fn apply(&self, state: &Value) -> Value {
        let mut next = state.clone();
        self.merge_into(&mut next);
        next
    }

    /// Deep-merge this patch into `target` in place.
    ///
    /// A non-empty `Merge` over a non-object target treats the target as an
    /// empty object. An empty `Merge` is a no-op everywhere. `Unset` at the
    /// root leaves `Null` behind, since there is no parent to remove it from.
    pub fn merge_into(&self, target: &mut Value) {
        match self {
            Patch::Set(value) => *target = value.clone(),
            Patch::Unset => *target = Value::Null,
            Patch::Merge(entries) => {
                if entries.is_empty() {
                    return;
                }
                if !target.is_object() {
                    *target = Value::Object(Map::new());
                }
                if let Value::Object(object) = target {
                    for (key, child) in entries {
                        match child {
                            Patch::Unset => {
                                object.remove(key);
                            }
                            _ => child.merge_into(object.entry(key.clone()).or_insert(Value::Null)),
                        }
                    }
                }
            }
        }
    }

    // ─── Diff ────────────────────────────────────────────────────────────

    /// Compute the minimal patch that turns `from` into `to`.
    ///
    /// Objects on both sides are compared key by key; any other change is a
    /// `Set` of the new value. Keys missing from `to` become `Unset`.
    pub fn diff(from: &Value, to: &Value) -> Patch {
        match (from, to) {
            (Value::Object(old), Value::Object(new)) => {
                let mut entries = BTreeMap::new();
                for (key, old_value) in old {
                    match new.get(key) {
                        Some(new_value) if new_value == old_value => {}
                        Some(new_value) => {
                            entries.insert(key.clone(), Patch::diff(old_value, new_value));
                        }
                        None => {
                            entries.insert(key.clone(), Patch::Unset);
                        }
                    }
                }
                for (key, new_value) in new {
                    if !old.contains_key(key) {
                        entries.insert(key.clone(), Patch::Set(new_value.clone()));
                    }
                }
                Patch::Merge(entries)
            }
            _ if from == to => Patch::empty(),
            _ => Patch::Set(to.clone()),
        }
    }

    /// Every leaf path this patch writes to.
    pub fn paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        collect_paths(self, &mut Path::new(), &mut out);
        out
    }

    // ─── JSON form ───────────────────────────────────────────────────────

    /// Interpret a JSON value as a patch: objects merge, `null` unsets,
    /// `{"$set": v}` replaces with `v`, `{"$merge": {..}}` merges the wrapped
    /// object literally, and any other value is set as-is.
    pub fn from_json(value: Value) -> Patch {
        match value {
            Value::Null => Patch::Unset,
            Value::Object(mut object) => {
                if object.len() == 1 {
                    if let Some(inner) = object.remove(SET_KEY) {
                        return Patch::Set(inner);
                    }
                    match object.remove(MERGE_KEY) {
                        Some(Value::Object(inner)) => return merge_from_map(inner),
                        Some(other) => {
                            object.insert(MERGE_KEY.to_string(), other);
                        }
                        None => {}
                    }
                }
                merge_from_map(object)
            }
            other => Patch::Set(other),
        }
    }

    /// Inverse of [`Patch::from_json`]. A `Merge` whose single key is
    /// `$set` or `$merge` is wrapped in a `$merge` envelope so it is not
    /// read back as one.
    pub fn to_json(&self) -> Value {
        match self {
            Patch::Merge(entries) => {
                let object: Map<String, Value> = entries
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_json()))
                    .collect();
                if object.len() == 1
                    && (object.contains_key(SET_KEY) || object.contains_key(MERGE_KEY))
                {
                    let mut envelope = Map::new();
                    envelope.insert(MERGE_KEY.to_string(), Value::Object(object));
                    return Value::Object(envelope);
                }
                Value::Object(object)
            }
            Patch::Set(value @ (Value::Object(_) | Value::Null)) => {
                let mut envelope = Map::new();
                envelope.insert(SET_KEY.to_string(), value.clone());
                Value::Object(envelope)
            }
            Patch::Set(value) => value.clone(),
            Patch::Unset => Value::Null,
        }
    }
}

fn merge_from_map(object: Map<String, Value>) -> Patch {
    Patch::Merge(
        object
            .into_iter()
            .map(|(key, child)| (key, Patch::from_json(child)))
            .collect(),
    )
}

fn collect_paths(patch: &Patch, prefix: &mut Path, out: &mut Vec<Path>) {
    match patch {
        Patch::Merge(entries) => {
            for (key, child) in entries {
                prefix.push(key.clone());
                collect_paths(child, prefix, out);
                prefix.pop();
            }
        }
        Patch::Set(_) | Patch::Unset => out.push(prefix.clone()),
    }
}

/// Look up the value at `path`, or `None` if any segment is missing.
pub fn lookup<'a>(state: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(state, |node, key| node.get(key))
}

impl From<Value> for Patch {
    fn from(value: Value) -> Self {
        Patch::from_json(value)
    }
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Patch::from_json)
    }
}
