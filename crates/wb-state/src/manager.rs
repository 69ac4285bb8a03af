//! Document state manager.
//!
//! `StateManager` owns the live document state and is the only thing allowed
//! to change it. Every change goes through one pipeline:
//!
//! 1. deep-merge a `Patch` into the current state,
//! 2. let `Hooks::cleanup` adjust the result,
//! 3. fire `on_state_will_change`, swap the state in, notify subscribers,
//!    fire `on_state_did_change`.
//!
//! `patch_state` runs the pipeline alone: the change is neither undoable nor
//! persisted. `set_state` commits a reversible `Command` to the history and
//! persists the result. `undo` / `redo` replay the `before` / `after` patches
//! of committed commands.
//!
//! Persistence is asynchronous and never blocks a mutation. `ready()` loads
//! any saved document once; `flush()` waits for outstanding writes.

use crate::config::ManagerConfig;
use crate::hooks::{Hooks, NoHooks};
use crate::persist::PersistQueue;
use crate::store::{Store, StoreError};
use crate::subscribe::{SubscriptionId, Subscribers};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wb_core::{Command, History, Patch, Value};

/// How the persisted document was reconciled on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyOutcome {
    /// Nothing was persisted (or loading failed).
    None,
    /// The saved document was adopted as-is.
    Restored,
    /// The saved document was adopted after `Hooks::upgrade`.
    Migrated,
}

impl fmt::Display for ReadyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadyOutcome::None => "none",
            ReadyOutcome::Restored => "restored",
            ReadyOutcome::Migrated => "migrated",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Loading,
    Ready,
}

/// Store key holding the schema version of the document saved under `key`.
pub fn version_key(key: &str) -> String {
    format!("{key}_version")
}

pub struct StateManager<S: Store, H: Hooks = NoHooks> {
    config: ManagerConfig,
    store: Arc<S>,
    hooks: H,

    /// The live state.
    state: Value,
    /// The state given at construction, restored by `reset`.
    initial: Value,
    /// A saved copy of state, independent of the history.
    snapshot: Value,

    history: History,
    status: Status,
    outcome: Option<ReadyOutcome>,
    paused: bool,
    subscribers: Subscribers,
    writer: Option<PersistQueue>,
}

impl<S: Store, H: Hooks> StateManager<S, H> {
    /// Create a manager over `initial`.
    ///
    /// Without a persistence key the manager is ready immediately. With one,
    /// it starts in `Status::Loading`; call `ready()` to load the saved
    /// document. The persistence writer is started on the tokio runtime that
    /// drives `ready()` or the first write, so construction itself needs no
    /// runtime.
    pub fn new(initial: Value, config: ManagerConfig, store: S, hooks: H) -> Self {
        let store = Arc::new(store);
        let status = if config.persistence_key.is_some() {
            Status::Loading
        } else {
            Status::Ready
        };

        Self {
            history: History::new(config.history_limit),
            config,
            store,
            hooks,
            state: initial.clone(),
            snapshot: initial.clone(),
            initial,
            status,
            outcome: None,
            paused: false,
            subscribers: Subscribers::default(),
            writer: None,
        }
    }

    // ─── Loading ─────────────────────────────────────────────────────────

    /// Load and reconcile the persisted document, once.
    ///
    /// Later calls return the first outcome. Load errors are logged and
    /// reported as `ReadyOutcome::None`; the initial state stays live.
    pub async fn ready(&mut self) -> ReadyOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        let outcome = match self.config.persistence_key.clone() {
            None => ReadyOutcome::None,
            Some(key) => match self.load(&key).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("failed to load persisted state `{key}`: {err}");
                    ReadyOutcome::None
                }
            },
        };

        self.status = Status::Ready;
        self.outcome = Some(outcome);
        self.ensure_writer();
        log::debug!("state manager ready: {outcome}");
        self.hooks.on_ready(outcome);
        outcome
    }

    async fn load(&mut self, key: &str) -> Result<ReadyOutcome, StoreError> {
        let version_key = version_key(key);
        let stored_version = Value::from(self.config.version.unwrap_or(-1));

        let Some(saved) = self.store.get(key).await? else {
            self.store.set(&version_key, stored_version).await?;
            return Ok(ReadyOutcome::None);
        };

        let mut outcome = ReadyOutcome::Restored;
        let mut next = saved;
        if let Some(version) = self.config.version {
            let saved_version = self.store.get(&version_key).await?.and_then(|v| v.as_i64());
            if let Some(saved_version) = saved_version
                && saved_version < version
            {
                log::info!("upgrading `{key}` from version {saved_version} to {version}");
                next = self.hooks.upgrade(next, &self.initial, saved_version);
                outcome = ReadyOutcome::Migrated;
            }
        }
        self.store.set(&version_key, stored_version).await?;

        let next = self.hooks.migrate(next);
        self.snapshot = next.clone();
        self.state = next;
        self.subscribers.notify(&self.state);
        Ok(outcome)
    }

    // ─── Patches & commands ──────────────────────────────────────────────

    /// Apply a patch to the current state. Does not touch the history and
    /// does not persist.
    pub fn patch_state(&mut self, patch: Patch, id: Option<&str>) -> &mut Self {
        self.apply_patch(&patch, id);
        self.hooks.on_patch(&self.state, &patch, id);
        self
    }

    /// Commit a command: truncate any redo entries, push it, apply its
    /// `after` patch, and persist. A given `id` replaces the command's own.
    pub fn set_state(&mut self, mut command: Command, id: Option<&str>) -> &mut Self {
        if let Some(id) = id {
            command.id = Some(id.to_string());
        }

        #[cfg(debug_assertions)]
        if !command.is_reversible(&self.state) {
            log::warn!(
                "command {:?} does not restore the fields it touches",
                command.id.as_deref().unwrap_or("<anonymous>")
            );
        }

        self.history.push(command.clone());
        let id = command.id.as_deref();
        self.apply_patch(&command.after, id);
        self.hooks.on_command(&self.state, &command);
        self.persist(&command.after, id);
        self
    }

    /// Swap in a whole new state (after cleanup). Does not touch the history
    /// and does not persist.
    pub fn replace_state(&mut self, state: Value, id: Option<&str>) -> &mut Self {
        let patch = Patch::Set(state.clone());
        let next = self.hooks.cleanup(state, &self.state, &patch, id);
        self.commit(next, Some("replace"));
        self
    }

    fn apply_patch(&mut self, patch: &Patch, id: Option<&str>) {
        log::trace!("apply patch {id:?}");
        let next = patch.apply(&self.state);
        let next = self.hooks.cleanup(next, &self.state, patch, id);
        self.commit(next, id);
    }

    fn commit(&mut self, next: Value, id: Option<&str>) {
        self.hooks.on_state_will_change(&next, id);
        self.state = next;
        self.subscribers.notify(&self.state);
        self.hooks.on_state_did_change(&self.state, id);
    }

    fn persist(&mut self, patch: &Patch, id: Option<&str>) {
        if self.status != Status::Ready {
            return;
        }
        self.hooks.on_persist(&self.state, patch, id);
        if self.ensure_writer()
            && let Some(writer) = &mut self.writer
        {
            writer.enqueue(self.state.clone());
        }
    }

    /// Start the writer task if there is a key and none is running yet.
    /// Retried on every write while no runtime is available.
    fn ensure_writer(&mut self) -> bool {
        if self.writer.is_none()
            && let Some(key) = &self.config.persistence_key
        {
            self.writer = PersistQueue::spawn(Arc::clone(&self.store), key.clone());
        }
        self.writer.is_some()
    }

    /// Wait until every persistence write issued so far has completed.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Undo one command. A no-op, hooks included, when paused or when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> &mut Self {
        if self.paused {
            log::debug!("undo ignored while paused");
            return self;
        }
        let Some(command) = self.history.step_back().cloned() else {
            return self;
        };
        log::debug!("undo {:?}", command.id);
        self.apply_patch(&command.before, Some("undo"));
        self.persist(&command.before, Some("undo"));
        self.hooks.on_undo(&self.state);
        self
    }

    /// Redo one command. A no-op, hooks included, when paused or when
    /// there is nothing to redo.
    pub fn redo(&mut self) -> &mut Self {
        if self.paused {
            log::debug!("redo ignored while paused");
            return self;
        }
        let Some(command) = self.history.step_forward().cloned() else {
            return self;
        };
        log::debug!("redo {:?}", command.id);
        self.apply_patch(&command.after, Some("redo"));
        self.persist(&command.after, Some("redo"));
        self.hooks.on_redo(&self.state);
        self
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Restore the initial state and clear the history.
    pub fn reset(&mut self) -> &mut Self {
        self.hooks.on_state_will_change(&self.initial, Some("reset"));
        self.state = self.initial.clone();
        self.subscribers.notify(&self.state);
        self.reset_history();
        self.persist(&Patch::empty(), Some("reset"));
        self.hooks.on_state_did_change(&self.state, Some("reset"));
        self.hooks.on_reset(&self.state);
        self
    }

    /// Clear the history without touching the state.
    pub fn reset_history(&mut self) -> &mut Self {
        self.history.clear();
        self.hooks.on_reset_history(&self.state);
        self
    }

    /// Force-replace the history. The caller is responsible for the
    /// commands being consistent with the current state.
    pub fn replace_history(&mut self, commands: Vec<Command>, pointer: Option<isize>) -> &mut Self {
        self.history.replace(commands, pointer);
        self.hooks.on_replace(&self.state);
        self
    }

    // ─── Snapshot ────────────────────────────────────────────────────────

    pub fn set_snapshot(&mut self) -> &mut Self {
        self.snapshot = self.state.clone();
        self
    }

    /// Replace the live state with the last snapshot.
    pub fn restore_snapshot(&mut self) -> &mut Self {
        let snapshot = self.snapshot.clone();
        self.replace_state(snapshot, Some("snapshot"))
    }

    // ─── Subscribers ─────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: impl FnMut(&Value) + Send + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Re-broadcast the current state without changing it.
    pub fn force_update(&mut self) {
        self.subscribers.notify(&self.state);
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Deserialize the live state into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.state)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }
}

impl<S: Store, H: Hooks> fmt::Debug for StateManager<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("config", &self.config)
            .field("status", &self.status)
            .field("pointer", &self.history.pointer())
            .field("history_len", &self.history.len())
            .field("paused", &self.paused)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}
