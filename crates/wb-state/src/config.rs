//! Manager configuration.

/// Configuration for a `StateManager`.
///
/// The default is fully in-memory: no persistence key, no schema version,
/// and an unbounded history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Store key the document is persisted under. `None` disables
    /// persistence entirely.
    pub persistence_key: Option<String>,

    /// Current schema version. A persisted document saved under a lower
    /// version is passed through `Hooks::upgrade` on load.
    pub version: Option<i64>,

    /// Maximum number of undo steps retained (`None` = unbounded).
    pub history_limit: Option<usize>,
}

impl ManagerConfig {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.persistence_key = Some(key.into());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }
}
