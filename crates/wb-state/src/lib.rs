pub mod config;
pub mod hooks;
pub mod manager;
mod persist;
pub mod store;
pub mod subscribe;

pub use config::ManagerConfig;
pub use hooks::{Hooks, NoHooks};
pub use manager::{ReadyOutcome, StateManager, Status, version_key};
pub use store::{Encoding, FileStore, MemoryStore, Store, StoreError};
pub use subscribe::SubscriptionId;

// Re-export the core types so callers only need this crate
pub use wb_core::{Command, History, Patch, Value};
