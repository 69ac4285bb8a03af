pub mod command;
pub mod history;
pub mod patch;

pub use command::Command;
pub use history::History;
pub use patch::{Patch, Path, lookup};

// Re-export the state value type so downstream crates agree on one tree type
pub use serde_json::Value;
