//! Key-value persistence backends.
//!
//! The manager only needs `get` and `set` of whole JSON values by key. Two
//! backends ship here: an in-memory map (cheap to clone, shared between
//! handles) and a directory of files, one per key.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Message(String),
}

/// An async key-value store holding JSON values.
pub trait Store: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ─── Memory ───────────────────────────────────────────────────────────────

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronously seed an entry (useful before a manager loads).
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.into(), value);
        Ok(())
    }

    /// Synchronously read an entry.
    pub fn peek(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.peek(key)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.insert(key, value)
    }
}

// ─── Files ────────────────────────────────────────────────────────────────

/// On-disk encoding used by `FileStore`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Pretty-printed JSON (`<key>.json`).
    #[default]
    Json,
    /// MessagePack (`<key>.msgpack`), smaller for large documents.
    MessagePack,
}

impl Encoding {
    fn extension(self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::MessagePack => "msgpack",
        }
    }

    fn encode(self, value: &Value) -> Result<Vec<u8>, StoreError> {
        Ok(match self {
            Encoding::Json => serde_json::to_vec_pretty(value)?,
            Encoding::MessagePack => rmp_serde::to_vec(value)?,
        })
    }

    fn decode(self, bytes: &[u8]) -> Result<Value, StoreError> {
        Ok(match self {
            Encoding::Json => serde_json::from_slice(bytes)?,
            Encoding::MessagePack => rmp_serde::from_slice(bytes)?,
        })
    }
}

/// Store keeping one file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written document.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    encoding: Encoding,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, encoding: Encoding) -> Self {
        Self {
            dir: dir.into(),
            encoding,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `key`. Characters outside `[A-Za-z0-9_-]` are escaped
    /// as `~xx` hex bytes so any key maps to a single safe file name.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("~{byte:02x}"));
            }
        }
        self.dir
            .join(format!("{name}.{}", self.encoding.extension()))
    }
}

impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => self.encoding.decode(&bytes).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let bytes = self.encoding.encode(&value)?;
        let path = self.path_for(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::trace!("wrote {}", path.display());
        Ok(())
    }
}
