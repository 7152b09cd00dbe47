//! Durable key-value storage for cross-restart state.
//!
//! The plugin persists exactly two values: the set of item guids the user
//! has opened (`itemsRead`) and the per-feed last-view timestamps
//! (`lastAccess`). Both live in a single flat JSON document. The host
//! launcher normally supplies this storage; [`JsonFileStore`] is the
//! standalone implementation, [`MemoryStore`] backs tests.

use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Narrow contract for the host's durable key-value storage.
///
/// `get` returns the stored JSON value or `None` when the key has never
/// been written. `set` must be durable before it returns (read-your-writes
/// across a process restart).
pub trait KeyValue: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// File-backed store: one JSON object, rewritten atomically on every `set`.
///
/// A missing or corrupt file yields an empty store rather than an error:
/// losing read markers is recoverable, refusing to start is not.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, Value>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "State file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No state file found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "State file unreadable, starting empty");
                HashMap::new()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Write-to-temp-then-rename so the state file is never left partial.
    fn persist(&self, data: &HashMap<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(data)?;
        let temp_path = self.path.with_extension("tmp");

        let mut temp_file = std::fs::File::create(&temp_path)?;
        temp_file.write_all(&bytes)?;
        temp_file.sync_all()?;
        drop(temp_file);

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValue for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().expect("state lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut data = self.data.lock().expect("state lock poisoned");
        data.insert(key.to_string(), value);
        self.persist(&data)
    }
}

/// In-memory store for tests and hosts that manage persistence themselves.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValue for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().expect("state lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.data
            .lock()
            .expect("state lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }
}
