use crate::error::{Result, ShellError};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::{collections::HashMap, fs, path::PathBuf};
use tracing::{debug, warn};

/// String key/value storage with `localStorage` semantics.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    /// # Errors
    /// Returns an error when the value cannot be persisted.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    /// Returns an error when the removal cannot be persisted.
    fn remove_item(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// The whole file is rewritten on every mutation; the data set is two keys.
/// An unreadable or corrupt file is treated as empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RwLock<Map<String, Value>>,
}

impl FileStorage {
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(items) => items,
                Err(err) => {
                    warn!("Ignoring corrupt storage file {}: {err}", path.display());
                    Map::new()
                }
            },
            Err(err) => {
                debug!("Starting with empty storage at {}: {err}", path.display());
                Map::new()
            }
        };

        Self {
            path,
            items: RwLock::new(items),
        }
    }

    fn flush(&self, items: &Map<String, Value>) -> Result<()> {
        let contents = serde_json::to_string_pretty(items)
            .map_err(|err| ShellError::Storage(format!("Failed to encode storage: {err}")))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    ShellError::Storage(format!("Failed to create {}: {err}", parent.display()))
                })?;
            }
        }
        fs::write(&self.path, contents).map_err(|err| {
            ShellError::Storage(format!("Failed to write {}: {err}", self.path.display()))
        })
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write();
        let previous = items.insert(key.to_string(), Value::String(value.to_string()));
        if let Err(err) = self.flush(&items) {
            // keep memory and disk in step
            match previous {
                Some(previous) => items.insert(key.to_string(), previous),
                None => items.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write();
        let Some(previous) = items.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.flush(&items) {
            items.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}
