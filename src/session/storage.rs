//! Key/value backends for the persisted session.
//!
//! The session lives in a small key space (`token`, `user`) with string
//! values. [`FileStorage`] keeps it in a JSON document on disk and replaces the
//! document atomically on every write; [`MemoryStorage`] keeps it in process.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::SessionError;

/// A string key/value store. Multi-key writes must be all-or-nothing as far as
/// readers are concerned.
pub trait Storage: Send + Sync {
    /// Read several keys from one consistent view of the store.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, SessionError>;

    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.get_many(&[key])?.pop().flatten())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), SessionError>;

    fn remove_many(&self, keys: &[&str]) -> Result<(), SessionError>;
}

/// JSON document on disk, e.g. `./data/session.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // Write beside the target and rename over it so a reader sees either
        // the old document or the new one.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, SessionError> {
        let mut all = self.read_all()?;
        Ok(keys.iter().map(|key| all.remove(*key)).collect())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), SessionError> {
        // A corrupt document is replaced rather than merged into.
        let mut all = self.read_all().unwrap_or_default();
        for (key, value) in entries {
            all.insert((*key).to_string(), value.clone());
        }
        self.write_all(&all)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut all = self.read_all().unwrap_or_default();
        for key in keys {
            all.remove(*key);
        }
        if all.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            self.write_all(&all)
        }
    }
}

/// In-process storage, used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw value, bypassing the session store. Lets tests plant
    /// partial or corrupt state.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }
}

impl Storage for MemoryStorage {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, SessionError> {
        let map = self.entries.lock();
        Ok(keys.iter().map(|key| map.get(*key).cloned()).collect())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), SessionError> {
        let mut map = self.entries.lock();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut map = self.entries.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}
