//! Flat string-keyed JSON file store.
//!
//! The persistence collaborator for both sides of the tunnel: the client
//! caches its `{SessionID, K3}` pair here to skip the handshake on the next
//! run, and the server snapshots its session table so sessions survive a
//! restart. Keys and values are plain strings; anything richer is the
//! caller's encoding choice.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing the backing file failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not contain a JSON string map.
    #[error("store file is not a valid JSON string map: {0}")]
    Format(#[from] serde_json::Error),
}

/// A string→string map backed by one JSON file.
///
/// Mutations stay in memory until [`FileStore::save`] is called.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is created empty; an
    /// existing file is loaded eagerly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            data: BTreeMap::new(),
        };
        if store.path.exists() {
            store.load()?;
        } else {
            store.save()?;
        }
        Ok(store)
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Insert or replace a value. In-memory only until [`FileStore::save`].
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove a key, returning the previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.remove(key)
    }

    /// Drop every entry. In-memory only until [`FileStore::save`].
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents to the backing file.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path)?;
        self.data = serde_json::from_str(&text)?;
        Ok(())
    }
}
