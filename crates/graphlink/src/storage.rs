//! Credential storage.
//!
//! The client only ever *reads* credentials. Writing them (after a login
//! flow) is the application's business; [`MemoryStore::set`] and
//! [`FileStore::set`] exist for that side.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Errors from a credential store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Failed to access credential file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("Malformed credential file '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

impl StorageError {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Read access to persisted credentials.
pub trait CredentialStore: Send + Sync {
    /// Look up the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
}

/// An in-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Remove the value under `key`.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().get(key).cloned())
    }
}

/// A credential store backed by a flat JSON object file.
///
/// The file is read on every lookup, so a credential rotated by another
/// process is picked up on the next request. A missing file holds nothing.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store in the platform's per-user data directory, if one exists.
    pub fn default_location() -> Option<Self> {
        directories::ProjectDirs::from("", "", "graphlink")
            .map(|dirs| Self::new(dirs.data_dir().join("credentials.json")))
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store `value` under `key`, creating the file and its directory if
    /// needed.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?.unwrap_or_default();
        entries.insert(key.to_owned(), Value::String(value.to_owned()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(&Value::Object(entries))
            .map_err(|e| StorageError::parse(&self.path, e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| StorageError::io(&self.path, e))
    }

    fn load(&self) -> Result<Option<Map<String, Value>>, StorageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        match serde_json::from_str(&text) {
            Ok(Value::Object(entries)) => Ok(Some(entries)),
            Ok(_) => Err(StorageError::parse(&self.path, "expected a JSON object")),
            Err(e) => Err(StorageError::parse(&self.path, e.to_string())),
        }
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let Some(entries) = self.load()? else {
            return Ok(None);
        };
        match entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(StorageError::parse(
                &self.path,
                format!("value for '{key}' is not a string"),
            )),
        }
    }
}
