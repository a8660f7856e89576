use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Storage key of the persisted session flag.
pub const AUTH_FLAG_KEY: &str = "isAuthenticated";

/// The only stored value that counts as authenticated.
pub const AUTH_FLAG_TRUE: &str = "true";

/// StoreError
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session store file {path} is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// 1. KeyValueStore Contract
/// KeyValueStore
///
/// Durable, string-keyed storage for session data. Reads are served from memory
/// and never touch the backing medium, so they are safe inside the navigation
/// guard. Writes may fail and report a `StoreError`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// StoreState
///
/// The shared handle used across the application state.
pub type StoreState = Arc<dyn KeyValueStore>;

// 2. In-memory implementation (tests, or no SESSION_FILE)
/// MemoryStore
///
/// Keeps entries for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// 3. File-backed implementation (survives restarts)
/// FileStore
///
/// Entries live in a JSON object on disk. The file is read once at `open` and
/// rewritten in full on every change. Writes block, so async callers run them
/// on the blocking pool.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// open
    ///
    /// A missing file is an empty store; it is created on the first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Session store opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Writes to a sibling temp file and renames it over the store, so a crash
    // mid-write leaves the previous contents intact.
    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let io_error = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
        serde_json::to_writer_pretty(&mut file, entries)
            .map_err(|e| io_error(io::Error::other(e)))?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(&self.path).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    // Changes are applied to a copy and only become visible once they are on disk.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

// 4. Session flag
/// SessionFlag
///
/// Read side of the session state, as seen by the navigation guard.
pub trait SessionFlag: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

/// StoredSession
///
/// The `isAuthenticated` flag kept in a `KeyValueStore`. Only the login and
/// logout flows write it.
#[derive(Clone)]
pub struct StoredSession {
    store: StoreState,
}

/// SessionState
///
/// The shared handle used across the application state.
pub type SessionState = Arc<StoredSession>;

impl StoredSession {
    pub fn new(store: StoreState) -> Self {
        Self { store }
    }

    pub fn login(&self) -> Result<(), StoreError> {
        self.store.set(AUTH_FLAG_KEY, AUTH_FLAG_TRUE)?;
        tracing::info!("Session flag set");
        Ok(())
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.remove(AUTH_FLAG_KEY)?;
        tracing::info!("Session flag cleared");
        Ok(())
    }
}

impl SessionFlag for StoredSession {
    // Absent and any value other than "true" are the same: not authenticated.
    fn is_authenticated(&self) -> bool {
        self.store.get(AUTH_FLAG_KEY).as_deref() == Some(AUTH_FLAG_TRUE)
    }
}
