//! Key-value storage backends for session state.
//!
//! DESIGN
//! ======
//! Writes arrive as a batch of [`Mutation`]s so the session store can set
//! or clear token, user id and signal together. Every backend applies a
//! batch all-or-nothing from the caller's point of view.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A single write against a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<'a> {
    Set(&'a str, String),
    Remove(&'a str),
}

/// Errors produced while persisting session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the backing file failed.
    #[error("session storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored entries could not be encoded.
    #[error("session storage encode failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable string key-value storage, scoped to one client.
pub trait Storage: Send + Sync {
    /// Read a value. Never fails: unreadable storage reads as empty.
    fn get(&self, key: &str) -> Option<String>;

    /// Apply a batch of writes atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be persisted; no partial
    /// batch is left behind in that case.
    fn apply(&self, mutations: &[Mutation<'_>]) -> Result<(), SessionError>;
}

fn apply_to(entries: &mut BTreeMap<String, String>, mutations: &[Mutation<'_>]) {
    for mutation in mutations {
        match mutation {
            Mutation::Set(key, value) => {
                entries.insert((*key).to_owned(), value.clone());
            }
            Mutation::Remove(key) => {
                entries.remove(*key);
            }
        }
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-process storage. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn apply(&self, mutations: &[Mutation<'_>]) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        apply_to(&mut entries, mutations);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON-object file on disk. Each batch rewrites the file through a
/// sibling temp file and a rename.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session file unreadable");
                return BTreeMap::new();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "session file corrupt; starting empty");
            BTreeMap::new()
        })
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec_pretty(entries)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let written = write_then_rename(&tmp_path, &self.path, &encoded);
        if written.is_err() && tmp_path.exists() {
            if let Err(e) = std::fs::remove_file(&tmp_path) {
                tracing::warn!(path = %tmp_path.display(), error = %e, "session temp file left behind");
            }
        }
        written.map_err(SessionError::from)
    }
}

fn write_then_rename(tmp_path: &Path, path: &Path, encoded: &[u8]) -> std::io::Result<()> {
    let mut file = open_private(tmp_path)?;
    file.write_all(encoded)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp_path, path)
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load().remove(key)
    }

    fn apply(&self, mutations: &[Mutation<'_>]) -> Result<(), SessionError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        apply_to(&mut entries, mutations);
        self.store(&entries)
    }
}

// =============================================================================
// UNAVAILABLE
// =============================================================================

/// Storage for contexts that have none (server-side rendering, routing).
/// Reads are empty and writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Storage for Unavailable {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn apply(&self, _mutations: &[Mutation<'_>]) -> Result<(), SessionError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
