//! Key-value settings store.
//!
//! Every persisted value (credentials, token blob, backup settings, activity
//! log) is a string under a well-known key. Callers get the store as an
//! explicit [`StoreHandle`] rather than reaching for a global.
//!
//! The file-backed store keeps a single JSON object on disk and rewrites it
//! atomically (temp file + rename) on every `set`. On unix the file is
//! readable by its owner only, since it holds the client secret and the
//! refresh token.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{GdabError, Result};
use crate::host::defaults;

/// Store keys.
pub mod keys {
    pub const CLIENT_ID: &str = "google_client_id";
    pub const CLIENT_SECRET: &str = "google_client_secret";
    pub const REDIRECT_URI: &str = "google_redirect_uri";
    pub const ACCESS_TOKEN: &str = "google_access_token";
    pub const ACCOUNT_EMAIL: &str = "google_account_email";
    pub const BACKUP_DIRS: &str = "backup_dirs";
    pub const BACKUP_FREQ: &str = "backup_freq";
    pub const RETENTION_COUNT: &str = "retention_count";
    pub const BACKUP_LOGS: &str = "backup_logs";
}

/// String-valued key-value store.
pub trait SettingsStore: Send + Sync {
    /// Read a key; `None` when unset.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read a key, falling back to `default` when unset.
    fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Read a key, falling back to the documented default for that key.
    fn get_or_default(&self, key: &str) -> Result<String> {
        self.get_or(key, defaults::default_value(key))
    }
}

/// Shared handle to a settings store.
pub type StoreHandle = Arc<dyn SettingsStore>;

// =============================================================================
// File-backed store
// =============================================================================

/// JSON-file settings store.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (lazily) the store at `path`. The file is created on first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convenience: open and wrap in a [`StoreHandle`].
    #[must_use]
    pub fn handle(path: impl Into<PathBuf>) -> StoreHandle {
        Arc::new(Self::open(path))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            GdabError::Config(format!(
                "settings store {} is corrupt: {e}",
                self.path.display()
            ))
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)?;
        tracing::trace!(key, path = %self.path.display(), "Setting saved");
        Ok(())
    }
}

/// Owner read/write only.
#[cfg(unix)]
const STORE_FILE_MODE: u32 = 0o600;

fn create_private(path: &Path) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(STORE_FILE_MODE);
    }
    options.open(path)
}

/// Write bytes atomically using temp file + rename.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Temp file must be in the same directory for the rename to be atomic
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("settings"),
        std::process::id()
    ));

    // A leftover from a crashed write may carry looser permissions.
    match std::fs::remove_file(&temp_path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    {
        let mut file = create_private(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory settings store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create and wrap in a [`StoreHandle`].
    #[must_use]
    pub fn handle() -> StoreHandle {
        Arc::new(Self::new())
    }

    /// Snapshot of all stored values.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
