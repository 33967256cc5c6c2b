//! Test utilities for gdab.
//!
//! Provides in-memory fakes for the pipeline seams ([`DriveApi`],
//! [`Archiver`], [`Scheduler`]), settings-store seeding helpers, test data
//! factories, and assertion macros for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gdab::test_utils::*;
//!
//! let store = MemoryStore::handle();
//! seed_connected(&store);
//! seed_settings(&store, &["/var/www"], "daily", 3);
//! let drive = FakeDrive::new().with_folder(DEFAULT_FOLDER_NAME, "folder-1");
//! ```

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{TimeDelta, Utc};

use crate::core::archiver::{ArchiveKind, Archiver};
use crate::core::drive::{
    About, DriveApi, DriveUser, FOLDER_MIME_TYPE, RESUMABLE_THRESHOLD, RemoteFile, StorageQuota,
    UploadStrategy, UploadedFile,
};
use crate::core::oauth::OAuthToken;
use crate::core::scheduler::{ScheduledTask, Scheduler, parse_crontab};
use crate::error::{GdabError, Result};
use crate::storage::settings_store::{StoreHandle, keys};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Test Data Factories
// =============================================================================

/// A token issued now that stays valid for an hour.
#[must_use]
pub fn make_test_token() -> OAuthToken {
    OAuthToken {
        access_token: "ya29.test-access".to_string(),
        refresh_token: Some("1//test-refresh".to_string()),
        token_type: Some("Bearer".to_string()),
        scope: Some(crate::core::oauth::DRIVE_SCOPE.to_string()),
        expires_in: Some(3600),
        created: Utc::now().timestamp(),
    }
}

/// A token that expired a day ago.
#[must_use]
pub fn make_expired_token(refresh_token: Option<&str>) -> OAuthToken {
    OAuthToken {
        refresh_token: refresh_token.map(str::to_string),
        expires_in: Some(3600),
        created: Utc::now().timestamp() - 86_400,
        ..make_test_token()
    }
}

/// A remote backup archive created `days_ago` days before now.
#[must_use]
pub fn make_remote_file(id: &str, name: &str, days_ago: i64) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: name.to_string(),
        created_time: Some(Utc::now() - TimeDelta::days(days_ago)),
        mime_type: Some(ArchiveKind::TarGz.mime_type().to_string()),
    }
}

// =============================================================================
// Settings Store Seeding
// =============================================================================

/// Store a valid OAuth client.
///
/// # Panics
///
/// Panics if the store rejects the write.
pub fn seed_credentials(store: &StoreHandle) {
    store.set(keys::CLIENT_ID, "test-client.apps.googleusercontent.com").unwrap();
    store.set(keys::CLIENT_SECRET, "test-secret").unwrap();
    store
        .set(keys::REDIRECT_URI, "http://127.0.0.1:8765/oauth2callback")
        .unwrap();
}

/// Store `token` as the current token blob.
///
/// # Panics
///
/// Panics if the store rejects the write.
pub fn seed_token(store: &StoreHandle, token: &OAuthToken) {
    store
        .set(keys::ACCESS_TOKEN, &serde_json::to_string(token).unwrap())
        .unwrap();
}

/// Credentials plus a fresh token.
pub fn seed_connected(store: &StoreHandle) {
    seed_credentials(store);
    seed_token(store, &make_test_token());
}

/// Write backup settings directly, bypassing validation and scheduling.
///
/// # Panics
///
/// Panics if the store rejects the write.
pub fn seed_settings(store: &StoreHandle, dirs: &[&str], frequency: &str, retention: u32) {
    store
        .set(keys::BACKUP_DIRS, &serde_json::to_string(dirs).unwrap())
        .unwrap();
    store.set(keys::BACKUP_FREQ, frequency).unwrap();
    store
        .set(keys::RETENTION_COUNT, &retention.to_string())
        .unwrap();
}

// =============================================================================
// Fake Drive
// =============================================================================

/// In-memory [`DriveApi`] that records every call.
///
/// Uploaded files get a creation time of "now", so they sort after any
/// seeded file created in the past.
#[derive(Debug)]
pub struct FakeDrive {
    state: Mutex<FakeDriveState>,
    resumable_threshold: u64,
    fail_uploads: bool,
}

#[derive(Debug, Default)]
struct FakeDriveState {
    folders: Vec<RemoteFile>,
    /// `(parent_id, file)`.
    files: Vec<(String, RemoteFile)>,
    calls: Vec<String>,
    next_id: usize,
}

impl Default for FakeDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDrive {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeDriveState::default()),
            resumable_threshold: RESUMABLE_THRESHOLD,
            fail_uploads: false,
        }
    }

    /// Pre-existing folder.
    #[must_use]
    pub fn with_folder(self, name: &str, id: &str) -> Self {
        lock(&self.state).folders.push(RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            created_time: Some(Utc::now() - TimeDelta::days(365)),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        });
        self
    }

    /// Pre-existing file inside `parent_id`.
    #[must_use]
    pub fn with_file(self, parent_id: &str, file: RemoteFile) -> Self {
        lock(&self.state).files.push((parent_id.to_string(), file));
        self
    }

    #[must_use]
    pub const fn with_resumable_threshold(mut self, threshold: u64) -> Self {
        self.resumable_threshold = threshold;
        self
    }

    /// Every upload fails with a Drive API error.
    #[must_use]
    pub const fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Calls in order, e.g. `upload:www_2026-01-01_02-00-00.tar.gz`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    /// Calls whose name starts with `prefix`.
    #[must_use]
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Current children of `parent_id`.
    #[must_use]
    pub fn files_in(&self, parent_id: &str) -> Vec<RemoteFile> {
        lock(&self.state)
            .files
            .iter()
            .filter(|(parent, _)| parent == parent_id)
            .map(|(_, file)| file.clone())
            .collect()
    }

    fn record(&self, call: String) -> usize {
        let mut state = lock(&self.state);
        state.calls.push(call);
        state.next_id += 1;
        state.next_id
    }
}

impl DriveApi for FakeDrive {
    async fn find_folder(&self, name: &str) -> Result<Option<String>> {
        self.record(format!("find_folder:{name}"));
        Ok(lock(&self.state)
            .folders
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn create_folder(&self, name: &str) -> Result<String> {
        let n = self.record(format!("create_folder:{name}"));
        let id = format!("folder-{n}");
        lock(&self.state).folders.push(RemoteFile {
            id: id.clone(),
            name: name.to_string(),
            created_time: Some(Utc::now()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        });
        Ok(id)
    }

    async fn upload_file(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<UploadedFile> {
        let n = self.record(format!("upload:{name}"));
        if self.fail_uploads {
            return Err(GdabError::DriveApi {
                operation: "upload".to_string(),
                status_code: Some(403),
                message: "The user has exceeded their Drive storage quota".to_string(),
            });
        }

        let size = fs::metadata(path)?.len();
        let id = format!("file-{n}");
        lock(&self.state).files.push((
            parent_id.to_string(),
            RemoteFile {
                id: id.clone(),
                name: name.to_string(),
                created_time: Some(Utc::now()),
                mime_type: Some(mime_type.to_string()),
            },
        ));
        Ok(UploadedFile {
            id,
            name: name.to_string(),
            size,
            strategy: self.upload_strategy(size),
        })
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        self.record(format!("list:{folder_id}"));
        Ok(self.files_in(folder_id))
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.record(format!("delete:{file_id}"));
        lock(&self.state).files.retain(|(_, f)| f.id != file_id);
        Ok(())
    }

    async fn about(&self) -> Result<About> {
        self.record("about".to_string());
        Ok(About {
            user: Some(DriveUser {
                email_address: Some("backup@example.com".to_string()),
                display_name: Some("Backup Operator".to_string()),
            }),
            storage_quota: StorageQuota {
                limit: 15 * 1024 * 1024 * 1024,
                usage: 5 * 1024 * 1024 * 1024,
            },
        })
    }

    fn upload_strategy(&self, size: u64) -> UploadStrategy {
        UploadStrategy::for_size(size, self.resumable_threshold)
    }
}

// =============================================================================
// Fake Archiver
// =============================================================================

/// [`Archiver`] that writes `size` filler bytes instead of packing anything.
#[derive(Debug)]
pub struct CountingArchiver {
    calls: AtomicUsize,
    sources: Mutex<Vec<PathBuf>>,
    size: usize,
    fail: bool,
}

impl Default for CountingArchiver {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CountingArchiver {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
            size,
            fail: false,
        }
    }

    /// Every call fails as if the archiver exited non-zero.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sources(&self) -> Vec<PathBuf> {
        lock(&self.sources).clone()
    }
}

impl Archiver for CountingArchiver {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::TarGz
    }

    async fn archive(&self, source: &Path, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.sources).push(source.to_path_buf());
        if self.fail {
            return Err(GdabError::Archive {
                path: source.display().to_string(),
                exit_code: 2,
                stderr: "tar: Cannot open: Permission denied".to_string(),
            });
        }
        tokio::fs::write(dest, vec![b'x'; self.size]).await?;
        Ok(())
    }
}

// =============================================================================
// Fake Scheduler
// =============================================================================

/// In-memory crontab.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
    fail: bool,
}

impl MemoryScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing crontab text.
    #[must_use]
    pub fn with_crontab(content: &str) -> Self {
        Self {
            tasks: Mutex::new(parse_crontab(content)),
            fail: false,
        }
    }

    /// Every operation fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        lock(&self.tasks).clone()
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(GdabError::Scheduler("crontab unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Scheduler for MemoryScheduler {
    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>> {
        self.check()?;
        Ok(self.tasks())
    }

    async fn remove_task(&self, task: &ScheduledTask) -> Result<()> {
        self.check()?;
        lock(&self.tasks).retain(|t| t != task);
        Ok(())
    }

    async fn add_cron_job(&self, schedule: &str, command: &str) -> Result<()> {
        self.check()?;
        lock(&self.tasks).push(ScheduledTask {
            schedule: schedule.to_string(),
            command: command.to_string(),
            line: format!("{schedule} {command}"),
        });
        Ok(())
    }
}

// =============================================================================
// Temporary Directory Helpers
// =============================================================================

/// A temporary directory that is cleaned up on drop.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with the given content, creating parent directories as
    /// needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Create a subdirectory and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn create_dir(&self, name: &str) -> PathBuf {
        let path = self.inner.path().join(name);
        fs::create_dir_all(&path).expect("Failed to create test directory");
        path
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// # Examples
///
/// ```rust,ignore
/// use gdab::assert_contains;
///
/// assert_contains!("Backup completed successfully", "completed");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
    ($haystack:expr, $needle:expr, $($arg:tt)*) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            $($arg)*
        );
    };
}

/// Assert that a string is valid JSON.
#[macro_export]
macro_rules! assert_json_valid {
    ($json:expr) => {
        let json = $json;
        if let Err(e) = serde_json::from_str::<serde_json::Value>(json) {
            panic!(
                "Expected valid JSON, but parsing failed: {}\n\nJSON string:\n{}",
                e, json
            );
        }
    };
}

// =============================================================================
// Tests for Test Utilities
// =============================================================================
