//! The backup run: archive each directory, upload, prune old archives.
//!
//! Every run appends to the activity log. A run either finishes with
//! "Backup completed successfully" or stops at the first failure and leaves
//! a single "Backup failed: <reason>" entry.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use reqwest::Client;

use crate::core::activity::ActivityLog;
use crate::core::archiver::{Archiver, archive_path};
use crate::core::credentials::CredentialManager;
use crate::core::drive::{DriveApi, RemoteFile, UploadStrategy, UploadedFile};
use crate::core::settings::SettingsManager;
use crate::error::{GdabError, Result};
use crate::storage::config::DEFAULT_FOLDER_NAME;
use crate::storage::{Endpoints, ResolvedConfig, StoreHandle};

/// Staging directory prefix; the run timestamp is appended.
pub const TEMP_DIR_PREFIX: &str = "gdrive_backup_";

/// Timestamp used in staging and archive names.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Message logged when a run succeeds.
pub const SUCCESS_MESSAGE: &str = "Backup completed successfully";

/// Where archives go and where they are staged.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub endpoints: Endpoints,
    pub folder_name: String,
    pub temp_dir: PathBuf,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl BackupOptions {
    #[must_use]
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            folder_name: config.folder_name.clone(),
            temp_dir: config.temp_dir.clone(),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub folder_id: Option<String>,
    pub uploaded: Vec<UploadedFile>,
    pub deleted: Vec<RemoteFile>,
    pub duration_ms: u64,
}

/// Runs backups against the shared settings store.
pub struct BackupService {
    http: Client,
    options: BackupOptions,
    credentials: CredentialManager,
    settings: SettingsManager,
    activity: ActivityLog,
}

impl BackupService {
    #[must_use]
    pub fn new(store: StoreHandle, http: Client, options: BackupOptions) -> Self {
        Self {
            http,
            options,
            credentials: CredentialManager::new(store.clone()),
            settings: SettingsManager::new(store.clone()),
            activity: ActivityLog::new(store),
        }
    }

    /// Full run: obtain a token, then archive, upload and prune.
    ///
    /// Fails before touching the archiver or Drive when not connected.
    pub async fn run<A: Archiver>(&self, archiver: &A) -> Result<RunReport> {
        let result = match self
            .credentials
            .drive_client(&self.http, &self.options.endpoints)
            .await
        {
            Ok(drive) => self.execute(&drive, archiver).await,
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    /// Run against an already-connected Drive client.
    pub async fn run_with<D: DriveApi, A: Archiver>(
        &self,
        drive: &D,
        archiver: &A,
    ) -> Result<RunReport> {
        let result = self.execute(drive, archiver).await;
        self.finish(result)
    }

    fn finish(&self, result: Result<RunReport>) -> Result<RunReport> {
        match result {
            Ok(report) => {
                tracing::info!(
                    uploaded = report.uploaded.len(),
                    deleted = report.deleted.len(),
                    duration_ms = report.duration_ms,
                    "Backup run finished"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(log_err) = self.activity.error(format!("Backup failed: {e}")) {
                    tracing::warn!(error = %log_err, "Could not record backup failure");
                }
                Err(e)
            }
        }
    }

    async fn execute<D: DriveApi, A: Archiver>(
        &self,
        drive: &D,
        archiver: &A,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let settings = self.settings.get()?;
        if settings.backup_dirs.is_empty() {
            return Err(GdabError::validation(
                "At least one backup directory must be selected",
            ));
        }

        self.activity.info("Starting backup process")?;

        let timestamp = Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();
        std::fs::create_dir_all(&self.options.temp_dir)?;
        // Removed on drop, so failed runs clean up too.
        let staging = tempfile::Builder::new()
            .prefix(&format!("{TEMP_DIR_PREFIX}{timestamp}"))
            .rand_bytes(0)
            .tempdir_in(&self.options.temp_dir)?;
        tracing::debug!(path = %staging.path().display(), "Created staging directory");

        let mut report = RunReport::default();
        let mut folder_id: Option<String> = None;

        for dir in &settings.backup_dirs {
            self.activity.info(format!("Backing up directory: {dir}"))?;

            let source = Path::new(dir);
            let archive = archive_path(staging.path(), source, &timestamp, archiver.kind());
            archiver.archive(source, &archive).await?;

            let parent_id = match &folder_id {
                Some(id) => id.clone(),
                None => {
                    let id = self.resolve_folder(drive).await?;
                    folder_id = Some(id.clone());
                    id
                }
            };

            let uploaded = self
                .upload(drive, &archive, archiver.kind().mime_type(), &parent_id)
                .await?;
            report.uploaded.push(uploaded);

            tokio::fs::remove_file(&archive).await?;
        }

        staging.close()?;

        if let Some(id) = &folder_id {
            report.deleted = self
                .apply_retention(drive, id, settings.retention_count as usize)
                .await?;
        }

        self.activity.info(SUCCESS_MESSAGE)?;
        report.folder_id = folder_id;
        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(report)
    }

    async fn resolve_folder<D: DriveApi>(&self, drive: &D) -> Result<String> {
        let name = &self.options.folder_name;
        let folder = drive.find_or_create_folder(name).await?;
        if folder.created {
            self.activity
                .info(format!("Created folder: {name} with ID: {}", folder.id))?;
        }
        Ok(folder.id)
    }

    async fn upload<D: DriveApi>(
        &self,
        drive: &D,
        archive: &Path,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<UploadedFile> {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = tokio::fs::metadata(archive).await?.len();

        let large = drive.upload_strategy(size) == UploadStrategy::Resumable;
        if large {
            self.activity.info(format!(
                "Large file detected, using chunked upload for: {name}"
            ))?;
        }

        let uploaded = drive.upload_file(archive, &name, mime_type, parent_id).await?;

        if large {
            self.activity.info(format!(
                "Uploaded large file: {name} with ID: {}",
                uploaded.id
            ))?;
        } else {
            self.activity
                .info(format!("Uploaded file: {name} with ID: {}", uploaded.id))?;
        }
        Ok(uploaded)
    }

    async fn apply_retention<D: DriveApi>(
        &self,
        drive: &D,
        folder_id: &str,
        keep: usize,
    ) -> Result<Vec<RemoteFile>> {
        let files = drive.list_children(folder_id).await?;
        let doomed = plan_retention(files, keep);
        if doomed.is_empty() {
            return Ok(doomed);
        }

        self.activity.info(format!(
            "Applying retention policy: keeping {keep} backups, removing {} old backups",
            doomed.len()
        ))?;

        for file in &doomed {
            drive.delete_file(&file.id).await?;
            self.activity
                .info(format!("Deleted old backup: {}", file.name))?;
        }
        Ok(doomed)
    }
}

/// The files to delete so that only the `keep` most recently created remain,
/// oldest first.
#[must_use]
pub fn plan_retention(mut files: Vec<RemoteFile>, keep: usize) -> Vec<RemoteFile> {
    files.sort_by(|a, b| a.created_time.cmp(&b.created_time));
    let excess = files.len().saturating_sub(keep);
    files.truncate(excess);
    files
}
