//! Backup pipeline, credentials, settings and the Drive/OAuth clients.

pub mod activity;
pub mod archiver;
pub mod backup;
pub mod command;
pub mod credentials;
pub mod drive;
pub mod http;
pub mod logging;
pub mod oauth;
pub mod scheduler;
pub mod settings;

pub use activity::{ActivityLog, LogEntry, LogLevel as ActivityLevel};
pub use archiver::{ArchiveKind, Archiver, ShellArchiver};
pub use backup::{BackupOptions, BackupService, RunReport, plan_retention};
pub use credentials::{CredentialManager, Credentials};
pub use drive::{About, DriveApi, DriveClient, RemoteFile, UploadStrategy, UploadedFile};
pub use oauth::{OAuthClient, OAuthToken};
pub use scheduler::{BackupJob, CrontabScheduler, ScheduledTask, Scheduler};
pub use settings::{BackupSettings, Frequency, SettingsManager, SettingsUpdate};
