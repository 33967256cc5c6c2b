//! Capped activity log shown in the UI.
//!
//! Stored as one JSON array under `backup_logs`, newest entry first, never
//! more than [`MAX_LOG_ENTRIES`] long. Every append is also emitted as a
//! tracing event.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::settings_store::{StoreHandle, keys};

/// Maximum number of retained entries.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Timestamp layout used for entries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

/// Read/append access to the activity log.
#[derive(Clone)]
pub struct ActivityLog {
    store: StoreHandle,
}

impl ActivityLog {
    #[must_use]
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// All entries, newest first. Unparseable stored data reads as empty.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let raw = self.store.get_or_default(keys::BACKUP_LOGS)?;
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable activity log");
            Vec::new()
        }))
    }

    /// Prepend an entry and truncate to [`MAX_LOG_ENTRIES`].
    pub fn append(&self, level: LogLevel, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!(target: "gdab::activity", "{message}"),
            LogLevel::Error => tracing::error!(target: "gdab::activity", "{message}"),
        }

        let mut entries = self.entries()?;
        entries.insert(
            0,
            LogEntry {
                timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
                level,
                message,
            },
        );
        entries.truncate(MAX_LOG_ENTRIES);

        self.store
            .set(keys::BACKUP_LOGS, &serde_json::to_string(&entries)?)
    }

    pub fn info(&self, message: impl Into<String>) -> Result<()> {
        self.append(LogLevel::Info, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Result<()> {
        self.append(LogLevel::Error, message)
    }
}
