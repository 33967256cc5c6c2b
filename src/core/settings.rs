//! Backup settings: which directories, how often, how many archives to keep.

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::scheduler::{BackupJob, Scheduler, replace_schedule};
use crate::error::{GdabError, Result};
use crate::host::defaults;
use crate::storage::settings_store::{StoreHandle, keys};

/// Allowed retention range, inclusive.
pub const MIN_RETENTION: i64 = 1;
pub const MAX_RETENTION: i64 = 100;

/// How often the scheduled backup runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Parse from string (exact, lowercase).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// All runs happen at 02:00; weekly on Sunday, monthly on the 1st.
    #[must_use]
    pub const fn cron_expression(self) -> &'static str {
        match self {
            Self::Daily => "0 2 * * *",
            Self::Weekly => "0 2 * * 0",
            Self::Monthly => "0 2 1 * *",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted, validated settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    pub backup_dirs: Vec<String>,
    pub backup_freq: Frequency,
    pub retention_count: u32,
}

/// Unvalidated settings as submitted by the UI or CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub backup_dirs: Vec<String>,
    pub backup_freq: String,
    #[serde(deserialize_with = "number_or_string")]
    pub retention_count: i64,
}

impl Default for SettingsUpdate {
    fn default() -> Self {
        Self {
            backup_dirs: Vec::new(),
            backup_freq: Frequency::Daily.as_str().to_string(),
            retention_count: 5,
        }
    }
}

impl SettingsUpdate {
    /// Validate in order: directories, frequency, retention.
    ///
    /// Blank directory entries are dropped before the check.
    pub fn validate(&self) -> Result<BackupSettings> {
        let backup_dirs: Vec<String> = self
            .backup_dirs
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
        if backup_dirs.is_empty() {
            return Err(GdabError::validation(
                "At least one backup directory must be selected",
            ));
        }

        let backup_freq = Frequency::from_arg(self.backup_freq.trim())
            .ok_or_else(|| GdabError::validation("Invalid backup frequency"))?;

        let retention_count = Some(self.retention_count)
            .filter(|n| (MIN_RETENTION..=MAX_RETENTION).contains(n))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| GdabError::validation("Retention count must be between 1 and 100"))?;

        Ok(BackupSettings {
            backup_dirs,
            backup_freq,
            retention_count,
        })
    }
}

/// Accept `5`, `"5"` or `null`; anything unparseable becomes 0 and fails
/// range validation.
#[allow(clippy::cast_possible_truncation)]
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        serde_json::Value::Null => SettingsUpdate::default().retention_count,
        _ => 0,
    })
}

/// Reads and writes backup settings in the settings store.
#[derive(Clone)]
pub struct SettingsManager {
    store: StoreHandle,
}

impl SettingsManager {
    #[must_use]
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Validate and persist, then point the host scheduler at the new
    /// frequency.
    ///
    /// Nothing is written when validation fails. A scheduler failure is
    /// logged and does not fail the save.
    pub async fn save<S: Scheduler>(
        &self,
        update: &SettingsUpdate,
        scheduler: &S,
        job: &BackupJob,
    ) -> Result<BackupSettings> {
        let settings = update.validate()?;

        self.store
            .set(keys::BACKUP_DIRS, &serde_json::to_string(&settings.backup_dirs)?)?;
        self.store
            .set(keys::BACKUP_FREQ, settings.backup_freq.as_str())?;
        self.store
            .set(keys::RETENTION_COUNT, &settings.retention_count.to_string())?;

        tracing::info!(
            dirs = settings.backup_dirs.len(),
            frequency = %settings.backup_freq,
            retention = settings.retention_count,
            "Backup settings saved"
        );

        if let Err(e) = replace_schedule(scheduler, job, settings.backup_freq).await {
            tracing::error!(error = %e, "Failed to update scheduled backup task");
        }

        Ok(settings)
    }

    /// Persisted settings with defaults. Unreadable values fall back to their
    /// defaults.
    pub fn get(&self) -> Result<BackupSettings> {
        let dirs_raw = self.store.get_or_default(keys::BACKUP_DIRS)?;
        let backup_dirs = serde_json::from_str(&dirs_raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stored backup_dirs unreadable; using none");
            Vec::new()
        });

        let freq_raw = self.store.get_or_default(keys::BACKUP_FREQ)?;
        let backup_freq = Frequency::from_arg(&freq_raw).unwrap_or_default();

        let retention_count = self
            .store
            .get_or_default(keys::RETENTION_COUNT)?
            .trim()
            .parse()
            .ok()
            .filter(|n: &u32| (1..=100).contains(n))
            .unwrap_or_else(|| {
                defaults::default_value(keys::RETENTION_COUNT)
                    .parse()
                    .unwrap_or(5)
            });

        Ok(BackupSettings {
            backup_dirs,
            backup_freq,
            retention_count,
        })
    }
}
