//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/gdab/config.toml`
//! - macOS: `~/Library/Application Support/com.gdab.gdab/config.toml`
//! - Windows: `%APPDATA%/gdab/gdab/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `GDAB_CONFIG`: Override config file path
//! - `GDAB_BIND`: Listen address for `gdab serve`
//! - `GDAB_PUBLIC_URL`: Externally visible base URL (OAuth redirects)
//! - `GDAB_TIMEOUT`: Network timeout in seconds
//! - `GDAB_SETTINGS_FILE`: Path of the key-value settings store
//!
//! Credentials, tokens and backup settings are *not* part of this file; they
//! live in the settings store so the UI can change them at runtime.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::error::{GdabError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "GDAB_CONFIG";
/// Environment variable for the server listen address.
pub const ENV_BIND: &str = "GDAB_BIND";
/// Environment variable for the externally visible base URL.
pub const ENV_PUBLIC_URL: &str = "GDAB_PUBLIC_URL";
/// Environment variable for the network timeout in seconds.
pub const ENV_TIMEOUT: &str = "GDAB_TIMEOUT";
/// Environment variable for the settings store path.
pub const ENV_SETTINGS_FILE: &str = "GDAB_SETTINGS_FILE";

/// Google endpoints.
pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Name of the Drive folder backups are uploaded to.
pub const DEFAULT_FOLDER_NAME: &str = "Plesk Backups";

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Values supplied on the command line that take precedence over everything.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--config` path.
    pub config_path: Option<PathBuf>,
    /// `serve --bind` address.
    pub bind: Option<String>,
}

/// Drive and OAuth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base for metadata calls (`/drive/v3/...`).
    pub api_base: String,
    /// Base for upload calls (`/upload/drive/v3/...`).
    pub upload_base: String,
    /// OAuth consent page.
    pub auth_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: GOOGLE_API_BASE.to_string(),
            upload_base: GOOGLE_API_BASE.to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Network request timeout.
    pub timeout: Duration,
    /// Listen address for the action API.
    pub bind: SocketAddr,
    /// Base URL the browser reaches the server on, without trailing slash.
    pub public_url: String,
    /// Settings store location.
    pub settings_file: PathBuf,
    /// Google endpoints.
    pub endpoints: Endpoints,
    /// Drive folder that receives archives.
    pub folder_name: String,
    /// Parent of the per-run staging directory.
    pub temp_dir: PathBuf,
    /// Upper bound for a single archiver invocation.
    pub archive_timeout: Duration,
    /// Command the scheduler runs.
    pub backup_command: String,
    /// Substring identifying our scheduled tasks.
    pub script_path: String,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub timeout: ConfigSource,
    pub bind: ConfigSource,
    pub public_url: ConfigSource,
    pub settings_file: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI overrides, environment variables,
    /// and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or if any
    /// resolved value is invalid.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let config = Self::load_config(overrides)?;
        Self::from_config(&config, overrides)
    }

    /// Resolve against an already-loaded config.
    ///
    /// # Errors
    ///
    /// Returns an error if any resolved value is invalid.
    pub fn from_config(config: &Config, overrides: &ConfigOverrides) -> Result<Self> {
        config.validate()?;

        let mut sources = ConfigSources::default();

        let timeout = Self::resolve_timeout(config, &mut sources.timeout);
        let bind = Self::resolve_bind(overrides, config, &mut sources.bind)?;
        let public_url = Self::resolve_public_url(config, bind, &mut sources.public_url)?;
        let settings_file = Self::resolve_settings_file(config, &mut sources.settings_file);
        let (backup_command, script_path) = Self::resolve_backup_command(config)?;

        Ok(Self {
            timeout,
            bind,
            public_url,
            settings_file,
            endpoints: Endpoints {
                api_base: trim_base(&config.drive.api_base),
                upload_base: trim_base(
                    config
                        .drive
                        .upload_base
                        .as_deref()
                        .unwrap_or(&config.drive.api_base),
                ),
                auth_url: config.drive.auth_url.clone(),
                token_url: config.drive.token_url.clone(),
            },
            folder_name: config.drive.folder_name.clone(),
            temp_dir: config
                .backup
                .temp_dir
                .as_ref()
                .map_or_else(std::env::temp_dir, PathBuf::from),
            archive_timeout: Duration::from_secs(config.backup.archive_timeout_seconds),
            backup_command,
            script_path,
            sources,
        })
    }

    /// Load config file, respecting `--config` and `GDAB_CONFIG`.
    fn load_config(overrides: &ConfigOverrides) -> Result<Config> {
        if let Some(path) = &overrides.config_path {
            Config::load_from(path)
        } else if let Ok(path) = std::env::var(ENV_CONFIG) {
            Config::load_from(Path::new(&path))
        } else {
            Config::load()
        }
    }

    fn resolve_timeout(config: &Config, source: &mut ConfigSource) -> Duration {
        if let Ok(timeout_env) = std::env::var(ENV_TIMEOUT) {
            if let Ok(timeout) = timeout_env.trim().parse::<u64>() {
                if timeout > 0 {
                    *source = ConfigSource::Env;
                    return Duration::from_secs(timeout);
                }
            }
        }

        *source = ConfigSource::ConfigFile;
        Duration::from_secs(config.general.timeout_seconds)
    }

    fn resolve_bind(
        overrides: &ConfigOverrides,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<SocketAddr> {
        let (raw, from) = if let Some(bind) = &overrides.bind {
            (bind.clone(), ConfigSource::Cli)
        } else if let Ok(bind) = std::env::var(ENV_BIND) {
            (bind, ConfigSource::Env)
        } else {
            (config.server.bind.clone(), ConfigSource::ConfigFile)
        };

        *source = from;
        raw.trim().parse().map_err(|_| {
            GdabError::Config(format!("Invalid bind address '{raw}' (from {from})"))
        })
    }

    fn resolve_public_url(
        config: &Config,
        bind: SocketAddr,
        source: &mut ConfigSource,
    ) -> Result<String> {
        let (raw, from) = if let Ok(url) = std::env::var(ENV_PUBLIC_URL) {
            (url, ConfigSource::Env)
        } else if let Some(url) = &config.server.public_url {
            (url.clone(), ConfigSource::ConfigFile)
        } else {
            (format!("http://{bind}"), ConfigSource::Default)
        };

        reqwest::Url::parse(raw.trim()).map_err(|e| {
            GdabError::Config(format!("Invalid public URL '{raw}' (from {from}): {e}"))
        })?;
        *source = from;
        Ok(trim_base(&raw))
    }

    fn resolve_settings_file(config: &Config, source: &mut ConfigSource) -> PathBuf {
        if let Ok(path) = std::env::var(ENV_SETTINGS_FILE) {
            if !path.trim().is_empty() {
                *source = ConfigSource::Env;
                return PathBuf::from(path.trim());
            }
        }

        if let Some(path) = &config.storage.settings_file {
            *source = ConfigSource::ConfigFile;
            return PathBuf::from(path);
        }

        *source = ConfigSource::Default;
        AppPaths::new().settings_file()
    }

    fn resolve_backup_command(config: &Config) -> Result<(String, String)> {
        if let Some(command) = &config.backup.command {
            let script = command
                .split_whitespace()
                .next()
                .ok_or_else(|| GdabError::Config("backup.command is empty".to_string()))?;
            return Ok((command.clone(), script.to_string()));
        }

        let exe = std::env::current_exe()?;
        let exe = exe.display().to_string();
        Ok((format!("{exe} run"), exe))
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Config file
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Action API server.
    pub server: ServerConfig,
    /// Google Drive endpoints and target folder.
    pub drive: DriveConfig,
    /// Archiving and scheduling.
    pub backup: BackupConfig,
    /// Settings store.
    pub storage: StorageConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default timeout for network requests in seconds.
    pub timeout_seconds: u64,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

/// Action API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// Externally visible base URL; defaults to `http://<bind>`.
    pub public_url: Option<String>,
}

/// Drive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub api_base: String,
    /// Defaults to `api_base`.
    pub upload_base: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub folder_name: String,
}

/// Archiving and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Where per-run staging directories are created (default: system temp).
    pub temp_dir: Option<String>,
    /// Timeout for a single archiver invocation.
    pub archive_timeout_seconds: u64,
    /// Command registered with cron (default: `<this executable> run`).
    pub command: Option<String>,
}

/// Settings store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub settings_file: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            log_level: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8765".to_string(),
            public_url: None,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: GOOGLE_API_BASE.to_string(),
            upload_base: None,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            archive_timeout_seconds: 3600,
            command: None,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().config_file())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GdabError::Config(format!("Invalid config file: {e}")))?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GdabError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// Checks that:
    /// - Timeouts are within bounds (network 1-300 s, archive > 0)
    /// - Endpoint URLs parse
    /// - The folder name is not blank
    pub fn validate(&self) -> Result<()> {
        if self.general.timeout_seconds == 0 || self.general.timeout_seconds > 300 {
            return Err(GdabError::Config(format!(
                "Timeout {} seconds is out of range. Must be between 1 and 300 seconds",
                self.general.timeout_seconds
            )));
        }

        if self.backup.archive_timeout_seconds == 0 {
            return Err(GdabError::Config(
                "backup.archive_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (key, value) in [
            ("drive.api_base", Some(&self.drive.api_base)),
            ("drive.upload_base", self.drive.upload_base.as_ref()),
            ("drive.auth_url", Some(&self.drive.auth_url)),
            ("drive.token_url", Some(&self.drive.token_url)),
        ] {
            if let Some(value) = value {
                reqwest::Url::parse(value).map_err(|e| {
                    GdabError::Config(format!("Invalid URL for {key} \"{value}\": {e}"))
                })?;
            }
        }

        if self.drive.folder_name.trim().is_empty() {
            return Err(GdabError::Config(
                "drive.folder_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
