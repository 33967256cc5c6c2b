//! Diagnostic logging setup.
//!
//! This is the process log (stderr or `GDAB_LOG_FILE`), separate from the
//! capped activity log shown in the UI. Activity entries are also emitted
//! here under the `gdab::activity` target, which stays at `info` so cron
//! mail and `journalctl` show every run even at the default level.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "GDAB_LOG";
pub const LOG_FORMAT_ENV: &str = "GDAB_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "GDAB_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Some(Self::Human),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Minimum severity for `gdab` targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Where and how the process log is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Combine CLI flags with `GDAB_LOG*` variables. Flags win; `--verbose`
    /// raises anything quieter than `debug` to `debug`.
    #[must_use]
    pub fn resolve(cli_level: Option<&str>, json_output: bool, verbose: bool) -> Self {
        let mut level = cli_level
            .and_then(LogLevel::from_arg)
            .or_else(|| env_value(LOG_LEVEL_ENV).as_deref().and_then(LogLevel::from_arg))
            .unwrap_or_default();
        if verbose && level > LogLevel::Debug {
            level = LogLevel::Debug;
        }

        let format = if json_output {
            LogFormat::Json
        } else {
            env_value(LOG_FORMAT_ENV)
                .as_deref()
                .and_then(LogFormat::from_arg)
                .unwrap_or_default()
        };

        Self {
            level,
            format,
            file: env_value(LOG_FILE_ENV).map(PathBuf::from),
        }
    }

    /// `RUST_LOG` when set, otherwise our level plus the activity target.
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    fn directives(&self) -> String {
        let activity = self.level.min(LogLevel::Info);
        format!(
            "gdab={},gdab::activity={}",
            self.level.as_filter(),
            activity.as_filter()
        )
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn writer(file: Option<&File>) -> BoxMakeWriter {
    match file.and_then(|f| f.try_clone().ok()) {
        Some(file) => BoxMakeWriter::new(file),
        None => BoxMakeWriter::new(std::io::stderr),
    }
}

/// Install the global subscriber. A log file that cannot be opened falls
/// back to stderr. Calling twice is a no-op.
pub fn init(settings: &LogSettings) {
    let file = settings.file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("gdab: cannot open log file {}: {e}", path.display());
                None
            }
        }
    });

    let installed = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(settings.filter())
            .json()
            .with_writer(writer(file.as_ref()))
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(settings.filter())
            .with_writer(writer(file.as_ref()))
            .with_target(false)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[allow(unsafe_code)]
    fn with_env(vars: &[(&str, &str)], f: impl FnOnce()) {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let prior: Vec<_> = vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();
        for (key, value) in vars {
            unsafe { std::env::set_var(key, value) };
        }
        f();
        for (key, value) in prior {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }

    #[test]
    fn defaults_to_warn_human_stderr() {
        with_env(&[(LOG_LEVEL_ENV, ""), (LOG_FORMAT_ENV, ""), (LOG_FILE_ENV, " ")], || {
            assert_eq!(LogSettings::resolve(None, false, false), LogSettings::default());
        });
    }

    #[test]
    fn flag_beats_environment() {
        with_env(&[(LOG_LEVEL_ENV, "trace"), (LOG_FORMAT_ENV, "JSON")], || {
            let env_only = LogSettings::resolve(None, false, false);
            assert_eq!(env_only.level, LogLevel::Trace);
            assert_eq!(env_only.format, LogFormat::Json);

            let flagged = LogSettings::resolve(Some("error"), false, false);
            assert_eq!(flagged.level, LogLevel::Error);
        });
    }

    #[test]
    fn verbose_only_raises() {
        with_env(&[(LOG_LEVEL_ENV, "")], || {
            assert_eq!(LogSettings::resolve(None, false, true).level, LogLevel::Debug);
            assert_eq!(
                LogSettings::resolve(Some("trace"), false, true).level,
                LogLevel::Trace
            );
        });
    }

    #[test]
    fn activity_target_is_never_quieter_than_info() {
        let quiet = LogSettings {
            level: LogLevel::Error,
            ..LogSettings::default()
        };
        assert_eq!(quiet.directives(), "gdab=error,gdab::activity=info");

        let loud = LogSettings {
            level: LogLevel::Trace,
            ..LogSettings::default()
        };
        assert_eq!(loud.directives(), "gdab=trace,gdab::activity=trace");
    }
}
