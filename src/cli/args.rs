//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Google Drive auto-backups - archive directories and keep them on Drive.
#[derive(Parser, Debug)]
#[command(name = "gdab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Config file path (overrides `GDAB_CONFIG`)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one backup pass (this is what cron invokes)
    Run,

    /// Serve the action API, OAuth callback and settings page
    Serve(ServeArgs),

    /// Manage Google API credentials
    #[command(subcommand)]
    Credentials(CredentialsCommand),

    /// Print the Google consent URL
    AuthUrl,

    /// Exchange an authorization code by hand (headless servers)
    AuthCode(AuthCodeArgs),

    /// Manage backup settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Show the activity log
    Logs(LogsArgs),

    /// Show connection status and Drive quota
    Status,
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen address (overrides `GDAB_BIND` and the config file)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Credential subcommands.
#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Store OAuth client credentials
    Set(CredentialsSetArgs),

    /// Show stored credentials (secret masked)
    Show,
}

/// Arguments for `credentials set`.
#[derive(Parser, Debug)]
pub struct CredentialsSetArgs {
    /// OAuth client ID
    #[arg(long, value_name = "ID")]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long, value_name = "SECRET")]
    pub client_secret: String,

    /// Redirect URI registered for the client
    #[arg(long, value_name = "URI")]
    pub redirect_uri: String,
}

/// Arguments for the `auth-code` command.
#[derive(Parser, Debug)]
pub struct AuthCodeArgs {
    /// Code from the consent redirect
    #[arg(value_name = "CODE")]
    pub code: String,
}

/// Settings subcommands.
#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Replace backup settings and reschedule
    Set(SettingsSetArgs),

    /// Show backup settings
    Show,
}

/// Arguments for `settings set`.
#[derive(Parser, Debug)]
pub struct SettingsSetArgs {
    /// Directory to back up (repeatable)
    #[arg(long = "dir", value_name = "PATH", required = true)]
    pub dirs: Vec<String>,

    /// daily, weekly or monthly
    #[arg(long, value_name = "FREQ", default_value = "daily")]
    pub frequency: String,

    /// Number of backups to keep (1-100)
    #[arg(long, value_name = "N", default_value = "5")]
    pub retention: i64,
}

/// Arguments for the `logs` command.
#[derive(Parser, Debug)]
pub struct LogsArgs {
    /// Show at most N entries
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Human,
    /// Machine-readable JSON
    Json,
}
