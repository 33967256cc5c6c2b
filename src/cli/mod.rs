//! CLI argument parsing and command dispatch.

pub mod args;
pub mod auth;
pub mod credentials;
pub mod logs;
pub mod output;
pub mod run;
pub mod serve;
pub mod settings;
pub mod status;

pub use args::{Cli, Commands, OutputFormat};

use reqwest::Client;

use crate::core::archiver::{ArchiveKind, ShellArchiver};
use crate::core::http;
use crate::error::{ExitCode, GdabError, Result};
use crate::storage::{ConfigOverrides, JsonFileStore, ResolvedConfig, StoreHandle};

/// Resolved configuration plus the handles every command works with.
pub struct Context {
    pub config: ResolvedConfig,
    pub store: StoreHandle,
    pub http: Client,
    pub format: OutputFormat,
}

impl Context {
    /// Resolve configuration and open the settings store.
    ///
    /// # Errors
    /// Returns an error if configuration is invalid or the HTTP client cannot
    /// be built.
    pub fn load(cli: &Cli, bind: Option<String>) -> Result<Self> {
        let overrides = ConfigOverrides {
            config_path: cli.config.clone(),
            bind,
        };
        let config = ResolvedConfig::resolve(&overrides)?;
        tracing::debug!(
            settings_file = %config.settings_file.display(),
            source = %config.sources.settings_file,
            "Configuration resolved"
        );

        let store = JsonFileStore::handle(config.settings_file.clone());
        let http = http::build_client(config.timeout)?;

        Ok(Self {
            config,
            store,
            http,
            format: cli.effective_format(),
        })
    }

    /// Archiver for this host with the configured timeout.
    #[must_use]
    pub fn archiver(&self) -> ShellArchiver {
        ShellArchiver::new(ArchiveKind::for_host(), self.config.archive_timeout)
    }

    #[must_use]
    pub const fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// Run the selected command.
///
/// Commands report their own expected failures (a failed backup run prints
/// its outcome and maps to [`ExitCode::GeneralError`]); anything else is
/// returned for the caller to render.
///
/// # Errors
/// Returns the first error a command could not handle itself.
pub async fn execute(cli: Cli) -> Result<ExitCode> {
    let bind = match &cli.command {
        Commands::Serve(args) => args.bind.clone(),
        _ => None,
    };
    let ctx = Context::load(&cli, bind)?;

    match cli.command {
        Commands::Run => return run::execute(&ctx).await,
        Commands::Serve(_) => serve::execute(ctx).await?,
        Commands::Credentials(cmd) => credentials::execute(&ctx, &cmd)?,
        Commands::AuthUrl => auth::execute_url(&ctx)?,
        Commands::AuthCode(args) => auth::execute_code(&ctx, &args).await?,
        Commands::Settings(cmd) => settings::execute(&ctx, &cmd).await?,
        Commands::Logs(args) => logs::execute(&ctx, &args)?,
        Commands::Status => status::execute(&ctx).await?,
    }
    Ok(ExitCode::Success)
}

/// Exit code for an error [`execute`] returned. A failed `run` exits with
/// [`ExitCode::GeneralError`] whatever stage it failed in, including config
/// loading.
#[must_use]
pub const fn failure_exit_code(is_run: bool, err: &GdabError) -> ExitCode {
    if is_run {
        ExitCode::GeneralError
    } else {
        err.exit_code()
    }
}
