//! gdab - Google Drive auto-backups
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use gdab::cli::{Cli, Commands};
use gdab::cli::output::render_error;
use gdab::core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&logging::LogSettings::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
    ));

    let format = cli.effective_format();
    let is_run = matches!(cli.command, Commands::Run);

    match gdab::cli::execute(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::debug!(error = %e, code = e.error_code(), "Command failed");
            eprintln!("{}", render_error(&e, format));
            ExitCode::from(gdab::cli::failure_exit_code(is_run, &e) as u8)
        }
    }
}
