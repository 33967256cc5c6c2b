//! `gdab run`: one backup pass, as invoked by cron.
//!
//! Prints `Backup completed successfully` or `Backup failed: <error>` on
//! stdout and exits 0 or 1 respectively.

use serde_json::json;

use crate::cli::Context;
use crate::cli::output::print_json;
use crate::core::backup::{BackupOptions, BackupService, SUCCESS_MESSAGE};
use crate::error::{ExitCode, Result};

/// Execute the run command.
///
/// # Errors
/// Only fails if the outcome cannot be printed.
pub async fn execute(ctx: &Context) -> Result<ExitCode> {
    let service = BackupService::new(
        ctx.store.clone(),
        ctx.http.clone(),
        BackupOptions::from_config(&ctx.config),
    );

    match service.run(&ctx.archiver()).await {
        Ok(report) => {
            if ctx.json() {
                print_json(&json!({
                    "success": true,
                    "message": SUCCESS_MESSAGE,
                    "uploaded": report.uploaded.iter().map(|f| &f.name).collect::<Vec<_>>(),
                    "deleted": report.deleted.iter().map(|f| &f.name).collect::<Vec<_>>(),
                    "durationMs": report.duration_ms,
                }))?;
            } else {
                println!("{SUCCESS_MESSAGE}");
            }
            Ok(ExitCode::Success)
        }
        Err(e) => {
            if ctx.json() {
                print_json(&json!({
                    "success": false,
                    "error": e.to_string(),
                    "errorCode": e.error_code(),
                }))?;
            } else {
                println!("Backup failed: {e}");
            }
            Ok(ExitCode::GeneralError)
        }
    }
}
