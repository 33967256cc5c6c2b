//! `gdab status`: destination state, account and Drive quota.

use serde_json::json;

use crate::cli::Context;
use crate::cli::output::print_json;
use crate::error::Result;
use crate::host::info::status_report;

/// Execute the status command.
///
/// # Errors
/// Only fails if JSON output cannot be written.
pub async fn execute(ctx: &Context) -> Result<()> {
    let report = status_report(
        &ctx.store,
        &ctx.http,
        &ctx.config.endpoints,
        &ctx.config.public_url,
    )
    .await;

    if ctx.json() {
        return print_json(&json!({"status": report}));
    }

    for line in &report.info {
        println!("{}: {}", line.title, line.content);
    }
    println!("{}: {}", report.provider.name, report.provider_message);
    println!("Settings file: {}", ctx.config.settings_file.display());
    Ok(())
}
