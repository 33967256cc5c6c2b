//! `gdab logs`: activity log, newest first.

use serde_json::json;

use crate::cli::Context;
use crate::cli::args::LogsArgs;
use crate::cli::output::print_json;
use crate::core::activity::ActivityLog;
use crate::error::Result;

/// Execute the logs command.
///
/// # Errors
/// Returns an error if the settings store cannot be read.
pub fn execute(ctx: &Context, args: &LogsArgs) -> Result<()> {
    let mut entries = ActivityLog::new(ctx.store.clone()).entries()?;
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }

    if ctx.json() {
        return print_json(&json!({"logs": entries}));
    }

    if entries.is_empty() {
        println!("No activity recorded yet.");
        return Ok(());
    }
    for entry in &entries {
        println!("{} {:<5} {}", entry.timestamp, entry.level, entry.message);
    }
    Ok(())
}
