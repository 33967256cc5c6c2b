//! `gdab settings set|show`.

use serde_json::json;

use crate::cli::Context;
use crate::cli::args::{SettingsCommand, SettingsSetArgs};
use crate::cli::output::print_json;
use crate::core::scheduler::{BackupJob, CrontabScheduler};
use crate::core::settings::{BackupSettings, SettingsManager, SettingsUpdate};
use crate::error::Result;

/// Execute settings subcommands.
///
/// # Errors
/// Returns a validation error for bad input, or a store error.
pub async fn execute(ctx: &Context, cmd: &SettingsCommand) -> Result<()> {
    let manager = SettingsManager::new(ctx.store.clone());
    match cmd {
        SettingsCommand::Set(args) => set(ctx, &manager, args).await,
        SettingsCommand::Show => show(ctx, &manager.get()?),
    }
}

async fn set(ctx: &Context, manager: &SettingsManager, args: &SettingsSetArgs) -> Result<()> {
    let update = SettingsUpdate {
        backup_dirs: args.dirs.clone(),
        backup_freq: args.frequency.clone(),
        retention_count: args.retention,
    };
    let job = BackupJob::from_config(&ctx.config);
    let saved = manager
        .save(&update, &CrontabScheduler::default(), &job)
        .await?;

    if ctx.json() {
        print_json(&json!({"success": true, "settings": saved}))
    } else {
        println!("Backup settings saved");
        print_human(&saved);
        Ok(())
    }
}

fn show(ctx: &Context, settings: &BackupSettings) -> Result<()> {
    if ctx.json() {
        return print_json(&json!({"settings": settings}));
    }
    print_human(settings);
    Ok(())
}

fn print_human(settings: &BackupSettings) {
    println!(
        "{:<12} {} ({})",
        "Frequency:",
        settings.backup_freq,
        settings.backup_freq.cron_expression()
    );
    println!("{:<12} {}", "Retention:", settings.retention_count);
    if settings.backup_dirs.is_empty() {
        println!("{:<12} (none)", "Directories:");
    } else {
        println!("Directories:");
        for dir in &settings.backup_dirs {
            println!("  {dir}");
        }
    }
}
