//! Host scheduler integration.
//!
//! Backups are triggered by cron; this module owns the single task that runs
//! `gdab run`. Tasks are matched by a substring of their command (the script
//! path), so re-saving settings replaces our entry and leaves everything else
//! in the crontab alone.

use std::io::Write;

use crate::core::command::{COMMAND_TIMEOUT, CommandError, run_command};
use crate::core::settings::Frequency;
use crate::error::{GdabError, Result};
use crate::storage::ResolvedConfig;

/// Default crontab binary.
pub const CRONTAB_PROGRAM: &str = "crontab";

/// One scheduled task as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Cron expression (five fields or an `@` macro).
    pub schedule: String,
    /// Command the task runs.
    pub command: String,
    /// Verbatim line, used to remove exactly this task.
    pub line: String,
}

/// The command our task runs and the substring identifying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub command: String,
    pub script_path: String,
}

impl BackupJob {
    #[must_use]
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            command: config.backup_command.clone(),
            script_path: config.script_path.clone(),
        }
    }

    /// Whether `task` was registered by us.
    #[must_use]
    pub fn owns(&self, task: &ScheduledTask) -> bool {
        !self.script_path.is_empty() && task.command.contains(&self.script_path)
    }
}

/// Host scheduler operations.
#[allow(async_fn_in_trait)]
pub trait Scheduler {
    /// All tasks currently scheduled.
    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>>;

    /// Remove one task.
    async fn remove_task(&self, task: &ScheduledTask) -> Result<()>;

    /// Add a cron task.
    async fn add_cron_job(&self, schedule: &str, command: &str) -> Result<()>;
}

/// Replace our scheduled task with one matching `frequency`.
///
/// # Errors
///
/// Propagates any scheduler failure; tasks removed before the failure stay
/// removed.
pub async fn replace_schedule<S: Scheduler>(
    scheduler: &S,
    job: &BackupJob,
    frequency: Frequency,
) -> Result<()> {
    for task in scheduler.list_tasks().await? {
        if job.owns(&task) {
            tracing::debug!(line = %task.line, "Removing previous backup task");
            scheduler.remove_task(&task).await?;
        }
    }

    let schedule = frequency.cron_expression();
    scheduler.add_cron_job(schedule, &job.command).await?;
    tracing::info!(schedule, command = %job.command, "Backup task scheduled");
    Ok(())
}

// =============================================================================
// crontab
// =============================================================================

#[allow(clippy::needless_pass_by_value)]
fn scheduler_error(err: CommandError) -> GdabError {
    GdabError::Scheduler(err.to_string())
}

/// Scheduler backed by the invoking user's crontab.
#[derive(Debug, Clone)]
pub struct CrontabScheduler {
    program: String,
}

impl Default for CrontabScheduler {
    fn default() -> Self {
        Self::new(CRONTAB_PROGRAM)
    }
}

impl CrontabScheduler {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn read_crontab(&self) -> Result<String> {
        let output = run_command(&self.program, &["-l".to_string()], COMMAND_TIMEOUT)
            .await
            .map_err(scheduler_error)?;
        if output.success() {
            return Ok(output.stdout);
        }
        // `crontab -l` exits 1 with "no crontab for <user>" when empty.
        if output.stderr.to_lowercase().contains("no crontab") {
            return Ok(String::new());
        }
        Err(GdabError::Scheduler(format!(
            "{} -l exited with {}: {}",
            self.program,
            output.exit_code,
            output.stderr.trim()
        )))
    }

    async fn write_crontab(&self, content: &str) -> Result<()> {
        let mut file = tempfile::Builder::new().prefix("gdab-crontab").tempfile()?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        let path = file.path().display().to_string();
        let output = run_command(&self.program, &[path], COMMAND_TIMEOUT)
            .await
            .map_err(scheduler_error)?;
        if !output.success() {
            return Err(GdabError::Scheduler(format!(
                "{} exited with {}: {}",
                self.program,
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Scheduler for CrontabScheduler {
    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>> {
        Ok(parse_crontab(&self.read_crontab().await?))
    }

    async fn remove_task(&self, task: &ScheduledTask) -> Result<()> {
        let current = self.read_crontab().await?;
        self.write_crontab(&without_line(&current, &task.line))
            .await
    }

    async fn add_cron_job(&self, schedule: &str, command: &str) -> Result<()> {
        let current = self.read_crontab().await?;
        self.write_crontab(&with_line(&current, &format!("{schedule} {command}")))
            .await
    }
}

/// Parse crontab text into tasks. Comments, blank lines and environment
/// assignments are skipped.
#[must_use]
pub fn parse_crontab(content: &str) -> Vec<ScheduledTask> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<ScheduledTask> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let fields = if trimmed.starts_with('@') { 1 } else { 5 };
    let mut schedule = Vec::with_capacity(fields);
    let mut rest = trimmed;
    for _ in 0..fields {
        let field = rest.trim_start();
        let end = field.find(char::is_whitespace)?;
        schedule.push(&field[..end]);
        rest = &field[end..];
    }
    let command = rest.trim();

    // NAME=value lines have no schedule fields.
    if schedule[0].contains('=') || command.is_empty() {
        return None;
    }

    Some(ScheduledTask {
        schedule: schedule.join(" "),
        command: command.to_string(),
        line: line.to_string(),
    })
}

fn without_line(content: &str, line: &str) -> String {
    let mut out: String = content
        .lines()
        .filter(|l| *l != line)
        .flat_map(|l| [l, "\n"])
        .collect();
    if out.trim().is_empty() {
        out.clear();
    }
    out
}

fn with_line(content: &str, line: &str) -> String {
    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRONTAB: &str = "\
# m h dom mon dow command
MAILTO=admin@example.com
0 2 * * * /usr/local/bin/gdab run
*/5 * * * * /usr/bin/php /opt/other/job.php

@reboot /usr/local/bin/agent --daemon
";

    #[test]
    fn parses_tasks_and_skips_noise() {
        let tasks = parse_crontab(CRONTAB);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].schedule, "0 2 * * *");
        assert_eq!(tasks[0].command, "/usr/local/bin/gdab run");
        assert_eq!(tasks[1].schedule, "*/5 * * * *");
        assert_eq!(tasks[2].schedule, "@reboot");
        assert_eq!(tasks[2].command, "/usr/local/bin/agent --daemon");
    }

    #[test]
    fn ownership_is_by_script_path() {
        let job = BackupJob {
            command: "/usr/local/bin/gdab run".to_string(),
            script_path: "/usr/local/bin/gdab".to_string(),
        };
        let tasks = parse_crontab(CRONTAB);
        let owned: Vec<_> = tasks.iter().filter(|t| job.owns(t)).collect();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].schedule, "0 2 * * *");
    }

    #[test]
    fn removing_a_line_keeps_the_rest() {
        let out = without_line(CRONTAB, "0 2 * * * /usr/local/bin/gdab run");
        assert!(!out.contains("gdab run"));
        assert!(out.contains("MAILTO=admin@example.com"));
        assert!(out.contains("/opt/other/job.php"));
    }

    #[test]
    fn appending_adds_trailing_newline() {
        assert_eq!(with_line("", "0 2 * * * x"), "0 2 * * * x\n");
        assert_eq!(with_line("a", "b"), "a\nb\n");
        assert_eq!(with_line("a\n", "b"), "a\nb\n");
    }

    #[tokio::test]
    async fn missing_crontab_is_a_scheduler_error() {
        let scheduler = CrontabScheduler::new("gdab-no-such-crontab");
        let err = scheduler.list_tasks().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(matches!(err, GdabError::Scheduler(ref m) if m.contains("gdab-no-such-crontab is not installed")));
    }
}
