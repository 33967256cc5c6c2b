//! Directory archiving via the host's own tools.
//!
//! POSIX hosts get `tar -czf`, Windows hosts get PowerShell
//! `Compress-Archive`. Arguments are passed to the process directly, never
//! through a shell.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::command::{CommandError, run_command};
use crate::error::{GdabError, Result};

/// Default upper bound for one archiver run.
pub const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Archive format produced on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Format native to the compile target.
    #[must_use]
    pub const fn for_host() -> Self {
        if cfg!(windows) { Self::Zip } else { Self::TarGz }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::TarGz => "application/gzip",
            Self::Zip => "application/zip",
        }
    }

    /// Program invoked for this format.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::TarGz => "tar",
            Self::Zip => "powershell.exe",
        }
    }

    /// Arguments that archive `source` into `dest`.
    #[must_use]
    pub fn args(self, source: &Path, dest: &Path) -> Vec<String> {
        match self {
            Self::TarGz => tar_args(source, dest),
            Self::Zip => powershell_args(source, dest),
        }
    }
}

/// Produces one archive per source directory.
#[allow(async_fn_in_trait)]
pub trait Archiver {
    fn kind(&self) -> ArchiveKind;

    /// Archive `source` into the file `dest`.
    ///
    /// # Errors
    ///
    /// [`GdabError::Archive`] when the archiver exits non-zero,
    /// [`GdabError::ArchiveTimeout`] when it runs too long.
    async fn archive(&self, source: &Path, dest: &Path) -> Result<()>;
}

/// [`Archiver`] that shells out to `tar` or PowerShell.
#[derive(Debug, Clone)]
pub struct ShellArchiver {
    kind: ArchiveKind,
    timeout: Duration,
}

impl Default for ShellArchiver {
    fn default() -> Self {
        Self::new(ArchiveKind::for_host(), ARCHIVE_TIMEOUT)
    }
}

impl ShellArchiver {
    #[must_use]
    pub const fn new(kind: ArchiveKind, timeout: Duration) -> Self {
        Self { kind, timeout }
    }
}

impl Archiver for ShellArchiver {
    fn kind(&self) -> ArchiveKind {
        self.kind
    }

    async fn archive(&self, source: &Path, dest: &Path) -> Result<()> {
        let program = self.kind.program();
        let resolved = which::which(program)
            .map_err(|_| GdabError::ArchiverNotFound(program.to_string()))?;
        let args = self.kind.args(source, dest);

        let output = run_command(&resolved.to_string_lossy(), &args, self.timeout)
            .await
            .map_err(|e| archive_error(source, program, e))?;
        if !output.success() {
            tracing::warn!(
                source = %source.display(),
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "Archiver failed"
            );
            return Err(GdabError::Archive {
                path: source.display().to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        tracing::debug!(source = %source.display(), dest = %dest.display(), "Archive created");
        Ok(())
    }
}

fn archive_error(source: &Path, program: &str, err: CommandError) -> GdabError {
    match err {
        CommandError::NotFound(_) => GdabError::ArchiverNotFound(program.to_string()),
        CommandError::TimedOut { after, .. } => GdabError::ArchiveTimeout {
            path: source.display().to_string(),
            after,
        },
        CommandError::Io { source: e, .. } => GdabError::Io(e),
    }
}

/// Final path component of `source`, used in archive names.
#[must_use]
pub fn source_basename(source: &Path) -> String {
    source
        .file_name()
        .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().to_string())
}

/// `<dest_dir>/<basename>_<timestamp>.<ext>`.
#[must_use]
pub fn archive_path(dest_dir: &Path, source: &Path, timestamp: &str, kind: ArchiveKind) -> PathBuf {
    dest_dir.join(format!(
        "{}_{timestamp}.{}",
        source_basename(source),
        kind.extension()
    ))
}

/// `tar -czf <dest> -C <parent> <basename>`: the archive holds one top-level
/// entry named after the directory.
#[must_use]
pub fn tar_args(source: &Path, dest: &Path) -> Vec<String> {
    let (parent, entry) = match (source.parent(), source.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => (
            parent.display().to_string(),
            name.to_string_lossy().to_string(),
        ),
        (_, Some(name)) => (".".to_string(), name.to_string_lossy().to_string()),
        _ => (source.display().to_string(), ".".to_string()),
    };

    vec![
        "-czf".to_string(),
        dest.display().to_string(),
        "-C".to_string(),
        parent,
        entry,
    ]
}

/// PowerShell `Compress-Archive` invocation.
#[must_use]
pub fn powershell_args(source: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-NoProfile".to_string(),
        "-NonInteractive".to_string(),
        "-Command".to_string(),
        format!(
            "Compress-Archive -Path {} -DestinationPath {} -Force",
            ps_quote(&source.display().to_string()),
            ps_quote(&dest.display().to_string())
        ),
    ]
}

/// Single-quoted PowerShell literal.
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
