//! Fix suggestions for gdab errors.
//!
//! Maps each error family to copy-paste ready commands plus a short
//! explanation of what went wrong.

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Primary fix commands in order of preference.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }
}

/// Install hints for the archivers gdab shells out to.
#[must_use]
pub fn install_commands_for_archiver(name: &str) -> Vec<String> {
    match name {
        "tar" => vec![
            "apt-get install tar".to_string(),
            "# Or: dnf install tar".to_string(),
        ],
        "powershell.exe" | "powershell" => vec![
            "# Compress-Archive ships with Windows PowerShell 5.0 and later".to_string(),
        ],
        "crontab" => vec![
            "apt-get install cron".to_string(),
            "# Or: dnf install cronie".to_string(),
        ],
        other => vec![format!("# Install {other} and make sure it is on PATH")],
    }
}

pub(crate) fn validation_suggestions(message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![
            "gdab settings show".to_string(),
            "gdab credentials show".to_string(),
        ],
        format!("Input was rejected: {message}. Nothing was saved."),
    )]
}

pub(crate) fn credentials_missing_suggestions() -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![
            "gdab credentials set --client-id <ID> --client-secret <SECRET> --redirect-uri <URL>"
                .to_string(),
        ],
        "No Google OAuth client is stored yet.",
    )
    .with_prevention("Create an OAuth client of type 'Web application' in the Google Cloud console.")]
}

pub(crate) fn not_connected_suggestions() -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["gdab auth-url".to_string(), "gdab auth-code <CODE>".to_string()],
        "There is no usable Google Drive token. Reconnect the account.",
    )
    .with_prevention("Keep the consent screen's offline access so a refresh token is issued.")]
}

pub(crate) fn archive_failed_suggestions(path: &str, stderr: &str) -> Vec<FixSuggestion> {
    let mut context = format!("The archiver could not read or pack {path}.");
    if !stderr.trim().is_empty() {
        context.push_str(&format!(" Archiver said: {}", stderr.trim()));
    }
    vec![FixSuggestion::new(
        vec![format!("ls -ld {path}")],
        context,
    )]
}

pub(crate) fn archiver_missing_suggestions(name: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        install_commands_for_archiver(name),
        format!("{name} is required to create backup archives."),
    )]
}

pub(crate) fn drive_api_suggestions(status_code: Option<u16>) -> Vec<FixSuggestion> {
    let context = match status_code {
        Some(401) => "Drive rejected the access token.",
        Some(403) => "Drive refused the request; the quota may be exhausted or the scope revoked.",
        Some(404) => "The backup folder or file no longer exists on Drive.",
        Some(code) if code >= 500 => "Drive is having trouble; try again later.",
        _ => "Drive returned an unexpected response.",
    };
    vec![FixSuggestion::new(
        vec!["gdab status".to_string(), "gdab logs".to_string()],
        context,
    )]
}

pub(crate) fn network_suggestions() -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["curl -sI https://www.googleapis.com".to_string()],
        "Could not reach Google. Check outbound connectivity and proxy settings.",
    )]
}

pub(crate) fn scheduler_suggestions() -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        install_commands_for_archiver("crontab"),
        "The cron table could not be read or written.",
    )]
}

pub(crate) fn archive_timeout_suggestions(path: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("du -sh {path}")],
        format!("Archiving {path} took longer than the archive timeout."),
    )
    .with_prevention("Raise [backup] archive_timeout_seconds in config.toml or split the directory.")]
}
