//! The remote-storage-provider view of the Drive destination.

use serde::Serialize;

use crate::core::credentials::CredentialManager;
use crate::error::{GdabError, Result};
use crate::host::BackupDestination;

/// Descriptor the host uses to list the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub vendor: &'static str,
}

pub const PROVIDER_INFO: ProviderInfo = ProviderInfo {
    id: "gdrive",
    kind: "cloud",
    name: "Google Drive",
    description: "Automatically store backups on Google Drive",
    icon: "icon.png",
    vendor: "gdab",
};

/// Drive as a remote storage provider.
pub struct GoogleDriveProvider {
    credentials: CredentialManager,
    public_url: String,
}

impl GoogleDriveProvider {
    #[must_use]
    pub fn new(credentials: CredentialManager, public_url: impl Into<String>) -> Self {
        Self {
            credentials,
            public_url: public_url.into(),
        }
    }

    #[must_use]
    pub const fn info(&self) -> &'static ProviderInfo {
        &PROVIDER_INFO
    }
}

impl BackupDestination for GoogleDriveProvider {
    fn id(&self) -> &'static str {
        PROVIDER_INFO.id
    }

    fn name(&self) -> &'static str {
        PROVIDER_INFO.name
    }

    fn description(&self) -> &'static str {
        PROVIDER_INFO.description
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_configured().unwrap_or(false)
    }

    /// "Not configured", "Connected as <email>", or "Configured" when the
    /// account email is unknown.
    fn status_message(&self) -> String {
        if !self.is_configured() {
            return "Not configured".to_string();
        }
        match self.credentials.account_email() {
            Ok(Some(email)) => format!("Connected as {email}"),
            Ok(None) => "Configured".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read account email");
                "Status unknown".to_string()
            }
        }
    }

    fn configuration_url(&self) -> String {
        format!("{}/", self.public_url)
    }

    fn validate(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GdabError::validation(
                "Google Drive storage provider is not configured. Please set up your Google credentials.",
            ))
        }
    }
}
