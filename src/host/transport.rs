//! The backup-transport view of the Drive destination.

use crate::core::credentials::CredentialManager;
use crate::error::{GdabError, Result};
use crate::host::{BackupDestination, DestinationStatus};

pub const TRANSPORT_ID: &str = "gdrive-autobackups";
pub const TRANSPORT_NAME: &str = "GDrive AutoBackups";

/// Drive as a backup transport.
pub struct GoogleDriveTransport {
    credentials: CredentialManager,
    public_url: String,
}

impl GoogleDriveTransport {
    #[must_use]
    pub fn new(credentials: CredentialManager, public_url: impl Into<String>) -> Self {
        Self {
            credentials,
            public_url: public_url.into(),
        }
    }

    fn configured(&self) -> Result<bool> {
        self.credentials.is_configured()
    }
}

impl BackupDestination for GoogleDriveTransport {
    fn id(&self) -> &'static str {
        TRANSPORT_ID
    }

    fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    fn description(&self) -> &'static str {
        "Store backups on Google Drive storage"
    }

    fn is_configured(&self) -> bool {
        self.configured().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Could not read transport configuration");
            false
        })
    }

    fn status(&self) -> DestinationStatus {
        match self.configured() {
            Ok(true) => DestinationStatus::Ok,
            Ok(false) => DestinationStatus::NotConfigured,
            Err(e) => {
                tracing::error!(error = %e, "Could not determine transport status");
                DestinationStatus::Error
            }
        }
    }

    fn status_message(&self) -> String {
        match self.status() {
            DestinationStatus::Ok => "Connected to Google Drive",
            DestinationStatus::Error => "Error connecting to Google Drive",
            DestinationStatus::NotConfigured => "Google Drive storage is not configured",
        }
        .to_string()
    }

    fn configuration_url(&self) -> String {
        format!("{}/", self.public_url)
    }

    fn validate(&self) -> Result<()> {
        match self.status() {
            DestinationStatus::Ok => Ok(()),
            DestinationStatus::NotConfigured => Err(GdabError::validation(
                "Google Drive storage is not configured. Please configure credentials in the extension settings.",
            )),
            DestinationStatus::Error => Err(GdabError::validation(
                "Unable to connect to Google Drive. Please check your credentials.",
            )),
        }
    }
}
