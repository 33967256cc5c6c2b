//! Host integration: how a control panel (or `gdab status`) sees this tool
//! as a backup destination.

pub mod defaults;
pub mod info;
pub mod provider;
pub mod transport;

use serde::Serialize;

use crate::error::Result;

pub use info::{InfoLine, Quota, StatusReport};
pub use provider::{GoogleDriveProvider, ProviderInfo};
pub use transport::GoogleDriveTransport;

/// Connection state reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStatus {
    Ok,
    NotConfigured,
    Error,
}

/// A backup destination as the host lists it.
pub trait BackupDestination {
    /// Stable identifier, unique across destinations.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Client credentials and a token are stored.
    fn is_configured(&self) -> bool;

    fn status(&self) -> DestinationStatus {
        if self.is_configured() {
            DestinationStatus::Ok
        } else {
            DestinationStatus::NotConfigured
        }
    }

    fn status_message(&self) -> String;

    /// Where the user configures this destination.
    fn configuration_url(&self) -> String;

    /// Ready to receive backups.
    ///
    /// # Errors
    ///
    /// A validation error describing what is missing.
    fn validate(&self) -> Result<()>;

    /// Archives can be downloaded back. Not offered.
    fn supports_restore(&self) -> bool {
        false
    }

    fn requires_authentication(&self) -> bool {
        true
    }
}
