//! Status summary: destination state, account, quota and the info lines a
//! panel would show.

use reqwest::Client;
use serde::Serialize;

use crate::core::credentials::CredentialManager;
use crate::core::drive::DriveApi;
use crate::host::provider::ProviderInfo;
use crate::host::{BackupDestination, DestinationStatus, GoogleDriveProvider, GoogleDriveTransport};
use crate::storage::{Endpoints, StoreHandle};
use crate::util::{format_bytes, format_percent};

/// Storage quota in bytes. All zero when unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Quota {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl Quota {
    #[must_use]
    pub const fn new(total: u64, used: u64) -> Self {
        Self {
            total,
            used,
            free: total.saturating_sub(used),
        }
    }
}

/// One titled line of status information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoLine {
    pub title: String,
    pub content: String,
}

/// Everything `getStatus` and `gdab status` report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub transport_id: &'static str,
    pub transport_name: &'static str,
    pub configured: bool,
    pub status: DestinationStatus,
    pub status_message: String,
    pub provider: &'static ProviderInfo,
    pub provider_message: String,
    pub account_email: Option<String>,
    pub quota: Quota,
    pub info: Vec<InfoLine>,
}

/// Status title plus, when the quota is known, a storage line
/// `<used> / <total> (<pct>%)`.
#[must_use]
pub fn info_lines(status_message: &str, quota: Option<Quota>) -> Vec<InfoLine> {
    let mut lines = vec![InfoLine {
        title: "Google Drive Backup Status".to_string(),
        content: status_message.to_string(),
    }];

    if let Some(quota) = quota.filter(|q| q.total > 0) {
        lines.push(InfoLine {
            title: "Google Drive Storage".to_string(),
            content: format!(
                "{} / {} ({}%)",
                format_bytes(quota.used),
                format_bytes(quota.total),
                format_percent(quota.used, quota.total)
            ),
        });
    }
    lines
}

/// Quota of the connected account. Zeros when not connected or on any
/// failure.
pub async fn fetch_quota(credentials: &CredentialManager, http: &Client, endpoints: &Endpoints) -> Quota {
    let drive = match credentials.drive_client(http, endpoints).await {
        Ok(drive) => drive,
        Err(e) => {
            tracing::debug!(error = %e, "Quota unavailable");
            return Quota::default();
        }
    };

    match drive.about().await {
        Ok(about) => Quota::new(about.storage_quota.limit, about.storage_quota.usage),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch Drive quota");
            Quota::default()
        }
    }
}

/// Build the full status report, querying Drive for the quota when
/// configured.
pub async fn status_report(
    store: &StoreHandle,
    http: &Client,
    endpoints: &Endpoints,
    public_url: &str,
) -> StatusReport {
    let credentials = CredentialManager::new(store.clone());
    let transport = GoogleDriveTransport::new(credentials.clone(), public_url);
    let provider = GoogleDriveProvider::new(credentials.clone(), public_url);

    let configured = transport.is_configured();
    let quota = if configured {
        fetch_quota(&credentials, http, endpoints).await
    } else {
        Quota::default()
    };
    let status_message = transport.status_message();

    StatusReport {
        transport_id: transport.id(),
        transport_name: transport.name(),
        configured,
        status: transport.status(),
        info: info_lines(&status_message, configured.then_some(quota)),
        status_message,
        provider: provider.info(),
        provider_message: provider.status_message(),
        account_email: credentials.account_email().ok().flatten(),
        quota,
    }
}
