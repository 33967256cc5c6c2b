//! HTTP client utilities.
//!
//! Provides the shared client used for OAuth and Drive calls, plus the
//! error mapping for non-success responses.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};

use crate::error::{GdabError, Result};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("gdab/{}", env!("CARGO_PKG_VERSION")))
        // Resumable uploads answer 308 without a Location header.
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| GdabError::Network(e.to_string()))
}

/// Get a client with the default timeout.
pub fn default_client() -> Result<Client> {
    build_client(DEFAULT_TIMEOUT)
}

/// Pass successful responses through; turn anything else into a
/// [`GdabError::DriveApi`] carrying Google's error message when present.
///
/// # Errors
///
/// Returns error for non-2xx responses.
pub async fn check_drive_response(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GdabError::DriveApi {
        operation: operation.to_string(),
        status_code: Some(status.as_u16()),
        message: extract_google_error(&body).unwrap_or_else(|| format!("HTTP {status}")),
    })
}

/// Pull a human-readable message out of a Google error body.
///
/// Drive uses `{"error": {"message": ...}}`; the OAuth endpoints use
/// `{"error": "...", "error_description": "..."}`.
#[must_use]
pub fn extract_google_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    if let Some(description) = value.get("error_description").and_then(|d| d.as_str()) {
        return Some(description.to_string());
    }
    error.as_str().map(str::to_string)
}
