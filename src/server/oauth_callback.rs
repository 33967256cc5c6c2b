//! `GET /oauth2callback`: finish the consent flow and send the browser back
//! to the UI.

use reqwest::Url;

use crate::core::credentials::CredentialManager;
use crate::server::{App, query_param};

const NO_CODE_MESSAGE: &str = "No authorization code was provided";

/// Handle the redirect from Google; returns the `Location` to send the
/// browser to.
pub async fn handle<S, A>(app: &App<S, A>, query: &str) -> String {
    let Some(code) = query_param(query, "code").filter(|c| !c.is_empty()) else {
        let message = query_param(query, "error_description")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| NO_CODE_MESSAGE.to_string());
        let error = query_param(query, "error").unwrap_or_default();
        tracing::warn!(%error, %message, "OAuth callback without code");
        return error_location(&app.public_url, &message);
    };

    let credentials = CredentialManager::new(app.store.clone());
    match credentials
        .connect_account(&app.http, &app.options.endpoints, &code)
        .await
    {
        Ok(_) => success_location(&app.public_url),
        Err(e) => {
            tracing::error!(error = %e, "OAuth code exchange failed");
            error_location(&app.public_url, &e.to_string())
        }
    }
}

/// `<public_url>/?auth=success`.
#[must_use]
pub fn success_location(public_url: &str) -> String {
    format!("{public_url}/?auth=success")
}

/// `<public_url>/?auth=error&message=<urlencoded>`.
#[must_use]
pub fn error_location(public_url: &str, message: &str) -> String {
    let base = format!("{public_url}/");
    match Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("auth", "error")
                .append_pair("message", message);
            url.to_string()
        }
        Err(_) => format!("{base}?auth=error"),
    }
}
