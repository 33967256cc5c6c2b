//! OAuth client credentials and the current token pair.
//!
//! [`CredentialManager::access_token`] is the single entry point the backup
//! pipeline uses: it returns a usable bearer token, refreshing and persisting
//! it when expired, or fails with [`GdabError::NotConnected`].

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::core::drive::{DriveApi, DriveClient};
use crate::core::oauth::{OAuthClient, OAuthToken};
use crate::error::{GdabError, Result};
use crate::storage::settings_store::{StoreHandle, keys};
use crate::storage::Endpoints;

/// Placeholder returned instead of the stored client secret.
pub const SECRET_MASK: &str = "••••••••";

/// OAuth client credentials as entered in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
}

impl Credentials {
    /// Copy with the secret replaced by [`SECRET_MASK`] (when set).
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            client_secret: if self.client_secret.is_empty() {
                String::new()
            } else {
                SECRET_MASK.to_string()
            },
            ..self.clone()
        }
    }

    /// Check every field; the first failure wins.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(GdabError::validation("Invalid Client ID"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(GdabError::validation("Invalid Client Secret"));
        }
        if !is_valid_redirect_uri(&self.redirect_uri) {
            return Err(GdabError::validation("Invalid Redirect URI"));
        }
        Ok(())
    }
}

fn is_valid_redirect_uri(raw: &str) -> bool {
    Url::parse(raw.trim())
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

/// Reads and writes credentials and tokens in the settings store.
#[derive(Clone)]
pub struct CredentialManager {
    store: StoreHandle,
}

impl CredentialManager {
    #[must_use]
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Validate and persist client credentials. Nothing is written when
    /// validation fails.
    ///
    /// A secret equal to [`SECRET_MASK`] keeps the stored secret, so a form
    /// pre-filled from [`Credentials::masked`] can be saved unchanged.
    pub fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        let mut credentials = credentials.clone();
        if credentials.client_secret == SECRET_MASK {
            credentials.client_secret = self.store.get_or_default(keys::CLIENT_SECRET)?;
        }
        credentials.validate()?;

        self.store
            .set(keys::CLIENT_ID, credentials.client_id.trim())?;
        self.store
            .set(keys::CLIENT_SECRET, credentials.client_secret.trim())?;
        self.store
            .set(keys::REDIRECT_URI, credentials.redirect_uri.trim())?;

        tracing::info!(client_id = %credentials.client_id.trim(), "Saved Google API credentials");
        Ok(())
    }

    /// Stored credentials (empty strings when unset).
    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            client_id: self.store.get_or_default(keys::CLIENT_ID)?,
            client_secret: self.store.get_or_default(keys::CLIENT_SECRET)?,
            redirect_uri: self.store.get_or_default(keys::REDIRECT_URI)?,
        })
    }

    /// Stored token, if any. An unreadable blob counts as no token.
    pub fn token(&self) -> Result<Option<OAuthToken>> {
        let raw = self.store.get_or_default(keys::ACCESS_TOKEN)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&raw).ok())
    }

    pub fn save_token(&self, token: &OAuthToken) -> Result<()> {
        self.store
            .set(keys::ACCESS_TOKEN, &serde_json::to_string(token)?)
    }

    pub fn clear_token(&self) -> Result<()> {
        self.store.set(keys::ACCESS_TOKEN, "")
    }

    /// Email of the connected account, when known.
    pub fn account_email(&self) -> Result<Option<String>> {
        let email = self.store.get_or_default(keys::ACCOUNT_EMAIL)?;
        Ok(Some(email).filter(|e| !e.is_empty()))
    }

    pub fn save_account_email(&self, email: &str) -> Result<()> {
        self.store.set(keys::ACCOUNT_EMAIL, email)
    }

    /// Client id and token are both present.
    pub fn is_configured(&self) -> Result<bool> {
        let client_id = self.store.get_or_default(keys::CLIENT_ID)?;
        let token = self.store.get_or_default(keys::ACCESS_TOKEN)?;
        Ok(!client_id.is_empty() && !token.is_empty())
    }

    /// Build an OAuth client from the stored credentials.
    ///
    /// # Errors
    ///
    /// [`GdabError::CredentialsNotConfigured`] when the client id or secret is
    /// missing.
    pub fn oauth_client(&self, http: &Client, endpoints: &Endpoints) -> Result<OAuthClient> {
        let credentials = self.credentials()?;
        if credentials.client_id.is_empty() || credentials.client_secret.is_empty() {
            return Err(GdabError::CredentialsNotConfigured);
        }

        Ok(OAuthClient::new(
            http.clone(),
            credentials.client_id,
            credentials.client_secret,
            credentials.redirect_uri,
            endpoints,
        ))
    }

    /// Exchange an authorization code and persist the resulting token.
    pub async fn complete_authorization(
        &self,
        oauth: &OAuthClient,
        code: &str,
    ) -> Result<OAuthToken> {
        let token = oauth.exchange_code(code).await?;
        self.save_token(&token)?;
        tracing::info!("Connected to Google Drive");
        Ok(token)
    }

    /// Finish the consent flow: exchange `code`, then record the connected
    /// account's email. Returns the email when Drive reported one.
    ///
    /// The email is informational; a failed lookup keeps the new token.
    pub async fn connect_account(
        &self,
        http: &Client,
        endpoints: &Endpoints,
        code: &str,
    ) -> Result<Option<String>> {
        let oauth = self.oauth_client(http, endpoints)?;
        let token = self.complete_authorization(&oauth, code).await?;

        let drive = DriveClient::new(http.clone(), token.access_token, endpoints);
        match drive.about().await {
            Ok(about) => {
                let email = about.user.and_then(|u| u.email_address);
                if let Some(email) = &email {
                    self.save_account_email(email)?;
                }
                Ok(email)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not look up connected account");
                Ok(None)
            }
        }
    }

    /// Drive client authorized with a fresh access token.
    pub async fn drive_client(&self, http: &Client, endpoints: &Endpoints) -> Result<DriveClient> {
        let oauth = self.oauth_client(http, endpoints)?;
        let token = self.access_token(&oauth).await?;
        Ok(DriveClient::new(http.clone(), token, endpoints))
    }

    /// A usable access token, refreshing it first when expired.
    ///
    /// A rejected refresh clears the stored token; the caller sees
    /// [`GdabError::NotConnected`] and the user has to reconnect.
    pub async fn access_token(&self, oauth: &OAuthClient) -> Result<String> {
        let Some(token) = self.token()? else {
            return Err(GdabError::NotConnected);
        };

        if !token.is_expired() {
            return Ok(token.access_token);
        }

        let Some(refresh_token) = token.refresh_token.as_deref() else {
            tracing::warn!("Access token expired and no refresh token is stored");
            self.clear_token()?;
            return Err(GdabError::NotConnected);
        };

        match oauth.refresh(refresh_token).await {
            Ok(fresh) => {
                self.save_token(&fresh)?;
                tracing::debug!("Access token refreshed");
                Ok(fresh.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh rejected; clearing stored token");
                self.clear_token()?;
                Err(GdabError::NotConnected)
            }
        }
    }
}
