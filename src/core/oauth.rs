//! Google OAuth 2.0 (authorization-code flow with offline access).

use chrono::Utc;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::core::http::extract_google_error;
use crate::error::{GdabError, Result};
use crate::storage::Endpoints;

/// Full Drive access; needed to list and delete files we uploaded earlier.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens are treated as expired this many seconds early.
pub const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Stored token blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds, counted from `created`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds when the token was issued.
    #[serde(default)]
    pub created: i64,
}

impl OAuthToken {
    /// Whether the token is expired at unix time `now`.
    /// Tokens without a lifetime never expire.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_in {
            Some(lifetime) => self.created + lifetime - EXPIRY_LEEWAY_SECS <= now,
            None => false,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            scope: self.scope,
            expires_in: self.expires_in,
            created: Utc::now().timestamp(),
        }
    }
}

/// OAuth client bound to one set of client credentials.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
}

impl OAuthClient {
    #[must_use]
    pub fn new(
        http: Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        endpoints: &Endpoints,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: endpoints.auth_url.clone(),
            token_url: endpoints.token_url.clone(),
        }
    }

    /// Consent page URL. Forces the consent prompt so Google issues a
    /// refresh token on every connection.
    pub fn authorization_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| GdabError::Config(format!("Invalid OAuth authorization URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", DRIVE_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url.to_string())
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        tracing::debug!("Exchanging authorization code");
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Exchange a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken> {
        tracing::debug!("Refreshing access token");
        let mut token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<OAuthToken> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GdabError::OAuth(
                extract_google_error(&body).unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| GdabError::OAuth(format!("unexpected token response: {e}")))?;
        Ok(parsed.into_token())
    }
}
