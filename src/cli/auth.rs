//! `gdab auth-url` and `gdab auth-code`: the consent flow without a browser
//! reaching the server.

use serde_json::json;

use crate::cli::Context;
use crate::cli::args::AuthCodeArgs;
use crate::cli::output::print_json;
use crate::core::credentials::CredentialManager;
use crate::error::Result;

/// Print the consent URL.
///
/// # Errors
/// [`crate::GdabError::CredentialsNotConfigured`] when no client is stored.
pub fn execute_url(ctx: &Context) -> Result<()> {
    let oauth = CredentialManager::new(ctx.store.clone())
        .oauth_client(&ctx.http, &ctx.config.endpoints)?;
    let url = oauth.authorization_url()?;

    if ctx.json() {
        print_json(&json!({"authUrl": url}))
    } else {
        println!("{url}");
        Ok(())
    }
}

/// Exchange a pasted authorization code.
///
/// # Errors
/// Returns an error if the client is not configured or Google rejects the
/// code.
pub async fn execute_code(ctx: &Context, args: &AuthCodeArgs) -> Result<()> {
    let email = CredentialManager::new(ctx.store.clone())
        .connect_account(&ctx.http, &ctx.config.endpoints, args.code.trim())
        .await?;

    if ctx.json() {
        return print_json(&json!({"success": true, "accountEmail": email}));
    }
    match email {
        Some(email) => println!("Connected to Google Drive as {email}"),
        None => println!("Connected to Google Drive"),
    }
    Ok(())
}
