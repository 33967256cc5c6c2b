//! `gdab credentials set|show`.

use serde_json::json;

use crate::cli::Context;
use crate::cli::args::{CredentialsCommand, CredentialsSetArgs};
use crate::cli::output::print_json;
use crate::core::credentials::{CredentialManager, Credentials};
use crate::error::Result;

/// Execute credentials subcommands.
///
/// # Errors
/// Returns a validation error for bad input, or a store error.
pub fn execute(ctx: &Context, cmd: &CredentialsCommand) -> Result<()> {
    let manager = CredentialManager::new(ctx.store.clone());
    match cmd {
        CredentialsCommand::Set(args) => set(ctx, &manager, args),
        CredentialsCommand::Show => show(ctx, &manager),
    }
}

fn set(ctx: &Context, manager: &CredentialManager, args: &CredentialsSetArgs) -> Result<()> {
    manager.save_credentials(&Credentials {
        client_id: args.client_id.clone(),
        client_secret: args.client_secret.clone(),
        redirect_uri: args.redirect_uri.clone(),
    })?;

    if ctx.json() {
        print_json(&json!({"success": true}))
    } else {
        println!("API credentials saved");
        println!("Next: gdab auth-url");
        Ok(())
    }
}

fn show(ctx: &Context, manager: &CredentialManager) -> Result<()> {
    let credentials = manager.credentials()?.masked();
    let email = manager.account_email()?;
    let connected = manager.token()?.is_some();

    if ctx.json() {
        return print_json(&json!({
            "credentials": credentials,
            "connected": connected,
            "accountEmail": email,
        }));
    }

    println!("{:<15} {}", "Client ID:", display_or_unset(&credentials.client_id));
    println!("{:<15} {}", "Client Secret:", display_or_unset(&credentials.client_secret));
    println!("{:<15} {}", "Redirect URI:", display_or_unset(&credentials.redirect_uri));
    let account = match (connected, email) {
        (true, Some(email)) => format!("connected as {email}"),
        (true, None) => "connected".to_string(),
        (false, _) => "not connected".to_string(),
    };
    println!("{:<15} {account}", "Drive:");
    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}
