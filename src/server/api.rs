//! `/api?action=<name>` dispatch.
//!
//! Handlers return a status and a JSON value; transport concerns stay in
//! [`super::App::handle`].

use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::core::activity::ActivityLog;
use crate::core::archiver::Archiver;
use crate::core::backup::{BackupService, SUCCESS_MESSAGE};
use crate::core::credentials::{CredentialManager, Credentials};
use crate::core::scheduler::Scheduler;
use crate::core::settings::{SettingsManager, SettingsUpdate};
use crate::error::Result;
use crate::host::info::status_report;
use crate::server::App;

/// Actions that may be called with any method; everything else needs POST.
pub const READ_ONLY_ACTIONS: &[&str] = &["getCredentials", "getSettings", "getLogs", "getStatus"];

/// Run `action` and produce the response status and body.
pub async fn dispatch<S: Scheduler, A: Archiver>(
    app: &App<S, A>,
    method: &Method,
    action: Option<&str>,
    body: &[u8],
) -> (StatusCode, Value) {
    let action = action.unwrap_or_default();

    if *method != Method::POST && !READ_ONLY_ACTIONS.contains(&action) {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"error": "Method not allowed"}),
        );
    }

    let result = match action {
        "saveCredentials" => save_credentials(app, body),
        "getCredentials" => get_credentials(app),
        "getAuthUrl" => get_auth_url(app),
        "saveSettings" => save_settings(app, body).await,
        "getSettings" => get_settings(app),
        "runBackup" => Ok(run_backup(app).await),
        "getLogs" => get_logs(app),
        "getStatus" => Ok(get_status(app).await),
        _ => return (StatusCode::BAD_REQUEST, json!({"error": "Invalid action"})),
    };

    match result {
        Ok(value) => (StatusCode::OK, value),
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(action, error = %e, code = e.error_code(), "Action failed");
            } else {
                tracing::debug!(action, error = %e, "Action rejected");
            }
            (status, json!({"error": e.to_string()}))
        }
    }
}

/// Missing, empty or malformed bodies read as the type's default.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    if body.iter().all(u8::is_ascii_whitespace) {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring malformed request body");
        T::default()
    })
}

fn save_credentials<S, A>(app: &App<S, A>, body: &[u8]) -> Result<Value> {
    let credentials: Credentials = parse_body(body);
    CredentialManager::new(app.store.clone()).save_credentials(&credentials)?;
    Ok(json!({"success": true}))
}

fn get_credentials<S, A>(app: &App<S, A>) -> Result<Value> {
    let credentials = CredentialManager::new(app.store.clone()).credentials()?;
    Ok(json!({"credentials": credentials.masked()}))
}

fn get_auth_url<S, A>(app: &App<S, A>) -> Result<Value> {
    let oauth = CredentialManager::new(app.store.clone())
        .oauth_client(&app.http, &app.options.endpoints)?;
    Ok(json!({"authUrl": oauth.authorization_url()?}))
}

async fn save_settings<S: Scheduler, A>(app: &App<S, A>, body: &[u8]) -> Result<Value> {
    let update: SettingsUpdate = parse_body(body);
    SettingsManager::new(app.store.clone())
        .save(&update, &app.scheduler, &app.job)
        .await?;
    Ok(json!({"success": true}))
}

fn get_settings<S, A>(app: &App<S, A>) -> Result<Value> {
    let settings = SettingsManager::new(app.store.clone()).get()?;
    Ok(json!({"settings": settings}))
}

/// Always answers 200; failures are reported in the body.
async fn run_backup<S, A: Archiver>(app: &App<S, A>) -> Value {
    let service = BackupService::new(app.store.clone(), app.http.clone(), app.options.clone());
    match service.run(&app.archiver).await {
        Ok(_) => json!({"success": true, "message": SUCCESS_MESSAGE}),
        Err(e) => json!({"success": false, "error": e.to_string()}),
    }
}

fn get_logs<S, A>(app: &App<S, A>) -> Result<Value> {
    let logs = ActivityLog::new(app.store.clone()).entries()?;
    Ok(json!({"logs": logs}))
}

async fn get_status<S, A>(app: &App<S, A>) -> Value {
    let report = status_report(
        &app.store,
        &app.http,
        &app.options.endpoints,
        &app.public_url,
    )
    .await;
    json!({"status": report})
}
