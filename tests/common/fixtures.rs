//! Test fixtures for integration tests: Google API response bodies, endpoint
//! wiring for mock servers, and config files for binary tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};

pub use gdab::storage::Endpoints;

/// Endpoints that send every Google call to `server_uri`.
#[must_use]
pub fn mock_endpoints(server_uri: &str) -> Endpoints {
    Endpoints {
        api_base: server_uri.to_string(),
        upload_base: server_uri.to_string(),
        auth_url: format!("{server_uri}/o/oauth2/v2/auth"),
        token_url: format!("{server_uri}/token"),
    }
}

/// 308 reply to a resumable chunk that stored everything up to the chunk's
/// last byte, echoed back in the `Range` header as Drive does.
///
/// # Panics
///
/// Panics if the request carries no parseable `Content-Range`.
#[must_use]
pub fn acknowledge_chunk(request: &wiremock::Request) -> wiremock::ResponseTemplate {
    let content_range = request.headers["content-range"].to_str().unwrap();
    let (_, span) = content_range.split_once(' ').unwrap();
    let (range, _) = span.split_once('/').unwrap();
    let (_, end) = range.split_once('-').unwrap();
    wiremock::ResponseTemplate::new(308).insert_header("Range", format!("bytes=0-{end}").as_str())
}

/// HTTP client configured like the binary's.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn test_client() -> reqwest::Client {
    gdab::core::http::default_client().expect("http client")
}

// =============================================================================
// Response Bodies
// =============================================================================

/// Token endpoint success body.
#[must_use]
pub fn token_response(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "expires_in": 3599,
        "token_type": "Bearer",
        "scope": "https://www.googleapis.com/auth/drive",
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = json!(refresh);
    }
    body
}

/// Token endpoint error body.
#[must_use]
pub fn oauth_error(error: &str, description: &str) -> Value {
    json!({"error": error, "error_description": description})
}

/// Drive error body.
#[must_use]
pub fn drive_error(code: u16, message: &str) -> Value {
    json!({"error": {"code": code, "message": message, "errors": [{"message": message}]}})
}

/// One file entry as Drive lists it.
#[must_use]
pub fn file_json(id: &str, name: &str, created: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "name": name,
        "createdTime": created.to_rfc3339(),
        "mimeType": "application/gzip",
    })
}

/// `files.list` page.
#[must_use]
pub fn file_list(files: Vec<Value>, next_page_token: Option<&str>) -> Value {
    let mut body = json!({"files": files});
    if let Some(token) = next_page_token {
        body["nextPageToken"] = json!(token);
    }
    body
}

/// `about.get` body with quota values as decimal strings.
#[must_use]
pub fn about_response(email: &str, limit: u64, usage: u64) -> Value {
    json!({
        "user": {"emailAddress": email, "displayName": "Backup Operator"},
        "storageQuota": {"limit": limit.to_string(), "usage": usage.to_string()},
    })
}

/// `days_ago` days before now.
#[must_use]
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::days(days)
}

// =============================================================================
// Config Files
// =============================================================================

/// Write a `config.toml` pointing Drive at `server_uri` (or the real
/// endpoints when `None`) and return its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_config(dir: &Path, server_uri: Option<&str>) -> PathBuf {
    let mut content = format!(
        "[backup]\ntemp_dir = {:?}\ncommand = \"/opt/gdab/bin/gdab run\"\n",
        dir.join("staging").display().to_string()
    );
    if let Some(uri) = server_uri {
        content.push_str(&format!(
            "\n[drive]\napi_base = \"{uri}\"\nauth_url = \"{uri}/o/oauth2/v2/auth\"\ntoken_url = \"{uri}/token\"\n"
        ));
    }
    let path = dir.join("config.toml");
    fs::write(&path, content).expect("write config");
    path
}
