//! JSON action API and OAuth callback.
//!
//! Most cases call [`api::dispatch`] directly; one test drives the real
//! listener over TCP to cover routing, redirects and body handling.

use gdab::core::activity::ActivityLog;
use gdab::core::backup::BackupOptions;
use gdab::core::credentials::SECRET_MASK;
use gdab::core::scheduler::BackupJob;
use gdab::server::{App, api, oauth_callback, serve_listener};
use gdab::storage::{MemoryStore, StoreHandle};
use gdab::test_utils::{CountingArchiver, MemoryScheduler, seed_connected, seed_credentials};
use hyper::{Method, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::fixtures::{about_response, mock_endpoints, test_client, token_response};
use common::logger::TestLogger;

const PUBLIC_URL: &str = "http://127.0.0.1:8765";
const SCRIPT: &str = "/opt/gdab/bin/gdab";

type TestApp = App<MemoryScheduler, CountingArchiver>;

fn app_with(store: StoreHandle, scheduler: MemoryScheduler, staging: &TempDir) -> TestApp {
    App {
        store,
        http: test_client(),
        options: BackupOptions {
            temp_dir: staging.path().to_path_buf(),
            ..BackupOptions::default()
        },
        public_url: PUBLIC_URL.to_string(),
        job: BackupJob {
            command: format!("{SCRIPT} run"),
            script_path: SCRIPT.to_string(),
        },
        scheduler,
        archiver: CountingArchiver::default(),
    }
}

fn app(staging: &TempDir) -> TestApp {
    app_with(MemoryStore::handle(), MemoryScheduler::new(), staging)
}

async fn post(app: &TestApp, action: &str, body: &Value) -> (StatusCode, Value) {
    let body = serde_json::to_vec(body).unwrap();
    api::dispatch(app, &Method::POST, Some(action), &body).await
}

async fn get(app: &TestApp, action: &str) -> (StatusCode, Value) {
    api::dispatch(app, &Method::GET, Some(action), b"").await
}

fn valid_credentials() -> Value {
    json!({
        "clientId": "123.apps.googleusercontent.com",
        "clientSecret": "s3cret",
        "redirectUri": format!("{PUBLIC_URL}/oauth2callback"),
    })
}

// =============================================================================
// Method and action routing
// =============================================================================

#[tokio::test]
async fn mutating_actions_require_post() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    for action in ["saveCredentials", "saveSettings", "runBackup", "getAuthUrl"] {
        let (status, body) = get(&app, action).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{action}");
        assert_eq!(body["error"], "Method not allowed");
    }
    assert_eq!(app.archiver.calls(), 0);
}

#[tokio::test]
async fn read_only_actions_accept_get() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    for action in api::READ_ONLY_ACTIONS {
        let (status, _) = get(&app, action).await;
        assert_eq!(status, StatusCode::OK, "{action}");
    }
}

#[tokio::test]
async fn unknown_or_missing_action_is_rejected() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let (status, body) = post(&app, "dropTables", &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action");

    let (status, _) = api::dispatch(&app, &Method::POST, None, b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn credentials_round_trip_masks_secret() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let (status, body) = post(&app, "saveCredentials", &valid_credentials()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, body) = get(&app, "getCredentials").await;
    let credentials = &body["credentials"];
    assert_eq!(credentials["clientId"], "123.apps.googleusercontent.com");
    assert_eq!(credentials["clientSecret"], SECRET_MASK);
    assert_eq!(credentials["redirectUri"], format!("{PUBLIC_URL}/oauth2callback"));
}

#[tokio::test]
async fn invalid_credentials_are_rejected_in_field_order() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let cases = [
        (json!({}), "Invalid Client ID"),
        (json!({"clientId": "id"}), "Invalid Client Secret"),
        (
            json!({"clientId": "id", "clientSecret": "s", "redirectUri": "not a url"}),
            "Invalid Redirect URI",
        ),
    ];
    for (body, expected) in cases {
        let (status, response) = post(&app, "saveCredentials", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], expected);
    }

    let (_, body) = get(&app, "getCredentials").await;
    assert_eq!(body["credentials"]["clientId"], "");
}

#[tokio::test]
async fn malformed_body_reads_as_empty() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let (status, body) =
        api::dispatch(&app, &Method::POST, Some("saveCredentials"), b"{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid Client ID");
}

#[tokio::test]
async fn auth_url_uses_stored_client() {
    let staging = TempDir::new().unwrap();
    let store = MemoryStore::handle();
    seed_credentials(&store);
    let app = app_with(store, MemoryScheduler::new(), &staging);

    let (status, body) = post(&app, "getAuthUrl", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let url = reqwest::Url::parse(body["authUrl"].as_str().unwrap()).unwrap();
    let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["client_id"], "test-client.apps.googleusercontent.com");
    assert_eq!(pairs["access_type"], "offline");
    assert_eq!(pairs["prompt"], "consent");
    assert_eq!(pairs["response_type"], "code");
}

#[tokio::test]
async fn auth_url_without_credentials_fails() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let (status, body) = post(&app, "getAuthUrl", &json!({})).await;
    assert!(!status.is_success());
    assert_eq!(body["error"], "Google API credentials not configured");
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn save_settings_persists_and_reschedules() {
    let log = TestLogger::new("save_settings_persists_and_reschedules");
    let staging = TempDir::new().unwrap();
    let scheduler = MemoryScheduler::with_crontab(&format!(
        "MAILTO=root\n0 2 * * * {SCRIPT} run\n15 3 * * * /usr/bin/logrotate\n"
    ));
    let app = app_with(MemoryStore::handle(), scheduler, &staging);

    log.phase("execute");
    let (status, body) = post(
        &app,
        "saveSettings",
        &json!({"backupDirs": ["/var/www", " ", "/etc"], "backupFreq": "weekly", "retentionCount": "7"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    log.phase("verify");
    let (_, body) = get(&app, "getSettings").await;
    assert_eq!(
        body["settings"],
        json!({"backupDirs": ["/var/www", "/etc"], "backupFreq": "weekly", "retentionCount": 7})
    );

    let tasks = app.scheduler.tasks();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().any(|t| t.command == "/usr/bin/logrotate"));
    let ours: Vec<_> = tasks.iter().filter(|t| t.command.contains(SCRIPT)).collect();
    assert_eq!(ours.len(), 1);
    assert_eq!(ours[0].schedule, "0 2 * * 0");
    log.finish_ok();
}

#[tokio::test]
async fn invalid_settings_are_not_saved() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let cases = [
        (json!({"backupDirs": [], "backupFreq": "daily", "retentionCount": 5}), "At least one backup directory must be selected"),
        (json!({"backupDirs": ["/a"], "backupFreq": "hourly", "retentionCount": 5}), "Invalid backup frequency"),
        (json!({"backupDirs": ["/a"], "backupFreq": "daily", "retentionCount": 0}), "Retention count must be between 1 and 100"),
        (json!({"backupDirs": ["/a"], "backupFreq": "daily", "retentionCount": 101}), "Retention count must be between 1 and 100"),
    ];
    for (body, expected) in cases {
        let (status, response) = post(&app, "saveSettings", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], expected);
    }

    let (_, body) = get(&app, "getSettings").await;
    assert_eq!(body["settings"]["backupDirs"], json!([]));
    assert_eq!(body["settings"]["backupFreq"], "daily");
    assert_eq!(body["settings"]["retentionCount"], 5);
    assert!(app.scheduler.tasks().is_empty());
}

#[tokio::test]
async fn scheduler_failure_does_not_fail_save() {
    let staging = TempDir::new().unwrap();
    let app = app_with(MemoryStore::handle(), MemoryScheduler::failing(), &staging);

    let (status, _) = post(
        &app,
        "saveSettings",
        &json!({"backupDirs": ["/a"], "backupFreq": "monthly", "retentionCount": 3}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(&app, "getSettings").await;
    assert_eq!(body["settings"]["backupFreq"], "monthly");
    assert!(app.scheduler.tasks().is_empty());
}

// =============================================================================
// Backup and logs
// =============================================================================

#[tokio::test]
async fn run_backup_reports_failure_in_body() {
    let staging = TempDir::new().unwrap();
    let store = MemoryStore::handle();
    seed_credentials(&store);
    let app = app_with(store, MemoryScheduler::new(), &staging);

    let (status, body) = post(&app, "runBackup", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not connected to Google Drive");
    assert_eq!(app.archiver.calls(), 0);

    let (_, body) = get(&app, "getLogs").await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["level"], "ERROR");
    assert_eq!(logs[0]["message"], "Backup failed: Not connected to Google Drive");
    assert!(logs[0]["timestamp"].as_str().is_some_and(|t| t.len() == 19));
}

#[tokio::test]
async fn logs_are_newest_first() {
    let staging = TempDir::new().unwrap();
    let store = MemoryStore::handle();
    let activity = ActivityLog::new(store.clone());
    activity.info("one").unwrap();
    activity.info("two").unwrap();
    let app = app_with(store, MemoryScheduler::new(), &staging);

    let (_, body) = get(&app, "getLogs").await;
    let messages: Vec<_> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(messages, vec!["two", "one"]);
}

#[tokio::test]
async fn status_reports_unconfigured_destination() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let (status, body) = get(&app, "getStatus").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["configured"], false);
    assert!(body["status"]["accountEmail"].is_null());
}

// =============================================================================
// OAuth callback
// =============================================================================

#[tokio::test]
async fn callback_without_code_redirects_with_error() {
    let staging = TempDir::new().unwrap();
    let app = app(&staging);

    let location = oauth_callback::handle(&app, "error=access_denied").await;
    let url = reqwest::Url::parse(&location).unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(location.starts_with(&format!("{PUBLIC_URL}/?")));
    assert_eq!(pairs[0], ("auth".to_string(), "error".to_string()));
    assert_eq!(pairs[1].0, "message");
    assert!(!pairs[1].1.is_empty());
}

#[tokio::test]
async fn callback_with_code_connects_account() {
    let log = TestLogger::new("callback_with_code_connects_account");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_response("ya29.cb", Some("1//cb"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(about_response(
            "ops@example.com",
            100,
            1,
        )))
        .mount(&server)
        .await;

    let staging = TempDir::new().unwrap();
    let store = MemoryStore::handle();
    seed_credentials(&store);
    let mut app = app_with(store, MemoryScheduler::new(), &staging);
    app.options.endpoints = mock_endpoints(&server.uri());

    let location = oauth_callback::handle(&app, "code=4%2F0Ab&scope=drive").await;
    assert_eq!(location, format!("{PUBLIC_URL}/?auth=success"));

    let (_, body) = get(&app, "getStatus").await;
    assert_eq!(body["status"]["configured"], true);
    assert_eq!(body["status"]["accountEmail"], "ops@example.com");
    log.finish_ok();
}

// =============================================================================
// Real listener
// =============================================================================

#[tokio::test]
async fn listener_routes_requests() {
    let log = TestLogger::new("listener_routes_requests");
    let staging = TempDir::new().unwrap();
    let store = MemoryStore::handle();
    seed_connected(&store);
    let app = Arc::new(app_with(store, MemoryScheduler::new(), &staging));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let client = test_client();

    let requests = async {
        let page = client.get(format!("{base}/")).send().await.unwrap();
        assert_eq!(page.status(), reqwest::StatusCode::OK);
        assert!(page.text().await.unwrap().contains("<html"));

        let logs = client
            .get(format!("{base}/api?action=getLogs"))
            .send()
            .await
            .unwrap();
        assert_eq!(logs.status(), reqwest::StatusCode::OK);
        let body: Value = logs.json().await.unwrap();
        assert_eq!(body, json!({"logs": []}));

        let saved = client
            .post(format!("{base}/api?action=saveCredentials"))
            .json(&valid_credentials())
            .send()
            .await
            .unwrap();
        assert_eq!(saved.status(), reqwest::StatusCode::OK);

        let callback = client
            .get(format!("{base}/oauth2callback"))
            .send()
            .await
            .unwrap();
        assert_eq!(callback.status(), reqwest::StatusCode::FOUND);
        let location = callback.headers()["location"].to_str().unwrap();
        assert!(location.starts_with(&format!("{PUBLIC_URL}/?auth=error")));

        let missing = client.get(format!("{base}/nope")).send().await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    };

    tokio::select! {
        result = serve_listener(Arc::clone(&app), listener) => panic!("server stopped: {result:?}"),
        () = requests => {}
    }
    log.finish_ok();
}

#[tokio::test]
async fn idle_connection_does_not_block_other_clients() {
    let staging = TempDir::new().unwrap();
    let app = Arc::new(app(&staging));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = test_client();

    let requests = async {
        // Opened and never written to, like a browser preconnect.
        let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let logs = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            client.get(format!("http://{addr}/api?action=getLogs")).send(),
        )
        .await
        .expect("request answered while another connection is idle")
        .unwrap();
        assert_eq!(logs.status(), reqwest::StatusCode::OK);
    };

    tokio::select! {
        result = serve_listener(Arc::clone(&app), listener) => panic!("server stopped: {result:?}"),
        () = requests => {}
    }
}
