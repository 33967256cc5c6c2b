//! E2E tests for the gdab binary.
//!
//! Covers:
//! - Help output
//! - `run` outcome line and exit status
//! - Credentials validation, persistence and masking
//! - Settings and logs read back through the CLI
//! - JSON output and error rendering
//! - `auth-code` against a mock token endpoint
//!
//! Every test points the binary at its own config and settings file via
//! environment variables, so nothing touches the invoking user's state.
//! `settings set` is only exercised on inputs that fail validation, since a
//! successful save rewrites the real crontab.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::fixtures::{about_response, token_response, write_config};
use common::logger::TestLogger;

struct Sandbox {
    dir: TempDir,
    server_uri: Option<String>,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
            server_uri: None,
        }
    }

    fn with_server(server: &MockServer) -> Self {
        Self {
            server_uri: Some(server.uri()),
            ..Self::new()
        }
    }

    #[allow(deprecated)]
    fn gdab(&self) -> Command {
        let config = write_config(self.dir.path(), self.server_uri.as_deref());
        let mut cmd = Command::cargo_bin("gdab").expect("gdab binary");
        cmd.env("GDAB_CONFIG", config)
            .env("GDAB_SETTINGS_FILE", self.dir.path().join("settings.json"))
            .env_remove("GDAB_BIND")
            .env_remove("GDAB_PUBLIC_URL")
            .env_remove("GDAB_TIMEOUT")
            .env_remove("GDAB_LOG")
            .env_remove("RUST_LOG");
        cmd
    }

    fn set_credentials(&self) {
        self.gdab()
            .args([
                "credentials",
                "set",
                "--client-id",
                "123.apps.googleusercontent.com",
                "--client-secret",
                "s3cret-value",
                "--redirect-uri",
                "http://127.0.0.1:8765/oauth2callback",
            ])
            .assert()
            .success();
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.gdab().args(args).arg("--json").output().expect("run gdab");
        assert!(output.status.success(), "{args:?} failed: {output:?}");
        serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
    }
}

#[test]
#[allow(deprecated)]
fn help_lists_commands() {
    let log = TestLogger::new("help_lists_commands");
    log.phase("execute");

    let mut cmd = Command::cargo_bin("gdab").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("credentials"))
        .stdout(predicate::str::contains("auth-url"))
        .stdout(predicate::str::contains("settings"));
    log.finish_ok();
}

#[test]
fn unknown_command_is_rejected() {
    Sandbox::new()
        .gdab()
        .arg("backup-everything")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("error")));
}

#[test]
fn run_without_credentials_reports_failure() {
    let log = TestLogger::new("run_without_credentials_reports_failure");
    let sandbox = Sandbox::new();

    log.phase("execute");
    sandbox
        .gdab()
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Backup failed: Google API credentials not configured",
        ));

    log.phase("verify");
    sandbox
        .gdab()
        .arg("logs")
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR"))
        .stdout(predicate::str::contains(
            "Backup failed: Google API credentials not configured",
        ));
    log.finish_ok();
}

#[test]
fn run_without_connection_reports_failure_as_json() {
    let sandbox = Sandbox::new();
    sandbox.set_credentials();

    let output = sandbox.gdab().args(["run", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not connected to Google Drive");
    assert!(body["errorCode"].as_str().is_some_and(|c| c.starts_with("GDAB-")));
}

#[test]
fn invalid_credentials_exit_with_input_error() {
    let sandbox = Sandbox::new();

    sandbox
        .gdab()
        .args([
            "credentials",
            "set",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--redirect-uri",
            "ftp://example.com/cb",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid Redirect URI"));

    sandbox
        .gdab()
        .args(["credentials", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not set)"));
}

#[test]
fn credentials_show_masks_secret() {
    let log = TestLogger::new("credentials_show_masks_secret");
    let sandbox = Sandbox::new();
    sandbox.set_credentials();

    log.phase("verify");
    sandbox
        .gdab()
        .args(["credentials", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("123.apps.googleusercontent.com"))
        .stdout(predicate::str::contains("not connected"))
        .stdout(predicate::str::contains("s3cret-value").not());

    let body = sandbox.json(&["credentials", "show"]);
    assert_eq!(body["credentials"]["clientSecret"], "••••••••");
    assert_eq!(body["connected"], false);
    log.finish_ok();
}

#[test]
fn settings_show_defaults() {
    let body = Sandbox::new().json(&["settings", "show"]);
    assert_eq!(body["settings"]["backupDirs"], serde_json::json!([]));
    assert_eq!(body["settings"]["backupFreq"], "daily");
    assert_eq!(body["settings"]["retentionCount"], 5);
}

#[test]
fn settings_set_rejects_out_of_range_retention() {
    let sandbox = Sandbox::new();

    sandbox
        .gdab()
        .args(["settings", "set", "--dir", "/var/www", "--retention", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Retention count must be between 1 and 100"));

    sandbox
        .gdab()
        .args(["settings", "set", "--dir", "/var/www", "--frequency", "hourly"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid backup frequency"));

    let body = sandbox.json(&["settings", "show"]);
    assert_eq!(body["settings"]["backupDirs"], serde_json::json!([]));
}

#[test]
fn logs_start_empty() {
    Sandbox::new()
        .gdab()
        .arg("logs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No activity recorded yet."));
}

#[test]
fn status_reports_unconfigured() {
    let sandbox = Sandbox::new();
    let body = sandbox.json(&["status"]);
    assert_eq!(body["status"]["configured"], false);
    assert_eq!(body["status"]["transportId"], "gdrive-autobackups");

    sandbox
        .gdab()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("settings.json"));
}

#[test]
fn run_with_broken_config_exits_with_general_error() {
    let sandbox = Sandbox::new();
    let config = sandbox.dir.path().join("broken.toml");
    std::fs::write(&config, "[general\ntimeout = ").unwrap();

    sandbox
        .gdab()
        .env("GDAB_CONFIG", &config)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid config file"));

    sandbox
        .gdab()
        .env("GDAB_CONFIG", &config)
        .arg("status")
        .assert()
        .code(2);
}

#[test]
fn auth_url_without_credentials_fails() {
    Sandbox::new()
        .gdab()
        .arg("auth-url")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Google API credentials not configured"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn auth_url_after_credentials_set() {
    let sandbox = Sandbox::new();
    sandbox.set_credentials();

    sandbox
        .gdab()
        .arg("auth-url")
        .assert()
        .success()
        .stdout(predicate::str::contains("client_id=123.apps.googleusercontent.com"))
        .stdout(predicate::str::contains("access_type=offline"));
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_code_connects_account() {
    let log = TestLogger::new("auth_code_connects_account");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_response("ya29.cli", Some("1//cli"))),
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

    let sandbox = Sandbox::with_server(&server);
    sandbox.set_credentials();

    log.phase("execute");
    sandbox
        .gdab()
        .args(["auth-code", "4/0Ab-pasted"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Connected to Google Drive as ops@example.com",
        ));

    log.phase("verify");
    sandbox
        .gdab()
        .args(["credentials", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("connected as ops@example.com"));
    log.finish_ok();
}
