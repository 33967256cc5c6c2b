//! OAuth code exchange and token refresh against a mock token endpoint.

use gdab::core::credentials::CredentialManager;
use gdab::error::GdabError;
use gdab::storage::{MemoryStore, SettingsStore, keys};
use gdab::test_utils::{make_expired_token, make_test_token, seed_credentials, seed_token};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::fixtures::{about_response, mock_endpoints, oauth_error, test_client, token_response};
use common::logger::TestLogger;

#[tokio::test]
async fn connect_account_stores_token_and_email() {
    let log = TestLogger::new("connect_account_stores_token_and_email");
    let server = MockServer::start().await;
    let store = MemoryStore::handle();
    seed_credentials(&store);

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2F0Ab-code"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_response("ya29.fresh", Some("1//refresh"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(about_response(
            "ops@example.com",
            100,
            10,
        )))
        .mount(&server)
        .await;

    log.phase("execute");
    let credentials = CredentialManager::new(store.clone());
    let email = credentials
        .connect_account(&test_client(), &mock_endpoints(&server.uri()), "4/0Ab-code")
        .await
        .unwrap();

    assert_eq!(email.as_deref(), Some("ops@example.com"));
    let token = credentials.token().unwrap().unwrap();
    assert_eq!(token.access_token, "ya29.fresh");
    assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
    assert_eq!(
        store.get(keys::ACCOUNT_EMAIL).unwrap().as_deref(),
        Some("ops@example.com")
    );
    assert!(credentials.is_configured().unwrap());
    log.finish_ok();
}

#[tokio::test]
async fn rejected_code_is_an_oauth_error() {
    let server = MockServer::start().await;
    let store = MemoryStore::handle();
    seed_credentials(&store);

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(oauth_error("invalid_grant", "Malformed auth code.")),
        )
        .mount(&server)
        .await;

    let credentials = CredentialManager::new(store.clone());
    let err = credentials
        .connect_account(&test_client(), &mock_endpoints(&server.uri()), "bad")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "OAuth exchange failed: Malformed auth code.");
    assert!(credentials.token().unwrap().is_none());
}

#[tokio::test]
async fn valid_token_is_used_without_refresh() {
    let server = MockServer::start().await;
    let store = MemoryStore::handle();
    seed_credentials(&store);
    seed_token(&store, &make_test_token());

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let credentials = CredentialManager::new(store);
    let oauth = credentials
        .oauth_client(&test_client(), &mock_endpoints(&server.uri()))
        .unwrap();
    let token = credentials.access_token(&oauth).await.unwrap();
    assert_eq!(token, "ya29.test-access");
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let log = TestLogger::new("expired_token_is_refreshed_and_persisted");
    let server = MockServer::start().await;
    let store = MemoryStore::handle();
    seed_credentials(&store);
    seed_token(&store, &make_expired_token(Some("1//keep-me")));

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Fkeep-me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("ya29.renewed", None)))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = CredentialManager::new(store);
    let oauth = credentials
        .oauth_client(&test_client(), &mock_endpoints(&server.uri()))
        .unwrap();
    let token = credentials.access_token(&oauth).await.unwrap();

    assert_eq!(token, "ya29.renewed");
    let stored = credentials.token().unwrap().unwrap();
    assert_eq!(stored.access_token, "ya29.renewed");
    // Google omits the refresh token on refresh; the old one is kept.
    assert_eq!(stored.refresh_token.as_deref(), Some("1//keep-me"));
    assert!(!stored.is_expired());
    log.finish_ok();
}

#[tokio::test]
async fn rejected_refresh_clears_token() {
    let server = MockServer::start().await;
    let store = MemoryStore::handle();
    seed_credentials(&store);
    seed_token(&store, &make_expired_token(Some("1//revoked")));

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(oauth_error("invalid_grant", "Token has been expired or revoked.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let credentials = CredentialManager::new(store);
    let oauth = credentials
        .oauth_client(&test_client(), &mock_endpoints(&server.uri()))
        .unwrap();
    let err = credentials.access_token(&oauth).await.unwrap_err();

    assert!(matches!(err, GdabError::NotConnected));
    assert!(credentials.token().unwrap().is_none());
    assert!(!credentials.is_configured().unwrap());
}

#[tokio::test]
async fn expired_token_without_refresh_token_needs_reconnect() {
    let server = MockServer::start().await;
    let store = MemoryStore::handle();
    seed_credentials(&store);
    seed_token(&store, &make_expired_token(None));

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let credentials = CredentialManager::new(store);
    let oauth = credentials
        .oauth_client(&test_client(), &mock_endpoints(&server.uri()))
        .unwrap();
    assert!(matches!(
        credentials.access_token(&oauth).await,
        Err(GdabError::NotConnected)
    ));
}
