//! Integration tests for the console federation URL builder.

use chrono::{Duration, Utc};
use cloudctl_core::error::CloudCtlError;
use cloudctl_core::federation::FederationClient;
use cloudctl_core::model::{Session, SessionKind};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn role_session(expires_in_minutes: i64) -> Session {
    Session {
        profile: "prod-admin".to_string(),
        access_key: "ASIAEXAMPLE".to_string(),
        secret_key: "federation-secret".to_string(),
        session_token: "federation-token".to_string(),
        expiration: Utc::now() + Duration::minutes(expires_in_minutes),
        kind: SessionKind::RoleAssumed,
        role_arn: "arn:aws:iam::123:role/Admin".to_string(),
        source_profile: "default".to_string(),
        region: "ap-southeast-1".to_string(),
        mfa_arn: String::new(),
        duration_seconds: 3600,
        revoked: false,
    }
}

#[tokio::test]
async fn builds_a_login_url_from_the_signin_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("Action", "getSigninToken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "SigninToken": "TOK123" })),
        )
        .mount(&server)
        .await;

    let client = FederationClient::with_endpoint(server.uri());
    let url = client
        .console_url(&role_session(60), Some("eu-west-1"), Utc::now())
        .await
        .unwrap();

    assert!(url.starts_with(&server.uri()));
    assert!(url.contains("Action=login"));
    assert!(url.contains("Issuer=cloudctl"));
    assert!(url.contains("SigninToken=TOK123"));
    // The destination is URL-encoded into the query string.
    assert!(url.contains("eu-west-1.console.aws.amazon.com"));
    assert!(!url.contains("Destination=https://"));
}

#[tokio::test]
async fn missing_signin_token_is_a_federation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = FederationClient::with_endpoint(server.uri());
    let result = client.console_url(&role_session(60), None, Utc::now()).await;

    assert!(matches!(result, Err(CloudCtlError::Federation { .. })));
}

#[tokio::test]
async fn expired_sessions_are_rejected_before_any_request() {
    // No mock server: a network call would fail the test with a different
    // error than the gate produces.
    let client = FederationClient::with_endpoint("http://127.0.0.1:1/federation");
    let result = client.console_url(&role_session(-5), None, Utc::now()).await;

    assert!(matches!(result, Err(CloudCtlError::SessionExpired { .. })));
}

#[tokio::test]
async fn mfa_base_sessions_are_rejected_before_any_request() {
    let mut session = role_session(60);
    session.kind = SessionKind::MfaBase;
    session.role_arn = String::new();

    let client = FederationClient::with_endpoint("http://127.0.0.1:1/federation");
    let result = client.console_url(&session, None, Utc::now()).await;

    assert!(matches!(result, Err(CloudCtlError::Unsupported { .. })));
}

#[tokio::test]
async fn global_console_is_used_without_a_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "SigninToken": "TOK456" })),
        )
        .mount(&server)
        .await;

    let client = FederationClient::with_endpoint(server.uri());
    let url = client
        .console_url(&role_session(60), None, Utc::now())
        .await
        .unwrap();

    assert!(url.contains("console.aws.amazon.com"));
    assert!(!url.contains("?region="));
}
