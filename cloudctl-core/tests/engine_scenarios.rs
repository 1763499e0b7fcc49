//! End-to-end scenarios for the session engine against a mock STS client.
//!
//! These verify the state machine itself: role chaining off a stored MFA
//! session, silent refresh of an active session, and the batch planner's
//! one-prompt-per-source amortization.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use cloudctl_core::config::Defaults;
use cloudctl_core::engine::{LoginRequest, RefreshOutcome, SessionEngine, UserPrompt};
use cloudctl_core::error::CloudCtlError;
use cloudctl_core::model::{Secret, Session, SessionKind};
use cloudctl_core::store::SessionStore;
use cloudctl_core::sts::{
    AssumeRoleRequest, SessionTokenRequest, SourceCredentials, StsClient, StsCredentials,
};
use tempfile::TempDir;

const KEY: &str = "1234567890ABCDEF1234567890ABCDEF";

/// What a mock call looked like, for assertions.
#[derive(Debug, Clone, PartialEq)]
enum StsCall {
    AssumeRole {
        session_name: String,
        role_arn: String,
        source_was_stored: bool,
        with_mfa: bool,
    },
    GetSessionToken {
        serial_number: String,
    },
}

/// Mock STS client issuing fixed-validity credentials and recording calls.
#[derive(Default)]
struct MockSts {
    calls: Mutex<Vec<StsCall>>,
}

impl MockSts {
    fn calls(&self) -> Vec<StsCall> {
        self.calls.lock().unwrap().clone()
    }

    fn assume_role_session_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StsCall::AssumeRole { session_name, .. } => Some(session_name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl StsClient for MockSts {
    async fn assume_role(
        &self,
        source: &SourceCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<StsCredentials, CloudCtlError> {
        self.calls.lock().unwrap().push(StsCall::AssumeRole {
            session_name: request.session_name.clone(),
            role_arn: request.role_arn.clone(),
            source_was_stored: matches!(source, SourceCredentials::Stored { .. }),
            with_mfa: request.mfa.is_some(),
        });
        Ok(StsCredentials {
            access_key: format!("ASIA{}", request.session_name.to_uppercase()),
            secret_key: "mock-secret-key".to_string(),
            session_token: "mock-session-token".to_string(),
            expiration: Utc::now() + Duration::seconds(request.duration_seconds.into()),
        })
    }

    async fn get_session_token(
        &self,
        _source: &SourceCredentials,
        request: &SessionTokenRequest,
    ) -> Result<StsCredentials, CloudCtlError> {
        self.calls.lock().unwrap().push(StsCall::GetSessionToken {
            serial_number: request.serial_number.clone(),
        });
        Ok(StsCredentials {
            access_key: "ASIAMFA".to_string(),
            secret_key: "mock-mfa-secret".to_string(),
            session_token: "mock-mfa-token".to_string(),
            expiration: Utc::now() + Duration::seconds(request.duration_seconds.into()),
        })
    }
}

/// Prompt that fails the test if the engine ever asks anything.
struct NoPrompt;

impl UserPrompt for NoPrompt {
    fn mfa_code(&self, mfa_arn: &str) -> Result<String, CloudCtlError> {
        panic!("unexpected MFA prompt for {mfa_arn}");
    }

    fn confirm(&self, message: &str) -> Result<bool, CloudCtlError> {
        panic!("unexpected confirmation prompt: {message}");
    }
}

/// Prompt replaying scripted answers and counting what was asked.
#[derive(Default)]
struct ScriptedPrompt {
    codes: Mutex<VecDeque<String>>,
    answers: Mutex<VecDeque<bool>>,
    confirms_asked: Mutex<usize>,
    codes_asked: Mutex<usize>,
}

impl ScriptedPrompt {
    fn with_answers(answers: &[bool], codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            answers: Mutex::new(answers.to_vec().into()),
            ..Default::default()
        }
    }

    fn confirms_asked(&self) -> usize {
        *self.confirms_asked.lock().unwrap()
    }

    fn codes_asked(&self) -> usize {
        *self.codes_asked.lock().unwrap()
    }
}

impl UserPrompt for ScriptedPrompt {
    fn mfa_code(&self, _mfa_arn: &str) -> Result<String, CloudCtlError> {
        *self.codes_asked.lock().unwrap() += 1;
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(CloudCtlError::Cancelled)
    }

    fn confirm(&self, _message: &str) -> Result<bool, CloudCtlError> {
        *self.confirms_asked.lock().unwrap() += 1;
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(CloudCtlError::Cancelled)
    }
}

fn test_engine() -> (SessionEngine<MockSts>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("credentials.json"));
    let engine = SessionEngine::new(store, MockSts::default(), Defaults::default());
    (engine, dir)
}

fn session(profile: &str, kind: SessionKind, expires_in_minutes: i64, source: &str) -> Session {
    Session {
        profile: profile.to_string(),
        access_key: format!("AKIA{}", profile.to_uppercase()),
        secret_key: "stored-secret".to_string(),
        session_token: "stored-token".to_string(),
        expiration: Utc::now() + Duration::minutes(expires_in_minutes),
        kind,
        role_arn: match kind {
            SessionKind::MfaBase => String::new(),
            SessionKind::RoleAssumed => format!("arn:aws:iam::123:role/{profile}"),
        },
        source_profile: source.to_string(),
        region: "ap-southeast-1".to_string(),
        mfa_arn: match kind {
            SessionKind::MfaBase => "arn:aws:iam::123:mfa/user".to_string(),
            SessionKind::RoleAssumed => String::new(),
        },
        duration_seconds: 3600,
        revoked: false,
    }
}

#[tokio::test]
async fn login_chains_off_a_stored_mfa_session_without_prompting() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    // MFA base session valid for four more hours.
    engine
        .store()
        .save(&session("mfa", SessionKind::MfaBase, 240, "default"), &secret)
        .unwrap();

    let request = LoginRequest {
        source_profile: "mfa".to_string(),
        profile: "role1".to_string(),
        role_arn: "arn:aws:iam::123:role/R1".to_string(),
        mfa_arn: None,
        region: None,
        duration_seconds: None,
    };
    engine.login(&request, &secret, &NoPrompt).await.unwrap();

    let stored = engine.store().load("role1", &secret).unwrap();
    assert_eq!(stored.source_profile, "mfa");
    assert_eq!(stored.role_arn, "arn:aws:iam::123:role/R1");
    assert_eq!(stored.kind, SessionKind::RoleAssumed);

    // Exactly one STS call: the role assumption, signed with the stored
    // triple, no GetSessionToken.
    assert_eq!(
        engine.sts_calls(),
        vec![StsCall::AssumeRole {
            session_name: "role1".to_string(),
            role_arn: "arn:aws:iam::123:role/R1".to_string(),
            source_was_stored: true,
            with_mfa: false,
        }]
    );
}

#[tokio::test]
async fn login_skips_the_mfa_step_when_the_source_is_stored() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    engine
        .store()
        .save(&session("mfa", SessionKind::MfaBase, 240, "default"), &secret)
        .unwrap();

    let request = LoginRequest {
        source_profile: "mfa".to_string(),
        profile: "role2".to_string(),
        role_arn: "arn:aws:iam::123:role/R2".to_string(),
        mfa_arn: Some("arn:aws:iam::123:mfa/user".to_string()),
        region: None,
        duration_seconds: None,
    };
    // NoPrompt: even with --mfa given, a stored source needs no code.
    engine.login(&request, &secret, &NoPrompt).await.unwrap();

    assert!(engine
        .sts_calls()
        .iter()
        .all(|c| !matches!(c, StsCall::GetSessionToken { .. })));
}

#[tokio::test]
async fn active_session_refreshes_silently() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    // Expires in 30 minutes; still valid, so the silent path applies.
    engine
        .store()
        .save(&session("p", SessionKind::RoleAssumed, 30, "default"), &secret)
        .unwrap();

    let outcome = engine.refresh("p", &secret, false, &NoPrompt).await.unwrap();

    assert!(matches!(outcome, RefreshOutcome::Silent(_)));
    let refreshed = engine.store().load("p", &secret).unwrap();
    assert!(refreshed.remaining(Utc::now()) > Duration::minutes(50));
}

#[tokio::test]
async fn forced_refresh_of_a_plain_role_goes_interactive_without_mfa() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    engine
        .store()
        .save(&session("p", SessionKind::RoleAssumed, 30, "default"), &secret)
        .unwrap();

    // No MFA ARN on the record, so restore needs no code either.
    let outcome = engine.refresh("p", &secret, true, &NoPrompt).await.unwrap();
    assert!(matches!(
        outcome,
        RefreshOutcome::Restored { silent_error: None, .. }
    ));
}

#[tokio::test]
async fn repeated_refresh_keeps_the_session_name_stable() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    engine
        .store()
        .save(&session("prod-admin", SessionKind::RoleAssumed, 30, "default"), &secret)
        .unwrap();

    for _ in 0..3 {
        engine
            .refresh("prod-admin", &secret, false, &NoPrompt)
            .await
            .unwrap();
    }

    let names = engine.mock().assume_role_session_names();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|n| n == "prod-admin"));
}

#[tokio::test]
async fn batch_refresh_amortizes_one_prompt_across_dependents() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    // One expired MFA source and three expired roles chained off it.
    engine
        .store()
        .save(&session("m", SessionKind::MfaBase, -10, "default"), &secret)
        .unwrap();
    for profile in ["a", "b", "c"] {
        engine
            .store()
            .save(&session(profile, SessionKind::RoleAssumed, -10, "m"), &secret)
            .unwrap();
    }

    let prompt = ScriptedPrompt::with_answers(&[true], &["123456"]);
    let summary = engine.refresh_all(&secret, &prompt).await.unwrap();

    // One confirmation, one code entry, four renewed records.
    assert_eq!(prompt.confirms_asked(), 1);
    assert_eq!(prompt.codes_asked(), 1);
    assert_eq!(summary.refreshed, 4);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);

    let now = Utc::now();
    for profile in ["m", "a", "b", "c"] {
        let s = engine.store().load(profile, &secret).unwrap();
        assert!(!s.is_expired(now), "{profile} should have been renewed");
    }
}

#[tokio::test]
async fn declining_the_source_skips_every_dependent_silently() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    engine
        .store()
        .save(&session("m", SessionKind::MfaBase, -10, "default"), &secret)
        .unwrap();
    for profile in ["a", "b", "c"] {
        engine
            .store()
            .save(&session(profile, SessionKind::RoleAssumed, -10, "m"), &secret)
            .unwrap();
    }

    let prompt = ScriptedPrompt::with_answers(&[false], &[]);
    let summary = engine.refresh_all(&secret, &prompt).await.unwrap();

    assert_eq!(prompt.confirms_asked(), 1);
    assert_eq!(prompt.codes_asked(), 0);
    assert_eq!(summary.refreshed, 0);
    assert_eq!(summary.skipped, 4);

    // Nothing was renewed.
    let now = Utc::now();
    for profile in ["m", "a", "b", "c"] {
        assert!(engine.store().load(profile, &secret).unwrap().is_expired(now));
    }
}

#[tokio::test]
async fn expired_role_source_is_offered_once_and_restored_without_mfa() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    // Two expired roles chained off an expired role-assumed source that
    // itself chains off an external profile.
    engine
        .store()
        .save(&session("s", SessionKind::RoleAssumed, -10, "default"), &secret)
        .unwrap();
    for profile in ["r1", "r2"] {
        engine
            .store()
            .save(&session(profile, SessionKind::RoleAssumed, -10, "s"), &secret)
            .unwrap();
    }

    let prompt = ScriptedPrompt::with_answers(&[true], &[]);
    let summary = engine.refresh_all(&secret, &prompt).await.unwrap();

    assert_eq!(prompt.confirms_asked(), 1);
    assert_eq!(prompt.codes_asked(), 0);
    assert_eq!(summary.refreshed, 3);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn mfa_sessions_are_never_silently_refreshed() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    let mfa = session("mfa", SessionKind::MfaBase, 240, "default");
    engine.store().save(&mfa, &secret).unwrap();

    let result = engine.silent_refresh(&mfa, &secret).await;
    assert!(matches!(result, Err(CloudCtlError::NotRefreshable { .. })));
}

#[tokio::test]
async fn logout_and_clear_all_need_no_secret() {
    let (engine, _dir) = test_engine();
    let secret = Secret::new(KEY);

    engine
        .store()
        .save(&session("p", SessionKind::RoleAssumed, 30, "default"), &secret)
        .unwrap();
    engine
        .store()
        .save(&session("q", SessionKind::RoleAssumed, 30, "default"), &secret)
        .unwrap();

    engine.logout("p").unwrap();
    assert_eq!(engine.store().list_profiles().unwrap(), vec!["q"]);

    engine.clear_all().unwrap();
    assert!(engine.store().list_profiles().unwrap().is_empty());
}

// Test-only accessors for the mock inside the engine.
trait MockAccess {
    fn mock(&self) -> &MockSts;
    fn sts_calls(&self) -> Vec<StsCall>;
}

impl MockAccess for SessionEngine<MockSts> {
    fn mock(&self) -> &MockSts {
        self.sts()
    }

    fn sts_calls(&self) -> Vec<StsCall> {
        self.sts().calls()
    }
}
