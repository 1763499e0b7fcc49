//! The session lifecycle engine.
//!
//! Five verbs over the encrypted store: `login`, `mfa_login`, `refresh`
//! (smart single), `refresh_all` (batch planner), and `logout`/`clear_all`.
//!
//! The engine owns every policy decision. Commands parse inputs and render
//! outcomes; the daemon drives the silent-refresh path on a timer. User
//! interaction goes through the [`UserPrompt`] capability so batch planning
//! can be tested with scripted answers.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{clamp_mfa_duration, clamp_role_duration, Defaults, DEFAULT_ROLE_DURATION_SECS};
use crate::error::CloudCtlError;
use crate::model::{Secret, Session, SessionKind};
use crate::store::SessionStore;
use crate::sts::{
    resolve_source, AssumeRoleRequest, MfaChallenge, ResolvedSource, SessionTokenRequest,
    SourceCredentials, StsClient,
};

/// Interactive capability the engine needs from its caller.
///
/// The terminal implementation lives in the CLI; tests supply scripted
/// answers.
pub trait UserPrompt: Send + Sync {
    /// Ask for a one-time MFA code for the given device.
    fn mfa_code(&self, mfa_arn: &str) -> Result<String, CloudCtlError>;

    /// Ask a yes/no question.
    fn confirm(&self, message: &str) -> Result<bool, CloudCtlError>;
}

/// Inputs for [`SessionEngine::login`].
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub source_profile: String,
    pub profile: String,
    pub role_arn: String,
    pub mfa_arn: Option<String>,
    pub region: Option<String>,
    pub duration_seconds: Option<i32>,
}

/// Inputs for [`SessionEngine::mfa_login`].
#[derive(Debug, Clone)]
pub struct MfaLoginRequest {
    pub source_profile: String,
    pub profile: String,
    pub mfa_arn: String,
    pub duration_seconds: Option<i32>,
}

/// How a single-session refresh completed.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The silent path succeeded; no interaction happened.
    Silent(Session),

    /// The session was restored interactively. When the silent path was
    /// attempted first and failed, its error is carried as context.
    Restored {
        session: Session,
        silent_error: Option<String>,
    },
}

impl RefreshOutcome {
    pub fn session(&self) -> &Session {
        match self {
            RefreshOutcome::Silent(session) => session,
            RefreshOutcome::Restored { session, .. } => session,
        }
    }
}

/// Counters reported at the end of a batch refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The core state machine, generic over the STS transport.
pub struct SessionEngine<C: StsClient> {
    store: SessionStore,
    sts: C,
    defaults: Defaults,
}

impl<C: StsClient> SessionEngine<C> {
    pub fn new(store: SessionStore, sts: C, defaults: Defaults) -> Self {
        Self {
            store,
            sts,
            defaults,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn sts(&self) -> &C {
        &self.sts
    }

    /// Obtain and persist a role session.
    ///
    /// When an MFA device is given and the source is an external profile,
    /// the source credentials are first traded for an MFA-verified triple
    /// via `GetSessionToken`. A stored source (including a stored MFA
    /// session) is used directly; its MFA verification already happened.
    pub async fn login(
        &self,
        request: &LoginRequest,
        secret: &Secret,
        prompt: &dyn UserPrompt,
    ) -> Result<Session, CloudCtlError> {
        if request.source_profile.is_empty()
            || request.profile.is_empty()
            || request.role_arn.is_empty()
        {
            return Err(CloudCtlError::Unsupported {
                message: "login requires a source, a profile name, and a role ARN".to_string(),
            });
        }

        let region = self.region_for(request.region.as_deref().unwrap_or(""));
        let duration = clamp_role_duration(request.duration_seconds);

        let source = resolve_source(&self.store, &request.source_profile, Some(secret))?;
        let mut credentials = source.credentials();

        if let Some(mfa_arn) = request.mfa_arn.as_deref().filter(|arn| !arn.is_empty()) {
            if source.is_external() {
                let code = prompt.mfa_code(mfa_arn)?;
                let token = self
                    .sts
                    .get_session_token(
                        &credentials,
                        &SessionTokenRequest {
                            duration_seconds: DEFAULT_ROLE_DURATION_SECS,
                            serial_number: mfa_arn.to_string(),
                            token_code: code,
                            region: region.clone(),
                        },
                    )
                    .await?;
                credentials = SourceCredentials::Stored {
                    access_key: token.access_key,
                    secret_key: token.secret_key,
                    session_token: token.session_token,
                };
            } else {
                debug!(
                    source = %request.source_profile,
                    "source is a stored session, skipping the MFA step"
                );
            }
        }

        let issued = self
            .sts
            .assume_role(
                &credentials,
                &AssumeRoleRequest {
                    role_arn: request.role_arn.clone(),
                    session_name: request.profile.clone(),
                    duration_seconds: duration,
                    region: region.clone(),
                    mfa: None,
                },
            )
            .await?;

        let session = Session {
            profile: request.profile.clone(),
            access_key: issued.access_key,
            secret_key: issued.secret_key,
            session_token: issued.session_token,
            expiration: issued.expiration,
            kind: SessionKind::RoleAssumed,
            role_arn: request.role_arn.clone(),
            source_profile: request.source_profile.clone(),
            region,
            mfa_arn: request.mfa_arn.clone().unwrap_or_default(),
            duration_seconds: duration,
            revoked: false,
        };
        self.store.save(&session, secret)?;
        info!(profile = %session.profile, "role session stored");
        Ok(session)
    }

    /// Obtain and persist an MFA base session for later role chaining.
    pub async fn mfa_login(
        &self,
        request: &MfaLoginRequest,
        secret: &Secret,
        prompt: &dyn UserPrompt,
    ) -> Result<Session, CloudCtlError> {
        if request.source_profile.is_empty()
            || request.profile.is_empty()
            || request.mfa_arn.is_empty()
        {
            return Err(CloudCtlError::Unsupported {
                message: "mfa-login requires a source, a profile name, and an MFA device ARN"
                    .to_string(),
            });
        }

        let region = self.defaults.region.clone();
        let duration = clamp_mfa_duration(request.duration_seconds);

        let source = resolve_source(&self.store, &request.source_profile, Some(secret))?;
        let code = prompt.mfa_code(&request.mfa_arn)?;

        let issued = self
            .sts
            .get_session_token(
                &source.credentials(),
                &SessionTokenRequest {
                    duration_seconds: duration,
                    serial_number: request.mfa_arn.clone(),
                    token_code: code,
                    region: region.clone(),
                },
            )
            .await?;

        let session = Session {
            profile: request.profile.clone(),
            access_key: issued.access_key,
            secret_key: issued.secret_key,
            session_token: issued.session_token,
            expiration: issued.expiration,
            kind: SessionKind::MfaBase,
            role_arn: String::new(),
            source_profile: request.source_profile.clone(),
            region,
            mfa_arn: request.mfa_arn.clone(),
            duration_seconds: duration,
            revoked: false,
        };
        self.store.save(&session, secret)?;
        info!(profile = %session.profile, "MFA session stored");
        Ok(session)
    }

    /// Re-run the original acquisition path using only stored metadata.
    ///
    /// Fails without side effects when the session is an MFA base session,
    /// has no source, or its stored source has itself expired.
    pub async fn silent_refresh(
        &self,
        current: &Session,
        secret: &Secret,
    ) -> Result<Session, CloudCtlError> {
        if current.kind == SessionKind::MfaBase {
            return Err(CloudCtlError::NotRefreshable {
                profile: current.profile.clone(),
                reason: "MFA sessions require a new token code".to_string(),
            });
        }
        if current.source_profile.is_empty() {
            return Err(CloudCtlError::NotRefreshable {
                profile: current.profile.clone(),
                reason: "no source profile stored".to_string(),
            });
        }

        let source = resolve_source(&self.store, &current.source_profile, Some(secret))?;
        if let ResolvedSource::Stored(stored) = &source {
            if stored.is_expired(Utc::now()) {
                return Err(CloudCtlError::SessionExpired {
                    profile: stored.profile.clone(),
                });
            }
        }

        let duration = clamp_role_duration(Some(current.duration_seconds));
        let region = self.region_for(&current.region);

        let issued = self
            .sts
            .assume_role(
                &source.credentials(),
                &AssumeRoleRequest {
                    role_arn: current.role_arn.clone(),
                    session_name: current.profile.clone(),
                    duration_seconds: duration,
                    region: region.clone(),
                    mfa: None,
                },
            )
            .await?;

        let refreshed = Session {
            access_key: issued.access_key,
            secret_key: issued.secret_key,
            session_token: issued.session_token,
            expiration: issued.expiration,
            region,
            ..current.clone()
        };
        self.store.save(&refreshed, secret)?;
        debug!(profile = %refreshed.profile, "silent refresh complete");
        Ok(refreshed)
    }

    /// Smart single-session refresh.
    ///
    /// A still-valid role session with a source is refreshed silently;
    /// everything else (or `force`) goes through interactive restore. A
    /// failed silent attempt is not fatal: the engine falls through to the
    /// interactive path and reports the silent error as context.
    pub async fn refresh(
        &self,
        profile: &str,
        secret: &Secret,
        force: bool,
        prompt: &dyn UserPrompt,
    ) -> Result<RefreshOutcome, CloudCtlError> {
        let current = self.store.load(profile, secret)?;
        let now = Utc::now();
        let mut silent_error = None;

        if !current.is_expired(now)
            && !force
            && current.kind == SessionKind::RoleAssumed
            && !current.source_profile.is_empty()
        {
            match self.silent_refresh(&current, secret).await {
                Ok(session) => return Ok(RefreshOutcome::Silent(session)),
                Err(e) => {
                    warn!(profile, error = %e, "silent refresh failed, switching to restore");
                    silent_error = Some(e.to_string());
                }
            }
        }

        let session = self.restore(&current, secret, prompt).await?;
        Ok(RefreshOutcome::Restored {
            session,
            silent_error,
        })
    }

    /// Interactive restore: reacquire with the stored metadata, prompting
    /// for an MFA code where the original acquisition used one.
    async fn restore(
        &self,
        current: &Session,
        secret: &Secret,
        prompt: &dyn UserPrompt,
    ) -> Result<Session, CloudCtlError> {
        let region = self.region_for(&current.region);
        let duration = clamp_role_duration(Some(current.duration_seconds));
        let source = resolve_source(&self.store, &current.source_profile, Some(secret))?;
        let credentials = source.credentials();

        let issued = match current.kind {
            SessionKind::MfaBase => {
                let code = prompt.mfa_code(&current.mfa_arn)?;
                self.sts
                    .get_session_token(
                        &credentials,
                        &SessionTokenRequest {
                            duration_seconds: duration,
                            serial_number: current.mfa_arn.clone(),
                            token_code: code,
                            region: region.clone(),
                        },
                    )
                    .await?
            }
            SessionKind::RoleAssumed => {
                let mfa = if current.mfa_arn.is_empty() {
                    None
                } else {
                    Some(MfaChallenge {
                        serial_number: current.mfa_arn.clone(),
                        token_code: prompt.mfa_code(&current.mfa_arn)?,
                    })
                };
                self.sts
                    .assume_role(
                        &credentials,
                        &AssumeRoleRequest {
                            role_arn: current.role_arn.clone(),
                            session_name: current.profile.clone(),
                            duration_seconds: duration,
                            region: region.clone(),
                            mfa,
                        },
                    )
                    .await?
            }
        };

        let restored = Session {
            access_key: issued.access_key,
            secret_key: issued.secret_key,
            session_token: issued.session_token,
            expiration: issued.expiration,
            region,
            duration_seconds: duration,
            ..current.clone()
        };
        self.store.save(&restored, secret)?;
        info!(profile = %restored.profile, "session restored");
        Ok(restored)
    }

    /// Intelligent batch refresh.
    ///
    /// MFA sessions are handled first since role sessions chain off them.
    /// The planner asks at most one question per distinct source session;
    /// the answer is memoized, so a declined source silently skips every
    /// dependent role.
    pub async fn refresh_all(
        &self,
        secret: &Secret,
        prompt: &dyn UserPrompt,
    ) -> Result<BatchSummary, CloudCtlError> {
        let mut sessions = self.store.list_all(secret)?;
        let mut summary = BatchSummary::default();
        if sessions.is_empty() {
            return Ok(summary);
        }

        sessions.sort_by_key(|s| s.kind != SessionKind::MfaBase);

        let now = Utc::now();
        let mut source_decisions: HashMap<String, bool> = HashMap::new();

        for session in &sessions {
            if session.kind == SessionKind::MfaBase {
                if !session.is_expired(now) {
                    info!(profile = %session.profile, "MFA session still active");
                    continue;
                }

                let restore = prompt.confirm(&format!(
                    "MFA session '{}' has expired. Restore it now?",
                    session.profile
                ))?;
                source_decisions.insert(session.profile.clone(), restore);
                if restore {
                    match self.restore(session, secret, prompt).await {
                        Ok(_) => summary.refreshed += 1,
                        Err(e) => {
                            warn!(profile = %session.profile, error = %e, "restore failed");
                            summary.failed += 1;
                        }
                    }
                } else {
                    info!(profile = %session.profile, "skipped at user request");
                    summary.skipped += 1;
                }
                continue;
            }

            let silent_err = match self.silent_refresh(session, secret).await {
                Ok(_) => {
                    info!(profile = %session.profile, "refreshed silently");
                    summary.refreshed += 1;
                    continue;
                }
                Err(e) => e,
            };

            // The usual cause of an expired role session is an expired
            // stored source. Offer to restore the source once, then retry
            // every dependent role silently.
            if session.is_expired(now) && !session.source_profile.is_empty() {
                if let Ok(source) = self.store.load(&session.source_profile, secret) {
                    if source.is_expired(now)
                        && !source_decisions.contains_key(&session.source_profile)
                    {
                        let restore = prompt.confirm(&format!(
                            "'{}' needs source '{}', which has expired. Restore the source?",
                            session.profile, session.source_profile
                        ))?;
                        source_decisions.insert(session.source_profile.clone(), restore);

                        if restore {
                            if let Err(e) = self.restore(&source, secret, prompt).await {
                                warn!(
                                    profile = %source.profile,
                                    error = %e,
                                    "source restore failed"
                                );
                            }
                            match self.silent_refresh(session, secret).await {
                                Ok(_) => summary.refreshed += 1,
                                Err(e) => {
                                    warn!(
                                        profile = %session.profile,
                                        error = %e,
                                        "refresh failed after source restore"
                                    );
                                    summary.failed += 1;
                                }
                            }
                        } else {
                            summary.skipped += 1;
                        }
                        continue;
                    }
                }
            }

            if session.is_expired(now) {
                info!(profile = %session.profile, "skipping, needs manual refresh");
                summary.skipped += 1;
            } else {
                warn!(profile = %session.profile, error = %silent_err, "refresh failed");
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    /// Remove a single record. Requires no secret.
    pub fn logout(&self, profile: &str) -> Result<(), CloudCtlError> {
        self.store.remove(profile)
    }

    /// Remove the whole envelope. Requires no secret; the caller confirms.
    pub fn clear_all(&self) -> Result<(), CloudCtlError> {
        self.store.clear_all()
    }

    fn region_for(&self, candidate: &str) -> String {
        if candidate.is_empty() {
            self.defaults.region.clone()
        } else {
            candidate.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sts::StsCredentials;
    use async_trait::async_trait;
    use chrono::Duration;
    use tempfile::TempDir;

    struct StaticSts;

    #[async_trait]
    impl StsClient for StaticSts {
        async fn assume_role(
            &self,
            _source: &SourceCredentials,
            request: &AssumeRoleRequest,
        ) -> Result<StsCredentials, CloudCtlError> {
            Ok(StsCredentials {
                access_key: "ASIANEW".to_string(),
                secret_key: "new-secret".to_string(),
                session_token: "new-token".to_string(),
                expiration: Utc::now() + Duration::seconds(request.duration_seconds.into()),
            })
        }

        async fn get_session_token(
            &self,
            _source: &SourceCredentials,
            request: &SessionTokenRequest,
        ) -> Result<StsCredentials, CloudCtlError> {
            Ok(StsCredentials {
                access_key: "ASIAMFA".to_string(),
                secret_key: "mfa-secret".to_string(),
                session_token: "mfa-token".to_string(),
                expiration: Utc::now() + Duration::seconds(request.duration_seconds.into()),
            })
        }
    }

    /// Prompt that refuses everything; verbs under test must not interact.
    struct Unprompted;

    impl UserPrompt for Unprompted {
        fn mfa_code(&self, _mfa_arn: &str) -> Result<String, CloudCtlError> {
            Err(CloudCtlError::Cancelled)
        }

        fn confirm(&self, _message: &str) -> Result<bool, CloudCtlError> {
            Err(CloudCtlError::Cancelled)
        }
    }

    fn test_engine() -> (SessionEngine<StaticSts>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("credentials.json"));
        (SessionEngine::new(store, StaticSts, Defaults::default()), dir)
    }

    fn test_secret() -> Secret {
        Secret::new("1234567890ABCDEF1234567890ABCDEF")
    }

    fn stored(profile: &str, kind: SessionKind, expires_in_minutes: i64) -> Session {
        Session {
            profile: profile.to_string(),
            access_key: "AKIASTORED".to_string(),
            secret_key: "sk".to_string(),
            session_token: "st".to_string(),
            expiration: Utc::now() + Duration::minutes(expires_in_minutes),
            kind,
            role_arn: match kind {
                SessionKind::MfaBase => String::new(),
                SessionKind::RoleAssumed => "arn:aws:iam::123:role/R".to_string(),
            },
            source_profile: "default".to_string(),
            region: String::new(),
            mfa_arn: String::new(),
            duration_seconds: 0,
            revoked: false,
        }
    }

    #[tokio::test]
    async fn login_rejects_missing_inputs() {
        let (engine, _dir) = test_engine();
        let request = LoginRequest {
            source_profile: String::new(),
            profile: "p".to_string(),
            role_arn: "arn:aws:iam::123:role/R".to_string(),
            mfa_arn: None,
            region: None,
            duration_seconds: None,
        };

        let result = engine.login(&request, &test_secret(), &Unprompted).await;
        assert!(matches!(result, Err(CloudCtlError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn login_applies_region_and_duration_defaults() {
        let (engine, _dir) = test_engine();
        let secret = test_secret();
        let request = LoginRequest {
            source_profile: "corp".to_string(),
            profile: "p".to_string(),
            role_arn: "arn:aws:iam::123:role/R".to_string(),
            mfa_arn: None,
            region: None,
            duration_seconds: None,
        };

        let session = engine.login(&request, &secret, &Unprompted).await.unwrap();
        assert_eq!(session.region, crate::config::DEFAULT_REGION);
        assert_eq!(session.duration_seconds, DEFAULT_ROLE_DURATION_SECS);
    }

    #[tokio::test]
    async fn silent_refresh_requires_a_live_stored_source() {
        let (engine, _dir) = test_engine();
        let secret = test_secret();

        let mut source = stored("src", SessionKind::MfaBase, -5);
        source.mfa_arn = "arn:aws:iam::123:mfa/u".to_string();
        engine.store.save(&source, &secret).unwrap();

        let mut role = stored("role", SessionKind::RoleAssumed, 30);
        role.source_profile = "src".to_string();
        engine.store.save(&role, &secret).unwrap();

        let result = engine.silent_refresh(&role, &secret).await;
        assert!(matches!(
            result,
            Err(CloudCtlError::SessionExpired { ref profile }) if profile == "src"
        ));
    }

    #[tokio::test]
    async fn refresh_of_unknown_profile_is_not_found() {
        let (engine, _dir) = test_engine();
        let result = engine
            .refresh("ghost", &test_secret(), false, &Unprompted)
            .await;
        assert!(matches!(result, Err(CloudCtlError::ProfileNotFound { .. })));
    }

    #[tokio::test]
    async fn batch_refresh_of_an_empty_store_is_a_noop() {
        let (engine, _dir) = test_engine();
        let summary = engine
            .refresh_all(&test_secret(), &Unprompted)
            .await
            .unwrap();
        assert_eq!(summary, BatchSummary::default());
    }
}
