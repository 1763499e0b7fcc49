//! STS gateway: role assumption and MFA session tokens.
//!
//! [`StsClient`] abstracts the upstream service so the engine and its tests
//! never touch the network directly. [`AwsStsClient`] is the production
//! implementation on the AWS SDK.
//!
//! A session's `source_profile` names either another stored session or a
//! profile in the external AWS shared configuration. [`resolve_source`]
//! settles that once, stored-session-first, and hands everything downstream
//! a uniform [`SourceCredentials`] value; the stored-first order is what
//! makes an MFA session usable as the source for role chaining.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::config::Credentials;
use aws_sdk_sts::error::{ProvideErrorMetadata, SdkError};
use chrono::{DateTime, Utc};

use crate::error::CloudCtlError;
use crate::model::{Secret, Session};
use crate::store::SessionStore;

/// A static credential triple plus its absolute expiration, as returned by
/// STS.
#[derive(Debug, Clone)]
pub struct StsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

/// Credentials used to sign an STS request.
#[derive(Debug, Clone)]
pub enum SourceCredentials {
    /// A static triple taken from a stored session (or from a just-issued
    /// `GetSessionToken` response during MFA chaining).
    Stored {
        access_key: String,
        secret_key: String,
        session_token: String,
    },

    /// A profile resolved by the SDK's shared-config machinery.
    External { profile: String },
}

/// Outcome of source resolution, keeping the stored session visible so the
/// engine can check its expiration before a silent refresh.
#[derive(Debug, Clone)]
pub enum ResolvedSource {
    Stored(Session),
    External(String),
}

impl ResolvedSource {
    pub fn credentials(&self) -> SourceCredentials {
        match self {
            ResolvedSource::Stored(session) => SourceCredentials::Stored {
                access_key: session.access_key.clone(),
                secret_key: session.secret_key.clone(),
                session_token: session.session_token.clone(),
            },
            ResolvedSource::External(profile) => SourceCredentials::External {
                profile: profile.clone(),
            },
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ResolvedSource::External(_))
    }
}

/// Resolve `source_profile` against the session store first, falling back
/// to the external shared configuration only when no stored record exists.
pub fn resolve_source(
    store: &SessionStore,
    source_profile: &str,
    secret: Option<&Secret>,
) -> Result<ResolvedSource, CloudCtlError> {
    if source_profile.is_empty() {
        return Err(CloudCtlError::SourceUnresolvable {
            source_name: source_profile.to_string(),
        });
    }

    if let Some(secret) = secret {
        match store.load(source_profile, secret) {
            Ok(session) => return Ok(ResolvedSource::Stored(session)),
            Err(CloudCtlError::ProfileNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(ResolvedSource::External(source_profile.to_string()))
}

/// An MFA serial number paired with a one-time code.
#[derive(Debug, Clone)]
pub struct MfaChallenge {
    pub serial_number: String,
    pub token_code: String,
}

/// Parameters for `AssumeRole`.
///
/// `session_name` is always the target record's profile, never a random
/// name, so the name is stable across refreshes and recognizable in
/// CloudTrail.
#[derive(Debug, Clone)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub session_name: String,
    pub duration_seconds: i32,
    pub region: String,
    pub mfa: Option<MfaChallenge>,
}

/// Parameters for `GetSessionToken`.
#[derive(Debug, Clone)]
pub struct SessionTokenRequest {
    pub duration_seconds: i32,
    pub serial_number: String,
    pub token_code: String,
    pub region: String,
}

/// Abstraction over the upstream STS service.
#[async_trait]
pub trait StsClient: Send + Sync {
    async fn assume_role(
        &self,
        source: &SourceCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<StsCredentials, CloudCtlError>;

    async fn get_session_token(
        &self,
        source: &SourceCredentials,
        request: &SessionTokenRequest,
    ) -> Result<StsCredentials, CloudCtlError>;
}

/// Production STS client on the AWS SDK.
#[derive(Debug, Default)]
pub struct AwsStsClient;

impl AwsStsClient {
    pub fn new() -> Self {
        Self
    }

    async fn client(&self, source: &SourceCredentials, region: &str) -> aws_sdk_sts::Client {
        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()));
        let config = match source {
            SourceCredentials::Stored {
                access_key,
                secret_key,
                session_token,
            } => {
                let token = if session_token.is_empty() {
                    None
                } else {
                    Some(session_token.clone())
                };
                loader
                    .credentials_provider(Credentials::new(
                        access_key.clone(),
                        secret_key.clone(),
                        token,
                        None,
                        "cloudctl",
                    ))
                    .load()
                    .await
            }
            SourceCredentials::External { profile } => {
                loader.profile_name(profile).load().await
            }
        };
        aws_sdk_sts::Client::new(&config)
    }
}

#[async_trait]
impl StsClient for AwsStsClient {
    async fn assume_role(
        &self,
        source: &SourceCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<StsCredentials, CloudCtlError> {
        let client = self.client(source, &request.region).await;

        let mut call = client
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.session_name)
            .duration_seconds(request.duration_seconds);
        if let Some(mfa) = &request.mfa {
            call = call
                .serial_number(&mfa.serial_number)
                .token_code(&mfa.token_code);
        }

        let output = call.send().await.map_err(|e| map_sdk_error(source, e))?;
        convert_credentials(output.credentials())
    }

    async fn get_session_token(
        &self,
        source: &SourceCredentials,
        request: &SessionTokenRequest,
    ) -> Result<StsCredentials, CloudCtlError> {
        let client = self.client(source, &request.region).await;

        let output = client
            .get_session_token()
            .duration_seconds(request.duration_seconds)
            .serial_number(&request.serial_number)
            .token_code(&request.token_code)
            .send()
            .await
            .map_err(|e| map_sdk_error(source, e))?;
        convert_credentials(output.credentials())
    }
}

fn convert_credentials(
    credentials: Option<&aws_sdk_sts::types::Credentials>,
) -> Result<StsCredentials, CloudCtlError> {
    let credentials = credentials.ok_or_else(|| CloudCtlError::Sts {
        message: "response carried no credentials".to_string(),
    })?;

    let expiration = credentials.expiration();
    let expiration = DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
        .ok_or_else(|| CloudCtlError::Sts {
            message: "response carried an invalid expiration".to_string(),
        })?;

    Ok(StsCredentials {
        access_key: credentials.access_key_id().to_string(),
        secret_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration,
    })
}

fn map_sdk_error<E>(source: &SourceCredentials, err: SdkError<E>) -> CloudCtlError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = err
        .meta()
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());

    if message.contains("MultiFactorAuthentication") || message.contains("MFA") {
        return CloudCtlError::MfaRejected { message };
    }

    // A construction failure means the SDK never produced signable
    // credentials, which for an external profile is "no such profile".
    if let (SdkError::ConstructionFailure(_), SourceCredentials::External { profile }) =
        (&err, source)
    {
        return CloudCtlError::SourceUnresolvable {
            source_name: profile.clone(),
        };
    }

    CloudCtlError::Sts { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionKind;
    use tempfile::TempDir;

    fn stored_session(profile: &str) -> Session {
        Session {
            profile: profile.to_string(),
            access_key: "AKIASRC".to_string(),
            secret_key: "srcsecret".to_string(),
            session_token: "srctoken".to_string(),
            expiration: Utc::now() + chrono::Duration::hours(4),
            kind: SessionKind::MfaBase,
            role_arn: String::new(),
            source_profile: "default".to_string(),
            region: "ap-southeast-1".to_string(),
            mfa_arn: "arn:aws:iam::123:mfa/user".to_string(),
            duration_seconds: 43200,
            revoked: false,
        }
    }

    #[test]
    fn stored_session_wins_over_external() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("credentials.json"));
        let secret = Secret::new("k");
        store.save(&stored_session("mfa"), &secret).unwrap();

        let resolved = resolve_source(&store, "mfa", Some(&secret)).unwrap();
        assert!(matches!(resolved, ResolvedSource::Stored(_)));
        assert!(matches!(
            resolved.credentials(),
            SourceCredentials::Stored { .. }
        ));
    }

    #[test]
    fn unknown_profile_falls_back_to_external() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("credentials.json"));
        let secret = Secret::new("k");

        let resolved = resolve_source(&store, "corp-dev", Some(&secret)).unwrap();
        assert!(matches!(resolved, ResolvedSource::External(ref p) if p == "corp-dev"));
    }

    #[test]
    fn no_secret_means_external() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("credentials.json"));

        let resolved = resolve_source(&store, "default", None).unwrap();
        assert!(resolved.is_external());
    }

    #[test]
    fn empty_source_is_unresolvable() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("credentials.json"));

        let result = resolve_source(&store, "", None);
        assert!(matches!(
            result,
            Err(CloudCtlError::SourceUnresolvable { .. })
        ));
    }
}
