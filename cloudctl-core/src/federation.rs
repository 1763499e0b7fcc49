//! AWS console federation URL builder.
//!
//! Trades a role session's static credentials for a sign-in token at the
//! federation endpoint, then assembles the console login URL. MFA base
//! sessions and expired sessions are rejected before any network call.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::json;

use crate::error::CloudCtlError;
use crate::model::{Session, SessionKind};

/// The production federation endpoint.
pub const FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";

/// Bounded timeout for the sign-in token exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the federation endpoint.
pub struct FederationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FederationClient {
    pub fn new() -> Self {
        Self::with_endpoint(FEDERATION_ENDPOINT)
    }

    /// Point at a different endpoint. Used by tests.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    /// Build a console sign-in URL for a role session.
    ///
    /// `region` picks the region-specific console home; without one the
    /// global console is used.
    pub async fn console_url(
        &self,
        session: &Session,
        region: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, CloudCtlError> {
        if session.is_expired(now) {
            return Err(CloudCtlError::SessionExpired {
                profile: session.profile.clone(),
            });
        }
        if session.kind == SessionKind::MfaBase {
            return Err(CloudCtlError::Unsupported {
                message: "MFA base sessions cannot open the console; assume a role first"
                    .to_string(),
            });
        }

        let credentials = json!({
            "sessionId": session.access_key,
            "sessionKey": session.secret_key,
            "sessionToken": session.session_token,
        })
        .to_string();

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("Action", "getSigninToken"), ("Session", &credentials)])
            .send()
            .await
            .map_err(|e| CloudCtlError::Federation {
                message: format!("sign-in token request failed: {e}"),
            })?;

        let body: HashMap<String, String> =
            response.json().await.map_err(|e| CloudCtlError::Federation {
                message: format!("unexpected sign-in token response: {e}"),
            })?;

        let signin_token = body
            .get("SigninToken")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CloudCtlError::Federation {
                message: "no SigninToken in response".to_string(),
            })?;

        let destination = match region {
            Some(r) if !r.is_empty() => {
                format!("https://{r}.console.aws.amazon.com/console/home?region={r}")
            }
            _ => "https://console.aws.amazon.com/".to_string(),
        };

        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("Action", "login"),
                ("Issuer", "cloudctl"),
                ("Destination", destination.as_str()),
                ("SigninToken", signin_token.as_str()),
            ],
        )
        .map_err(|e| CloudCtlError::Federation {
            message: format!("could not assemble console URL: {e}"),
        })?;

        Ok(url.to_string())
    }
}

impl Default for FederationClient {
    fn default() -> Self {
        Self::new()
    }
}
