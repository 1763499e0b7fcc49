//! Domain model types for CloudCtl.
//!
//! This module defines the types shared across the core:
//! - [`Session`] - A stored AWS session with credentials and metadata
//! - [`SessionKind`] - Whether the session came from `AssumeRole` or
//!   `GetSessionToken`
//! - [`SessionState`] - Derived active/expiring/expired classification
//! - [`Secret`] - The master encryption secret, redacted in logs

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// On-disk sentinel marking a session produced by `GetSessionToken`.
///
/// Kept for compatibility with existing envelopes; in memory the
/// distinction lives in [`SessionKind`].
pub const MFA_SENTINEL: &str = "MFA-Session";

/// Sessions expiring within this window are classified [`SessionState::Expiring`]
/// and are picked up by the auto-refresh daemon.
pub const EXPIRING_WINDOW_MINUTES: i64 = 15;

/// How a session was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Obtained via `AssumeRole`; can open the console and be silently
    /// refreshed from its source.
    RoleAssumed,

    /// Obtained via `GetSessionToken`; usable as a chaining source but
    /// cannot open the console or refresh without a new MFA code.
    MfaBase,
}

/// Derived lifecycle state, orthogonal to [`SessionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// More than the expiring window remains.
    Active,

    /// Still valid but inside the expiring window.
    Expiring,

    /// Expiration is in the past.
    Expired,
}

/// A stored AWS session.
///
/// `profile` is the unique key in the store and doubles as the STS
/// `RoleSessionName`, so the name stays stable across refreshes and is
/// recognizable in CloudTrail.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Local alias for this session; unique key in the store.
    pub profile: String,

    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,

    pub kind: SessionKind,

    /// ARN of the assumed role; empty for MFA base sessions.
    pub role_arn: String,

    /// Credential origin: another stored session or an external AWS
    /// profile, by name. Empty means the session cannot be silently
    /// refreshed.
    pub source_profile: String,

    /// Region used at acquisition; reused verbatim at refresh.
    pub region: String,

    /// MFA device ARN used for authentication, if any.
    pub mfa_arn: String,

    /// Requested validity in seconds; 0 means the default was used.
    pub duration_seconds: i32,

    /// Manual invalidation marker; propagated but never silently unset.
    pub revoked: bool,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expiration - now
    }

    /// Classify the session relative to `now`.
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        let remaining = self.remaining(now);
        if remaining <= Duration::zero() {
            SessionState::Expired
        } else if remaining <= Duration::minutes(EXPIRING_WINDOW_MINUTES) {
            SessionState::Expiring
        } else {
            SessionState::Active
        }
    }

    /// The role ARN as stored in the envelope, with the MFA sentinel
    /// applied for base sessions.
    pub fn stored_role_arn(&self) -> &str {
        match self.kind {
            SessionKind::MfaBase => MFA_SENTINEL,
            SessionKind::RoleAssumed => &self.role_arn,
        }
    }

    /// Map an envelope role ARN back to the in-memory representation.
    pub fn kind_from_stored(role_arn: &str) -> (SessionKind, String) {
        if role_arn.is_empty() || role_arn == MFA_SENTINEL {
            (SessionKind::MfaBase, String::new())
        } else {
            (SessionKind::RoleAssumed, role_arn.to_string())
        }
    }
}

/// The master encryption secret.
///
/// The inner value is only reachable through [`expose()`](Secret::expose);
/// Debug and Display render `[REDACTED]` so the secret cannot leak into
/// logs or error messages.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value. Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}
