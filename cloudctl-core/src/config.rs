//! On-disk locations and operational defaults.
//!
//! Everything the core touches on disk hangs off two values threaded
//! through construction, so tests can redirect the storage root instead of
//! fighting process-wide globals.

use std::path::{Path, PathBuf};

use crate::error::CloudCtlError;

/// Default region applied when neither the request nor the stored session
/// carries one.
pub const DEFAULT_REGION: &str = "ap-southeast-1";

/// Default validity for role sessions, in seconds.
pub const DEFAULT_ROLE_DURATION_SECS: i32 = 3600;

/// Default validity for MFA base sessions (12 hours).
pub const DEFAULT_MFA_DURATION_SECS: i32 = 43200;

/// STS floor for any session duration.
pub const MIN_DURATION_SECS: i32 = 900;

/// STS ceiling for `GetSessionToken` (36 hours).
pub const MAX_MFA_DURATION_SECS: i32 = 129600;

/// Resolved filesystem layout.
///
/// The CloudCtl root defaults to `$HOME/.cloudctl` and the shared AWS
/// credentials file to `$HOME/.aws/credentials`.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
    aws_credentials: PathBuf,
}

impl Paths {
    /// Resolve the standard layout from the user's home directory.
    pub fn resolve() -> Result<Self, CloudCtlError> {
        let home = dirs::home_dir().ok_or_else(|| CloudCtlError::Unsupported {
            message: "could not determine home directory".to_string(),
        })?;
        Ok(Self {
            root: home.join(".cloudctl"),
            aws_credentials: home.join(".aws").join("credentials"),
        })
    }

    /// Build a layout rooted elsewhere. Used by tests and by anything that
    /// needs a sandboxed store.
    pub fn with_root(root: impl Into<PathBuf>, aws_credentials: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            aws_credentials: aws_credentials.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Encrypted session envelope.
    pub fn credentials(&self) -> PathBuf {
        self.root.join("credentials.json")
    }

    /// MFA device alias store (plain JSON).
    pub fn mfa_aliases(&self) -> PathBuf {
        self.root.join("mfa.json")
    }

    /// IAM role alias store (plain JSON).
    pub fn role_aliases(&self) -> PathBuf {
        self.root.join("roles.json")
    }

    /// Release-check cache.
    pub fn version_check(&self) -> PathBuf {
        self.root.join("version_check.json")
    }

    pub fn daemon_pid(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.root.join("daemon.log")
    }

    pub fn daemon_stdout(&self) -> PathBuf {
        self.root.join("daemon.stdout.log")
    }

    pub fn daemon_stderr(&self) -> PathBuf {
        self.root.join("daemon.stderr.log")
    }

    /// The shared AWS credentials file co-owned with other tooling.
    pub fn aws_credentials(&self) -> &Path {
        &self.aws_credentials
    }
}

/// Operational defaults threaded into the engine.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub region: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
        }
    }
}

/// Clamp a requested role-session duration: floor 900, default 3600.
pub fn clamp_role_duration(requested: Option<i32>) -> i32 {
    match requested {
        Some(d) if d >= MIN_DURATION_SECS => d,
        _ => DEFAULT_ROLE_DURATION_SECS,
    }
}

/// Clamp a requested MFA-session duration: floor 900, ceiling 36 hours,
/// default 12 hours.
pub fn clamp_mfa_duration(requested: Option<i32>) -> i32 {
    match requested {
        Some(d) if d >= MIN_DURATION_SECS => d.min(MAX_MFA_DURATION_SECS),
        _ => DEFAULT_MFA_DURATION_SECS,
    }
}
