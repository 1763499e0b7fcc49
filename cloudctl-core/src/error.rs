//! Top-level error type for CloudCtl.

use std::path::PathBuf;

use thiserror::Error;

/// Error type covering every failure the core can surface.
#[derive(Debug, Error)]
pub enum CloudCtlError {
    /// No secret was found in the flag, the environment, or the OS keystore.
    #[error("no encryption secret available")]
    NoSecretAvailable,

    /// AEAD verification failed or the ciphertext is too short to contain a
    /// nonce. The two cases are deliberately indistinguishable.
    #[error("invalid secret or corrupt ciphertext")]
    InvalidSecretOrCorruptCiphertext,

    /// The credentials envelope is not valid JSON.
    #[error("credentials store at {path} is corrupt; refusing to touch it")]
    CorruptStoreFile { path: PathBuf },

    /// The profile key is absent from the envelope.
    #[error("profile '{profile}' not found")]
    ProfileNotFound { profile: String },

    /// The alias is absent from the alias store.
    #[error("alias '{name}' not found")]
    AliasNotFound { name: String },

    /// Neither a stored session nor an external AWS profile matched.
    #[error("cannot resolve credentials for source '{source_name}'")]
    SourceUnresolvable { source_name: String },

    /// The operation requires a live session.
    #[error("session '{profile}' has expired")]
    SessionExpired { profile: String },

    /// The session cannot be silently refreshed.
    #[error("session '{profile}' cannot be silently refreshed: {reason}")]
    NotRefreshable { profile: String, reason: String },

    /// STS rejected the MFA token code.
    #[error("MFA authentication failed: {message}")]
    MfaRejected { message: String },

    /// Any other STS failure, carrying the service message.
    #[error("STS error: {message}")]
    Sts { message: String },

    /// The federation endpoint did not return a sign-in token.
    #[error("federation endpoint error: {message}")]
    Federation { message: String },

    /// The operation does not apply here (wrong session kind, unsupported
    /// platform, and similar).
    #[error("{message}")]
    Unsupported { message: String },

    /// The daemon PID file already exists.
    #[error("daemon is already running (or a stale PID file exists at {path})")]
    DaemonAlreadyRunning { path: PathBuf },

    /// The user cancelled an interactive prompt.
    #[error("cancelled")]
    Cancelled,

    /// I/O error reading or writing a store file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
