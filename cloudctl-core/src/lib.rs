//! # CloudCtl Core
//!
//! Core library for CloudCtl, a local credential manager and session
//! broker for AWS IAM role assumption.
//!
//! This crate provides:
//! - Authenticated at-rest storage of session records (per-field AES-GCM
//!   inside a JSON envelope)
//! - The session state machine: login, mfa-login, refresh, restore, logout
//! - Smart and batch refresh planning that amortizes one MFA prompt across
//!   dependent role sessions
//! - The shared AWS credentials file synchronizer
//! - The console federation URL builder
//! - The auto-refresh daemon supervisor
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use cloudctl_core::{
//!     config::{Defaults, Paths},
//!     engine::{LoginRequest, SessionEngine},
//!     secret::SecretProvider,
//!     store::SessionStore,
//!     sts::AwsStsClient,
//! };
//!
//! let paths = Paths::resolve()?;
//! let engine = SessionEngine::new(
//!     SessionStore::new(paths.credentials()),
//!     AwsStsClient::new(),
//!     Defaults::default(),
//! );
//! let secret = SecretProvider::resolve(None)?;
//! let session = engine.login(&request, &secret, &prompt).await?;
//! ```

pub mod config;
pub mod crypto;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod federation;
pub mod model;
pub mod secret;
pub mod store;
pub mod sts;
pub mod sync;

// Re-export commonly used types at crate root
pub use config::{Defaults, Paths};
pub use engine::{
    BatchSummary, LoginRequest, MfaLoginRequest, RefreshOutcome, SessionEngine, UserPrompt,
};
pub use error::CloudCtlError;
pub use model::{Secret, Session, SessionKind, SessionState};
pub use secret::SecretProvider;
pub use store::{AliasStore, SessionStore};
pub use sts::{AwsStsClient, StsClient};
