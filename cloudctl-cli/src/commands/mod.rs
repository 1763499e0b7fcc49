//! Command implementations.
//!
//! Each module parses its inputs, resolves anything missing interactively,
//! calls exactly one engine verb, and renders the outcome. Policy lives in
//! the engine, not here.

use std::collections::BTreeSet;

use anyhow::Result;
use cloudctl_core::{
    AwsStsClient, CloudCtlError, Defaults, Paths, Secret, SecretProvider, SessionEngine,
    SessionStore,
};

use crate::ui;

pub mod console;
pub mod daemon;
pub mod init;
pub mod list;
pub mod login;
pub mod logout;
pub mod mfa;
pub mod mfa_login;
pub mod prompt;
pub mod refresh;
pub mod role;
pub mod secret;
pub mod status;
pub mod switch;
pub mod sync;

pub(crate) fn paths() -> Result<Paths> {
    Ok(Paths::resolve()?)
}

pub(crate) fn engine(paths: &Paths) -> SessionEngine<AwsStsClient> {
    SessionEngine::new(
        SessionStore::new(paths.credentials()),
        AwsStsClient::new(),
        Defaults::default(),
    )
}

/// Resolve the master secret; on a supported platform with nothing
/// configured, offer to provision one in the keystore.
pub(crate) fn resolve_secret(flag: Option<&str>) -> Result<Secret> {
    match SecretProvider::resolve(flag) {
        Ok(secret) => Ok(secret),
        Err(CloudCtlError::NoSecretAvailable) if SecretProvider::keystore_supported() => {
            eprintln!("No encryption secret found.");
            if ui::confirm("Generate a secure key and store it in your system keystore?")
                .unwrap_or(false)
            {
                let secret = SecretProvider::provision()?;
                eprintln!("Secure key generated and stored in the keystore.");
                return Ok(secret);
            }
            Err(secret_hint(CloudCtlError::NoSecretAvailable))
        }
        Err(e) => Err(secret_hint(e)),
    }
}

/// Like [`resolve_secret`] but never interactive. Used by verbs whose
/// stdout is machine-consumed.
pub(crate) fn resolve_secret_quiet(flag: Option<&str>) -> Result<Secret> {
    SecretProvider::resolve(flag).map_err(secret_hint)
}

fn secret_hint(err: CloudCtlError) -> anyhow::Error {
    anyhow::anyhow!(
        "{err}\n\nSet the secret or use the system keystore:\n   \
         export CLOUDCTL_SECRET=\"your-32-char-encryption-key\"\n   \
         cloudctl secret import <key>"
    )
}

/// Profiles defined in the external AWS shared configuration.
///
/// Section headers from `~/.aws/credentials` plus `[profile x]` entries
/// from `~/.aws/config`, deduplicated and sorted.
pub(crate) fn aws_profiles() -> Vec<String> {
    let mut profiles = BTreeSet::new();
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    if let Ok(data) = std::fs::read_to_string(home.join(".aws").join("credentials")) {
        for line in data.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                profiles.insert(name.to_string());
            }
        }
    }

    if let Ok(data) = std::fs::read_to_string(home.join(".aws").join("config")) {
        for line in data.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.strip_prefix("profile ").unwrap_or(name);
                if !name.contains(' ') {
                    profiles.insert(name.to_string());
                }
            }
        }
    }

    profiles.into_iter().collect()
}

/// Format a remaining duration as `1h23m` / `23m`.
pub(crate) fn format_remaining(remaining: chrono::Duration) -> String {
    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}
