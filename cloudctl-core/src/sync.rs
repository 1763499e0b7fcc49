//! Shared AWS credentials file synchronizer.
//!
//! Rewrites `~/.aws/credentials` so every target session appears as an
//! INI-style profile section, without disturbing sections owned by other
//! tooling. Ownership is recorded with a machine-readable comment directly
//! above each written section:
//!
//! ```ini
//! ; Managed by cloudctl (Role Session) - Expires: 2025-11-20 17:30:00
//! [prod-admin]
//! aws_access_key_id = ...
//! aws_secret_access_key = ...
//! aws_session_token = ...
//! ```
//!
//! The rewrite drops target sections and their ownership comments, keeps
//! every other line verbatim, and appends fresh blocks at the end. Expired
//! sessions are filtered out before writing.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local, Utc};

use crate::error::CloudCtlError;
use crate::model::{Session, SessionKind};

/// Prefix marking a section as CloudCtl-owned.
pub const MANAGED_TAG: &str = "; Managed by cloudctl";

/// Rewrite the credentials file with the given sessions.
///
/// Returns the number of sections written. Sessions already expired at
/// `now` are dropped; an empty target set leaves the file untouched.
pub fn sync_sessions(
    path: &Path,
    sessions: &[Session],
    now: DateTime<Utc>,
) -> Result<usize, CloudCtlError> {
    let active: Vec<&Session> = sessions.iter().filter(|s| !s.is_expired(now)).collect();
    if active.is_empty() {
        return Ok(0);
    }

    let targets: HashSet<&str> = active.iter().map(|s| s.profile.as_str()).collect();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let lines: Vec<&str> = content.split('\n').collect();

    let mut kept: Vec<String> = Vec::new();
    let mut skip_section = false;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if let Some(name) = section_name(trimmed) {
            skip_section = targets.contains(name);
        }

        if trimmed.starts_with(MANAGED_TAG) {
            // The comment belongs to the next section header, past any
            // blank or comment lines. With no header after it, the comment
            // is an orphan and is dropped.
            let owner = lines[i + 1..].iter().find_map(|next| {
                let t = next.trim();
                if t.is_empty() || t.starts_with(';') {
                    None
                } else {
                    Some(section_name(t))
                }
            });
            match owner {
                Some(Some(name)) if targets.contains(name) => continue,
                None => continue,
                _ => {}
            }
        }

        if !skip_section {
            kept.push(line.to_string());
        }
    }

    while kept.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        kept.pop();
    }
    if !kept.is_empty() {
        kept.push(String::new());
    }

    let mut written = 0;
    for session in &active {
        let session_type = match session.kind {
            SessionKind::MfaBase => "MFA Session",
            SessionKind::RoleAssumed => "Role Session",
        };
        let expires = session
            .expiration
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S");

        kept.push(format!("{MANAGED_TAG} ({session_type}) - Expires: {expires}"));
        kept.push(format!("[{}]", session.profile));
        kept.push(format!("aws_access_key_id = {}", session.access_key));
        kept.push(format!("aws_secret_access_key = {}", session.secret_key));
        kept.push(format!("aws_session_token = {}", session.session_token));
        kept.push(String::new());
        written += 1;
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = open_private(path)?;
    file.write_all(kept.join("\n").as_bytes())?;
    file.sync_all()?;

    Ok(written)
}

fn section_name(trimmed: &str) -> Option<&str> {
    trimmed.strip_prefix('[')?.strip_suffix(']')
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
