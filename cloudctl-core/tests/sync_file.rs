//! Integration tests for the shared credentials file synchronizer.
//!
//! The rewriter must own only the sections it previously tagged, keep every
//! foreign line byte-for-byte, and converge: syncing the same inputs twice
//! produces identical files.

use chrono::{Duration, Utc};
use cloudctl_core::model::{Session, SessionKind};
use cloudctl_core::sync::sync_sessions;
use tempfile::TempDir;

fn session(profile: &str, kind: SessionKind, expires_in_minutes: i64) -> Session {
    Session {
        profile: profile.to_string(),
        access_key: format!("AKIA{}", profile.to_uppercase()),
        secret_key: format!("secret-{profile}"),
        session_token: format!("token-{profile}"),
        expiration: Utc::now() + Duration::minutes(expires_in_minutes),
        kind,
        role_arn: match kind {
            SessionKind::MfaBase => String::new(),
            SessionKind::RoleAssumed => format!("arn:aws:iam::123:role/{profile}"),
        },
        source_profile: "default".to_string(),
        region: "ap-southeast-1".to_string(),
        mfa_arn: String::new(),
        duration_seconds: 3600,
        revoked: false,
    }
}

fn creds_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("aws").join("credentials")
}

#[test]
fn foreign_sections_survive_byte_for_byte() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let existing = "[legacy]\naws_access_key_id = AKLEGACY\n\n[other]\naws_access_key_id = AK2OTHER\n";
    std::fs::write(&path, existing).unwrap();

    let prod = session("prod", SessionKind::RoleAssumed, 60);
    let written = sync_sessions(&path, &[prod.clone()], Utc::now()).unwrap();
    assert_eq!(written, 1);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[legacy]\naws_access_key_id = AKLEGACY"));
    assert!(content.contains("[other]\naws_access_key_id = AK2OTHER"));
    assert!(content.contains("; Managed by cloudctl (Role Session) - Expires: "));
    assert!(content.contains("[prod]\naws_access_key_id = AKIAPROD"));
    assert!(content.contains(&format!("aws_secret_access_key = {}", prod.secret_key)));
    assert!(content.contains(&format!("aws_session_token = {}", prod.session_token)));
}

#[test]
fn resyncing_replaces_the_owned_section_exactly_once() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[legacy]\naws_access_key_id = AKLEGACY\n").unwrap();

    let mut prod = session("prod", SessionKind::RoleAssumed, 60);
    sync_sessions(&path, &[prod.clone()], Utc::now()).unwrap();

    // New credentials for the same profile.
    prod.access_key = "AKIANEWKEY".to_string();
    prod.expiration = Utc::now() + Duration::minutes(90);
    sync_sessions(&path, &[prod], Utc::now()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("[prod]").count(), 1);
    assert_eq!(content.matches("; Managed by cloudctl").count(), 1);
    assert!(content.contains("aws_access_key_id = AKIANEWKEY"));
    assert!(!content.contains("AKIAPROD"));
    assert!(content.contains("[legacy]"));
}

#[test]
fn sync_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[legacy]\naws_access_key_id = AKLEGACY\n").unwrap();

    let sessions = vec![
        session("prod", SessionKind::RoleAssumed, 60),
        session("mfa", SessionKind::MfaBase, 240),
    ];
    let now = Utc::now();

    sync_sessions(&path, &sessions, now).unwrap();
    let first = std::fs::read(&path).unwrap();

    sync_sessions(&path, &sessions, now).unwrap();
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn expired_sessions_are_filtered_and_empty_sets_are_noops() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[legacy]\nk = v\n").unwrap();
    let before = std::fs::read(&path).unwrap();

    let expired = session("gone", SessionKind::RoleAssumed, -5);
    let written = sync_sessions(&path, &[expired], Utc::now()).unwrap();

    assert_eq!(written, 0);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn mfa_sessions_get_their_own_tag() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);

    sync_sessions(&path, &[session("mfa", SessionKind::MfaBase, 240)], Utc::now()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("; Managed by cloudctl (MFA Session) - Expires: "));
}

#[test]
fn unmanaged_comment_above_a_target_section_is_kept() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    // A non-cloudctl comment must never be dropped, even when its section
    // is being rewritten.
    std::fs::write(&path, "; hand-written note\n[prod]\naws_access_key_id = OLD\n").unwrap();

    sync_sessions(&path, &[session("prod", SessionKind::RoleAssumed, 60)], Utc::now()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("; hand-written note"));
    assert_eq!(content.matches("[prod]").count(), 1);
    assert!(!content.contains("OLD"));
}

#[test]
fn orphan_managed_comment_is_dropped() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    // Managed comment at EOF with no section after it.
    std::fs::write(
        &path,
        "[legacy]\nk = v\n\n; Managed by cloudctl (Role Session) - Expires: 2020-01-01 00:00:00\n",
    )
    .unwrap();

    sync_sessions(&path, &[session("prod", SessionKind::RoleAssumed, 60)], Utc::now()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.contains("2020-01-01"));
    assert!(content.contains("[legacy]"));
}

#[test]
fn missing_file_is_created_with_private_mode() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);

    let written =
        sync_sessions(&path, &[session("prod", SessionKind::RoleAssumed, 60)], Utc::now()).unwrap();
    assert_eq!(written, 1);
    assert!(path.exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn managed_section_of_another_profile_is_untouched() {
    let dir = TempDir::new().unwrap();
    let path = creds_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    // A cloudctl-managed section that is not in this sync's target set
    // must survive, comment included.
    let existing = "; Managed by cloudctl (Role Session) - Expires: 2030-01-01 00:00:00\n\
                    [dev]\naws_access_key_id = AKDEV\n";
    std::fs::write(&path, existing).unwrap();

    sync_sessions(&path, &[session("prod", SessionKind::RoleAssumed, 60)], Utc::now()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("Expires: 2030-01-01 00:00:00"));
    assert!(content.contains("[dev]\naws_access_key_id = AKDEV"));
    assert!(content.contains("[prod]"));
}
