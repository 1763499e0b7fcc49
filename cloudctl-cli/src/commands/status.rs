//! `cloudctl status` - classified session listing.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::{Session, SessionKind, SessionState};

use super::{engine, format_remaining, paths, resolve_secret};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Filter by a specific profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Secret for decryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,

    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret(args.secret.as_deref())?;

    let mut sessions = engine.store().list_all(&secret)?;
    if let Some(filter) = &args.profile {
        sessions.retain(|s| &s.profile == filter);
        if sessions.is_empty() {
            anyhow::bail!("no session found for profile: {filter}");
        }
    }
    if sessions.is_empty() {
        eprintln!("No stored sessions found.");
        return Ok(());
    }

    sessions.sort_by_key(|s| s.expiration);
    let now = Utc::now();

    if args.json {
        // Credentials are deliberately absent: stdout only ever carries
        // them during `switch` and inside the synced credentials file.
        let entries: Vec<serde_json::Value> = sessions
            .iter()
            .map(|s| {
                serde_json::json!({
                    "profile": s.profile,
                    "kind": match s.kind {
                        SessionKind::MfaBase => "mfa_base",
                        SessionKind::RoleAssumed => "role_assumed",
                    },
                    "role_arn": s.role_arn,
                    "source_profile": s.source_profile,
                    "region": s.region,
                    "expiration": s.expiration.to_rfc3339(),
                    "remaining_seconds": s.remaining(now).num_seconds(),
                    "expired": s.is_expired(now),
                    "revoked": s.revoked,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{:<3} {:<20} {:<50} {:<20} {:<12} {}",
        "", "PROFILE", "ROLE ARN", "EXPIRATION", "REMAINING", "STATUS"
    );
    println!("{}", "-".repeat(118));

    for session in &sessions {
        let (icon, status) = render_state(session, now);
        let remaining = if session.revoked {
            "-".to_string()
        } else if session.is_expired(now) {
            "expired".to_string()
        } else {
            format!("{} left", format_remaining(session.remaining(now)))
        };

        println!(
            "{:<3} {:<20} {:<50} {:<20} {:<12} {}",
            icon,
            session.profile,
            truncate(session.stored_role_arn(), 48),
            session
                .expiration
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            remaining,
            status,
        );
    }

    Ok(())
}

/// Icon plus status label; MFA sessions show the MFA variant of the
/// active/expiring icon.
fn render_state(session: &Session, now: chrono::DateTime<Utc>) -> (String, &'static str) {
    if session.revoked {
        return ("⛔".to_string(), "REVOKED");
    }
    let (icon, status) = match session.state(now) {
        SessionState::Active => ("🟢", "ACTIVE"),
        SessionState::Expiring => ("🟡", "EXPIRING"),
        SessionState::Expired => ("🔴", "EXPIRED"),
    };
    if session.kind == SessionKind::MfaBase {
        (format!("{icon}🔐"), status)
    } else {
        (icon.to_string(), status)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        format!("{}...", &text[..max - 3])
    } else {
        text.to_string()
    }
}
