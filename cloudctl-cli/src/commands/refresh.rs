//! `cloudctl refresh` - smart single or intelligent batch refresh.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::sync::sync_sessions;
use cloudctl_core::RefreshOutcome;

use crate::ui;

use super::{engine, paths, resolve_secret};

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Profile to refresh (interactive selection when omitted)
    pub profile: Option<String>,

    /// Profile to refresh (flag form)
    #[arg(long = "profile")]
    pub profile_flag: Option<String>,

    /// Refresh every stored session
    #[arg(long)]
    pub all: bool,

    /// Secret for decryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,

    /// Force interactive re-login even if the session is active
    #[arg(short, long)]
    pub force: bool,
}

pub async fn run(args: RefreshArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret(args.secret.as_deref())?;

    if args.all {
        eprintln!("Intelligent batch refresh starting...");
        let summary = engine.refresh_all(&secret, &ui::TermPrompt).await?;
        eprintln!(
            "\nSummary: {} refreshed, {} skipped, {} failed",
            summary.refreshed, summary.skipped, summary.failed
        );

        if summary.refreshed > 0 {
            let sessions = engine.store().list_all(&secret)?;
            let written = sync_sessions(paths.aws_credentials(), &sessions, Utc::now())?;
            eprintln!(
                "Synced {written} sessions to {}",
                paths.aws_credentials().display()
            );
        }
        return Ok(());
    }

    let profile = match args.profile_flag.or(args.profile) {
        Some(profile) => profile,
        None => {
            let sessions = engine.store().list_all(&secret)?;
            if sessions.is_empty() {
                anyhow::bail!("no sessions found");
            }
            let now = Utc::now();
            let options: Vec<String> = sessions
                .iter()
                .map(|s| {
                    let status = if s.is_expired(now) { "expired" } else { "active" };
                    format!("{} [{status}]", s.profile)
                })
                .collect();
            let selected = ui::select("Select session to refresh or restore", &options)?;
            selected
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        }
    };

    match engine
        .refresh(&profile, &secret, args.force, &ui::TermPrompt)
        .await?
    {
        RefreshOutcome::Silent(session) => {
            eprintln!("Session '{}' refreshed silently.", session.profile);
        }
        RefreshOutcome::Restored {
            session,
            silent_error,
        } => {
            if let Some(reason) = silent_error {
                eprintln!("Silent refresh failed ({reason}); session was restored instead.");
            }
            eprintln!(
                "Session '{}' restored. Expires: {}",
                session.profile,
                session
                    .expiration
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
