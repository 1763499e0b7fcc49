//! `cloudctl sync` - export sessions to the shared AWS credentials file.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::sync::sync_sessions;

use crate::ui;

use super::{engine, paths, resolve_secret};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync all active sessions
    #[arg(long)]
    pub all: bool,

    /// Sync a single profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Secret for decryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret(args.secret.as_deref())?;

    let sessions = engine.store().list_all(&secret)?;
    if sessions.is_empty() {
        eprintln!("No stored sessions found.");
        return Ok(());
    }

    let now = Utc::now();
    let active: Vec<_> = sessions.into_iter().filter(|s| !s.is_expired(now)).collect();
    if active.is_empty() {
        eprintln!("No active (non-expired) sessions to sync.");
        return Ok(());
    }

    let targets = if args.all {
        active
    } else if let Some(profile) = args.profile {
        let target: Vec<_> = active.into_iter().filter(|s| s.profile == profile).collect();
        if target.is_empty() {
            anyhow::bail!("profile '{profile}' not found or expired");
        }
        target
    } else {
        let mut options: Vec<String> = active.iter().map(|s| s.profile.clone()).collect();
        options.sort();
        let selected = ui::select("Select active profile to sync", &options)?;
        active.into_iter().filter(|s| s.profile == selected).collect()
    };

    let written = sync_sessions(paths.aws_credentials(), &targets, now)?;
    eprintln!(
        "Synced {written} profiles to {}",
        paths.aws_credentials().display()
    );

    Ok(())
}
