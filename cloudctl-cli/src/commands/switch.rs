//! `cloudctl switch` - print `export AWS_*` lines for eval.
//!
//! On success stdout carries exactly the three export lines; everything
//! else goes to stderr so `eval $(cloudctl switch ...)` stays safe.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::SessionKind;

use crate::ui;

use super::{engine, paths, resolve_secret_quiet};

#[derive(Args, Debug)]
pub struct SwitchArgs {
    /// Profile to switch to (interactive selection when omitted)
    pub profile: Option<String>,

    /// Secret for decryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,
}

pub async fn run(args: SwitchArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret_quiet(args.secret.as_deref())?;
    let now = Utc::now();

    let profile = match args.profile {
        Some(profile) => profile,
        None => {
            let sessions = engine.store().list_all(&secret)?;
            let mut options: Vec<String> = sessions
                .iter()
                .filter(|s| !s.is_expired(now))
                .map(|s| {
                    let kind = match s.kind {
                        SessionKind::MfaBase => "MFA",
                        SessionKind::RoleAssumed => "Role",
                    };
                    format!("{} ({kind})", s.profile)
                })
                .collect();
            options.sort();
            if options.is_empty() {
                anyhow::bail!("no active sessions found; create one first");
            }
            let selected = ui::select("Select active profile", &options)?;
            selected
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        }
    };

    let session = engine.store().load(&profile, &secret).map_err(|e| {
        if let Ok(profiles) = engine.store().list_profiles() {
            if !profiles.is_empty() {
                eprintln!("Available profiles:");
                for p in profiles {
                    eprintln!("   {p}");
                }
            }
        }
        anyhow::anyhow!(e)
    })?;

    if session.is_expired(now) {
        anyhow::bail!(
            "session '{profile}' has expired; refresh it first:\n   cloudctl refresh {profile}"
        );
    }

    println!("export AWS_ACCESS_KEY_ID={}", session.access_key);
    println!("export AWS_SECRET_ACCESS_KEY={}", session.secret_key);
    println!("export AWS_SESSION_TOKEN={}", session.session_token);

    Ok(())
}
