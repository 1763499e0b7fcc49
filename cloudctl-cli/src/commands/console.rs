//! `cloudctl console` - federation sign-in URL for a role session.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::federation::FederationClient;
use cloudctl_core::SessionKind;

use crate::ui;

use super::{engine, paths, resolve_secret};

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    /// Profile to generate a console URL for
    #[arg(long)]
    pub profile: Option<String>,

    /// Secret for decryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,

    /// AWS region for the console destination
    #[arg(long)]
    pub region: Option<String>,

    /// Open the URL in a browser instead of printing it
    #[arg(long)]
    pub open: bool,
}

pub async fn run(args: ConsoleArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret(args.secret.as_deref())?;
    let now = Utc::now();

    let profile = match args.profile {
        Some(profile) => profile,
        None => {
            let sessions = engine.store().list_all(&secret)?;
            let mut options: Vec<String> = sessions
                .iter()
                .filter(|s| !s.is_expired(now) && s.kind == SessionKind::RoleAssumed)
                .map(|s| s.profile.clone())
                .collect();
            options.sort();
            if options.is_empty() {
                anyhow::bail!("no active role sessions found; login or refresh first");
            }
            ui::select("Select profile", &options)?
        }
    };

    let session = engine.store().load(&profile, &secret)?;
    let region = args.region.or_else(|| {
        if session.region.is_empty() {
            None
        } else {
            Some(session.region.clone())
        }
    });

    eprintln!("Getting sign-in token...");
    let url = FederationClient::new()
        .console_url(&session, region.as_deref(), now)
        .await
        .map_err(|e| match &e {
            cloudctl_core::CloudCtlError::SessionExpired { profile } => anyhow::anyhow!(
                "{e}\nRefresh it first:\n   cloudctl refresh {profile}"
            ),
            cloudctl_core::CloudCtlError::Unsupported { .. } => anyhow::anyhow!(
                "{e}\nAssume a role off it instead:\n   \
                 cloudctl login --source {profile} --profile <name> --role <role-arn>"
            ),
            _ => anyhow::anyhow!(e),
        })?;

    eprintln!("Console URL generated for profile '{}'", session.profile);
    eprintln!("   Role:    {}", session.role_arn);
    eprintln!(
        "   Expires: {}",
        session
            .expiration
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );

    if args.open {
        eprintln!("Opening AWS console in browser...");
        if let Err(e) = ui::open_browser(&url) {
            eprintln!("Could not open a browser ({e}); open this URL manually:");
            println!("{url}");
        }
    } else {
        println!("{url}");
    }

    Ok(())
}
