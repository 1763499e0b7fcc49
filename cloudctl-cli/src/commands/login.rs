//! `cloudctl login` - assume a role and store the session.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::federation::FederationClient;
use cloudctl_core::{AliasStore, LoginRequest};

use crate::ui;

use super::{aws_profiles, engine, format_remaining, paths, resolve_secret};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Source AWS CLI profile or stored session for base credentials
    #[arg(long)]
    pub source: Option<String>,

    /// Name to store the new session as
    #[arg(long)]
    pub profile: Option<String>,

    /// Target IAM role ARN (or a saved role alias) to assume
    #[arg(long)]
    pub role: Option<String>,

    /// MFA device ARN (or a saved MFA alias)
    #[arg(long)]
    pub mfa: Option<String>,

    /// Secret for encryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// Session duration in seconds (floor 900, default 3600)
    #[arg(long)]
    pub duration: Option<i32>,

    /// Open the AWS console after login
    #[arg(long)]
    pub open: bool,
}

pub async fn run(args: LoginArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret(args.secret.as_deref())?;

    let source = match args.source {
        Some(source) => source,
        None => {
            let mut options = aws_profiles();
            for p in engine.store().list_profiles()? {
                if !options.contains(&p) {
                    options.push(p);
                }
            }
            ui::select("Select source profile", &options)?
        }
    };

    let profile = match args.profile {
        Some(profile) => profile,
        None => ui::input("Enter session name", "prod-admin")?,
    };

    let role_arn = match args.role {
        Some(role) => resolve_alias(&AliasStore::new(paths.role_aliases()), &role)?,
        None => ui::input("Enter role ARN", "arn:aws:iam::123456789012:role/RoleName")?,
    };

    let mfa_arn = match args.mfa {
        Some(mfa) => Some(resolve_alias(&AliasStore::new(paths.mfa_aliases()), &mfa)?),
        None => None,
    };

    let request = LoginRequest {
        source_profile: source,
        profile,
        role_arn,
        mfa_arn,
        region: args.region,
        duration_seconds: args.duration,
    };
    let session = engine.login(&request, &secret, &ui::TermPrompt).await?;

    let remaining = format_remaining(session.remaining(Utc::now()));
    eprintln!("Encrypted session stored as '{}'", session.profile);
    eprintln!("   Role:    {}", session.role_arn);
    eprintln!("   Source:  {}", session.source_profile);
    eprintln!(
        "   Expires: {} ({remaining} remaining)",
        session
            .expiration
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );

    if args.open {
        eprintln!("\nOpening AWS console...");
        let url = FederationClient::new()
            .console_url(&session, Some(&session.region), Utc::now())
            .await?;
        if let Err(e) = ui::open_browser(&url) {
            eprintln!("Could not open a browser ({e}); URL:\n{url}");
        }
    }

    Ok(())
}

/// Treat anything that is not an ARN as an alias and look it up.
fn resolve_alias(store: &AliasStore, value: &str) -> Result<String> {
    if value.starts_with("arn:") {
        return Ok(value.to_string());
    }
    match store.get(value)? {
        Some(arn) => Ok(arn),
        None => Ok(value.to_string()),
    }
}
