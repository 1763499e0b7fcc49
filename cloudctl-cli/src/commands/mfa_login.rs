//! `cloudctl mfa-login` - obtain an MFA base session for role chaining.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use cloudctl_core::{AliasStore, MfaLoginRequest};

use crate::ui;

use super::{engine, format_remaining, paths, resolve_secret};

#[derive(Args, Debug)]
pub struct MfaLoginArgs {
    /// Source AWS CLI profile for base credentials
    #[arg(long)]
    pub source: String,

    /// Name to store the MFA session as
    #[arg(long)]
    pub profile: String,

    /// MFA device ARN (or a saved MFA alias)
    #[arg(long)]
    pub mfa: String,

    /// Secret for encryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,

    /// Session duration in seconds (default 43200 = 12 h, max 129600 = 36 h)
    #[arg(long)]
    pub duration: Option<i32>,
}

pub async fn run(args: MfaLoginArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);
    let secret = resolve_secret(args.secret.as_deref())?;

    let mfa_arn = if args.mfa.starts_with("arn:") {
        args.mfa.clone()
    } else {
        AliasStore::new(paths.mfa_aliases())
            .get(&args.mfa)?
            .unwrap_or(args.mfa.clone())
    };

    eprintln!("Getting MFA session token from profile {}...", args.source);

    let request = MfaLoginRequest {
        source_profile: args.source,
        profile: args.profile,
        mfa_arn,
        duration_seconds: args.duration,
    };
    let session = engine.mfa_login(&request, &secret, &ui::TermPrompt).await?;

    let remaining = format_remaining(session.remaining(Utc::now()));
    eprintln!("MFA session stored as '{}'", session.profile);
    eprintln!("   MFA device: {}", session.mfa_arn);
    eprintln!("   Source:     {}", session.source_profile);
    eprintln!(
        "   Expires:    {} ({remaining} remaining)",
        session
            .expiration
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    eprintln!("\nYou can now assume roles without re-entering MFA:");
    eprintln!(
        "   cloudctl login --source {} --profile <name> --role <role-arn>",
        session.profile
    );

    Ok(())
}
