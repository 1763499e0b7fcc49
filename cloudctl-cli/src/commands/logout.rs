//! `cloudctl logout` - remove one or all stored sessions.

use anyhow::Result;
use clap::Args;

use crate::ui;

use super::{engine, paths};

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Profile to remove from the credential store
    #[arg(long)]
    pub profile: Option<String>,

    /// Remove all stored profiles
    #[arg(long)]
    pub all: bool,
}

pub async fn run(args: LogoutArgs) -> Result<()> {
    let paths = paths()?;
    let engine = engine(&paths);

    if args.all {
        if !ui::confirm_destructive("This will remove all stored credentials.")? {
            eprintln!("Operation cancelled.");
            return Ok(());
        }
        engine.clear_all()?;
        eprintln!("All profiles removed.");
        return Ok(());
    }

    let profile = match args.profile {
        Some(profile) => profile,
        None => {
            let profiles = engine.store().list_profiles()?;
            if profiles.is_empty() {
                anyhow::bail!("no stored profiles found");
            }
            ui::select("Select profile to logout", &profiles)?
        }
    };

    engine.logout(&profile)?;
    eprintln!("Profile '{profile}' removed.");
    Ok(())
}
