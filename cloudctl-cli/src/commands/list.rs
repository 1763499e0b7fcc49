//! `cloudctl list` - print stored profile names.
//!
//! Needs no secret: the envelope keys are unencrypted.

use anyhow::Result;
use cloudctl_core::SessionStore;

use super::paths;

pub async fn run() -> Result<()> {
    let paths = paths()?;
    let store = SessionStore::new(paths.credentials());

    let profiles = store.list_profiles()?;
    if profiles.is_empty() {
        eprintln!("No profiles found.");
        return Ok(());
    }
    for profile in profiles {
        println!("{profile}");
    }
    Ok(())
}
