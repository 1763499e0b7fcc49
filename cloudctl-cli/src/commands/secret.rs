//! `cloudctl secret` - keystore introspection.

use anyhow::Result;
use clap::Subcommand;
use cloudctl_core::SecretProvider;

use crate::ui;

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    /// Reveal the secret stored in the system keystore
    Show,

    /// Save an existing secret into the keystore
    Import { key: Option<String> },
}

pub async fn run(command: SecretCommand) -> Result<()> {
    if !SecretProvider::keystore_supported() {
        anyhow::bail!("no native keystore on this platform");
    }

    match command {
        SecretCommand::Show => {
            let Some(secret) = SecretProvider::stored()? else {
                anyhow::bail!(
                    "no secret found in the keystore; provision one with:\n   \
                     cloudctl secret import <key>"
                );
            };
            eprintln!("Your CloudCtl encryption secret:");
            eprintln!("{}", "-".repeat(64));
            println!("{}", secret.expose());
            eprintln!("{}", "-".repeat(64));
            eprintln!("\nKeep this safe. You will need it to restore access on another machine.");
            eprintln!("   To restore there: cloudctl secret import <key>");
        }
        SecretCommand::Import { key } => {
            let key = match key {
                Some(key) => key,
                None => ui::input("Enter secret key to import", "")?,
            };
            if key.is_empty() {
                anyhow::bail!("secret key cannot be empty");
            }
            SecretProvider::import(&key)?;
            eprintln!("Secret imported into the keystore.");
        }
    }
    Ok(())
}
