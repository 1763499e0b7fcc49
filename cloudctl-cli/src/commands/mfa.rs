//! `cloudctl mfa` - MFA device alias CRUD.

use anyhow::Result;
use clap::Subcommand;
use cloudctl_core::AliasStore;

use super::paths;

#[derive(Subcommand, Debug)]
pub enum MfaCommand {
    /// List all MFA device aliases
    List,

    /// Add an MFA device alias
    Add { name: String, arn: String },

    /// Remove an MFA device alias
    #[command(alias = "rm", alias = "delete")]
    Remove { name: String },

    /// Export all MFA device aliases to JSON (stdout or a file)
    Export { file: Option<String> },

    /// Import MFA device aliases from a JSON file, merging with existing ones
    Import { file: String },
}

pub async fn run(command: MfaCommand) -> Result<()> {
    let store = AliasStore::new(paths()?.mfa_aliases());

    match command {
        MfaCommand::List => {
            let devices = store.list()?;
            if devices.is_empty() {
                eprintln!("No MFA devices found.");
                eprintln!("\nAdd one with:\n   cloudctl mfa add <name> <arn>");
                return Ok(());
            }
            for (name, arn) in devices {
                println!("{name:<20} {arn}");
            }
        }
        MfaCommand::Add { name, arn } => {
            if !arn.starts_with("arn:aws:iam::") || !arn.contains(":mfa/") {
                eprintln!(
                    "Warning: that does not look like an MFA ARN \
                     (expected arn:aws:iam::<account-id>:mfa/<username>)."
                );
            }
            store.save(&name, &arn)?;
            eprintln!("Added MFA device '{name}'");
        }
        MfaCommand::Remove { name } => {
            store.remove(&name)?;
            eprintln!("Removed MFA device '{name}'");
        }
        MfaCommand::Export { file } => {
            let devices = store.list()?;
            let json = serde_json::to_string_pretty(&devices)?;
            match file {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    eprintln!("Exported {} devices to {path}", devices.len());
                }
                None => println!("{json}"),
            }
        }
        MfaCommand::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let imported: std::collections::BTreeMap<String, String> =
                serde_json::from_str(&raw)?;

            let mut merged = store.list()?;
            let count = imported.len();
            merged.extend(imported);
            store.save_all(&merged)?;
            eprintln!("Imported {count} devices");
        }
    }
    Ok(())
}
