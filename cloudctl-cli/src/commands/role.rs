//! `cloudctl role` - IAM role alias CRUD.

use anyhow::Result;
use clap::Subcommand;
use cloudctl_core::AliasStore;

use crate::ui;

use super::paths;

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    /// List all saved role aliases
    List,

    /// Add a role alias
    Add { name: String, arn: String },

    /// Remove one or all role aliases
    #[command(alias = "rm", alias = "delete")]
    Remove {
        name: Option<String>,

        /// Remove all stored role aliases
        #[arg(long)]
        all: bool,
    },

    /// Export all role aliases to JSON (stdout or a file)
    Export { file: Option<String> },

    /// Import role aliases from a JSON file, merging with existing ones
    Import { file: String },
}

fn store() -> Result<AliasStore> {
    Ok(AliasStore::new(paths()?.role_aliases()))
}

pub async fn run(command: RoleCommand) -> Result<()> {
    match command {
        RoleCommand::List => {
            let roles = store()?.list()?;
            if roles.is_empty() {
                eprintln!("No role aliases found.");
                eprintln!("\nAdd one with:\n   cloudctl role add <name> <arn>");
                return Ok(());
            }
            for (name, arn) in roles {
                println!("{name:<20} {arn}");
            }
        }
        RoleCommand::Add { name, arn } => {
            if !arn.starts_with("arn:aws:iam::") || !arn.contains(":role/") {
                eprintln!(
                    "Warning: that does not look like a role ARN \
                     (expected arn:aws:iam::<account-id>:role/<role-name>)."
                );
            }
            store()?.save(&name, &arn)?;
            eprintln!("Added role alias '{name}'");
        }
        RoleCommand::Remove { name, all } => {
            let store = store()?;
            if all {
                if !ui::confirm_destructive("This will remove ALL saved role aliases.")? {
                    eprintln!("Operation cancelled.");
                    return Ok(());
                }
                store.clear_all()?;
                eprintln!("All role aliases removed.");
                return Ok(());
            }
            let name = match name {
                Some(name) => name,
                None => {
                    let names: Vec<String> = store.list()?.into_keys().collect();
                    if names.is_empty() {
                        anyhow::bail!("no role aliases found");
                    }
                    ui::select("Select role alias to remove", &names)?
                }
            };
            store.remove(&name)?;
            eprintln!("Removed role alias '{name}'");
        }
        RoleCommand::Export { file } => {
            let roles = store()?.list()?;
            let json = serde_json::to_string_pretty(&roles)?;
            match file {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    eprintln!("Exported {} roles to {path}", roles.len());
                }
                None => println!("{json}"),
            }
        }
        RoleCommand::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let imported: std::collections::BTreeMap<String, String> =
                serde_json::from_str(&raw)?;

            let store = store()?;
            let mut merged = store.list()?;
            let count = imported.len();
            merged.extend(imported);
            store.save_all(&merged)?;
            eprintln!("Imported {count} roles");
        }
    }
    Ok(())
}
