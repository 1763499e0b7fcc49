//! `cloudctl prompt` - compact session indicator for shell prompts.
//!
//! The current session is identified by `AWS_ACCESS_KEY_ID` (what the
//! shell actually has exported), falling back to the `CLOUDCTL_PROFILE`
//! pin. Missing context produces no output rather than an error so prompt
//! hooks stay quiet.

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use cloudctl_core::{SecretProvider, Session};

use super::{engine, format_remaining, paths};

#[derive(Args, Debug)]
pub struct PromptArgs {
    /// Secret for decryption (or set CLOUDCTL_SECRET)
    #[arg(long)]
    pub secret: Option<String>,

    #[command(subcommand)]
    pub command: Option<PromptCommand>,
}

#[derive(Subcommand, Debug)]
pub enum PromptCommand {
    /// Detailed session info as JSON
    Info,

    /// Show shell integration instructions
    Setup,
}

pub async fn run(args: PromptArgs) -> Result<()> {
    match args.command {
        Some(PromptCommand::Setup) => {
            print_setup();
            Ok(())
        }
        Some(PromptCommand::Info) => {
            match current_session(args.secret.as_deref()) {
                Some(session) => {
                    let now = Utc::now();
                    let info = serde_json::json!({
                        "profile": session.profile,
                        "role_arn": session.role_arn,
                        "expiration": session.expiration.to_rfc3339(),
                        "remaining": session.remaining(now).num_seconds(),
                        "expired": session.is_expired(now),
                    });
                    println!("{info}");
                }
                None => println!("{{}}"),
            }
            Ok(())
        }
        None => {
            let Some(session) = current_session(args.secret.as_deref()) else {
                return Ok(());
            };
            let now = Utc::now();
            if session.is_expired(now) {
                print!("☁️  {} (expired)", session.profile);
            } else {
                print!(
                    "☁️  {} ({})",
                    session.profile,
                    format_remaining(session.remaining(now))
                );
            }
            use std::io::Write;
            std::io::stdout().flush()?;
            Ok(())
        }
    }
}

fn current_session(secret_flag: Option<&str>) -> Option<Session> {
    let secret = SecretProvider::resolve(secret_flag).ok()?;
    let paths = paths().ok()?;
    let sessions = engine(&paths).store().list_all(&secret).ok()?;

    if let Ok(access_key) = std::env::var("AWS_ACCESS_KEY_ID") {
        if !access_key.is_empty() {
            return sessions.into_iter().find(|s| s.access_key == access_key);
        }
    }

    let pinned = std::env::var("CLOUDCTL_PROFILE").ok()?;
    sessions.into_iter().find(|s| s.profile == pinned)
}

fn print_setup() {
    println!(
        r#"Shell prompt integration
========================

Add CloudCtl session info to your prompt by adding these lines to your
shell config:

Bash (~/.bashrc) or Zsh (~/.zshrc):
-----------------------------------
export CLOUDCTL_SECRET="your-32-char-secret-key"

cloudctl_prompt() {{
  cloudctl prompt 2>/dev/null
}}

# Bash: PS1='$(cloudctl_prompt) \u@\h:\w\$ '
# Zsh:  PROMPT='$(cloudctl_prompt) %n@%m:%~%# '

Fish (~/.config/fish/config.fish):
----------------------------------
set -gx CLOUDCTL_SECRET "your-32-char-secret-key"

function fish_prompt
    cloudctl prompt 2>/dev/null
    echo -n ' '
    echo -n (whoami)@(hostname):(prompt_pwd)'> '
end

After setup, your prompt will show:
  ☁️  prod-admin (45m) user@host:~$
"#
    );
}
